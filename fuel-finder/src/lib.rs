//! Client and node registry for the UK Fuel Finder open-data API.
//!
//! The client layers a TTL response cache and OAuth token renewal over a
//! pluggable HTTP transport. The node service exhausts the batched station
//! and price resources into a merged, periodically refreshed registry.

pub mod cache;
pub mod client;
pub mod pagination;
pub mod service;
pub mod web;
