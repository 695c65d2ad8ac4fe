//! Fuel Finder API client.
//!
//! This module provides an HTTP client for the UK Fuel Finder open-data API,
//! which publishes forecourt metadata and pump prices.
//!
//! Key characteristics of the API:
//! - Access needs an OAuth token, issued from client credentials and
//!   renewable with a refresh token
//! - Stations and prices are served in numbered batches starting at 1; an
//!   empty batch marks the end
//! - Both resources accept an `effective-start-timestamp` to return only
//!   records changed since then

#[allow(clippy::module_inception)]
mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod transport;
mod types;

pub use client::{
    CacheMode, ClientConfig, FuelFinderClient, MIN_BATCH_NUMBER, RequestOptions,
    Resource, SUPPORTED_API_VERSION,
};
pub use error::ClientError;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{
    BankHoliday, DayOpeningTime, FuelPrice, FuelPriceEntry, FuelStation, Location,
    OAuthResponse, OAuthToken, OpeningTimes, TokenRenewal, UsualDays,
};
