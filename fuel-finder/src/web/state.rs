//! Application state for the web layer.

use crate::client::{FuelFinderClient, ReqwestTransport, Transport};
use crate::service::NodeService;

/// Shared application state.
///
/// The node service owns the API client, so both the registry and the raw
/// batch endpoints are reached through it.
pub struct AppState<T = ReqwestTransport> {
    pub service: NodeService<T>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<T: Transport + 'static> AppState<T> {
    /// Create a new app state.
    pub fn new(service: NodeService<T>) -> Self {
        Self { service }
    }

    pub fn client(&self) -> &FuelFinderClient<T> {
        self.service.client()
    }
}
