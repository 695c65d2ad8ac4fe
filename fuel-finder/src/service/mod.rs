//! Fuel station node registry.
//!
//! Keeps an in-memory, periodically refreshed merge of station metadata and
//! prices keyed by `node_id`, and saves or restores it as a snapshot.

mod error;
mod nodes;
mod registry;
mod snapshot;

pub use error::ServiceError;
pub use nodes::{NodeService, RefreshOutcome};
pub use registry::{FuelStationNode, NodeUpdate, Registry};
pub use snapshot::{FileSnapshotStore, Snapshot, SnapshotStore};
