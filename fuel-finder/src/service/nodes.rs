//! Periodically refreshed registry of fuel station nodes.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::{ClientError, FuelFinderClient, ReqwestTransport, Resource, Transport};

use super::error::ServiceError;
use super::registry::{FuelStationNode, NodeUpdate, Registry};
use super::snapshot::{Snapshot, SnapshotStore};

/// Result of a call to [`NodeService::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another refresh was already running, so nothing was fetched.
    Skipped,
    /// Both resources were fetched to the end.
    Completed { stations: usize, prices: usize },
}

/// Thread-safe node registry fed by a [`FuelFinderClient`].
///
/// Station and price records are merged by `node_id`. Every refresh asks
/// only for records changed since the previous successful one. Readers may
/// observe a registry that a running refresh has only partly merged.
pub struct NodeService<T = ReqwestTransport> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for NodeService<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    client: FuelFinderClient<T>,
    registry: RwLock<Registry>,
    /// Held for the whole of a refresh.
    refreshing: Mutex<()>,
    /// Ticker task while periodic refresh is scheduled.
    schedule: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(ticker) = self.schedule.get_mut().take() {
            ticker.abort();
        }
    }
}

impl<T: Transport + 'static> NodeService<T> {
    /// Create a service with an empty registry.
    pub fn new(client: FuelFinderClient<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                registry: RwLock::new(Registry::default()),
                refreshing: Mutex::new(()),
                schedule: Mutex::new(None),
            }),
        }
    }

    pub fn client(&self) -> &FuelFinderClient<T> {
        &self.inner.client
    }

    /// Copy of every node.
    pub async fn nodes(&self) -> BTreeMap<String, FuelStationNode> {
        let guard = self.inner.registry.read().await;
        guard.nodes.clone()
    }

    /// Look up a node by id.
    pub async fn node(&self, node_id: &str) -> Option<FuelStationNode> {
        let guard = self.inner.registry.read().await;
        guard.nodes.get(node_id).cloned()
    }

    /// Get the number of nodes in the registry.
    pub async fn len(&self) -> usize {
        let guard = self.inner.registry.read().await;
        guard.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        let guard = self.inner.registry.read().await;
        guard.nodes.is_empty()
    }

    /// Start time of the last successful refresh.
    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        let guard = self.inner.registry.read().await;
        guard.last_refresh
    }

    /// Whether periodic refresh is scheduled.
    pub async fn is_started(&self) -> bool {
        self.inner.schedule.lock().await.is_some()
    }

    /// Whether a refresh is running right now.
    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.try_lock().is_err()
    }

    /// Fetch stations and prices changed since the last successful refresh
    /// and merge them into the registry.
    ///
    /// Returns [`RefreshOutcome::Skipped`] without fetching anything if a
    /// refresh is already running. Pages are merged as they arrive, so a
    /// failed refresh may leave some of its records merged; the watermark
    /// only moves once both resources have been read to the end.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ServiceError> {
        let Ok(_guard) = self.inner.refreshing.try_lock() else {
            debug!("service is currently refreshing");
            return Ok(RefreshOutcome::Skipped);
        };

        // Taken before the first request so that records changing while
        // this refresh runs are asked for again next time.
        let started_at = Utc::now();
        let since = self.last_refresh().await;
        debug!(since = ?since, "refreshing service nodes");

        let client = &self.inner.client;
        let (stations, prices) = futures::try_join!(
            self.merge_pages(client.pages::<NodeUpdate>(Resource::Stations, since)),
            self.merge_pages(client.pages::<NodeUpdate>(Resource::Prices, since)),
        )?;

        self.inner.registry.write().await.last_refresh = Some(started_at);
        let pruned = client.cache().prune().await;

        info!(stations, prices, pruned, "service nodes refreshed");
        Ok(RefreshOutcome::Completed { stations, prices })
    }

    /// Merge each page into the registry as soon as it arrives.
    async fn merge_pages(
        &self,
        pages: impl Stream<Item = Result<Vec<NodeUpdate>, ClientError>>,
    ) -> Result<usize, ServiceError> {
        let mut pages = std::pin::pin!(pages);
        let mut merged = 0;

        while let Some(page) = pages.next().await {
            let page = page?;
            let mut guard = self.inner.registry.write().await;
            merged += guard.merge_page(page);
        }

        Ok(merged)
    }

    /// Refresh every `interval` until [`stop`](Self::stop) is called.
    ///
    /// With `wait_for_initial_refresh`, one refresh runs before this returns
    /// and its failure aborts the start. Otherwise the first refresh happens
    /// one interval from now. Each tick spawns its own refresh; a tick that
    /// lands while the previous refresh is still running is a no-op.
    pub async fn start(
        &self,
        interval: Duration,
        wait_for_initial_refresh: bool,
    ) -> Result<(), ServiceError> {
        if self.is_started().await {
            return Err(ServiceError::AlreadyStarted);
        }
        if interval.is_zero() {
            return Err(ServiceError::InvalidInterval);
        }

        // The schedule lock is not held here, so `stop` and status checks
        // do not wait on the initial refresh.
        if wait_for_initial_refresh {
            self.refresh().await?;
        }

        let mut schedule = self.inner.schedule.lock().await;
        if schedule.is_some() {
            return Err(ServiceError::AlreadyStarted);
        }
        *schedule = Some(spawn_ticker(Arc::downgrade(&self.inner), interval));
        info!(interval_secs = interval.as_secs(), "service started");
        Ok(())
    }

    /// Cancel future refreshes. A refresh already running is left to finish.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        let ticker = self
            .inner
            .schedule
            .lock()
            .await
            .take()
            .ok_or(ServiceError::NotStarted)?;

        ticker.abort();
        info!("service stopped");
        Ok(())
    }

    /// Copy of the registry, watermark included.
    pub async fn snapshot(&self) -> Snapshot {
        let guard = self.inner.registry.read().await;
        Snapshot::from(guard.clone())
    }

    /// Replace the registry with the stored snapshot, if there is one.
    ///
    /// Returns whether a snapshot was found.
    pub async fn restore(&self, store: &impl SnapshotStore) -> Result<bool, ServiceError> {
        let Some(snapshot) = store.load()? else {
            return Ok(false);
        };

        let count = snapshot.nodes.len();
        *self.inner.registry.write().await = Registry::from(snapshot);
        info!(count, "restored service nodes from snapshot");
        Ok(true)
    }

    /// Save the current registry to `store`.
    pub async fn persist(&self, store: &impl SnapshotStore) -> Result<(), ServiceError> {
        let snapshot = self.snapshot().await;
        store.save(&snapshot)?;
        debug!(count = snapshot.nodes.len(), "persisted service nodes");
        Ok(())
    }
}

/// Spawn the periodic refresh task.
///
/// The task only holds a weak reference, so it ends by itself once every
/// handle to the service has been dropped.
fn spawn_ticker<T: Transport + 'static>(inner: Weak<Inner<T>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first tick (fires immediately)
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(inner) = inner.upgrade() else {
                debug!("service dropped, ending refresh schedule");
                return;
            };
            let service = NodeService { inner };

            tokio::spawn(async move {
                match service.refresh().await {
                    Ok(RefreshOutcome::Skipped) => {
                        debug!("previous refresh still running, skipping tick");
                    }
                    Ok(RefreshOutcome::Completed { .. }) => {}
                    Err(e) => warn!(error = %e, "scheduled refresh failed"),
                }
            });
        }
    })
}
