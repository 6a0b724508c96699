//! In-memory vehicle snapshot cache.
//!
//! Entries are never dropped for being old: a stale snapshot is still the
//! last known good state and the gateway may return it as a fallback when
//! both providers are down. `get` reports freshness and lets the caller
//! decide.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::{VehicleId, VehicleSnapshot};

/// Default freshness window for cached snapshots.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

/// A cached snapshot together with its freshness verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub snapshot: VehicleSnapshot,
    pub fresh: bool,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<VehicleId, VehicleSnapshot>,
    freshness_window: Duration,
}

impl CacheInner {
    fn new(freshness_window: Duration) -> Self {
        Self {
            map: HashMap::new(),
            freshness_window,
        }
    }

    fn get(&self, id: &VehicleId) -> Option<CachedSnapshot> {
        self.map.get(id).map(|snapshot| {
            let age = OffsetDateTime::now_utc() - snapshot.captured_at.into_inner();
            // Clock skew can make age negative; those count as fresh.
            let fresh = age < self.freshness_window;
            CachedSnapshot {
                snapshot: snapshot.clone(),
                fresh,
            }
        })
    }

    fn put(&mut self, snapshot: VehicleSnapshot) {
        self.map.insert(snapshot.id.clone(), snapshot);
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Thread-safe snapshot cache shared by the gateway and automation passes.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl SnapshotCache {
    /// Create a cache with an explicit freshness window.
    pub fn new(freshness_window: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::new(freshness_window))),
        }
    }

    /// Create a cache with the default 30 second freshness window.
    pub fn with_default_freshness() -> Self {
        Self::new(DEFAULT_FRESHNESS_WINDOW)
    }

    /// Look up the last stored snapshot for a vehicle.
    ///
    /// Returns `None` only when the vehicle has never been stored.
    /// Freshness is measured against the snapshot's `captured_at`, so a
    /// stale entry comes back with `fresh == false` instead of vanishing.
    pub async fn get(&self, id: &VehicleId) -> Option<CachedSnapshot> {
        let store = self.inner.read().await;
        store.get(id)
    }

    /// Store a snapshot, superseding any previous entry for its vehicle.
    pub async fn put(&self, snapshot: VehicleSnapshot) {
        let mut store = self.inner.write().await;
        store.put(snapshot);
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut store = self.inner.write().await;
        store.clear();
    }

    /// Number of vehicles with a stored snapshot.
    pub async fn len(&self) -> usize {
        let store = self.inner.read().await;
        store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::with_default_freshness()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ChargeState, ChargingState, ClimateState, ConnectivityState, DriveState, SecurityState,
        ShiftState, UtcDateTime,
    };

    fn snapshot(id: &str, captured_at: UtcDateTime) -> VehicleSnapshot {
        VehicleSnapshot::new(
            VehicleId::parse(id).expect("vehicle id"),
            "Test Car",
            ConnectivityState::Online,
            ChargeState::new(64.0, ChargingState::Disconnected, 280.0, 0.0, None)
                .expect("charge state"),
            ClimateState::new(false, Some(21.0), Some(14.0)).expect("climate state"),
            SecurityState::new(true, false, 42_000.0, "2024.8.7").expect("security state"),
            DriveState::new(52.52, 13.405, ShiftState::Park, None).expect("drive state"),
            captured_at,
        )
    }

    #[tokio::test]
    async fn returns_fresh_entry_after_put() {
        let cache = SnapshotCache::with_default_freshness();
        let id = VehicleId::parse("car-1").expect("vehicle id");

        assert!(cache.get(&id).await.is_none());

        cache.put(snapshot("car-1", UtcDateTime::now())).await;
        let cached = cache.get(&id).await.expect("entry");
        assert!(cached.fresh);
        assert_eq!(cached.snapshot.display_name, "Test Car");
    }

    #[tokio::test]
    async fn stale_entry_is_kept_and_flagged() {
        let cache = SnapshotCache::with_default_freshness();
        let id = VehicleId::parse("car-1").expect("vehicle id");

        let old = OffsetDateTime::now_utc() - time::Duration::seconds(90);
        let captured_at = UtcDateTime::from_offset_datetime(old).expect("utc timestamp");
        cache.put(snapshot("car-1", captured_at)).await;

        let cached = cache.get(&id).await.expect("entry");
        assert!(!cached.fresh);
    }

    #[tokio::test]
    async fn entry_goes_stale_after_window_elapses() {
        let cache = SnapshotCache::new(Duration::from_millis(100));
        let id = VehicleId::parse("car-1").expect("vehicle id");

        cache.put(snapshot("car-1", UtcDateTime::now())).await;
        assert!(cache.get(&id).await.expect("entry").fresh);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!cache.get(&id).await.expect("entry").fresh);
    }

    #[tokio::test]
    async fn put_supersedes_previous_entry() {
        let cache = SnapshotCache::with_default_freshness();
        let id = VehicleId::parse("car-1").expect("vehicle id");

        let old = OffsetDateTime::now_utc() - time::Duration::seconds(90);
        cache
            .put(snapshot(
                "car-1",
                UtcDateTime::from_offset_datetime(old).expect("utc timestamp"),
            ))
            .await;
        cache.put(snapshot("car-1", UtcDateTime::now())).await;

        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&id).await.expect("entry").fresh);
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = SnapshotCache::with_default_freshness();

        cache.put(snapshot("car-1", UtcDateTime::now())).await;
        cache.put(snapshot("car-2", UtcDateTime::now())).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
