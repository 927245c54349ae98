//! Zone state persistence.
//!
//! Snapshots are written through the host's [`KeyValueStore`] as versioned,
//! timestamped bincode records under `zone_state:<zone id>`. Reading a record
//! that is older than the TTL, or written by an unknown format version,
//! deletes it and reports no snapshot.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use zonestream::host::MemoryStore;
//! use zonestream::persistence::{ZonePersistence, ZoneSnapshot};
//!
//! let persistence = ZonePersistence::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));
//! persistence.save(&"lab".into(), &ZoneSnapshot::new()).unwrap();
//! assert!(persistence.load(&"lab".into()).unwrap().is_some());
//! ```

mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::host::{KeyValueStore, StoreError};
use crate::registry::ZoneId;

pub use snapshot::{DoorState, EntityState, ItemState, ZoneSnapshot};

/// Current on-store record format.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Default snapshot time-to-live in hours.
pub const DEFAULT_SNAPSHOT_TTL_HOURS: u64 = 24;

/// Default snapshot time-to-live.
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(DEFAULT_SNAPSHOT_TTL_HOURS * 3600);

const KEY_PREFIX: &str = "zone_state:";

/// Errors from snapshot persistence.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode snapshot for zone {zone}: {reason}")]
    Encode { zone: ZoneId, reason: String },

    #[error("failed to decode snapshot for zone {zone}: {reason}")]
    Decode { zone: ZoneId, reason: String },
}

/// Leading fields of every record, readable regardless of format version.
#[derive(Debug, Deserialize)]
struct RecordHeader {
    version: u32,
    saved_at_ms: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    version: u32,
    saved_at_ms: i64,
    snapshot: ZoneSnapshot,
}

/// Reads and writes zone snapshots with staleness eviction.
#[derive(Clone)]
pub struct ZonePersistence {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ZonePersistence {
    /// Create a persistence layer over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Snapshot time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store key for a zone.
    pub fn key_for(zone: &ZoneId) -> String {
        format!("{}{}", KEY_PREFIX, zone)
    }

    /// Save a snapshot stamped with the current time.
    pub fn save(&self, zone: &ZoneId, snapshot: &ZoneSnapshot) -> Result<(), PersistenceError> {
        self.save_at(zone, snapshot, Utc::now())
    }

    /// Save a snapshot with an explicit timestamp.
    pub fn save_at(
        &self,
        zone: &ZoneId,
        snapshot: &ZoneSnapshot,
        saved_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let record = SnapshotRecord {
            version: SNAPSHOT_FORMAT_VERSION,
            saved_at_ms: saved_at.timestamp_millis(),
            snapshot: snapshot.clone(),
        };
        let bytes = bincode::serialize(&record).map_err(|e| PersistenceError::Encode {
            zone: zone.clone(),
            reason: e.to_string(),
        })?;

        self.store.set(&Self::key_for(zone), bytes)?;
        debug!(zone = %zone, entities = snapshot.entities.len(), "Zone snapshot saved");
        Ok(())
    }

    /// Load the snapshot for a zone as of now.
    pub fn load(&self, zone: &ZoneId) -> Result<Option<ZoneSnapshot>, PersistenceError> {
        self.load_at(zone, Utc::now())
    }

    /// Load the snapshot for a zone as of `now`.
    ///
    /// Stale and incompatible records are deleted and reported as absent.
    /// Undecodable records are deleted and reported as an error.
    pub fn load_at(
        &self,
        zone: &ZoneId,
        now: DateTime<Utc>,
    ) -> Result<Option<ZoneSnapshot>, PersistenceError> {
        let key = Self::key_for(zone);
        let Some(bytes) = self.store.get(&key)? else {
            return Ok(None);
        };

        let header: RecordHeader = match bincode::deserialize(&bytes) {
            Ok(header) => header,
            Err(e) => return Err(self.discard_corrupt(zone, &key, e.to_string())),
        };

        if header.version != SNAPSHOT_FORMAT_VERSION {
            warn!(
                zone = %zone,
                version = header.version,
                expected = SNAPSHOT_FORMAT_VERSION,
                "Discarding snapshot with unknown format version"
            );
            self.store.delete(&key)?;
            return Ok(None);
        }

        let age_ms = now.timestamp_millis().saturating_sub(header.saved_at_ms);
        if age_ms > 0 && Duration::from_millis(age_ms as u64) > self.ttl {
            debug!(
                zone = %zone,
                age_secs = age_ms / 1000,
                ttl_secs = self.ttl.as_secs(),
                "Discarding stale zone snapshot"
            );
            self.store.delete(&key)?;
            return Ok(None);
        }

        match bincode::deserialize::<SnapshotRecord>(&bytes) {
            Ok(record) => Ok(Some(record.snapshot)),
            Err(e) => Err(self.discard_corrupt(zone, &key, e.to_string())),
        }
    }

    /// Remove the stored snapshot for a zone.
    pub fn forget(&self, zone: &ZoneId) -> Result<bool, PersistenceError> {
        Ok(self.store.delete(&Self::key_for(zone))?)
    }

    fn discard_corrupt(&self, zone: &ZoneId, key: &str, reason: String) -> PersistenceError {
        if let Err(e) = self.store.delete(key) {
            warn!(zone = %zone, error = %e, "Failed to delete corrupt snapshot");
        }
        PersistenceError::Decode {
            zone: zone.clone(),
            reason,
        }
    }
}

impl std::fmt::Debug for ZonePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZonePersistence")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
