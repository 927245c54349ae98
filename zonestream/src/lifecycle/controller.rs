//! Zone lifecycle controller.
//!
//! Owns every zone's state, the memory budget and the pending-request map.
//! All bookkeeping happens synchronously under one lock; the lock is never
//! held across an await, so loads resolving from the host's frame loop apply
//! their updates atomically.
//!
//! Collaborators (loader, spawner, store) are invoked while the lock is held
//! and must not call back into the controller.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::state::{DetailLevel, ZoneState};
use super::ticket::{LoadOutcome, LoadTicket};
use crate::budget::{EvictionCandidate, EvictionReport, MemoryBudget, OverrunPolicy};
use crate::error::{ZoneError, ZoneResult};
use crate::host::{EntitySpawner, LoadedZoneHandle, LoaderError, ZoneLoader};
use crate::persistence::ZonePersistence;
use crate::registry::{ZoneId, ZoneRegistry};

/// Counters describing controller activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleStats {
    /// Loader calls issued.
    pub loads_issued: u64,
    /// Requests attached to an already in-flight load.
    pub loads_coalesced: u64,
    /// Loads that failed and were reverted.
    pub loads_failed: u64,
    /// Zones unloaded to make room.
    pub evictions: u64,
    /// All unloads, including evictions and pruning.
    pub unloads: u64,
    /// Loads that proceeded over budget.
    pub overruns: u64,
    /// Snapshot restores performed.
    pub restores: u64,
}

/// Read-only view of one zone's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStatus {
    pub zone: ZoneId,
    pub state: ZoneState,
    pub size_bytes: u64,
    /// Game time the zone was last active.
    pub last_visited_at: Option<Duration>,
    pub is_first_visit: bool,
    pub is_active: bool,
    pub is_pinned: bool,
}

#[derive(Debug)]
struct ZoneRecord {
    size_bytes: u64,
    state: ZoneState,
    last_visited_at: Option<Duration>,
    first_visit: bool,
    /// Snapshot already restored during the current residency.
    restored: bool,
    handle: Option<LoadedZoneHandle>,
}

/// How a new load finds room in the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// Evict, then apply the overrun policy.
    Evict,
    /// Proceed only if the zone fits without either.
    FitOnly,
}

#[derive(Debug)]
struct PendingLoad {
    target: DetailLevel,
    request: u64,
    ticket: LoadTicket,
}

#[derive(Debug)]
struct ZoneTable {
    records: HashMap<ZoneId, ZoneRecord>,
    pending: HashMap<ZoneId, PendingLoad>,
    budget: MemoryBudget,
    active: Option<ZoneId>,
    pinned: BTreeSet<ZoneId>,
    clock: Duration,
    next_request: u64,
    stats: LifecycleStats,
}

struct Inner {
    registry: Arc<ZoneRegistry>,
    loader: Arc<dyn ZoneLoader>,
    spawner: Arc<dyn EntitySpawner>,
    persistence: ZonePersistence,
    table: Mutex<ZoneTable>,
}

/// Drives per-zone state transitions through the injected loader.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ZoneLifecycle {
    inner: Arc<Inner>,
}

impl ZoneLifecycle {
    /// Create a controller with every registered zone `Unloaded`.
    pub fn new(
        registry: Arc<ZoneRegistry>,
        loader: Arc<dyn ZoneLoader>,
        spawner: Arc<dyn EntitySpawner>,
        persistence: ZonePersistence,
        budget: MemoryBudget,
    ) -> Self {
        let records = registry
            .zones()
            .into_iter()
            .map(|zone| {
                (
                    zone.id.clone(),
                    ZoneRecord {
                        size_bytes: zone.size_bytes(),
                        state: ZoneState::Unloaded,
                        last_visited_at: None,
                        first_visit: true,
                        restored: false,
                        handle: None,
                    },
                )
            })
            .collect();

        let table = ZoneTable {
            records,
            pending: HashMap::new(),
            budget,
            active: None,
            pinned: BTreeSet::new(),
            clock: Duration::ZERO,
            next_request: 0,
            stats: LifecycleStats::default(),
        };

        Self {
            inner: Arc::new(Inner {
                registry,
                loader,
                spawner,
                persistence,
                table: Mutex::new(table),
            }),
        }
    }

    /// The registry this controller was built from.
    pub fn registry(&self) -> &Arc<ZoneRegistry> {
        &self.inner.registry
    }

    /// The snapshot persistence layer.
    pub fn persistence(&self) -> &ZonePersistence {
        &self.inner.persistence
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────

    /// Request that `zone` become resident at `target` or better.
    ///
    /// - Already at or above `target`: resolves immediately to the held level.
    /// - A load of at least `target` is in flight: returns that same ticket.
    /// - A lower load is in flight: waits for it, then requests `target`.
    /// - Otherwise: makes room if the zone is unloaded, commits its bytes,
    ///   enters `Loading` and calls the loader exactly once.
    ///
    /// # Errors
    ///
    /// `ZoneNotFound` for unknown zones; `BudgetExceeded` when eviction cannot
    /// make room and the overrun policy rejects.
    pub fn request_load(&self, zone: &ZoneId, target: DetailLevel) -> ZoneResult<LoadTicket> {
        self.issue_load(zone, target, Admission::Evict)
    }

    /// Request a load that only proceeds if the zone fits as things stand.
    ///
    /// Never evicts and never overruns the budget, whatever the overrun
    /// policy. Used for prefetching.
    ///
    /// # Errors
    ///
    /// `ZoneNotFound` for unknown zones; `BudgetExceeded` when the zone does
    /// not fit in the free budget.
    pub fn request_speculative(
        &self,
        zone: &ZoneId,
        target: DetailLevel,
    ) -> ZoneResult<LoadTicket> {
        self.issue_load(zone, target, Admission::FitOnly)
    }

    fn issue_load(
        &self,
        zone: &ZoneId,
        target: DetailLevel,
        admission: Admission,
    ) -> ZoneResult<LoadTicket> {
        let mut table = self.inner.table.lock();

        let (size_bytes, previous) = match table.records.get(zone) {
            Some(record) => (record.size_bytes, record.state),
            None => return Err(ZoneError::ZoneNotFound(zone.clone())),
        };

        if let Some(pending) = table.pending.get(zone) {
            if pending.target >= target {
                let ticket = pending.ticket.clone();
                table.stats.loads_coalesced += 1;
                debug!(zone = %zone, level = %target, "Coalesced onto in-flight load");
                return Ok(ticket);
            }

            let lower = pending.ticket.clone();
            drop(table);
            debug!(zone = %zone, level = %target, "Upgrade queued behind in-flight load");

            let controller = self.clone();
            let zone_id = zone.clone();
            return Ok(LoadTicket::new(zone.clone(), target, async move {
                let _ = lower.await;
                controller.issue_load(&zone_id, target, admission)?.await
            }));
        }

        if let Some(level) = previous.detail_level() {
            if level >= target {
                return Ok(LoadTicket::ready(zone.clone(), target, Ok(level)));
            }
        }

        let mut committed = 0;
        if previous == ZoneState::Unloaded {
            match admission {
                Admission::Evict => {
                    let protected = table.active.clone();
                    self.make_room(&mut table, size_bytes, protected.as_ref())?;
                }
                Admission::FitOnly if !table.budget.can_afford(size_bytes) => {
                    return Err(ZoneError::BudgetExceeded {
                        requested: size_bytes,
                        available: table.budget.available(),
                    });
                }
                Admission::FitOnly => {}
            }
            table.budget.commit(size_bytes);
            committed = size_bytes;
        }

        if let Some(record) = table.records.get_mut(zone) {
            record.state = ZoneState::Loading;
        }
        let request = table.next_request;
        table.next_request += 1;
        table.stats.loads_issued += 1;

        let load = self.inner.loader.load(zone, target);
        let controller = self.clone();
        let zone_id = zone.clone();
        let ticket = LoadTicket::new(zone.clone(), target, async move {
            let result = load.await;
            controller.finish_load(&zone_id, target, request, previous, committed, result)
        });

        table.pending.insert(
            zone.clone(),
            PendingLoad {
                target,
                request,
                ticket: ticket.clone(),
            },
        );

        debug!(
            zone = %zone,
            level = %target,
            from = %previous,
            committed_bytes = table.budget.committed_bytes(),
            "Zone load issued"
        );

        Ok(ticket)
    }

    fn finish_load(
        &self,
        zone: &ZoneId,
        target: DetailLevel,
        request: u64,
        previous: ZoneState,
        committed: u64,
        result: Result<LoadedZoneHandle, LoaderError>,
    ) -> LoadOutcome {
        let mut table = self.inner.table.lock();

        if table.pending.get(zone).map(|p| p.request) != Some(request) {
            if let Ok(handle) = result {
                self.inner.loader.release(handle);
            }
            debug!(zone = %zone, level = %target, "Discarding result of cancelled load");
            return Err(ZoneError::LoadCancelled(zone.clone()));
        }
        table.pending.remove(zone);
        let is_active = table.active.as_ref() == Some(zone);

        match result {
            Ok(handle) => {
                let mut restore = false;
                if let Some(record) = table.records.get_mut(zone) {
                    record.state = target.into();
                    if let Some(old) = record.handle.replace(handle) {
                        self.inner.loader.release(old);
                    }
                    restore = is_active && target == DetailLevel::Full && !record.restored;
                }
                info!(zone = %zone, level = %target, "Zone loaded");

                if restore {
                    self.restore_locked(&mut table, zone);
                }
                Ok(target)
            }
            Err(e) => {
                if let Some(record) = table.records.get_mut(zone) {
                    record.state = previous;
                }
                if committed > 0 {
                    table.budget.release(committed);
                }
                table.stats.loads_failed += 1;
                warn!(
                    zone = %zone,
                    level = %target,
                    reverted_to = %previous,
                    error = %e,
                    "Zone load failed"
                );
                Err(ZoneError::LoadFailed {
                    zone: zone.clone(),
                    reason: e.message,
                })
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Budget / eviction
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `bytes` more fit under the budget.
    pub fn can_afford(&self, bytes: u64) -> bool {
        self.inner.table.lock().budget.can_afford(bytes)
    }

    /// Unload least-recently-visited zones until `bytes` fit.
    ///
    /// Candidates are all zones holding memory except `protected`, the
    /// active zone and pinned zones. A candidate with a load in flight has
    /// that load cancelled.
    pub fn ensure_afford(
        &self,
        bytes: u64,
        protected: Option<&ZoneId>,
    ) -> ZoneResult<EvictionReport> {
        let mut table = self.inner.table.lock();
        self.make_room(&mut table, bytes, protected)
    }

    fn make_room(
        &self,
        table: &mut ZoneTable,
        bytes: u64,
        protected: Option<&ZoneId>,
    ) -> ZoneResult<EvictionReport> {
        let mut report = EvictionReport::default();
        if table.budget.can_afford(bytes) {
            return Ok(report);
        }

        let candidates = table
            .records
            .iter()
            .filter(|(id, record)| {
                record.state.holds_memory()
                    && Some(*id) != protected
                    && Some(*id) != table.active.as_ref()
                    && !table.pinned.contains(*id)
            })
            .map(|(id, record)| EvictionCandidate {
                zone: id.clone(),
                last_visited_at: record.last_visited_at,
            })
            .collect();

        for victim in MemoryBudget::eviction_order(candidates) {
            if table.budget.can_afford(bytes) {
                break;
            }
            let freed = if table.pending.contains_key(&victim) {
                self.cancel_load_locked(table, &victim)
            } else {
                self.unload_locked(table, &victim)
            };
            table.stats.evictions += 1;
            info!(zone = %victim, freed_bytes = freed, "Evicted zone to make room");
            report.freed_bytes += freed;
            report.evicted.push(victim);
        }

        if !table.budget.can_afford(bytes) {
            match table.budget.policy() {
                OverrunPolicy::Allow => {
                    report.overrun_bytes = table.budget.record_overrun(bytes);
                    table.stats.overruns += 1;
                    warn!(
                        requested = bytes,
                        committed = table.budget.committed_bytes(),
                        limit = table.budget.limit_bytes(),
                        overrun = report.overrun_bytes,
                        "Nothing left to evict, proceeding over memory budget"
                    );
                }
                OverrunPolicy::Reject => {
                    return Err(ZoneError::BudgetExceeded {
                        requested: bytes,
                        available: table.budget.available(),
                    });
                }
            }
        }

        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Unloading
    // ─────────────────────────────────────────────────────────────────────────

    /// Unload a resident zone.
    ///
    /// Returns `Ok(false)` when there is nothing to unload or a load is in
    /// flight for the zone.
    pub fn unload(&self, zone: &ZoneId) -> ZoneResult<bool> {
        let mut table = self.inner.table.lock();

        let state = match table.records.get(zone) {
            Some(record) => record.state,
            None => return Err(ZoneError::ZoneNotFound(zone.clone())),
        };
        if table.active.as_ref() == Some(zone) {
            return Err(ZoneError::ActiveZoneProtected(zone.clone()));
        }
        if !state.is_resident() {
            debug!(zone = %zone, state = %state, "Nothing to unload");
            return Ok(false);
        }

        Ok(self.unload_locked(&mut table, zone) > 0)
    }

    /// Unload every resident zone outside `keep` (active and pinned zones
    /// are always kept). Returns the zones unloaded.
    pub fn prune(&self, keep: &BTreeSet<ZoneId>) -> Vec<ZoneId> {
        let mut table = self.inner.table.lock();

        let mut victims: Vec<ZoneId> = table
            .records
            .iter()
            .filter(|(id, record)| {
                record.state.is_resident()
                    && !keep.contains(*id)
                    && Some(*id) != table.active.as_ref()
                    && !table.pinned.contains(*id)
            })
            .map(|(id, _)| id.clone())
            .collect();
        victims.sort();

        for victim in &victims {
            self.unload_locked(&mut table, victim);
        }
        if !victims.is_empty() {
            info!(count = victims.len(), "Pruned zones outside the keep set");
        }
        victims
    }

    /// Returns the bytes released.
    fn unload_locked(&self, table: &mut ZoneTable, zone: &ZoneId) -> u64 {
        let Some(record) = table.records.get_mut(zone) else {
            return 0;
        };
        if !record.state.is_resident() {
            return 0;
        }

        let was_full = record.state == ZoneState::Full;
        record.state = ZoneState::Unloading;

        if was_full && self.save_snapshot(zone) {
            record.first_visit = false;
        }
        if let Some(handle) = record.handle.take() {
            self.inner.loader.release(handle);
        }

        record.state = ZoneState::Unloaded;
        record.restored = false;
        let size = record.size_bytes;

        table.budget.release(size);
        table.stats.unloads += 1;
        info!(
            zone = %zone,
            freed_bytes = size,
            committed_bytes = table.budget.committed_bytes(),
            "Zone unloaded"
        );
        size
    }

    /// Abandon an in-flight load and return the zone to `Unloaded`.
    ///
    /// The loader's eventual result is released by `finish_load`, which no
    /// longer finds the request pending. Returns the bytes released.
    fn cancel_load_locked(&self, table: &mut ZoneTable, zone: &ZoneId) -> u64 {
        let Some(pending) = table.pending.remove(zone) else {
            return 0;
        };
        let Some(record) = table.records.get_mut(zone) else {
            return 0;
        };

        if let Some(handle) = record.handle.take() {
            self.inner.loader.release(handle);
        }
        record.state = ZoneState::Unloaded;
        record.restored = false;
        let size = record.size_bytes;

        table.budget.release(size);
        table.stats.unloads += 1;
        info!(
            zone = %zone,
            level = %pending.target,
            freed_bytes = size,
            committed_bytes = table.budget.committed_bytes(),
            "In-flight zone load cancelled"
        );
        size
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Active zone / snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Make `zone` the active zone.
    ///
    /// Stamps the visit time on both the outgoing and incoming zone and
    /// restores the incoming zone's snapshot if it is `Full` and has not been
    /// restored during its current residency.
    pub fn set_active(&self, zone: &ZoneId) -> ZoneResult<()> {
        let mut table = self.inner.table.lock();
        if !table.records.contains_key(zone) {
            return Err(ZoneError::ZoneNotFound(zone.clone()));
        }

        let now = table.clock;
        if let Some(previous) = table.active.take() {
            if let Some(record) = table.records.get_mut(&previous) {
                record.last_visited_at = Some(now);
            }
        }

        let mut restore = false;
        if let Some(record) = table.records.get_mut(zone) {
            record.last_visited_at = Some(now);
            restore = record.state == ZoneState::Full && !record.restored;
            if record.state != ZoneState::Full {
                warn!(zone = %zone, state = %record.state, "Activating a zone that is not fully loaded");
            }
        }
        table.active = Some(zone.clone());
        info!(zone = %zone, "Active zone changed");

        if restore {
            self.restore_locked(&mut table, zone);
        }
        Ok(())
    }

    /// The active zone, if one has been entered.
    pub fn active(&self) -> Option<ZoneId> {
        self.inner.table.lock().active.clone()
    }

    /// Capture and save the live state of `zone`.
    ///
    /// Returns whether a snapshot was written.
    pub fn persist(&self, zone: &ZoneId) -> bool {
        let saved = self.save_snapshot(zone);
        if saved {
            if let Some(record) = self.inner.table.lock().records.get_mut(zone) {
                record.first_visit = false;
            }
        }
        saved
    }

    fn save_snapshot(&self, zone: &ZoneId) -> bool {
        let Some(snapshot) = self.inner.spawner.capture(zone) else {
            return false;
        };
        match self.inner.persistence.save(zone, &snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!(zone = %zone, error = %e, "Failed to save zone snapshot");
                false
            }
        }
    }

    fn restore_locked(&self, table: &mut ZoneTable, zone: &ZoneId) {
        match self.inner.persistence.load(zone) {
            Ok(Some(snapshot)) => {
                let spawner = &self.inner.spawner;
                let mut entities = 0;
                for entity in snapshot.living_entities() {
                    spawner.spawn_entity(zone, &entity.kind, entity.position, entity.health);
                    entities += 1;
                }
                for item in &snapshot.items {
                    spawner.spawn_item(zone, &item.kind, item.position, item.quantity);
                }
                for (door, state) in &snapshot.doors {
                    spawner.set_door(zone, door, *state);
                }
                info!(
                    zone = %zone,
                    entities,
                    items = snapshot.items.len(),
                    doors = snapshot.doors.len(),
                    "Zone snapshot restored"
                );
            }
            Ok(None) => debug!(zone = %zone, "No snapshot to restore"),
            Err(e) => warn!(zone = %zone, error = %e, "Ignoring unreadable zone snapshot"),
        }

        if let Some(record) = table.records.get_mut(zone) {
            record.restored = true;
        }
        table.stats.restores += 1;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pins / clock
    // ─────────────────────────────────────────────────────────────────────────

    /// Protect `zone` from eviction and pruning until unpinned.
    pub fn pin(&self, zone: &ZoneId) {
        self.inner.table.lock().pinned.insert(zone.clone());
    }

    /// Remove eviction protection from `zone`.
    pub fn unpin(&self, zone: &ZoneId) {
        self.inner.table.lock().pinned.remove(zone);
    }

    /// Advance the game clock used for visit timestamps.
    pub fn advance_clock(&self, dt: Duration) {
        let mut table = self.inner.table.lock();
        table.clock += dt;
    }

    /// Current game time.
    pub fn now(&self) -> Duration {
        self.inner.table.lock().clock
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Current state of a zone.
    pub fn state(&self, zone: &ZoneId) -> Option<ZoneState> {
        self.inner.table.lock().records.get(zone).map(|r| r.state)
    }

    /// Lifecycle view of one zone.
    pub fn status(&self, zone: &ZoneId) -> Option<ZoneStatus> {
        let table = self.inner.table.lock();
        table.records.get(zone).map(|r| status_of(&table, zone, r))
    }

    /// Lifecycle view of every zone, sorted by id.
    pub fn statuses(&self) -> Vec<ZoneStatus> {
        let table = self.inner.table.lock();
        let mut statuses: Vec<_> = table
            .records
            .iter()
            .map(|(id, r)| status_of(&table, id, r))
            .collect();
        statuses.sort_by(|a, b| a.zone.cmp(&b.zone));
        statuses
    }

    /// Copy of the memory budget.
    pub fn budget(&self) -> MemoryBudget {
        self.inner.table.lock().budget.clone()
    }

    pub fn committed_bytes(&self) -> u64 {
        self.inner.table.lock().budget.committed_bytes()
    }

    /// Change the budget limit.
    pub fn set_budget_limit(&self, limit_bytes: u64) {
        self.inner.table.lock().budget.set_limit(limit_bytes);
    }

    /// Whether committed bytes equal the declared sizes of all non-unloaded zones.
    pub fn is_budget_consistent(&self) -> bool {
        let table = self.inner.table.lock();
        let expected: u64 = table
            .records
            .values()
            .filter(|r| r.state.holds_memory())
            .map(|r| r.size_bytes)
            .sum();
        expected == table.budget.committed_bytes()
    }

    /// Number of loads in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.table.lock().pending.len()
    }

    /// Activity counters.
    pub fn stats(&self) -> LifecycleStats {
        self.inner.table.lock().stats.clone()
    }
}

fn status_of(table: &ZoneTable, id: &ZoneId, record: &ZoneRecord) -> ZoneStatus {
    ZoneStatus {
        zone: id.clone(),
        state: record.state,
        size_bytes: record.size_bytes,
        last_visited_at: record.last_visited_at,
        is_first_visit: record.first_visit,
        is_active: table.active.as_ref() == Some(id),
        is_pinned: table.pinned.contains(id),
    }
}

impl std::fmt::Debug for ZoneLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.inner.table.lock();
        f.debug_struct("ZoneLifecycle")
            .field("active", &table.active)
            .field("committed_bytes", &table.budget.committed_bytes())
            .field("in_flight", &table.pending.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::simulated::{RecordingSpawner, SimulatedLoader};
    use crate::host::MemoryStore;
    use crate::persistence::DEFAULT_SNAPSHOT_TTL;
    use crate::registry::{SizeCategory, ZoneDefinition, MB};

    fn id(zone: &str) -> ZoneId {
        ZoneId::from(zone)
    }

    /// a and b are 40MB, c is 25MB, d is 10MB.
    fn lifecycle(limit_mb: u64, loader: Arc<SimulatedLoader>) -> ZoneLifecycle {
        let registry = ZoneRegistry::new(
            vec![
                ZoneDefinition::new("a", SizeCategory::Large),
                ZoneDefinition::new("b", SizeCategory::Large),
                ZoneDefinition::new("c", SizeCategory::Medium),
                ZoneDefinition::new("d", SizeCategory::Small),
            ],
            vec![],
        )
        .unwrap();

        ZoneLifecycle::new(
            Arc::new(registry),
            loader,
            Arc::new(RecordingSpawner::new()),
            ZonePersistence::new(Arc::new(MemoryStore::new()), DEFAULT_SNAPSHOT_TTL),
            MemoryBudget::new(limit_mb * MB, OverrunPolicy::Allow),
        )
    }

    fn load_now(lifecycle: &ZoneLifecycle, zone: &str, level: DetailLevel) {
        let ticket = lifecycle.request_load(&id(zone), level).unwrap();
        assert_eq!(ticket.poll_now(), Some(Ok(level)));
    }

    #[test]
    fn test_evicting_in_flight_load_discards_its_result() {
        let loader = Arc::new(SimulatedLoader::new().held());
        let lifecycle = lifecycle(100, loader.clone());

        let a = lifecycle.request_load(&id("a"), DetailLevel::Full).unwrap();
        loader.complete_held(&id("a"));
        assert_eq!(a.poll_now(), Some(Ok(DetailLevel::Full)));
        lifecycle.set_active(&id("a")).unwrap();

        let b = lifecycle.request_load(&id("b"), DetailLevel::Full).unwrap();
        let c = lifecycle.request_load(&id("c"), DetailLevel::Full).unwrap();

        assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Unloaded));
        assert_eq!(lifecycle.state(&id("c")), Some(ZoneState::Loading));
        assert_eq!(lifecycle.committed_bytes(), 65 * MB);
        assert_eq!(lifecycle.in_flight(), 1);

        loader.complete_held(&id("b"));
        assert_eq!(b.poll_now(), Some(Err(ZoneError::LoadCancelled(id("b")))));
        assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Unloaded));
        assert!(loader.released().iter().any(|h| h.zone == id("b")));
        assert_eq!(lifecycle.committed_bytes(), 65 * MB);

        loader.complete_held(&id("c"));
        assert_eq!(c.poll_now(), Some(Ok(DetailLevel::Full)));

        let stats = lifecycle.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.overruns, 0);
        assert!(lifecycle.is_budget_consistent());
    }

    #[test]
    fn test_cancelled_load_failing_late_leaves_budget_alone() {
        let loader = Arc::new(SimulatedLoader::new().held());
        loader.fail_next("b", 1);
        let lifecycle = lifecycle(70, loader.clone());

        let b = lifecycle.request_load(&id("b"), DetailLevel::Simplified).unwrap();
        let a = lifecycle.request_load(&id("a"), DetailLevel::Full).unwrap();
        assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Unloaded));

        loader.complete_all_held();
        assert_eq!(b.poll_now(), Some(Err(ZoneError::LoadCancelled(id("b")))));
        assert_eq!(a.poll_now(), Some(Ok(DetailLevel::Full)));
        assert_eq!(lifecycle.committed_bytes(), 40 * MB);
        assert_eq!(lifecycle.stats().loads_failed, 0);
        assert!(lifecycle.is_budget_consistent());
    }

    #[test]
    fn test_reissued_load_is_not_confused_with_cancelled_one() {
        let loader = Arc::new(SimulatedLoader::new().held());
        let lifecycle = lifecycle(70, loader.clone());

        let stale = lifecycle.request_load(&id("b"), DetailLevel::Full).unwrap();
        lifecycle.ensure_afford(70 * MB, None).unwrap();
        assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Unloaded));

        let fresh = lifecycle.request_load(&id("b"), DetailLevel::Full).unwrap();
        assert!(!stale.same_request(&fresh));
        assert_eq!(loader.complete_held(&id("b")), 2);

        assert_eq!(stale.poll_now(), Some(Err(ZoneError::LoadCancelled(id("b")))));
        assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Loading));
        assert_eq!(fresh.poll_now(), Some(Ok(DetailLevel::Full)));
        assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Full));
        assert_eq!(lifecycle.committed_bytes(), 40 * MB);
    }

    #[test]
    fn test_speculative_request_never_evicts_or_overruns() {
        let lifecycle = lifecycle(60, Arc::new(SimulatedLoader::new()));
        load_now(&lifecycle, "a", DetailLevel::Full);
        lifecycle.set_active(&id("a")).unwrap();
        load_now(&lifecycle, "d", DetailLevel::Full);

        let err = lifecycle
            .request_speculative(&id("b"), DetailLevel::Simplified)
            .unwrap_err();

        assert_eq!(
            err,
            ZoneError::BudgetExceeded {
                requested: 40 * MB,
                available: 10 * MB,
            }
        );
        assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Unloaded));
        assert_eq!(lifecycle.state(&id("d")), Some(ZoneState::Full));
        assert_eq!(lifecycle.committed_bytes(), 50 * MB);
        let stats = lifecycle.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.overruns, 0);
    }

    #[test]
    fn test_speculative_request_loads_when_it_fits() {
        let lifecycle = lifecycle(100, Arc::new(SimulatedLoader::new()));
        load_now(&lifecycle, "a", DetailLevel::Full);
        lifecycle.set_active(&id("a")).unwrap();

        let ticket = lifecycle
            .request_speculative(&id("c"), DetailLevel::Simplified)
            .unwrap();

        assert_eq!(ticket.poll_now(), Some(Ok(DetailLevel::Simplified)));
        assert_eq!(lifecycle.committed_bytes(), 65 * MB);
        assert!(!lifecycle.budget().is_over_limit());
    }
}
