//! The zone manager facade.
//!
//! [`ZoneManager`] is the one value a host owns. It wires the lifecycle
//! controller, prefetcher and hand-off orchestrator to the host's
//! collaborators and exposes the four operations a game loop needs:
//! [`enter_zone`](ZoneManager::enter_zone),
//! [`request_transition`](ZoneManager::request_transition),
//! [`tick`](ZoneManager::tick) and
//! [`debug_snapshot`](ZoneManager::debug_snapshot).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zonestream::coord::Vec2;
//! use zonestream::host::simulated::{RecordingPresenter, RecordingSpawner, ScriptedInput, SimulatedLoader};
//! use zonestream::registry::{SizeCategory, ZoneDefinition, ZoneRegistry};
//! use zonestream::ZoneManager;
//!
//! let registry = ZoneRegistry::new(vec![ZoneDefinition::new("lab", SizeCategory::Small)], vec![]).unwrap();
//! let mut manager = ZoneManager::builder(Arc::new(registry))
//!     .loader(Arc::new(SimulatedLoader::new()))
//!     .spawner(Arc::new(RecordingSpawner::new()))
//!     .presenter(Arc::new(RecordingPresenter::new()))
//!     .input(Arc::new(ScriptedInput::new()))
//!     .build()
//!     .unwrap();
//!
//! futures::executor::block_on(manager.enter_zone(&"lab".into())).unwrap();
//! manager.tick(std::time::Duration::from_millis(16), Vec2::ZERO);
//! assert_eq!(manager.debug_snapshot().active_zone, Some("lab".into()));
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::budget::MemoryBudget;
use crate::config::{ConfigError, StreamingConfig};
use crate::coord::Vec2;
use crate::debug::DebugSnapshot;
use crate::error::{ZoneError, ZoneResult};
use crate::host::simulated::StaticInventory;
use crate::host::{
    EntitySpawner, InputSource, Inventory, KeyValueStore, MemoryStore, TransitionPresenter,
    ZoneLoader,
};
use crate::lifecycle::{DetailLevel, LoadTicket, ZoneLifecycle, ZoneState};
use crate::persistence::ZonePersistence;
use crate::prefetch::{PerformanceSignal, SteadyPerformance, ZonePrefetcher};
use crate::registry::{TransitionId, ZoneId, ZoneRegistry};
use crate::transition::{HandoffEvent, TransitionOrchestrator, TransitionView};

/// How a transition request was carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionStart {
    /// An interactive hand-off started; drive it with [`ZoneManager::tick`].
    Interactive(TransitionId),
    /// No transition links the zones; the destination was loaded directly.
    Direct,
}

/// What happened during one [`ZoneManager::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub frame: u64,
    /// A hand-off that ended this frame.
    pub handoff: Option<HandoffEvent>,
    /// Zones the prefetcher requested this frame.
    pub prefetch_requested: Vec<ZoneId>,
    /// Background loads that resolved this frame.
    pub loads_resolved: usize,
    /// Background loads that failed this frame.
    pub loads_failed: usize,
}

/// Owns zone streaming for one world.
pub struct ZoneManager {
    config: StreamingConfig,
    lifecycle: ZoneLifecycle,
    prefetcher: ZonePrefetcher,
    orchestrator: TransitionOrchestrator,
    presenter: Arc<dyn TransitionPresenter>,
    performance: Arc<dyn PerformanceSignal>,
    background: Vec<LoadTicket>,
    frame: u64,
}

impl ZoneManager {
    /// Start building a manager for `registry`.
    pub fn builder(registry: Arc<ZoneRegistry>) -> ZoneManagerBuilder {
        ZoneManagerBuilder::new(registry)
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ZoneRegistry> {
        self.lifecycle.registry()
    }

    /// The lifecycle controller, for direct inspection or manual loads.
    pub fn lifecycle(&self) -> &ZoneLifecycle {
        &self.lifecycle
    }

    pub fn prefetcher(&self) -> &ZonePrefetcher {
        &self.prefetcher
    }

    pub fn active_zone(&self) -> Option<ZoneId> {
        self.lifecycle.active()
    }

    pub fn zone_state(&self, zone: &ZoneId) -> Option<ZoneState> {
        self.lifecycle.state(zone)
    }

    pub fn is_transitioning(&self) -> bool {
        self.orchestrator.is_active()
    }

    pub fn active_transition(&self) -> Option<TransitionView> {
        self.orchestrator.active()
    }

    /// Load `zone` at full detail and make it the active zone.
    ///
    /// Shows the blocking loading indicator while waiting. Saves the previous
    /// active zone's state first and prunes zones outside the keep set after.
    pub async fn enter_zone(&mut self, zone: &ZoneId) -> ZoneResult<()> {
        if self.registry().zone(zone).is_none() {
            return Err(ZoneError::ZoneNotFound(zone.clone()));
        }
        if self.orchestrator.is_active() {
            return Err(ZoneError::TransitionInProgress);
        }

        let previous = self.lifecycle.active();
        if previous.as_ref() == Some(zone) && self.lifecycle.state(zone) == Some(ZoneState::Full) {
            debug!(zone = %zone, "Already in zone");
            return Ok(());
        }
        if let Some(previous) = &previous {
            self.lifecycle.persist(previous);
        }

        self.lifecycle.pin(zone);
        self.presenter.set_loading_indicator(true);
        let result = match self.lifecycle.request_load(zone, DetailLevel::Full) {
            Ok(ticket) => ticket.await,
            Err(e) => Err(e),
        };
        self.presenter.set_loading_indicator(false);
        self.lifecycle.unpin(zone);

        if let Err(e) = result {
            warn!(zone = %zone, error = %e, "Failed to enter zone");
            return Err(e);
        }

        self.lifecycle.set_active(zone)?;
        self.prefetcher.reset_history();

        if previous.is_some() {
            let keep = self
                .registry()
                .connected_zones(zone, self.orchestrator.keep_depth());
            self.lifecycle.prune(&keep);
        }

        info!(
            zone = %zone,
            committed_bytes = self.lifecycle.committed_bytes(),
            "Entered zone"
        );
        Ok(())
    }

    /// Move the player from `from` to `to`.
    ///
    /// Starts the interactive hand-off for the transition linking them. When
    /// no transition links them, falls back to [`enter_zone`](Self::enter_zone).
    ///
    /// # Errors
    ///
    /// - `ZoneNotFound` for unknown zones
    /// - `NotActive` when `from` is not the active zone
    /// - `TransitionInProgress` while another hand-off runs
    /// - `TransitionLocked` when the player lacks the required item
    pub async fn request_transition(
        &mut self,
        from: &ZoneId,
        to: &ZoneId,
    ) -> ZoneResult<TransitionStart> {
        for zone in [from, to] {
            if self.registry().zone(zone).is_none() {
                return Err(ZoneError::ZoneNotFound(zone.clone()));
            }
        }
        if self.orchestrator.is_active() {
            return Err(ZoneError::TransitionInProgress);
        }
        if self.lifecycle.active().as_ref() != Some(from) {
            return Err(ZoneError::NotActive(from.clone()));
        }

        let definition = self.registry().transition_between(from, to).cloned();
        match definition {
            Some(definition) => {
                self.orchestrator.begin(&definition, from, to)?;
                Ok(TransitionStart::Interactive(definition.id))
            }
            None => {
                let error = ZoneError::TransitionNotFound {
                    from: from.clone(),
                    to: to.clone(),
                };
                warn!(error = %error, "Falling back to direct load");
                self.enter_zone(to).await?;
                Ok(TransitionStart::Direct)
            }
        }
    }

    /// Advance one frame.
    ///
    /// Polls outstanding loads without blocking, drives the in-flight
    /// hand-off and runs a prefetch cycle. `position` is the player's world
    /// position, or sequence-local position during a hand-off.
    pub fn tick(&mut self, dt: Duration, position: Vec2) -> TickReport {
        self.frame += 1;
        self.lifecycle.advance_clock(dt);

        let mut report = TickReport {
            frame: self.frame,
            ..Default::default()
        };

        self.background.retain(|ticket| match ticket.poll_now() {
            None => true,
            Some(Ok(_)) => {
                report.loads_resolved += 1;
                false
            }
            Some(Err(e)) => {
                debug!(zone = %ticket.zone(), error = %e, "Background load failed");
                report.loads_failed += 1;
                false
            }
        });

        if let Some(event) = self.orchestrator.update(dt, position) {
            self.prefetcher.reset_history();
            report.handoff = Some(event);
        }

        let tickets = self.prefetcher.tick(
            &self.lifecycle,
            position,
            self.performance.class(),
            self.orchestrator.is_active(),
        );
        for ticket in tickets {
            report.prefetch_requested.push(ticket.zone().clone());
            match ticket.poll_now() {
                None => self.background.push(ticket),
                Some(Ok(_)) => report.loads_resolved += 1,
                Some(Err(_)) => report.loads_failed += 1,
            }
        }

        report
    }

    /// Unload a zone explicitly. The active zone is protected.
    pub fn unload_zone(&self, zone: &ZoneId) -> ZoneResult<bool> {
        self.lifecycle.unload(zone)
    }

    /// Save the active zone's live state now.
    pub fn persist_active(&self) -> bool {
        match self.lifecycle.active() {
            Some(zone) => self.lifecycle.persist(&zone),
            None => false,
        }
    }

    /// Current diagnostics.
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let budget = self.lifecycle.budget();
        DebugSnapshot {
            frame: self.frame,
            active_zone: self.lifecycle.active(),
            committed_bytes: budget.committed_bytes(),
            limit_bytes: budget.limit_bytes(),
            over_budget: budget.is_over_limit(),
            prefetch_status: self.prefetcher.status(),
            prefetch_priorities: self.prefetcher.last_scores().to_vec(),
            zones: self.lifecycle.statuses(),
            active_transition: self.orchestrator.active(),
            lifecycle: self.lifecycle.stats(),
            handoffs: self.orchestrator.stats().clone(),
            background_loads: self.background.len(),
        }
    }
}

impl std::fmt::Debug for ZoneManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneManager")
            .field("frame", &self.frame)
            .field("lifecycle", &self.lifecycle)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`ZoneManager`].
///
/// Loader, spawner, presenter and input are required. The store defaults to
/// an in-memory map, the inventory to empty and performance to steady.
pub struct ZoneManagerBuilder {
    registry: Arc<ZoneRegistry>,
    config: StreamingConfig,
    loader: Option<Arc<dyn ZoneLoader>>,
    spawner: Option<Arc<dyn EntitySpawner>>,
    store: Option<Arc<dyn KeyValueStore>>,
    presenter: Option<Arc<dyn TransitionPresenter>>,
    input: Option<Arc<dyn InputSource>>,
    inventory: Option<Arc<dyn Inventory>>,
    performance: Option<Arc<dyn PerformanceSignal>>,
}

impl ZoneManagerBuilder {
    pub fn new(registry: Arc<ZoneRegistry>) -> Self {
        Self {
            registry,
            config: StreamingConfig::default(),
            loader: None,
            spawner: None,
            store: None,
            presenter: None,
            input: None,
            inventory: None,
            performance: None,
        }
    }

    pub fn config(mut self, config: StreamingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn loader(mut self, loader: Arc<dyn ZoneLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn spawner(mut self, spawner: Arc<dyn EntitySpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn TransitionPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn input(mut self, input: Arc<dyn InputSource>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn inventory(mut self, inventory: Arc<dyn Inventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn performance(mut self, performance: Arc<dyn PerformanceSignal>) -> Self {
        self.performance = Some(performance);
        self
    }

    /// Assemble the manager.
    pub fn build(self) -> Result<ZoneManager, ConfigError> {
        let loader = self.loader.ok_or(ConfigError::MissingCollaborator("loader"))?;
        let spawner = self
            .spawner
            .ok_or(ConfigError::MissingCollaborator("spawner"))?;
        let presenter = self
            .presenter
            .ok_or(ConfigError::MissingCollaborator("presenter"))?;
        let input = self.input.ok_or(ConfigError::MissingCollaborator("input source"))?;
        let store = self.store.unwrap_or_else(|| {
            debug!("No store configured, snapshots kept in memory");
            Arc::new(MemoryStore::new())
        });
        let inventory = self
            .inventory
            .unwrap_or_else(|| Arc::new(StaticInventory::default()));
        let performance = self
            .performance
            .unwrap_or_else(|| Arc::new(SteadyPerformance));

        let config = self.config;
        let lifecycle = ZoneLifecycle::new(
            self.registry,
            loader,
            spawner,
            ZonePersistence::new(store, config.snapshot_ttl),
            MemoryBudget::new(config.budget_limit_bytes, config.overrun_policy),
        );
        let orchestrator =
            TransitionOrchestrator::new(lifecycle.clone(), presenter.clone(), inventory, input)
                .with_keep_depth(config.keep_depth);

        info!(
            zones = lifecycle.registry().zone_count(),
            budget_bytes = config.budget_limit_bytes,
            overrun_policy = %config.overrun_policy,
            "Zone manager ready"
        );

        Ok(ZoneManager {
            prefetcher: ZonePrefetcher::new(config.prefetch.clone()),
            config,
            lifecycle,
            orchestrator,
            presenter,
            performance,
            background: Vec::new(),
            frame: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::simulated::{
        PresenterEvent, RecordingPresenter, RecordingSpawner, ScriptedInput, SimulatedLoader,
    };
    use crate::host::FrameInput;
    use crate::prefetch::{PrefetchStatus, ReducedPerformance};
    use crate::registry::{
        CorridorParams, SizeCategory, TransitionDefinition, TransitionKind, ZoneDefinition, MB,
    };

    struct Harness {
        manager: ZoneManager,
        presenter: Arc<RecordingPresenter>,
        input: Arc<ScriptedInput>,
    }

    fn registry() -> Arc<ZoneRegistry> {
        Arc::new(
            ZoneRegistry::new(
                vec![
                    ZoneDefinition::new("a", SizeCategory::Medium),
                    ZoneDefinition::new("b", SizeCategory::Medium),
                    ZoneDefinition::new("island", SizeCategory::Small),
                ],
                vec![TransitionDefinition::new(
                    "ab",
                    TransitionKind::Corridor(CorridorParams::new(10.0)),
                    vec!["a".into(), "b".into()],
                )],
            )
            .unwrap(),
        )
    }

    fn harness_with(builder: impl FnOnce(ZoneManagerBuilder) -> ZoneManagerBuilder) -> Harness {
        let presenter = Arc::new(RecordingPresenter::new());
        let input = Arc::new(ScriptedInput::new());
        let manager = builder(
            ZoneManager::builder(registry())
                .config(StreamingConfig::default().with_budget_limit_mb(200))
                .loader(Arc::new(SimulatedLoader::new()))
                .spawner(Arc::new(RecordingSpawner::new()))
                .presenter(presenter.clone())
                .input(input.clone()),
        )
        .build()
        .unwrap();
        Harness {
            manager,
            presenter,
            input,
        }
    }

    fn harness() -> Harness {
        harness_with(|b| b)
    }

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn test_builder_requires_loader() {
        let result = ZoneManager::builder(registry())
            .spawner(Arc::new(RecordingSpawner::new()))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingCollaborator("loader"))
        ));
    }

    #[tokio::test]
    async fn test_enter_zone_shows_loading_indicator() {
        let mut h = harness();
        h.manager.enter_zone(&"a".into()).await.unwrap();

        assert_eq!(h.manager.active_zone(), Some("a".into()));
        assert_eq!(h.manager.zone_state(&"a".into()), Some(ZoneState::Full));
        let events = h.presenter.events();
        assert!(events.contains(&PresenterEvent::LoadingIndicator(true)));
        assert!(!h.presenter.loading_indicator_visible());
    }

    #[tokio::test]
    async fn test_enter_unknown_zone() {
        let mut h = harness();
        let err = h.manager.enter_zone(&"nowhere".into()).await.unwrap_err();
        assert_eq!(err, ZoneError::ZoneNotFound("nowhere".into()));
    }

    #[tokio::test]
    async fn test_transition_requires_active_origin() {
        let mut h = harness();
        h.manager.enter_zone(&"a".into()).await.unwrap();

        let err = h
            .manager
            .request_transition(&"b".into(), &"a".into())
            .await
            .unwrap_err();
        assert_eq!(err, ZoneError::NotActive("b".into()));
    }

    #[tokio::test]
    async fn test_missing_transition_falls_back_to_direct_load() {
        let mut h = harness();
        h.manager.enter_zone(&"a".into()).await.unwrap();

        let start = h
            .manager
            .request_transition(&"a".into(), &"island".into())
            .await
            .unwrap();

        assert_eq!(start, TransitionStart::Direct);
        assert_eq!(h.manager.active_zone(), Some("island".into()));
        // a is not connected to island at all, so it is pruned
        assert_eq!(h.manager.zone_state(&"a".into()), Some(ZoneState::Unloaded));
    }

    #[tokio::test]
    async fn test_corridor_handoff_through_tick() {
        let mut h = harness();
        h.manager.enter_zone(&"a".into()).await.unwrap();

        let start = h
            .manager
            .request_transition(&"a".into(), &"b".into())
            .await
            .unwrap();
        assert_eq!(start, TransitionStart::Interactive("ab".into()));
        assert!(h.manager.is_transitioning());

        let report = h.manager.tick(FRAME, Vec2::new(5.0, 0.0));
        assert!(report.handoff.is_none());
        assert_eq!(h.manager.prefetcher().status(), PrefetchStatus::SuspendedTransition);

        h.input.push(FrameInput::confirm());
        let report = h.manager.tick(FRAME, Vec2::new(10.0, 0.0));

        assert!(report.handoff.unwrap().is_completed());
        assert_eq!(h.manager.active_zone(), Some("b".into()));
        // Loading indicator never shown during the hand-off
        let indicator_events = h
            .presenter
            .events()
            .iter()
            .filter(|e| matches!(e, PresenterEvent::LoadingIndicator(true)))
            .count();
        assert_eq!(indicator_events, 1);
    }

    #[tokio::test]
    async fn test_tick_prefetches_neighbours() {
        let mut h = harness();
        h.manager.enter_zone(&"a".into()).await.unwrap();

        let report = h.manager.tick(FRAME, Vec2::ZERO);

        assert_eq!(report.prefetch_requested, vec![ZoneId::from("b")]);
        assert_eq!(report.loads_resolved, 1);
        assert_eq!(h.manager.zone_state(&"b".into()), Some(ZoneState::Simplified));
    }

    #[tokio::test]
    async fn test_reduced_performance_disables_prefetch() {
        let mut h = harness_with(|b| b.performance(Arc::new(ReducedPerformance)));
        h.manager.enter_zone(&"a".into()).await.unwrap();

        let report = h.manager.tick(FRAME, Vec2::ZERO);

        assert!(report.prefetch_requested.is_empty());
        assert_eq!(h.manager.zone_state(&"b".into()), Some(ZoneState::Unloaded));
    }

    #[tokio::test]
    async fn test_debug_snapshot() {
        let mut h = harness();
        h.manager.enter_zone(&"a".into()).await.unwrap();
        h.manager.tick(FRAME, Vec2::ZERO);

        let snapshot = h.manager.debug_snapshot();

        assert_eq!(snapshot.frame, 1);
        assert_eq!(snapshot.active_zone, Some("a".into()));
        assert_eq!(snapshot.committed_bytes, 50 * MB);
        assert_eq!(snapshot.limit_bytes, 200 * MB);
        assert_eq!(snapshot.zones.len(), 3);
        assert!(snapshot.active_transition.is_none());
        assert_eq!(snapshot.lifecycle.loads_issued, 2);
    }

    #[tokio::test]
    async fn test_unload_active_zone_is_refused() {
        let mut h = harness();
        h.manager.enter_zone(&"a".into()).await.unwrap();
        assert_eq!(
            h.manager.unload_zone(&"a".into()),
            Err(ZoneError::ActiveZoneProtected("a".into()))
        );
    }
}
