//! End-to-end behaviour of the zone manager against simulated collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;

use zonestream::budget::{MemoryBudget, OverrunPolicy};
use zonestream::coord::Vec2;
use zonestream::host::simulated::{
    RecordingPresenter, RecordingSpawner, ScriptedInput, SimulatedLoader, SpawnEvent,
    StaticInventory,
};
use zonestream::host::{FrameInput, MemoryStore};
use zonestream::lifecycle::ZoneLifecycle;
use zonestream::persistence::{EntityState, ZonePersistence, ZoneSnapshot, DEFAULT_SNAPSHOT_TTL};
use zonestream::prefetch::PrefetchConfig;
use zonestream::registry::{
    CorridorParams, SizeCategory, TransitionDefinition, TransitionKind, ZoneDefinition, MB,
};
use zonestream::transition::HandoffEvent;
use zonestream::{
    DetailLevel, StreamingConfig, TransitionStart, ZoneError, ZoneId, ZoneManager, ZoneRegistry,
    ZoneState,
};

const FRAME: Duration = Duration::from_millis(16);

fn id(zone: &str) -> ZoneId {
    ZoneId::from(zone)
}

fn corridor(name: &str, a: &str, b: &str) -> TransitionDefinition {
    TransitionDefinition::new(
        name,
        TransitionKind::Corridor(CorridorParams::new(10.0)),
        vec![id(a), id(b)],
    )
}

struct World {
    manager: ZoneManager,
    loader: Arc<SimulatedLoader>,
    spawner: Arc<RecordingSpawner>,
    store: Arc<MemoryStore>,
    presenter: Arc<RecordingPresenter>,
    input: Arc<ScriptedInput>,
}

fn build_world(registry: ZoneRegistry, config: StreamingConfig, loader: SimulatedLoader) -> World {
    let loader = Arc::new(loader);
    let spawner = Arc::new(RecordingSpawner::new());
    let store = Arc::new(MemoryStore::new());
    let presenter = Arc::new(RecordingPresenter::new());
    let input = Arc::new(ScriptedInput::new());

    let manager = ZoneManager::builder(Arc::new(registry))
        .config(config)
        .loader(loader.clone())
        .spawner(spawner.clone())
        .store(store.clone())
        .presenter(presenter.clone())
        .input(input.clone())
        .inventory(Arc::new(StaticInventory::default()))
        .build()
        .unwrap();

    World {
        manager,
        loader,
        spawner,
        store,
        presenter,
        input,
    }
}

fn no_prefetch() -> StreamingConfig {
    StreamingConfig::default()
        .with_prefetch(PrefetchConfig::default().with_max_requests_per_tick(0))
}

/// a(Large) - b(Large) - d(Small), a - c(Medium), island(Small) unconnected.
fn station() -> ZoneRegistry {
    ZoneRegistry::new(
        vec![
            ZoneDefinition::new("a", SizeCategory::Large),
            ZoneDefinition::new("b", SizeCategory::Large),
            ZoneDefinition::new("c", SizeCategory::Medium),
            ZoneDefinition::new("d", SizeCategory::Small),
            ZoneDefinition::new("island", SizeCategory::Small),
        ],
        vec![
            corridor("ab", "a", "b"),
            corridor("ac", "a", "c"),
            corridor("bd", "b", "d"),
        ],
    )
    .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Budget and eviction
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_eviction_skips_active_zone() {
    let mut w = build_world(
        station(),
        StreamingConfig::default().with_budget_limit_mb(100),
        SimulatedLoader::new(),
    );

    w.manager.enter_zone(&id("b")).await.unwrap();
    w.manager.lifecycle().advance_clock(Duration::from_secs(5));
    w.manager.enter_zone(&id("a")).await.unwrap();
    assert_eq!(w.manager.lifecycle().committed_bytes(), 80 * MB);

    let outcome = w
        .manager
        .lifecycle()
        .request_load(&id("c"), DetailLevel::Full)
        .unwrap()
        .await;

    assert_eq!(outcome, Ok(DetailLevel::Full));
    assert_eq!(w.manager.zone_state(&id("a")), Some(ZoneState::Full));
    assert_eq!(w.manager.zone_state(&id("b")), Some(ZoneState::Unloaded));
    assert_eq!(w.manager.zone_state(&id("c")), Some(ZoneState::Full));
    assert_eq!(w.manager.lifecycle().committed_bytes(), 65 * MB);
    assert!(w.manager.lifecycle().is_budget_consistent());
}

#[test]
fn test_simultaneous_full_requests_evict_instead_of_overrunning() {
    let w = build_world(
        station(),
        StreamingConfig::default().with_budget_limit_mb(100),
        SimulatedLoader::new().held(),
    );
    let lifecycle = w.manager.lifecycle();

    let a = lifecycle.request_load(&id("a"), DetailLevel::Full).unwrap();
    w.loader.complete_held(&id("a"));
    assert_eq!(a.poll_now(), Some(Ok(DetailLevel::Full)));
    lifecycle.set_active(&id("a")).unwrap();

    // Same step, nothing polled in between.
    let b = lifecycle.request_load(&id("b"), DetailLevel::Full).unwrap();
    let c = lifecycle.request_load(&id("c"), DetailLevel::Full).unwrap();

    assert_eq!(lifecycle.state(&id("a")), Some(ZoneState::Full));
    assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Unloaded));
    assert_eq!(lifecycle.state(&id("c")), Some(ZoneState::Loading));
    assert_eq!(lifecycle.committed_bytes(), 65 * MB);
    assert!(!lifecycle.budget().is_over_limit());

    assert_eq!(w.loader.complete_all_held(), 2);
    assert_eq!(b.poll_now(), Some(Err(ZoneError::LoadCancelled(id("b")))));
    assert_eq!(c.poll_now(), Some(Ok(DetailLevel::Full)));

    let stats = lifecycle.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.overruns, 0);
    assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Unloaded));
    assert_eq!(lifecycle.committed_bytes(), 65 * MB);
    assert!(lifecycle.is_budget_consistent());
}

#[tokio::test]
async fn test_prefetch_stays_within_budget() {
    let mut w = build_world(
        station(),
        StreamingConfig::default().with_budget_limit_mb(60),
        SimulatedLoader::new(),
    );
    w.manager.enter_zone(&id("a")).await.unwrap();

    let report = w.manager.tick(FRAME, Vec2::ZERO);

    // b and c pass the half-size gate but neither fits at full size.
    assert!(report.prefetch_requested.is_empty());
    let snapshot = w.manager.debug_snapshot();
    assert!(!snapshot.over_budget);
    assert_eq!(snapshot.lifecycle.overruns, 0);
    assert_eq!(w.manager.lifecycle().committed_bytes(), 40 * MB);
}

#[tokio::test]
async fn test_reject_policy_refuses_when_only_active_zone_remains() {
    let mut w = build_world(
        station(),
        StreamingConfig::default()
            .with_budget_limit_mb(50)
            .with_overrun_policy(OverrunPolicy::Reject),
        SimulatedLoader::new(),
    );
    w.manager.enter_zone(&id("a")).await.unwrap();

    let err = w
        .manager
        .lifecycle()
        .request_load(&id("b"), DetailLevel::Full)
        .unwrap_err();

    assert!(matches!(err, ZoneError::BudgetExceeded { .. }));
    assert_eq!(w.manager.zone_state(&id("a")), Some(ZoneState::Full));
    assert_eq!(w.manager.zone_state(&id("b")), Some(ZoneState::Unloaded));
    assert_eq!(w.manager.lifecycle().committed_bytes(), 40 * MB);
}

#[tokio::test]
async fn test_allow_policy_records_overrun() {
    let mut w = build_world(
        station(),
        StreamingConfig::default().with_budget_limit_mb(50),
        SimulatedLoader::new(),
    );
    w.manager.enter_zone(&id("a")).await.unwrap();

    let outcome = w
        .manager
        .lifecycle()
        .request_load(&id("b"), DetailLevel::Full)
        .unwrap()
        .await;

    assert_eq!(outcome, Ok(DetailLevel::Full));
    let snapshot = w.manager.debug_snapshot();
    assert!(snapshot.over_budget);
    assert_eq!(snapshot.lifecycle.overruns, 1);
    assert_eq!(w.manager.zone_state(&id("a")), Some(ZoneState::Full));
}

#[derive(Debug, Clone)]
enum Op {
    Load(usize, DetailLevel),
    Unload(usize),
    Activate(usize),
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let level = prop_oneof![
        Just(DetailLevel::Proxy),
        Just(DetailLevel::Simplified),
        Just(DetailLevel::Full),
    ];
    prop_oneof![
        (0..5usize, level).prop_map(|(zone, level)| Op::Load(zone, level)),
        (0..5usize).prop_map(Op::Unload),
        (0..5usize).prop_map(Op::Activate),
        (1..120u64).prop_map(Op::Advance),
    ]
}

fn lifecycle_with_limit(limit_mb: u64) -> (ZoneLifecycle, Vec<ZoneId>) {
    let zones: Vec<ZoneDefinition> = ["z0", "z1", "z2", "z3", "z4"]
        .iter()
        .zip([
            SizeCategory::Large,
            SizeCategory::Medium,
            SizeCategory::Small,
            SizeCategory::Huge,
            SizeCategory::Tiny,
        ])
        .map(|(zone, size)| ZoneDefinition::new(*zone, size))
        .collect();
    let ids = zones.iter().map(|z| z.id.clone()).collect();
    let registry = ZoneRegistry::new(zones, vec![]).unwrap();

    let lifecycle = ZoneLifecycle::new(
        Arc::new(registry),
        Arc::new(SimulatedLoader::new()),
        Arc::new(RecordingSpawner::new()),
        ZonePersistence::new(Arc::new(MemoryStore::new()), DEFAULT_SNAPSHOT_TTL),
        MemoryBudget::new(limit_mb * MB, OverrunPolicy::Reject),
    );
    (lifecycle, ids)
}

proptest! {
    #[test]
    fn prop_committed_bytes_match_resident_zones(
        ops in proptest::collection::vec(op_strategy(), 1..60)
    ) {
        let (lifecycle, ids) = lifecycle_with_limit(100);

        for op in ops {
            let active_resident = lifecycle
                .active()
                .and_then(|zone| lifecycle.state(&zone))
                .map(|state| state.holds_memory())
                .unwrap_or(false);
            let activates = matches!(op, Op::Activate(_));

            match op {
                Op::Load(zone, level) => {
                    if let Ok(ticket) = lifecycle.request_load(&ids[zone], level) {
                        prop_assert!(ticket.poll_now().is_some());
                    }
                }
                Op::Unload(zone) => {
                    let result = lifecycle.unload(&ids[zone]);
                    if lifecycle.active().as_ref() == Some(&ids[zone]) {
                        prop_assert_eq!(result, Err(ZoneError::ActiveZoneProtected(ids[zone].clone())));
                    }
                }
                Op::Activate(zone) => lifecycle.set_active(&ids[zone]).unwrap(),
                Op::Advance(secs) => lifecycle.advance_clock(Duration::from_secs(secs)),
            }

            prop_assert!(lifecycle.is_budget_consistent());
            prop_assert!(lifecycle.committed_bytes() <= 100 * MB);
            if active_resident && !activates {
                let active = lifecycle.active().unwrap();
                prop_assert!(lifecycle.state(&active).unwrap().holds_memory());
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coalescing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_concurrent_requests_share_one_load() {
    let w = build_world(station(), StreamingConfig::default(), SimulatedLoader::new().held());
    let lifecycle = w.manager.lifecycle();

    let first = lifecycle.request_load(&id("b"), DetailLevel::Full).unwrap();
    let second = lifecycle.request_load(&id("b"), DetailLevel::Simplified).unwrap();

    assert!(first.same_request(&second));
    assert_eq!(w.loader.calls_for(&id("b")), 1);
    assert_eq!(first.poll_now(), None);
    assert_eq!(lifecycle.state(&id("b")), Some(ZoneState::Loading));

    assert_eq!(w.loader.complete_held(&id("b")), 1);

    assert_eq!(first.poll_now(), Some(Ok(DetailLevel::Full)));
    assert_eq!(second.poll_now(), Some(Ok(DetailLevel::Full)));
    assert_eq!(lifecycle.stats().loads_coalesced, 1);
    assert_eq!(lifecycle.committed_bytes(), 40 * MB);
}

#[tokio::test(start_paused = true)]
async fn test_awaiting_coalesced_loads_with_latency() {
    let w = build_world(
        station(),
        StreamingConfig::default(),
        SimulatedLoader::new().with_latency(Duration::from_millis(250)),
    );
    let lifecycle = w.manager.lifecycle();

    let first = lifecycle.request_load(&id("c"), DetailLevel::Full).unwrap();
    let second = lifecycle.request_load(&id("c"), DetailLevel::Full).unwrap();
    let (a, b) = tokio::join!(first, second);

    assert_eq!(a, Ok(DetailLevel::Full));
    assert_eq!(a, b);
    assert_eq!(w.loader.calls_for(&id("c")), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_snapshot_restored_on_return() {
    let mut w = build_world(station(), StreamingConfig::default(), SimulatedLoader::new());
    w.spawner.set_live_state(
        "a",
        ZoneSnapshot::new()
            .with_entity(EntityState::new("guard", Vec2::new(1.0, 2.0), 50.0, true))
            .with_entity(EntityState::new("guard", Vec2::new(4.0, 4.0), 0.0, false)),
    );

    w.manager.enter_zone(&id("a")).await.unwrap();
    w.manager.enter_zone(&id("b")).await.unwrap();
    assert!(w.store.contains(&ZonePersistence::key_for(&id("a"))));

    w.manager.unload_zone(&id("a")).unwrap();
    w.spawner.clear();
    w.manager.enter_zone(&id("a")).await.unwrap();

    let entities: Vec<SpawnEvent> = w
        .spawner
        .events_for(&id("a"))
        .into_iter()
        .filter(|e| matches!(e, SpawnEvent::Entity { .. }))
        .collect();
    assert_eq!(
        entities,
        vec![SpawnEvent::Entity {
            zone: id("a"),
            kind: "guard".to_string(),
            position: Vec2::new(1.0, 2.0),
            health: 50.0,
        }]
    );
    let status = w.manager.lifecycle().status(&id("a")).unwrap();
    assert!(!status.is_first_visit);
}

#[test]
fn test_stale_snapshot_discarded() {
    let store = Arc::new(MemoryStore::new());
    let persistence = ZonePersistence::new(store.clone(), DEFAULT_SNAPSHOT_TTL);
    let zone = id("a");
    let snapshot =
        ZoneSnapshot::new().with_entity(EntityState::new("guard", Vec2::ZERO, 10.0, true));

    persistence
        .save_at(&zone, &snapshot, Utc::now() - chrono::Duration::hours(25))
        .unwrap();
    assert!(store.contains(&ZonePersistence::key_for(&zone)));

    assert_eq!(persistence.load(&zone).unwrap(), None);
    assert!(!store.contains(&ZonePersistence::key_for(&zone)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Hand-offs
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_corridor_cancel_leaves_destination_unloaded() {
    let mut w = build_world(station(), no_prefetch(), SimulatedLoader::new());
    w.manager.enter_zone(&id("a")).await.unwrap();
    let committed = w.manager.lifecycle().committed_bytes();

    w.manager.request_transition(&id("a"), &id("b")).await.unwrap();
    w.manager.tick(FRAME, Vec2::new(3.0, 0.0));
    w.input.push(FrameInput::cancel());
    let report = w.manager.tick(FRAME, Vec2::new(2.0, 0.0));

    assert!(matches!(report.handoff, Some(HandoffEvent::Cancelled { .. })));
    assert_eq!(w.manager.zone_state(&id("b")), Some(ZoneState::Unloaded));
    assert_eq!(w.manager.lifecycle().committed_bytes(), committed);
    assert_eq!(w.loader.calls_for(&id("b")), 0);
    assert_eq!(w.manager.active_zone(), Some(id("a")));
    assert!(!w.presenter.is_showing());
}

#[tokio::test]
async fn test_corridor_commit_activates_destination_and_prunes() {
    let mut w = build_world(
        station(),
        StreamingConfig::default().with_keep_depth(1),
        SimulatedLoader::new(),
    );
    w.manager.enter_zone(&id("a")).await.unwrap();
    w.manager
        .lifecycle()
        .request_load(&id("c"), DetailLevel::Simplified)
        .unwrap()
        .await
        .unwrap();

    let start = w.manager.request_transition(&id("a"), &id("b")).await.unwrap();
    assert_eq!(start, TransitionStart::Interactive("ab".into()));
    assert_eq!(w.loader.calls_for(&id("b")), 0);

    w.manager.tick(FRAME, Vec2::new(6.0, 0.0));
    w.input.push(FrameInput::confirm());
    let report = w.manager.tick(FRAME, Vec2::new(10.0, 0.0));

    match report.handoff {
        Some(HandoffEvent::Completed { to, pruned, .. }) => {
            assert_eq!(to, id("b"));
            // c is two hops from b, outside a keep depth of one
            assert_eq!(pruned, vec![id("c")]);
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(w.manager.active_zone(), Some(id("b")));
    assert_eq!(w.manager.zone_state(&id("b")), Some(ZoneState::Full));
    assert_eq!(w.manager.zone_state(&id("a")), Some(ZoneState::Full));
    assert_eq!(w.manager.zone_state(&id("c")), Some(ZoneState::Unloaded));
    assert!(w.manager.lifecycle().is_budget_consistent());
}

#[tokio::test]
async fn test_locked_transition_reports_required_item() {
    let registry = ZoneRegistry::new(
        vec![
            ZoneDefinition::new("a", SizeCategory::Small),
            ZoneDefinition::new("vault", SizeCategory::Small),
        ],
        vec![corridor("vault-door", "a", "vault").locked_by("keycard")],
    )
    .unwrap();
    let mut w = build_world(registry, StreamingConfig::default(), SimulatedLoader::new());
    w.manager.enter_zone(&id("a")).await.unwrap();

    let err = w
        .manager
        .request_transition(&id("a"), &id("vault"))
        .await
        .unwrap_err();

    assert!(matches!(err, ZoneError::TransitionLocked { .. }));
    assert_eq!(err.user_message(), Some("Requires keycard".to_string()));
    assert_eq!(w.presenter.notifications(), vec!["Requires keycard".to_string()]);
    assert!(!w.manager.is_transitioning());
    assert_eq!(w.loader.calls_for(&id("vault")), 0);
}

#[tokio::test]
async fn test_missing_transition_falls_back_to_direct_load() {
    let mut w = build_world(station(), StreamingConfig::default(), SimulatedLoader::new());
    w.manager.enter_zone(&id("a")).await.unwrap();

    let start = w
        .manager
        .request_transition(&id("a"), &id("island"))
        .await
        .unwrap();

    assert_eq!(start, TransitionStart::Direct);
    assert_eq!(w.manager.active_zone(), Some(id("island")));
    assert_eq!(w.manager.zone_state(&id("island")), Some(ZoneState::Full));
}

#[tokio::test]
async fn test_failed_destination_load_retries_then_gives_up() {
    let mut w = build_world(station(), no_prefetch(), SimulatedLoader::new());
    w.manager.enter_zone(&id("a")).await.unwrap();
    w.loader.fail_next("b", 2);

    w.manager.request_transition(&id("a"), &id("b")).await.unwrap();
    w.input.push(FrameInput::confirm());
    let first = w.manager.tick(FRAME, Vec2::new(10.0, 0.0));
    assert!(first.handoff.is_none());

    let second = w.manager.tick(FRAME, Vec2::new(10.0, 0.0));

    assert!(matches!(second.handoff, Some(HandoffEvent::Failed { .. })));
    assert_eq!(w.manager.active_zone(), Some(id("a")));
    assert_eq!(w.manager.zone_state(&id("b")), Some(ZoneState::Unloaded));
    assert_eq!(w.manager.debug_snapshot().handoffs.retries, 1);
    assert!(w.manager.lifecycle().is_budget_consistent());
}
