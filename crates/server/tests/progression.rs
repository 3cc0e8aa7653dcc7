//! Progression core: gate rules, frontier and partition properties, unlock
//! atomicity, batch semantics, events and write-through persistence.

use std::collections::HashSet;

use chunklock_engine::world::World;
use chunklock_engine::world::position::ChunkPos;
use chunklock_server::config::ProgressionConfig;
use chunklock_server::event_bus::{HostEvent, ProgressionEvent};
use chunklock_server::persistence::{FILE_NAME, ProgressFile};
use chunklock_server::progression::{
    AccessGate, AreaDetector, CreditLedger, Mode, ModeError, STARTER_KIT, UnlockSet,
    UnlockTransactor,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn c(x: i32, z: i32) -> ChunkPos {
    ChunkPos::new(x, z)
}

fn set(chunks: &[(i32, i32)]) -> UnlockSet {
    chunks.iter().map(|&(x, z)| c(x, z)).collect()
}

fn actor(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// Random unlocked set inside a `size`x`size` window around the origin.
fn random_set(rng: &mut StdRng, size: i32, density: f64) -> UnlockSet {
    let half = size / 2;
    (-half..half)
        .flat_map(|x| (-half..half).map(move |z| c(x, z)))
        .filter(|_| rng.gen_bool(density))
        .collect()
}

fn transactor_with_credits(who: Uuid, credits: u32) -> UnlockTransactor {
    let mut core = UnlockTransactor::default();
    core.set_credits(who, credits);
    core
}

// ---------------------------------------------------------------------------
// AccessGate
// ---------------------------------------------------------------------------

#[test]
fn bootstrap_allows_any_first_chunk() {
    let empty = UnlockSet::new();
    let gate = AccessGate::new(&empty);
    for chunk in [c(0, 0), c(100, -7), c(-3, 9)] {
        assert!(gate.can_unlock(chunk));
        assert!(!gate.can_access(chunk));
    }
    assert!(gate.frontier().is_empty());
}

#[test]
fn can_unlock_requires_adjacency_once_started() {
    let unlocked = set(&[(0, 0)]);
    let gate = AccessGate::new(&unlocked);
    assert!(!gate.can_unlock(c(0, 0)), "already unlocked");
    assert!(gate.can_unlock(c(1, 0)));
    assert!(gate.can_unlock(c(0, -1)));
    assert!(!gate.can_unlock(c(1, 1)), "diagonal");
    assert!(!gate.can_unlock(c(5, 5)));
    assert!(gate.can_access(c(0, 0)));
}

#[test]
fn frontier_of_single_chunk_is_its_four_neighbors() {
    let unlocked = set(&[(2, 3)]);
    let frontier = AccessGate::new(&unlocked).frontier();
    let expected: HashSet<ChunkPos> = c(2, 3).neighbors().into_iter().collect();
    assert_eq!(frontier, expected);
}

#[test]
fn frontier_matches_brute_force_on_random_sets() {
    let mut rng = StdRng::seed_from_u64(0xC4A7);
    for _ in 0..50 {
        let unlocked = random_set(&mut rng, 12, 0.35);
        let frontier = AccessGate::new(&unlocked).frontier();

        let mut expected = HashSet::new();
        for x in -8..8 {
            for z in -8..8 {
                let chunk = c(x, z);
                if !unlocked.contains(chunk)
                    && chunk.neighbors().iter().any(|n| unlocked.contains(*n))
                {
                    expected.insert(chunk);
                }
            }
        }
        assert_eq!(frontier, expected);
    }
}

// ---------------------------------------------------------------------------
// AreaDetector
// ---------------------------------------------------------------------------

#[test]
fn areas_partition_random_sets() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut detector = AreaDetector::new();
    for _ in 0..50 {
        let unlocked = random_set(&mut rng, 10, 0.45);
        let areas = detector.detect(&unlocked);

        let mut union = HashSet::new();
        let mut total = 0;
        for area in areas {
            total += area.chunk_count();
            union.extend(area.chunks().iter().copied());
        }
        assert_eq!(&union, unlocked.as_set(), "union covers the set");
        assert_eq!(total, unlocked.len(), "areas are disjoint");

        // No two areas touch.
        for (i, a) in areas.iter().enumerate() {
            for b in &areas[i + 1..] {
                assert!(a.chunks().iter().all(|chunk| !b.is_adjacent_to(*chunk)));
            }
        }
    }
}

#[test]
fn l_shape_is_one_area_with_truncated_center() {
    let unlocked = set(&[(0, 0), (1, 0), (2, 0), (2, 1)]);
    let mut detector = AreaDetector::new();
    let areas = detector.detect(&unlocked);
    assert_eq!(areas.len(), 1);
    assert_eq!(areas[0].chunk_count(), 4);
    // x: 5 / 4 = 1, z: 1 / 4 = 0
    assert_eq!(areas[0].center(), c(1, 0));
}

#[test]
fn empty_set_has_no_areas() {
    let mut detector = AreaDetector::new();
    assert!(detector.detect(&UnlockSet::new()).is_empty());
}

// ---------------------------------------------------------------------------
// UnlockTransactor
// ---------------------------------------------------------------------------

#[test]
fn concrete_scenario() {
    let alex = actor(1);
    let mut core = transactor_with_credits(alex, 1);

    assert!(core.try_unlock(alex, c(0, 0)));
    assert_eq!(core.store().unlocked().as_set(), set(&[(0, 0)]).as_set());
    assert_eq!(core.available_credits(alex), 0);

    assert!(!core.try_unlock(alex, c(5, 5)));
    assert_eq!(core.store().unlocked_count(), 1);

    assert!(core.force_unlock(c(5, 5)));
    assert_eq!(core.store().unlocked_count(), 2);

    let areas = core.calculate_global_areas();
    assert_eq!(areas.len(), 2);
    assert!(areas.iter().all(|a| a.chunk_count() == 1));
}

#[test]
fn failed_unlock_changes_nothing() {
    let alex = actor(2);
    let mut core = UnlockTransactor::default();
    let mut events = core.subscribe();

    assert!(!core.try_unlock(alex, c(0, 0)));
    assert_eq!(core.store().unlocked_count(), 0);
    assert_eq!(core.available_credits(alex), 0);
    assert!(core.ledger().progress(alex).is_none());
    assert!(!core.is_dirty());
    assert!(events.try_recv().is_err());
}

#[test]
fn unlocking_twice_does_not_charge_twice() {
    let alex = actor(3);
    let mut core = transactor_with_credits(alex, 5);
    assert!(core.try_unlock(alex, c(0, 0)));
    assert!(!core.try_unlock(alex, c(0, 0)));
    assert_eq!(core.available_credits(alex), 4);
}

#[test]
fn try_unlock_trusts_caller_on_adjacency_by_default() {
    let alex = actor(4);
    let mut core = transactor_with_credits(alex, 2);
    assert!(core.try_unlock(alex, c(0, 0)));
    assert!(core.try_unlock(alex, c(9, 9)));
}

#[test]
fn strict_adjacency_rejects_islands() {
    let alex = actor(5);
    let mut core = UnlockTransactor::new(ProgressionConfig {
        strict_adjacency: true,
        ..ProgressionConfig::default()
    });
    core.set_credits(alex, 3);

    assert!(core.try_unlock(alex, c(0, 0)), "bootstrap");
    assert!(!core.try_unlock(alex, c(9, 9)));
    assert_eq!(core.available_credits(alex), 2);
    assert!(core.try_unlock(alex, c(0, 1)));
}

#[test]
fn batch_unlock_stops_at_first_failure() {
    let alex = actor(6);
    let mut core = transactor_with_credits(alex, 2);
    let chunks = [c(0, 0), c(1, 0), c(2, 0), c(3, 0)];

    assert_eq!(core.try_unlock_many(alex, &chunks), 2);
    assert!(core.store().is_unlocked(c(0, 0)));
    assert!(core.store().is_unlocked(c(1, 0)));
    assert!(!core.store().is_unlocked(c(2, 0)));
    assert!(!core.store().is_unlocked(c(3, 0)));
}

#[test]
fn force_and_lock_batches_count_changes() {
    let mut core = UnlockTransactor::default();
    assert_eq!(core.force_unlock_many(&[c(0, 0), c(0, 1), c(0, 0)]), 2);
    assert!(!core.force_unlock(c(0, 1)));
    assert_eq!(core.lock_many(&[c(0, 1), c(7, 7)]), 1);
    assert!(!core.lock(c(0, 1)));
    assert!(core.force_lock(c(0, 0)));
    assert_eq!(core.store().unlocked_count(), 0);
}

#[test]
fn every_mutation_invalidates_areas() {
    let mut core = UnlockTransactor::default();
    core.force_unlock_many(&[c(0, 0), c(2, 0)]);
    assert_eq!(core.calculate_global_areas().len(), 2);
    assert!(core.is_area_cache_valid());

    core.force_unlock(c(1, 0));
    assert!(!core.is_area_cache_valid());
    assert_eq!(core.calculate_global_areas().len(), 1);

    core.lock(c(1, 0));
    assert!(!core.is_area_cache_valid());
    assert_eq!(core.calculate_global_areas().len(), 2);

    core.clear_all();
    assert!(core.calculate_global_areas().is_empty());
}

#[test]
fn area_queries_see_latest_state() {
    let mut core = UnlockTransactor::default();
    core.force_unlock_many(&[c(-1, 0), c(1, 0)]);
    assert_eq!(core.areas_adjacent_to(c(0, 0)).len(), 2);

    core.force_unlock(c(0, 0));
    let merged = core.area_containing(c(-1, 0)).map(|a| a.chunk_count());
    assert_eq!(merged, Some(3));
    assert!(core.area_containing(c(4, 4)).is_none());
}

#[test]
fn frontier_follows_unlocks() {
    let mut core = UnlockTransactor::default();
    core.force_unlock_many(&[c(0, 0), c(1, 0)]);
    assert_eq!(core.calculate_frontier().len(), 6);
}

#[test]
fn events_are_published_for_committed_changes() {
    let alex = actor(7);
    let mut core = UnlockTransactor::default();
    let mut events = core.subscribe();

    core.add_credits(alex, 1);
    core.try_unlock(alex, c(0, 0));
    core.lock(c(0, 0));

    let received: Vec<ProgressionEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        received,
        vec![
            ProgressionEvent::CreditsChanged {
                actor: alex,
                available: 1
            },
            ProgressionEvent::ChunkUnlocked {
                chunk: c(0, 0),
                actor: Some(alex)
            },
            ProgressionEvent::CreditsChanged {
                actor: alex,
                available: 0
            },
            ProgressionEvent::ChunkLocked { chunk: c(0, 0) },
        ]
    );
}

#[test]
fn milestones_feed_the_ledger_once() {
    let alex = actor(8);
    let world = World::new();
    let mut core = UnlockTransactor::default();
    let event = HostEvent::MilestoneCompleted {
        actor: alex,
        milestone: "story/mine_stone".into(),
        reward: 2,
    };

    assert!(core.handle_host_event(&world, event.clone()));
    assert!(!core.handle_host_event(&world, event));
    assert_eq!(core.available_credits(alex), 2);
    assert_eq!(core.ledger().progress(alex).unwrap().total_milestones, 1);
}

#[test]
fn chunks_at_the_coordinate_range_have_no_wrapping_neighbors() {
    let world = World::new();
    let mut core = UnlockTransactor::default();
    core.force_unlock_with_walls(&world, c(i32::MAX, 0));
    core.force_unlock_with_walls(&world, c(i32::MIN, 0));

    let frontier = core.calculate_frontier();
    assert_eq!(frontier.len(), 6);
    assert!(frontier.contains(&c(i32::MAX - 1, 0)));
    assert!(frontier.contains(&c(i32::MIN + 1, 0)));
    assert_eq!(core.calculate_global_areas().len(), 2, "edges do not join");
    assert!(core.gate().is_adjacent_to_unlocked(c(i32::MAX, 1)));
    assert!(!core.gate().is_adjacent_to_unlocked(c(i32::MIN, 0)));
    assert_eq!(core.walls().lazy().pending_count(), 6);
}

// ---------------------------------------------------------------------------
// Actor position: portal arrivals and the locked-chunk penalty
// ---------------------------------------------------------------------------

fn entered(actor: Uuid, chunk: ChunkPos, via_portal: bool) -> HostEvent {
    HostEvent::ActorEnteredChunk {
        actor,
        chunk,
        via_portal,
    }
}

#[test]
fn portal_arrival_unlocks_when_actor_can_pay() {
    let alex = actor(20);
    let world = World::new();
    let mut core = transactor_with_credits(alex, 1);

    assert!(core.handle_host_event(&world, entered(alex, c(40, 40), true)));
    assert!(core.can_access(c(40, 40)));
    assert_eq!(core.available_credits(alex), 0);
    assert!(!core.is_penalized(alex), "standing in an unlocked chunk");
}

#[test]
fn walking_into_a_locked_chunk_never_unlocks_it() {
    let alex = actor(21);
    let world = World::new();
    let mut core = transactor_with_credits(alex, 3);

    assert!(!core.handle_host_event(&world, entered(alex, c(1, 0), false)));
    assert!(!core.can_access(c(1, 0)));
    assert_eq!(core.available_credits(alex), 3);
    assert!(!core.should_penalize(alex, c(1, 0)), "has credits");
}

#[test]
fn portal_arrival_without_credits_only_penalizes() {
    let alex = actor(22);
    let world = World::new();
    let mut core = UnlockTransactor::default();

    assert!(core.handle_host_event(&world, entered(alex, c(3, 3), true)));
    assert!(!core.can_access(c(3, 3)));
    assert!(core.is_penalized(alex));
}

#[test]
fn penalty_events_fire_on_transitions_only() {
    let alex = actor(23);
    let world = World::new();
    let mut core = UnlockTransactor::default();
    core.force_unlock(c(0, 0));
    let mut events = core.subscribe();

    assert!(core.should_penalize(alex, c(1, 0)));
    assert!(!core.should_penalize(alex, c(0, 0)));

    assert!(core.handle_host_event(&world, entered(alex, c(1, 0), false)));
    // Periodic reports while nothing changes publish nothing.
    assert!(!core.handle_host_event(&world, entered(alex, c(1, 0), false)));
    assert!(!core.handle_host_event(&world, entered(alex, c(2, 0), false)));
    assert!(core.handle_host_event(&world, entered(alex, c(0, 0), false)));

    let received: Vec<ProgressionEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        received,
        vec![
            ProgressionEvent::PenaltyChanged {
                actor: alex,
                chunk: c(1, 0),
                active: true
            },
            ProgressionEvent::PenaltyChanged {
                actor: alex,
                chunk: c(0, 0),
                active: false
            },
        ]
    );
}

#[test]
fn earning_credits_lifts_the_penalty_on_next_report() {
    let alex = actor(24);
    let world = World::new();
    let mut core = UnlockTransactor::default();

    core.handle_host_event(&world, entered(alex, c(5, 5), false));
    assert!(core.is_penalized(alex));

    core.add_credits(alex, 1);
    assert!(core.handle_host_event(&world, entered(alex, c(5, 5), false)));
    assert!(!core.is_penalized(alex));
    assert!(!core.can_access(c(5, 5)));
}

#[test]
fn leaving_drops_penalty_state() {
    let alex = actor(25);
    let world = World::new();
    let mut core = UnlockTransactor::default();

    core.handle_host_event(&world, entered(alex, c(5, 5), false));
    assert!(core.handle_host_event(&world, HostEvent::ActorLeft(alex)));
    assert!(!core.is_penalized(alex));
    assert!(!core.handle_host_event(&world, HostEvent::ActorLeft(alex)));
}

#[test]
fn mode_is_set_once_and_gates_starter_kit() {
    let alex = actor(9);
    let mut core = UnlockTransactor::default();
    assert!(core.provision_starter_items(alex).is_none());

    core.set_mode(Mode::Extreme).unwrap();
    assert_eq!(
        core.set_mode(Mode::Extreme),
        Err(ModeError::AlreadySet {
            current: Mode::Extreme
        })
    );

    assert_eq!(core.provision_starter_items(alex), Some(STARTER_KIT));
    assert!(core.provision_starter_items(alex).is_none());
}

#[test]
fn ledger_trait_is_usable_generically() {
    fn drain<L: CreditLedger>(ledger: &mut L, who: Uuid) -> u32 {
        let all = ledger.available_credits(who);
        ledger.spend_credits(who, all).unwrap();
        all
    }
    let alex = actor(10);
    let core = transactor_with_credits(alex, 4);
    let mut ledger = core.ledger().clone();
    assert_eq!(drain(&mut ledger, alex), 4);
    assert_eq!(ledger.available_credits(alex), 0);
    // The copy is independent.
    assert_eq!(core.available_credits(alex), 4);
}

#[test]
fn debug_snapshot_serializes() {
    let mut core = UnlockTransactor::default();
    core.force_unlock_many(&[c(0, 0), c(0, 1), c(5, 5)]);
    let snapshot = core.debug_snapshot();
    assert_eq!(snapshot.unlocked_chunks, 3);
    assert_eq!(snapshot.area_sizes, vec![2, 1]);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["mode"], "DISABLED");
    assert_eq!(json["frontier_chunks"], 10);
}

// ---------------------------------------------------------------------------
// Write-through persistence
// ---------------------------------------------------------------------------

#[test]
fn mutations_are_saved_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let alex = actor(11);

    {
        let mut core = UnlockTransactor::open(dir.path(), ProgressionConfig::default());
        core.set_mode(Mode::Easy).unwrap();
        core.set_credits(alex, 3);
        assert!(core.try_unlock(alex, c(0, 0)));
        assert!(core.try_unlock(alex, c(1, 0)));
        assert!(!core.is_dirty(), "each mutation writes through");
    }
    assert!(dir.path().join(FILE_NAME).exists());

    let mut core = UnlockTransactor::open(dir.path(), ProgressionConfig::default());
    assert_eq!(core.store().unlocked_count(), 2);
    assert_eq!(core.available_credits(alex), 1);
    assert_eq!(core.store().mode(), Mode::Easy);
    assert!(core.set_mode(Mode::Extreme).is_err());
    assert_eq!(core.calculate_global_areas().len(), 1);
}

#[test]
fn failed_save_keeps_state_dirty() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the parent directory should be makes every write fail.
    let not_a_dir = dir.path().join("not_a_dir");
    std::fs::write(&not_a_dir, b"").unwrap();
    let mut core = UnlockTransactor::default()
        .with_persistence(ProgressFile::new(not_a_dir.join(FILE_NAME)));

    assert!(core.force_unlock(c(0, 0)));
    assert!(core.is_dirty());
    assert!(core.store().is_unlocked(c(0, 0)));
}
