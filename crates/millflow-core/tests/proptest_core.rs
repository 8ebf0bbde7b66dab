//! Property-based tests for the flow core.
//!
//! Uses proptest to generate random queues, events and splitter networks,
//! then verify volume bookkeeping holds.

use millflow_core::event::{Event, EventError};
use millflow_core::fixed::Fixed64;
use millflow_core::queue::EventQueue;
use millflow_core::simulation::Simulation;
use millflow_core::socket::Capacity;
use millflow_core::species::{Phase, RegistryError, Species, SpeciesRegistryBuilder};
use millflow_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

/// Volumes on a 1/16 grid so every value is exact in Q32.32.
fn arb_volume() -> impl Strategy<Value = Fixed64> {
    (0u32..16_000).prop_map(|n| Fixed64::from_num(n) / Fixed64::from_num(16))
}

fn arb_fraction() -> impl Strategy<Value = Fixed64> {
    (0u32..=256).prop_map(|n| Fixed64::from_num(n) / Fixed64::from_num(256))
}

#[derive(Debug, Clone)]
enum QueueOp {
    Enqueue(Fixed64, Fixed64),
    Dequeue,
    Purge,
}

fn arb_queue_ops(max_ops: usize) -> impl Strategy<Value = Vec<QueueOp>> {
    proptest::collection::vec(
        prop_oneof![
            6 => (arb_volume(), arb_volume()).prop_map(|(w, f)| QueueOp::Enqueue(w, f)),
            3 => Just(QueueOp::Dequeue),
            1 => Just(QueueOp::Purge),
        ],
        1..=max_ops,
    )
}

/// Source -> binary splitter tree -> sinks, with a random split per level
/// and an optional bound on every splitter.
fn random_splitter_tree(splits: &[Fixed64], bound: Option<u32>, event_rate: u32) -> Simulation {
    let mut sim = new_simulation();
    let src = sim
        .add_source("source", bounded(512.0), event_rate, None)
        .unwrap();
    let capacity = match bound {
        Some(b) => bounded(f64::from(b)),
        None => Capacity::Unbounded,
    };
    let mut frontier = vec![(src, 0usize)];
    for (level, &split) in splits.iter().enumerate() {
        let mut next = Vec::with_capacity(frontier.len() * 2);
        for (i, (module, outlet)) in frontier.into_iter().enumerate() {
            let splitter = sim
                .add_splitter(&format!("split-{level}-{i}"), capacity, split)
                .unwrap();
            sim.connect(module, outlet, splitter, 0).unwrap();
            next.push((splitter, 0));
            next.push((splitter, 1));
        }
        frontier = next;
    }
    for (i, (module, outlet)) in frontier.into_iter().enumerate() {
        let sink = sim.add_sink(&format!("sink-{i}"), Capacity::Unbounded);
        sim.connect(module, outlet, sink, 0).unwrap();
    }
    sim
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Running totals match a full recount after any enqueue/dequeue mix.
    #[test]
    fn queue_totals_track_contents(ops in arb_queue_ops(40)) {
        let reg = water_fiber_registry();
        let mut queue = EventQueue::new();
        for op in ops {
            match op {
                QueueOp::Enqueue(w, f) => {
                    let event = Event::new(&reg, &[(water(), w), (fiber(), f)]).unwrap();
                    queue.enqueue(event).unwrap();
                }
                QueueOp::Dequeue => {
                    queue.dequeue();
                }
                QueueOp::Purge => {
                    queue.purge();
                }
            }
            prop_assert_eq!(queue.aggregate_volume(), queue.recomputed_volume());
            prop_assert!(queue.species_volumes().iter().all(|v| *v >= Fixed64::ZERO));
            let water_sum: Fixed64 = queue
                .iter()
                .map(|e| e.species_volume(water()).unwrap_or(Fixed64::ZERO))
                .sum();
            prop_assert_eq!(queue.species_volume(water()), water_sum);
        }
    }

    /// A queue near the top of the fixed-point range admits exactly the
    /// events that fit its headroom and keeps its totals intact.
    #[test]
    fn queue_refuses_only_overflowing_events(
        fill in 1_900_000_000u32..2_100_000_000,
        volumes in proptest::collection::vec(1u32..200_000_000, 1..12),
    ) {
        let reg = water_fiber_registry();
        let mut queue = EventQueue::new();
        queue.enqueue(water_event(&reg, f64::from(fill))).unwrap();
        for v in volumes {
            let event = water_event(&reg, f64::from(v));
            let headroom = queue.headroom();
            let before = queue.aggregate_volume();
            match queue.enqueue(event) {
                Ok(()) => prop_assert!(Fixed64::from_num(v) <= headroom),
                Err(refused) => {
                    prop_assert!(refused.volume > headroom);
                    prop_assert_eq!(refused.event.aggregate_volume(), Fixed64::from_num(v));
                    prop_assert_eq!(queue.aggregate_volume(), before);
                }
            }
            prop_assert_eq!(queue.aggregate_volume(), queue.recomputed_volume());
        }
    }

    /// Splitting never creates or loses volume; out-of-range fractions are refused.
    #[test]
    fn split_is_exact(v in arb_volume(), f in arb_fraction(), bad in 1u32..100) {
        let reg = water_fiber_registry();
        let mut event = water_event(&reg, 0.0);
        event.set_species_volume(water(), v).unwrap();

        let (removed, retained) = event.split_species_volume(water(), f).unwrap();
        prop_assert_eq!(removed + retained, v);
        prop_assert!(removed >= Fixed64::ZERO && retained >= Fixed64::ZERO);
        prop_assert_eq!(event.species_volume(water()), Some(retained));

        let over = Fixed64::ONE + Fixed64::from_num(bad) / Fixed64::from_num(100);
        prop_assert_eq!(
            event.split_species_volume(water(), over),
            Err(EventError::InvalidSplitFraction(over))
        );
        prop_assert_eq!(event.species_volume(water()), Some(retained));
    }

    /// A push across an unbounded stream moves the whole backlog and records it.
    #[test]
    fn push_conserves_volume(volumes in proptest::collection::vec((arb_volume(), arb_volume()), 0..20)) {
        let mut sim = new_simulation();
        let reg = sim.registry().clone();
        let join = sim.add_joiner("join", Capacity::Unbounded, Capacity::Unbounded);
        let sink = sim.add_sink("sink", Capacity::Unbounded);
        let stream = sim.connect(join, 0, sink, 0).unwrap();
        let out = sim.network().outlet(join, 0).unwrap();
        let inlet = sim.network().inlet(sink, 0).unwrap();

        let mut expected = Fixed64::ZERO;
        for (w, f) in &volumes {
            let event = Event::new(&reg, &[(water(), *w), (fiber(), *f)]).unwrap();
            expected += event.aggregate_volume();
            sim.network_mut().socket_mut(out).unwrap().queue.enqueue(event).unwrap();
        }

        let pushed = sim.network_mut().push(out).unwrap();
        prop_assert_eq!(pushed, expected);
        prop_assert!(sim.network().socket(out).unwrap().queue.is_empty());
        prop_assert_eq!(sim.network().socket(inlet).unwrap().queue.aggregate_volume(), expected);
        prop_assert_eq!(stream_total(&sim, stream), expected);
    }

    /// Registering a name twice fails and leaves the builder untouched.
    #[test]
    fn duplicate_registration_is_rejected(names in proptest::collection::hash_set("[a-z]{1,8}", 1..6)) {
        let mut builder = SpeciesRegistryBuilder::new();
        let names: Vec<String> = names.into_iter().collect();
        for (i, name) in names.iter().enumerate() {
            let id = builder.register(Species::new(name, fixed(1000.0), Phase::Liquid)).unwrap();
            prop_assert_eq!(id.index(), i);
        }
        for name in &names {
            prop_assert_eq!(
                builder.register(Species::new(name, fixed(1.0), Phase::Gas)),
                Err(RegistryError::DuplicateSpecies(name.clone()))
            );
        }
        prop_assert_eq!(builder.len(), names.len());
        let reg = builder.build();
        for (i, name) in names.iter().enumerate() {
            prop_assert_eq!(reg.id_of(name).map(|id| id.index()), Some(i));
        }
    }

    /// Everything generated is either consumed by a sink or still held
    /// somewhere in the network.
    #[test]
    fn splitter_networks_conserve_volume(
        splits in proptest::collection::vec(arb_fraction(), 1..4),
        bound in proptest::option::of(16u32..600),
        event_rate in 1u32..9,
        iterations in 1u64..20,
    ) {
        let mut sim = random_splitter_tree(&splits, bound, event_rate);
        let report = sim.run_for(iterations);
        prop_assert_eq!(report.flow_errors, 0);
        prop_assert_eq!(report.generated, report.consumed + network_inventory(&sim));
    }

    /// Identically built networks stay in lockstep.
    #[test]
    fn identical_networks_hash_identically(
        splits in proptest::collection::vec(arb_fraction(), 1..3),
        iterations in 1usize..10,
    ) {
        let mut a = random_splitter_tree(&splits, None, 4);
        let mut b = random_splitter_tree(&splits, None, 4);
        for _ in 0..iterations {
            a.run();
            b.run();
            prop_assert_eq!(a.state_hash(), b.state_hash());
        }
    }
}
