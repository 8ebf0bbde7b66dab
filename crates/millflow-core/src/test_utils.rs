//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::*;
use crate::sim::{SchedulingOrder, SimulationConfig};
use crate::simulation::Simulation;
use crate::socket::Capacity;
use crate::species::{Phase, Species, SpeciesRegistry, SpeciesRegistryBuilder};
use crate::unit::Unit;
use std::sync::Arc;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

pub fn bounded(v: f64) -> Capacity {
    Capacity::bounded(fixed(v))
}

// ===========================================================================
// Species
// ===========================================================================

pub fn water() -> SpeciesId {
    SpeciesId(0)
}
pub fn fiber() -> SpeciesId {
    SpeciesId(1)
}

/// Water (liquid, 997.5) and fiber (solid, 1200), in that order.
pub fn water_fiber_registry() -> SpeciesRegistry {
    let mut b = SpeciesRegistryBuilder::new();
    b.register(Species::new("water", fixed(997.5), Phase::Liquid))
        .unwrap();
    b.register(Species::new("fiber", fixed(1200.0), Phase::Solid))
        .unwrap();
    b.build()
}

pub fn shared_registry() -> Arc<SpeciesRegistry> {
    Arc::new(water_fiber_registry())
}

// ===========================================================================
// Event constructors
// ===========================================================================

pub fn water_event(registry: &SpeciesRegistry, volume: f64) -> Event {
    Event::new(registry, &[(water(), fixed(volume))]).unwrap()
}

pub fn mixed_event(registry: &SpeciesRegistry, water_volume: f64, fiber_volume: f64) -> Event {
    Event::new(
        registry,
        &[(water(), fixed(water_volume)), (fiber(), fixed(fiber_volume))],
    )
    .unwrap()
}

// ===========================================================================
// Simulation helpers
// ===========================================================================

pub fn new_simulation() -> Simulation {
    Simulation::new(shared_registry(), SimulationConfig::default())
}

pub fn topological_simulation() -> Simulation {
    Simulation::new(
        shared_registry(),
        SimulationConfig {
            scheduling: SchedulingOrder::Topological,
        },
    )
}

/// Total volume a sink has purged so far.
pub fn sink_consumed(sim: &Simulation, sink: ModuleId) -> Fixed64 {
    match sim.network().module(sink).map(|m| &m.unit) {
        Some(Unit::Sink(s)) => s.consumed,
        _ => Fixed64::ZERO,
    }
}

pub fn stream_total(sim: &Simulation, stream: StreamId) -> Fixed64 {
    sim.network()
        .stream(stream)
        .map(|s| s.total_flowrate())
        .unwrap_or(Fixed64::ZERO)
}

/// Everything currently held anywhere in the network: module queues plus
/// socket queues.
pub fn network_inventory(sim: &Simulation) -> Fixed64 {
    let net = sim.network();
    net.modules()
        .map(|(id, m)| {
            let sockets: Fixed64 = net
                .inlets(id)
                .iter()
                .chain(net.outlets(id))
                .filter_map(|s| net.socket(*s))
                .map(|s| s.queue.aggregate_volume())
                .sum();
            m.queue.aggregate_volume() + sockets
        })
        .sum()
}

// ===========================================================================
// Network builders (for benchmarks and property tests)
// ===========================================================================

/// Source -> Sink with the given source capacity and event rate.
pub fn build_source_sink(capacity: f64, event_rate: u32) -> (Simulation, ModuleId, ModuleId, StreamId) {
    let mut sim = new_simulation();
    let src = sim
        .add_source("source", bounded(capacity), event_rate, None)
        .unwrap();
    let sink = sim.add_sink("sink", Capacity::Unbounded);
    let stream = sim.connect(src, 0, sink, 0).unwrap();
    (sim, src, sink, stream)
}

/// Source -> Pump x N -> Sink, registered upstream-first.
pub fn build_pump_chain(length: usize) -> Simulation {
    let mut sim = new_simulation();
    let mut prev = sim
        .add_source("source", bounded(100.0), 4, None)
        .unwrap();
    for i in 0..length {
        let pump = sim.add_pump(&format!("pump-{i}"), bounded(100.0));
        sim.connect(prev, 0, pump, 0).unwrap();
        prev = pump;
    }
    let sink = sim.add_sink("sink", Capacity::Unbounded);
    sim.connect(prev, 0, sink, 0).unwrap();
    sim
}

/// Binary tree of splitters `depth` levels deep, one sink per leaf.
pub fn build_splitter_tree(depth: usize) -> Simulation {
    let mut sim = new_simulation();
    let src = sim
        .add_source("source", bounded(1024.0), 8, None)
        .unwrap();
    let mut frontier = vec![(src, 0usize)];
    for level in 0..depth {
        let mut next = Vec::with_capacity(frontier.len() * 2);
        for (i, (module, outlet)) in frontier.into_iter().enumerate() {
            let splitter = sim
                .add_splitter(&format!("split-{level}-{i}"), Capacity::Unbounded, fixed(0.5))
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
