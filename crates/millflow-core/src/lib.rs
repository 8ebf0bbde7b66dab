//! Millflow Core -- a discrete-time material flow simulator.
//!
//! Process units (sources, tanks, pumps, splitters, joiners, hydrocyclones,
//! sinks) are wired together by streams. Material travels as events: packets
//! carrying one volume per registered species. Every iteration each unit
//! pulls or receives material through its inlet sockets, applies its own
//! transform, and apportions the result across its outlet sockets.
//!
//! # Iteration
//!
//! Each call to [`simulation::Simulation::run`] drives every registered
//! module through three phases:
//!
//! 1. **Preprocess** -- push inlets deliver into the module queue; pull
//!    inlets signal demand upstream and draw material; the queue is
//!    snapshotted.
//! 2. **Process** -- the unit's own logic: generation, flow fractions, or
//!    purging.
//! 3. **Postprocess** -- the queue is apportioned across outlets by flow
//!    fraction and push outlets forward their material across streams.
//!
//! Readouts are refreshed once all modules have run.
//!
//! Queues never hold more than [`fixed::Fixed64::MAX`]: a transfer stops at
//! the first event the receiving queue has no room for, which backs material
//! up the way a capacity limit does. Lifetime counters saturate.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let mut sim = Simulation::new(registry, SimulationConfig::default());
//! let src = sim.add_source("feed", Capacity::from_f64(100.0)?, 4, None)?;
//! let sink = sim.add_sink("drain", Capacity::Unbounded);
//! let stream = sim.connect(src, 0, sink, 0).expect("compatible sockets");
//! sim.run();
//! ```
//!
//! # Key Types
//!
//! - [`simulation::Simulation`] -- scheduler, readouts and run order.
//! - [`network::FlowNetwork`] -- arena of modules, sockets and streams, with
//!   wiring and topological ordering.
//! - [`unit::Unit`] -- the seven unit kinds, dispatched by enum match.
//! - [`socket::Socket`] -- push/pull inlet/outlet endpoints and the transfer
//!   operations between them.
//! - [`event::Event`] / [`queue::EventQueue`] -- material packets and their
//!   FIFO containers with running per-species totals.
//! - [`species::SpeciesRegistry`] -- immutable set of tracked species.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for exact volume sums.

#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod event;
pub mod fixed;
pub mod id;
pub mod module;
pub mod network;
pub mod queue;
pub mod readout;
pub mod sim;
pub mod simulation;
pub mod socket;
pub mod species;
pub mod stream;
pub mod unit;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
