//! The simulation scheduler: owns the flow network, the run order and the
//! readouts, and advances everything one discrete iteration at a time.
//!
//! # Iteration
//!
//! Each [`Simulation::run`]:
//! 1. **Modules** -- every registered module runs preprocess, process and
//!    postprocess, in registration order (or upstream-first when configured).
//! 2. **Readouts** -- every readout formats its stream's flowrates.
//! 3. **Bookkeeping** -- the iteration counter advances and the state hash is
//!    recomputed.
//!
//! A flow error inside one module is logged and counted; the rest of the
//! network still runs.

use crate::fixed::Fixed64;
use crate::id::*;
use crate::module::ModuleError;
use crate::network::FlowNetwork;
use crate::readout::Readout;
use crate::sim::{RunReport, SchedulingOrder, SimState, SimulationConfig, StateHash};
use crate::socket::Capacity;
use crate::species::SpeciesRegistry;
use slotmap::SlotMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Simulation {
    network: FlowNetwork,
    config: SimulationConfig,
    /// Registered modules in run order.
    order: Vec<ModuleId>,
    readouts: SlotMap<ReadoutId, Readout>,
    pub sim_state: SimState,
    last_report: RunReport,
    last_state_hash: u64,
}

impl Simulation {
    pub fn new(registry: Arc<SpeciesRegistry>, config: SimulationConfig) -> Self {
        Self {
            network: FlowNetwork::new(registry),
            config,
            order: Vec::new(),
            readouts: SlotMap::with_key(),
            sim_state: SimState::default(),
            last_report: RunReport::default(),
            last_state_hash: StateHash::new().finish(),
        }
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        self.network.registry()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn network(&self) -> &FlowNetwork {
        &self.network
    }

    /// Direct access for wiring. Structural changes belong between
    /// iterations.
    pub fn network_mut(&mut self) -> &mut FlowNetwork {
        &mut self.network
    }

    /// Completed iterations.
    pub fn iteration(&self) -> u64 {
        self.sim_state.iteration
    }

    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    /// Totals from the most recent `run`/`run_for`.
    pub fn last_report(&self) -> RunReport {
        self.last_report
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Append a module to the run order. Unknown or already registered
    /// modules are refused.
    pub fn register(&mut self, module: ModuleId) -> bool {
        if !self.network.contains_module(module) || self.order.contains(&module) {
            return false;
        }
        self.order.push(module);
        true
    }

    pub fn unregister(&mut self, module: ModuleId) -> bool {
        let before = self.order.len();
        self.order.retain(|m| *m != module);
        self.order.len() != before
    }

    /// Registered modules in registration order.
    pub fn modules(&self) -> &[ModuleId] {
        &self.order
    }

    fn registered(&mut self, module: ModuleId) -> ModuleId {
        self.order.push(module);
        module
    }

    pub fn add_source(
        &mut self,
        name: &str,
        capacity: Capacity,
        event_rate: u32,
        volumetric_fractions: Option<&[(SpeciesId, Fixed64)]>,
    ) -> Result<ModuleId, ModuleError> {
        let id = self
            .network
            .add_source(name, capacity, event_rate, volumetric_fractions)?;
        Ok(self.registered(id))
    }

    pub fn add_tank(
        &mut self,
        name: &str,
        event_rate: u32,
        volumetric_fractions: Option<&[(SpeciesId, Fixed64)]>,
    ) -> Result<ModuleId, ModuleError> {
        let id = self.network.add_tank(name, event_rate, volumetric_fractions)?;
        Ok(self.registered(id))
    }

    pub fn add_pump(&mut self, name: &str, capacity: Capacity) -> ModuleId {
        let id = self.network.add_pump(name, capacity);
        self.registered(id)
    }

    pub fn add_splitter(
        &mut self,
        name: &str,
        capacity: Capacity,
        split: Fixed64,
    ) -> Result<ModuleId, ModuleError> {
        let id = self.network.add_splitter(name, capacity, split)?;
        Ok(self.registered(id))
    }

    pub fn add_joiner(&mut self, name: &str, first: Capacity, second: Capacity) -> ModuleId {
        let id = self.network.add_joiner(name, first, second);
        self.registered(id)
    }

    pub fn add_hydrocyclone(
        &mut self,
        name: &str,
        capacity: Capacity,
        rrv: Fixed64,
        rrw: Fixed64,
    ) -> Result<ModuleId, ModuleError> {
        let id = self.network.add_hydrocyclone(name, capacity, rrv, rrw)?;
        Ok(self.registered(id))
    }

    pub fn add_sink(&mut self, name: &str, capacity: Capacity) -> ModuleId {
        let id = self.network.add_sink(name, capacity);
        self.registered(id)
    }

    /// Wire outlet `from_index` of `from` to inlet `to_index` of `to`.
    pub fn connect(
        &mut self,
        from: ModuleId,
        from_index: usize,
        to: ModuleId,
        to_index: usize,
    ) -> Option<StreamId> {
        let outlet = self.network.outlet(from, from_index)?;
        let inlet = self.network.inlet(to, to_index)?;
        self.network.connect(outlet, inlet)
    }

    /// Tear down a module, its streams and any readout watching them.
    pub fn remove_module(&mut self, module: ModuleId) -> bool {
        let Some((_, streams)) = self.network.remove_module(module) else {
            return false;
        };
        self.order.retain(|m| *m != module);
        for readout in self.readouts.values_mut() {
            if readout.stream.is_some_and(|s| streams.contains(&s)) {
                readout.stream = None;
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Readouts
    // -----------------------------------------------------------------------

    pub fn add_readout(&mut self, name: &str, species: Option<SpeciesId>) -> ReadoutId {
        self.readouts.insert(Readout::new(name, species))
    }

    pub fn readout(&self, id: ReadoutId) -> Option<&Readout> {
        self.readouts.get(id)
    }

    pub fn readouts(&self) -> impl Iterator<Item = (ReadoutId, &Readout)> {
        self.readouts.iter()
    }

    /// Attach a readout to a stream. Fails when the stream already has a
    /// reader. A readout attached elsewhere is moved.
    pub fn connect_readout(&mut self, readout: ReadoutId, stream: StreamId) -> bool {
        let Some(reader) = self.network.stream(stream).map(|s| s.reader) else {
            return false;
        };
        if !self.readouts.contains_key(readout) {
            return false;
        }
        match reader {
            Some(existing) if existing == readout => return true,
            Some(_) => return false,
            None => {}
        }
        self.disconnect_readout(readout);
        self.network.streams[stream].reader = Some(readout);
        self.readouts[readout].stream = Some(stream);
        true
    }

    pub fn disconnect_readout(&mut self, readout: ReadoutId) -> bool {
        let Some(stream) = self.readouts.get_mut(readout).and_then(|r| r.stream.take()) else {
            return false;
        };
        if let Some(st) = self.network.streams.get_mut(stream) {
            st.reader = None;
        }
        true
    }

    pub fn remove_readout(&mut self, readout: ReadoutId) -> Option<Readout> {
        self.disconnect_readout(readout);
        self.readouts.remove(readout)
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    /// Advance exactly one iteration.
    pub fn run(&mut self) {
        self.last_report = self.step();
    }

    /// Advance `iterations` iterations and return their combined report.
    pub fn run_for(&mut self, iterations: u64) -> RunReport {
        let mut total = RunReport::default();
        for _ in 0..iterations {
            total.absorb(self.step());
        }
        self.last_report = total;
        total
    }

    fn step(&mut self) -> RunReport {
        let mut report = RunReport {
            iterations: 1,
            ..RunReport::default()
        };

        let order = match self.config.scheduling {
            SchedulingOrder::Registration => std::mem::take(&mut self.order),
            SchedulingOrder::Topological => self.network.topological_order(&self.order),
        };
        for &id in &order {
            match self.network.simulate(id) {
                Ok(result) => {
                    report.generated = report.generated.saturating_add(result.generated);
                    report.consumed = report.consumed.saturating_add(result.consumed);
                }
                Err(error) => {
                    report.flow_errors = report.flow_errors.saturating_add(1);
                    tracing::error!(module = ?id, %error, "flow error absorbed");
                }
            }
        }
        if self.config.scheduling == SchedulingOrder::Registration {
            self.order = order;
        }

        for readout in self.readouts.values_mut() {
            let stream = readout.stream.and_then(|s| self.network.streams.get(s));
            readout.update(&self.network.registry, stream);
        }

        self.sim_state.iteration += 1;
        self.last_state_hash = self.compute_state_hash();
        tracing::debug!(
            iteration = self.sim_state.iteration,
            generated = %report.generated,
            consumed = %report.consumed,
            errors = report.flow_errors,
            "iteration complete"
        );
        report
    }

    fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.iteration);
        for &id in &self.order {
            let Some(module) = self.network.module(id) else {
                continue;
            };
            hasher.write_queue(&module.queue);
            for &socket in module.inlets().iter().chain(module.outlets()) {
                if let Some(s) = self.network.socket(socket) {
                    hasher.write_queue(&s.queue);
                }
            }
        }
        for (_, stream) in self.network.streams() {
            for rate in stream.flowrates() {
                hasher.write_fixed64(*rate);
            }
        }
        hasher.finish()
    }
}
