//! Process units and their three-phase iteration.
//!
//! Every iteration a module runs preprocess (inlets deliver into the module
//! queue), process (the unit's own logic, see [`Unit::process`]) and
//! postprocess (the queue is apportioned across outlets and pushed
//! downstream). The phases are methods on [`FlowNetwork`] because each one
//! touches the module and its sockets together.

use crate::fixed::Fixed64;
use crate::id::{ModuleId, SocketId, SpeciesId};
use crate::network::FlowNetwork;
use crate::queue::{EventQueue, QueueSnapshot};
use crate::socket::{
    FlowError, OutletPool, SocketKind, pull, push, transfer_inlet, transfer_outlet,
};
use crate::unit::{Unit, UnitContext, UnitResult};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Invalid construction parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModuleError {
    #[error("{parameter} must lie in [0, 1], got {value}")]
    FractionOutOfRange {
        parameter: &'static str,
        value: Fixed64,
    },
    #[error("event rate must be at least 1")]
    ZeroEventRate,
    #[error("no species registered")]
    NoSpeciesRegistered,
    #[error("unknown species in volumetric fractions: {0:?}")]
    UnknownSpecies(SpeciesId),
    #[error("negative volumetric fraction {fraction} for species {species:?}")]
    NegativeFraction { species: SpeciesId, fraction: Fixed64 },
    #[error("volumetric fractions sum to zero")]
    ZeroFractionSum,
    #[error("capacity must be finite and within fixed-point range, got {0}")]
    InvalidCapacity(f64),
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// A process unit with a fixed set of sockets and an internal queue.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub unit: Unit,
    pub(crate) inlets: Vec<SocketId>,
    pub(crate) outlets: Vec<SocketId>,
    /// Material inside the unit between phases.
    pub queue: EventQueue,
    /// Volume each inlet delivered during the last preprocess.
    pub(crate) inlet_flows: Vec<(SocketId, Fixed64)>,
    /// Queue contents captured at the end of preprocess. Cleared by postprocess.
    pub(crate) snapshot: Option<QueueSnapshot>,
}

impl Module {
    pub(crate) fn new(name: &str, unit: Unit) -> Self {
        Self {
            name: name.to_string(),
            unit,
            inlets: Vec::new(),
            outlets: Vec::new(),
            queue: EventQueue::new(),
            inlet_flows: Vec::new(),
            snapshot: None,
        }
    }

    pub fn inlets(&self) -> &[SocketId] {
        &self.inlets
    }

    pub fn outlets(&self) -> &[SocketId] {
        &self.outlets
    }

    pub fn inlet_flows(&self) -> &[(SocketId, Fixed64)] {
        &self.inlet_flows
    }

    /// Total volume delivered by all inlets during the last preprocess.
    pub fn inlet_flow(&self) -> Fixed64 {
        self.inlet_flows.iter().map(|(_, v)| *v).sum()
    }

    pub fn snapshot(&self) -> Option<&QueueSnapshot> {
        self.snapshot.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Iteration phases
// ---------------------------------------------------------------------------

impl FlowNetwork {
    /// Deliver inlet material into the module queue and snapshot it.
    ///
    /// Push inlets are transferred first. A pump then limits its pull inlet
    /// to whatever capacity the push inlets left over before pulling.
    pub fn preprocess(&mut self, id: ModuleId) -> Result<(), FlowError> {
        let module = self
            .modules
            .get_mut(id)
            .ok_or(FlowError::UnknownModule(id))?;
        module.inlet_flows.clear();

        let mut pushed = Fixed64::ZERO;
        for &inlet in &module.inlets {
            let socket = self
                .sockets
                .get(inlet)
                .ok_or(FlowError::UnknownSocket(inlet))?;
            if socket.kind != SocketKind::PushInlet {
                continue;
            }
            let moved = transfer_inlet(&mut self.sockets, &mut module.queue, inlet)?;
            pushed = pushed.saturating_add(moved);
            module.inlet_flows.push((inlet, moved));
        }

        let pump_capacity = match &module.unit {
            Unit::Pump(pump) => Some(pump.capacity),
            _ => None,
        };
        for &inlet in &module.inlets {
            let socket = self
                .sockets
                .get_mut(inlet)
                .ok_or(FlowError::UnknownSocket(inlet))?;
            if socket.kind != SocketKind::PullInlet {
                continue;
            }
            if let Some(capacity) = pump_capacity {
                socket.capacity = capacity.saturating_sub(pushed);
            }
            let wired = socket
                .stream
                .and_then(|s| self.streams.get(s))
                .is_some_and(|s| s.is_wired());
            if wired {
                pull(&mut self.sockets, &mut self.streams, inlet)?;
            }
            let moved = transfer_inlet(&mut self.sockets, &mut module.queue, inlet)?;
            module.inlet_flows.push((inlet, moved));
        }

        let mut snapshot = module.queue.snapshot();
        if snapshot.species_volumes.len() < self.registry.len() {
            snapshot
                .species_volumes
                .resize(self.registry.len(), Fixed64::ZERO);
        }
        module.snapshot = Some(snapshot);
        Ok(())
    }

    /// Run the unit's own logic.
    pub fn process(&mut self, id: ModuleId) -> Result<UnitResult, FlowError> {
        let module = self
            .modules
            .get_mut(id)
            .ok_or(FlowError::UnknownModule(id))?;
        let fallback = QueueSnapshot::default();
        let mut ctx = UnitContext {
            registry: &self.registry,
            queue: &mut module.queue,
            snapshot: module.snapshot.as_ref().unwrap_or(&fallback),
            outlets: &module.outlets,
            sockets: &mut self.sockets,
        };
        module.unit.process(&mut ctx)
    }

    /// Apportion the module queue across outlets, then push every wired
    /// push outlet. Returns the volume pushed downstream.
    pub fn postprocess(&mut self, id: ModuleId) -> Result<Fixed64, FlowError> {
        let module = self
            .modules
            .get_mut(id)
            .ok_or(FlowError::UnknownModule(id))?;
        let snapshot = module.snapshot.take().unwrap_or_default();
        if module.outlets.is_empty() {
            return Ok(Fixed64::ZERO);
        }

        let mut pool = OutletPool::open(snapshot, &mut module.queue, module.outlets.len());
        let mut apportioned = Ok(Fixed64::ZERO);
        for &outlet in &module.outlets {
            match transfer_outlet(&mut self.sockets, &mut pool, outlet) {
                Ok(v) => apportioned = apportioned.map(|total| total.saturating_add(v)),
                Err(e) => {
                    apportioned = Err(e);
                    break;
                }
            }
        }
        let residual = pool.close(&mut module.queue)?;
        let apportioned = apportioned?;
        tracing::trace!(?id, apportioned = %apportioned, residual = %residual, "apportioned");

        let mut pushed = Fixed64::ZERO;
        for &outlet in &module.outlets {
            let socket = self
                .sockets
                .get(outlet)
                .ok_or(FlowError::UnknownSocket(outlet))?;
            let wired = socket
                .stream
                .and_then(|s| self.streams.get(s))
                .is_some_and(|s| s.is_wired());
            if socket.kind == SocketKind::PushOutlet && wired {
                let moved = push(&mut self.sockets, &mut self.streams, outlet)?;
                pushed = pushed.saturating_add(moved);
            }
        }
        Ok(pushed)
    }

    /// All three phases for one module.
    pub fn simulate(&mut self, id: ModuleId) -> Result<UnitResult, FlowError> {
        self.preprocess(id)?;
        let result = self.process(id)?;
        self.postprocess(id)?;
        Ok(result)
    }
}
