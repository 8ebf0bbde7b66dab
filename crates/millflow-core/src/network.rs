//! The flow network: arenas of modules, sockets and streams.
//!
//! Modules own their sockets. A module's sockets are created with it, in a
//! fixed order per unit kind, and removed with it together with every stream
//! they were wired to. Sockets and streams refer to each other only by key,
//! and all wiring goes through [`FlowNetwork`], which keeps these invariants:
//!
//! - a socket's `stream` link names a stream exactly when that stream names
//!   the socket as one of its terminals;
//! - a stream's inlet terminal holds an outlet socket and its outlet terminal
//!   an inlet socket;
//! - both terminals of a stream share a flow mode and belong to different
//!   modules;
//! - a wired pull outlet carries the capacity of its pull inlet.
//!
//! Wiring conflicts are returned as [`WiringConflict`] by the `try_` methods
//! and logged and reported as `false` (or `None`) by the others.

use crate::fixed::Fixed64;
use crate::id::*;
use crate::module::{Module, ModuleError};
use crate::socket::{self, Capacity, Direction, FlowError, FlowMode, Socket, SocketKind};
use crate::species::SpeciesRegistry;
use crate::stream::{Stream, WiringConflict};
use crate::unit::{Generator, Hydrocyclone, Pump, Sink, Splitter, Unit};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::VecDeque;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Flow network
// ---------------------------------------------------------------------------

/// Arena of modules, sockets and streams.
///
/// Sockets and streams refer to each other only by key. Every wiring change
/// goes through this type so that a socket's `stream` link and the stream's
/// terminal always agree.
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    pub(crate) registry: Arc<SpeciesRegistry>,
    pub(crate) modules: SlotMap<ModuleId, Module>,
    pub(crate) sockets: SlotMap<SocketId, Socket>,
    pub(crate) streams: SlotMap<StreamId, Stream>,
}

/// Description of one socket created with a module.
struct SocketSpec<'a> {
    name: &'a str,
    kind: SocketKind,
    capacity: Capacity,
}

fn spec(name: &str, kind: SocketKind, capacity: Capacity) -> SocketSpec<'_> {
    SocketSpec {
        name,
        kind,
        capacity,
    }
}

fn check_fraction(parameter: &'static str, value: Fixed64) -> Result<(), ModuleError> {
    if value < Fixed64::ZERO || value > Fixed64::ONE {
        return Err(ModuleError::FractionOutOfRange { parameter, value });
    }
    Ok(())
}

impl FlowNetwork {
    pub fn new(registry: Arc<SpeciesRegistry>) -> Self {
        Self {
            registry,
            modules: SlotMap::with_key(),
            sockets: SlotMap::with_key(),
            streams: SlotMap::with_key(),
        }
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Module construction
    // -----------------------------------------------------------------------

    fn insert_module(
        &mut self,
        name: &str,
        unit: Unit,
        inlets: &[SocketSpec<'_>],
        outlets: &[SocketSpec<'_>],
    ) -> ModuleId {
        let label = unit.label();
        let id = self.modules.insert(Module::new(name, unit));
        for s in inlets {
            let socket = self.sockets.insert(Socket::new(id, s.name, s.kind, s.capacity));
            self.modules[id].inlets.push(socket);
        }
        for s in outlets {
            let socket = self.sockets.insert(Socket::new(id, s.name, s.kind, s.capacity));
            self.modules[id].outlets.push(socket);
        }
        tracing::debug!(?id, name, kind = label, "module added");
        id
    }

    /// Generator with one push outlet. Emits `capacity` per iteration.
    pub fn add_source(
        &mut self,
        name: &str,
        capacity: Capacity,
        event_rate: u32,
        volumetric_fractions: Option<&[(SpeciesId, Fixed64)]>,
    ) -> Result<ModuleId, ModuleError> {
        let generator = Generator::new(&self.registry, event_rate, volumetric_fractions)?;
        Ok(self.insert_module(
            name,
            Unit::Source(generator),
            &[],
            &[spec("out", SocketKind::PushOutlet, capacity)],
        ))
    }

    /// Generator with one pull outlet. Emits whatever the downstream
    /// puller demands; generates nothing until wired to a bounded pull inlet.
    pub fn add_tank(
        &mut self,
        name: &str,
        event_rate: u32,
        volumetric_fractions: Option<&[(SpeciesId, Fixed64)]>,
    ) -> Result<ModuleId, ModuleError> {
        let generator = Generator::new(&self.registry, event_rate, volumetric_fractions)?;
        Ok(self.insert_module(
            name,
            Unit::Tank(generator),
            &[],
            &[spec("drain", SocketKind::PullOutlet, Capacity::Unbounded)],
        ))
    }

    /// Inlet 0 is push-fed, inlet 1 pulls the balance up to `capacity`.
    pub fn add_pump(&mut self, name: &str, capacity: Capacity) -> ModuleId {
        self.insert_module(
            name,
            Unit::Pump(Pump { capacity }),
            &[
                spec("feed", SocketKind::PushInlet, capacity),
                spec("suction", SocketKind::PullInlet, capacity),
            ],
            &[spec("discharge", SocketKind::PushOutlet, capacity)],
        )
    }

    /// Outlet 0 receives `split` of every species, outlet 1 the rest.
    pub fn add_splitter(
        &mut self,
        name: &str,
        capacity: Capacity,
        split: Fixed64,
    ) -> Result<ModuleId, ModuleError> {
        check_fraction("split", split)?;
        Ok(self.insert_module(
            name,
            Unit::Splitter(Splitter { split }),
            &[spec("feed", SocketKind::PushInlet, capacity)],
            &[
                spec("first", SocketKind::PushOutlet, capacity.scaled(split)),
                spec("second", SocketKind::PushOutlet, capacity.scaled(Fixed64::ONE - split)),
            ],
        ))
    }

    pub fn add_joiner(&mut self, name: &str, first: Capacity, second: Capacity) -> ModuleId {
        self.insert_module(
            name,
            Unit::Joiner,
            &[
                spec("first", SocketKind::PushInlet, first),
                spec("second", SocketKind::PushInlet, second),
            ],
            &[spec("out", SocketKind::PushOutlet, first.combined(second))],
        )
    }

    /// Outlet 0 carries accepts, outlet 1 rejects.
    pub fn add_hydrocyclone(
        &mut self,
        name: &str,
        capacity: Capacity,
        rrv: Fixed64,
        rrw: Fixed64,
    ) -> Result<ModuleId, ModuleError> {
        check_fraction("rrv", rrv)?;
        check_fraction("rrw", rrw)?;
        Ok(self.insert_module(
            name,
            Unit::Hydrocyclone(Hydrocyclone::new(rrv, rrw)),
            &[spec("feed", SocketKind::PushInlet, capacity)],
            &[
                spec("accepts", SocketKind::PushOutlet, capacity),
                spec("rejects", SocketKind::PushOutlet, capacity),
            ],
        ))
    }

    pub fn add_sink(&mut self, name: &str, capacity: Capacity) -> ModuleId {
        self.insert_module(
            name,
            Unit::Sink(Sink::default()),
            &[spec("in", SocketKind::PushInlet, capacity)],
            &[],
        )
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id)
    }

    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        self.sockets.get(id)
    }

    pub fn socket_mut(&mut self, id: SocketId) -> Option<&mut Socket> {
        self.sockets.get_mut(id)
    }

    pub fn stream(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(id)
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules.iter()
    }

    pub fn streams(&self) -> impl Iterator<Item = (StreamId, &Stream)> {
        self.streams.iter()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn contains_module(&self, id: ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn contains_stream(&self, id: StreamId) -> bool {
        self.streams.contains_key(id)
    }

    /// Inlet sockets of a module, in construction order.
    pub fn inlets(&self, module: ModuleId) -> &[SocketId] {
        self.modules
            .get(module)
            .map(|m| m.inlets.as_slice())
            .unwrap_or(&[])
    }

    /// Outlet sockets of a module, in construction order.
    pub fn outlets(&self, module: ModuleId) -> &[SocketId] {
        self.modules
            .get(module)
            .map(|m| m.outlets.as_slice())
            .unwrap_or(&[])
    }

    pub fn inlet(&self, module: ModuleId, index: usize) -> Option<SocketId> {
        self.inlets(module).get(index).copied()
    }

    pub fn outlet(&self, module: ModuleId, index: usize) -> Option<SocketId> {
        self.outlets(module).get(index).copied()
    }

    /// Whether `socket` sits on a stream with both terminals connected.
    pub fn is_wired(&self, socket: SocketId) -> bool {
        self.sockets
            .get(socket)
            .and_then(|s| s.stream)
            .and_then(|id| self.streams.get(id))
            .is_some_and(Stream::is_wired)
    }

    // -----------------------------------------------------------------------
    // Wiring
    // -----------------------------------------------------------------------

    /// Create an empty, unwired stream.
    pub fn add_stream(&mut self) -> StreamId {
        self.streams.insert(Stream::new())
    }

    /// Attach `socket` to the matching terminal of `stream`.
    ///
    /// Outlet sockets take the stream's inlet terminal, inlet sockets its
    /// outlet terminal. Completing a pull pair copies the inlet's capacity
    /// onto the outlet.
    pub fn try_add_socket(&mut self, stream: StreamId, socket: SocketId) -> Result<(), WiringConflict> {
        let s = self
            .sockets
            .get(socket)
            .ok_or(WiringConflict::UnknownSocket(socket))?;
        let st = self
            .streams
            .get(stream)
            .ok_or(WiringConflict::UnknownStream(stream))?;
        if let Some(existing) = s.stream {
            return Err(WiringConflict::SocketAlreadyWired {
                socket,
                stream: existing,
            });
        }
        let (slot, mate) = match s.direction() {
            Direction::Outlet => (st.inlet, st.outlet),
            Direction::Inlet => (st.outlet, st.inlet),
        };
        if slot.is_some() {
            return Err(WiringConflict::SlotOccupied { stream });
        }
        if let Some(mate) = mate {
            let m = self
                .sockets
                .get(mate)
                .ok_or(WiringConflict::UnknownSocket(mate))?;
            if m.mode() != s.mode() {
                return Err(WiringConflict::ModeMismatch { socket, mate });
            }
            if m.owner == s.owner {
                return Err(WiringConflict::SameModule(socket, mate));
            }
        }

        let direction = s.direction();
        let st = &mut self.streams[stream];
        match direction {
            Direction::Outlet => st.inlet = Some(socket),
            Direction::Inlet => st.outlet = Some(socket),
        }
        self.sockets[socket].stream = Some(stream);

        if let Some(mate) = mate
            && self.sockets[socket].mode() == FlowMode::Pull
        {
            let (inlet, outlet) = match direction {
                Direction::Inlet => (socket, mate),
                Direction::Outlet => (mate, socket),
            };
            self.sockets[outlet].capacity = self.sockets[inlet].capacity;
        }
        Ok(())
    }

    /// [`try_add_socket`](Self::try_add_socket), logging and reporting
    /// conflicts as `false`.
    pub fn add_socket(&mut self, stream: StreamId, socket: SocketId) -> bool {
        match self.try_add_socket(stream, socket) {
            Ok(()) => true,
            Err(conflict) => {
                tracing::warn!(%conflict, "wiring rejected");
                false
            }
        }
    }

    /// Detach `socket` from `stream`, clearing both links.
    pub fn remove_socket(&mut self, stream: StreamId, socket: SocketId) -> bool {
        let Some(st) = self.streams.get_mut(stream) else {
            return false;
        };
        if !st.detach(socket) {
            return false;
        }
        if let Some(s) = self.sockets.get_mut(socket) {
            s.stream = None;
        }
        true
    }

    /// Detach a socket from whatever stream it is wired to.
    pub fn disconnect(&mut self, socket: SocketId) -> bool {
        match self.sockets.get(socket).and_then(|s| s.stream) {
            Some(stream) => self.remove_socket(stream, socket),
            None => false,
        }
    }

    /// Remove a stream after detaching both terminals.
    pub fn remove_stream(&mut self, stream: StreamId) -> Option<Stream> {
        let st = self.streams.remove(stream)?;
        for socket in [st.inlet, st.outlet].into_iter().flatten() {
            if let Some(s) = self.sockets.get_mut(socket) {
                s.stream = None;
            }
        }
        Some(st)
    }

    /// Wire an outlet socket to an inlet socket through a fresh stream.
    ///
    /// On any conflict the half-built stream is removed again and `None` is
    /// returned.
    pub fn connect(&mut self, outlet: SocketId, inlet: SocketId) -> Option<StreamId> {
        for (socket, expected) in [(outlet, Direction::Outlet), (inlet, Direction::Inlet)] {
            match self.sockets.get(socket) {
                Some(s) if s.direction() == expected => {}
                Some(_) => {
                    let conflict = WiringConflict::DirectionMismatch(socket);
                    tracing::warn!(%conflict, "wiring rejected");
                    return None;
                }
                None => {
                    let conflict = WiringConflict::UnknownSocket(socket);
                    tracing::warn!(%conflict, "wiring rejected");
                    return None;
                }
            }
        }
        let stream = self.add_stream();
        if self.add_socket(stream, outlet) && self.add_socket(stream, inlet) {
            tracing::debug!(?stream, ?outlet, ?inlet, "connected");
            return Some(stream);
        }
        self.remove_stream(stream);
        None
    }

    /// Tear down a module: remove every stream attached to its sockets, then
    /// drop the sockets and the module itself.
    pub fn remove_module(&mut self, id: ModuleId) -> Option<(Module, Vec<StreamId>)> {
        let module = self.modules.remove(id)?;
        let mut removed_streams = Vec::new();
        for &socket in module.inlets.iter().chain(&module.outlets) {
            if let Some(stream) = self.sockets.get(socket).and_then(|s| s.stream) {
                self.remove_stream(stream);
                removed_streams.push(stream);
            }
            self.sockets.remove(socket);
        }
        tracing::debug!(?id, streams = removed_streams.len(), "module removed");
        Some((module, removed_streams))
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    /// Push a push outlet's queue across its stream.
    pub fn push(&mut self, outlet: SocketId) -> Result<Fixed64, FlowError> {
        socket::push(&mut self.sockets, &mut self.streams, outlet)
    }

    /// Pull from the mate of a pull inlet.
    pub fn pull(&mut self, inlet: SocketId) -> Result<Fixed64, FlowError> {
        socket::pull(&mut self.sockets, &mut self.streams, inlet)
    }

    // -----------------------------------------------------------------------
    // Topology
    // -----------------------------------------------------------------------

    /// Modules feeding `module` through its wired inlets.
    fn upstream_of(&self, module: &Module) -> Vec<ModuleId> {
        module
            .inlets
            .iter()
            .filter_map(|&inlet| {
                let stream = self.sockets.get(inlet)?.stream?;
                let mate = self.streams.get(stream)?.inlet?;
                Some(self.sockets.get(mate)?.owner)
            })
            .collect()
    }

    /// Order `modules` so every module follows the modules feeding it.
    ///
    /// Kahn's algorithm seeded in the given order. Modules left over (they
    /// sit on cycles) are appended in the given order.
    pub fn topological_order(&self, modules: &[ModuleId]) -> Vec<ModuleId> {
        let mut in_degree: SecondaryMap<ModuleId, usize> = SecondaryMap::new();
        let mut downstream: SecondaryMap<ModuleId, Vec<ModuleId>> = SecondaryMap::new();
        for &id in modules {
            if self.modules.contains_key(id) {
                in_degree.insert(id, 0);
                downstream.insert(id, Vec::new());
            }
        }
        for &id in modules {
            let Some(module) = self.modules.get(id) else {
                continue;
            };
            for up in self.upstream_of(module) {
                if up == id || !in_degree.contains_key(up) {
                    continue;
                }
                if let Some(deg) = in_degree.get_mut(id) {
                    *deg += 1;
                }
                if let Some(list) = downstream.get_mut(up) {
                    list.push(id);
                }
            }
        }

        let mut queue: VecDeque<ModuleId> = modules
            .iter()
            .copied()
            .filter(|id| in_degree.get(*id) == Some(&0))
            .collect();
        let mut order: Vec<ModuleId> = Vec::with_capacity(in_degree.len());
        let mut placed: SecondaryMap<ModuleId, ()> = SecondaryMap::new();

        while let Some(id) = queue.pop_front() {
            if placed.insert(id, ()).is_some() {
                continue;
            }
            order.push(id);
            for &next in downstream.get(id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(deg) = in_degree.get_mut(next) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        for &id in modules {
            if in_degree.contains_key(id) && !placed.contains_key(id) {
                placed.insert(id, ());
                order.push(id);
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn network() -> FlowNetwork {
        FlowNetwork::new(shared_registry())
    }

    #[test]
    fn constructors_create_fixed_sockets() {
        let mut net = network();
        let pump = net.add_pump("pump", bounded(50.0));
        assert_eq!(net.inlets(pump).len(), 2);
        assert_eq!(net.outlets(pump).len(), 1);
        let suction = net.inlet(pump, 1).unwrap();
        assert_eq!(net.socket(suction).unwrap().kind, SocketKind::PullInlet);
        assert_eq!(net.socket_count(), 3);
    }

    #[test]
    fn splitter_outlet_capacities_follow_split() {
        let mut net = network();
        let s = net
            .add_splitter("split", bounded(100.0), fixed(0.25))
            .unwrap();
        let first = net.outlet(s, 0).unwrap();
        let second = net.outlet(s, 1).unwrap();
        assert_eq!(net.socket(first).unwrap().capacity, bounded(25.0));
        assert_eq!(net.socket(second).unwrap().capacity, bounded(75.0));
    }

    #[test]
    fn joiner_outlet_capacity_is_sum() {
        let mut net = network();
        let j = net.add_joiner("join", bounded(10.0), bounded(15.0));
        let out = net.outlet(j, 0).unwrap();
        assert_eq!(net.socket(out).unwrap().capacity, bounded(25.0));
    }

    #[test]
    fn constructor_validation() {
        let mut net = network();
        assert!(matches!(
            net.add_splitter("bad", Capacity::Unbounded, fixed(1.5)),
            Err(ModuleError::FractionOutOfRange { parameter: "split", .. })
        ));
        assert!(matches!(
            net.add_hydrocyclone("bad", Capacity::Unbounded, fixed(0.5), fixed(-0.1)),
            Err(ModuleError::FractionOutOfRange { parameter: "rrw", .. })
        ));
        assert_eq!(
            net.add_source("bad", bounded(1.0), 0, None).unwrap_err(),
            ModuleError::ZeroEventRate
        );
        assert_eq!(net.module_count(), 0);
    }

    #[test]
    fn connect_links_both_sides() {
        let mut net = network();
        let src = net.add_source("src", bounded(10.0), 1, None).unwrap();
        let sink = net.add_sink("sink", Capacity::Unbounded);
        let out = net.outlet(src, 0).unwrap();
        let inp = net.inlet(sink, 0).unwrap();

        let stream = net.connect(out, inp).unwrap();
        let st = net.stream(stream).unwrap();
        assert_eq!(st.inlet(), Some(out));
        assert_eq!(st.outlet(), Some(inp));
        assert_eq!(net.socket(out).unwrap().stream(), Some(stream));
        assert_eq!(net.socket(inp).unwrap().stream(), Some(stream));
        assert!(net.is_wired(out));
    }

    #[test]
    fn connect_rejects_mode_mismatch_and_rolls_back() {
        let mut net = network();
        let tank = net.add_tank("tank", 1, None).unwrap();
        let sink = net.add_sink("sink", Capacity::Unbounded);
        let drain = net.outlet(tank, 0).unwrap();
        let inp = net.inlet(sink, 0).unwrap();

        assert!(net.connect(drain, inp).is_none());
        assert_eq!(net.stream_count(), 0);
        assert!(net.socket(drain).unwrap().stream().is_none());
        assert!(net.socket(inp).unwrap().stream().is_none());
    }

    #[test]
    fn connect_rejects_reversed_direction() {
        let mut net = network();
        let src = net.add_source("src", bounded(10.0), 1, None).unwrap();
        let sink = net.add_sink("sink", Capacity::Unbounded);
        let out = net.outlet(src, 0).unwrap();
        let inp = net.inlet(sink, 0).unwrap();
        assert!(net.connect(inp, out).is_none());
        assert_eq!(net.stream_count(), 0);
    }

    #[test]
    fn add_socket_conflicts() {
        let mut net = network();
        let a = net.add_source("a", bounded(1.0), 1, None).unwrap();
        let b = net.add_source("b", bounded(1.0), 1, None).unwrap();
        let a_out = net.outlet(a, 0).unwrap();
        let b_out = net.outlet(b, 0).unwrap();

        let stream = net.add_stream();
        assert!(net.try_add_socket(stream, a_out).is_ok());
        assert_eq!(
            net.try_add_socket(stream, b_out),
            Err(WiringConflict::SlotOccupied { stream })
        );
        let other = net.add_stream();
        assert_eq!(
            net.try_add_socket(other, a_out),
            Err(WiringConflict::SocketAlreadyWired { socket: a_out, stream })
        );
    }

    #[test]
    fn add_socket_rejects_same_module() {
        let mut net = network();
        let pump = net.add_pump("pump", bounded(5.0));
        let feed = net.inlet(pump, 0).unwrap();
        let discharge = net.outlet(pump, 0).unwrap();
        let stream = net.add_stream();
        assert!(net.add_socket(stream, discharge));
        assert_eq!(
            net.try_add_socket(stream, feed),
            Err(WiringConflict::SameModule(feed, discharge))
        );
    }

    #[test]
    fn pull_pair_propagates_capacity() {
        let mut net = network();
        let tank = net.add_tank("tank", 2, None).unwrap();
        let pump = net.add_pump("pump", bounded(40.0));
        let drain = net.outlet(tank, 0).unwrap();
        let suction = net.inlet(pump, 1).unwrap();
        assert_eq!(net.socket(drain).unwrap().capacity, Capacity::Unbounded);
        net.connect(drain, suction).unwrap();
        assert_eq!(net.socket(drain).unwrap().capacity, bounded(40.0));
    }

    #[test]
    fn remove_socket_clears_both_links() {
        let mut net = network();
        let src = net.add_source("src", bounded(10.0), 1, None).unwrap();
        let sink = net.add_sink("sink", Capacity::Unbounded);
        let out = net.outlet(src, 0).unwrap();
        let inp = net.inlet(sink, 0).unwrap();
        let stream = net.connect(out, inp).unwrap();

        assert!(net.remove_socket(stream, inp));
        assert!(!net.remove_socket(stream, inp));
        assert!(net.socket(inp).unwrap().stream().is_none());
        assert_eq!(net.stream(stream).unwrap().outlet(), None);
        assert!(!net.is_wired(out));
    }

    #[test]
    fn remove_module_tears_down_streams() {
        let mut net = network();
        let src = net.add_source("src", bounded(10.0), 1, None).unwrap();
        let sink = net.add_sink("sink", Capacity::Unbounded);
        let out = net.outlet(src, 0).unwrap();
        let inp = net.inlet(sink, 0).unwrap();
        let stream = net.connect(out, inp).unwrap();

        let (_, streams) = net.remove_module(sink).unwrap();
        assert_eq!(streams, vec![stream]);
        assert!(!net.contains_stream(stream));
        assert!(net.socket(inp).is_none());
        assert!(net.socket(out).unwrap().stream().is_none());
        assert!(net.remove_module(sink).is_none());
    }

    #[test]
    fn topological_order_reorders_chain() {
        let mut net = network();
        let src = net.add_source("src", bounded(10.0), 1, None).unwrap();
        let pump = net.add_pump("pump", bounded(10.0));
        let sink = net.add_sink("sink", Capacity::Unbounded);
        net.connect(net.outlet(src, 0).unwrap(), net.inlet(pump, 0).unwrap())
            .unwrap();
        net.connect(net.outlet(pump, 0).unwrap(), net.inlet(sink, 0).unwrap())
            .unwrap();

        assert_eq!(net.topological_order(&[sink, pump, src]), vec![src, pump, sink]);
    }

    #[test]
    fn topological_order_appends_cycles() {
        let mut net = network();
        let a = net.add_joiner("a", Capacity::Unbounded, Capacity::Unbounded);
        let b = net.add_joiner("b", Capacity::Unbounded, Capacity::Unbounded);
        let src = net.add_source("src", bounded(1.0), 1, None).unwrap();
        net.connect(net.outlet(a, 0).unwrap(), net.inlet(b, 0).unwrap())
            .unwrap();
        net.connect(net.outlet(b, 0).unwrap(), net.inlet(a, 0).unwrap())
            .unwrap();

        assert_eq!(net.topological_order(&[b, a, src]), vec![src, b, a]);
    }
}
