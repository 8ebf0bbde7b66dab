//! Flow-control endpoints attached to modules.
//!
//! A socket has a direction (inlet/outlet) and a flow mode (push/pull). Push
//! outlets send material forward unconditionally; pull inlets propagate
//! downstream demand upstream by copying their capacity onto the mate outlet
//! and then draw at most that much.
//!
//! Transfers move whole events only: an event moves when the running total
//! plus its volume fits within the bound and the receiving queue has room for
//! it, otherwise it stays queued.

use crate::event::Event;
use crate::fixed::{Fixed64, ceil_to_u32, f64_to_fixed64, ratio_or_zero};
use crate::id::{ModuleId, SocketId, StreamId};
use crate::module::ModuleError;
use crate::queue::{EventQueue, QueueOverflow, QueueSnapshot};
use crate::stream::Stream;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("socket {socket:?} is {actual:?}, operation requires {expected:?}")]
    FlowModeMismatch {
        socket: SocketId,
        expected: SocketKind,
        actual: SocketKind,
    },
    #[error("socket {socket:?} is an {actual:?}, operation requires an {expected:?}")]
    DirectionMismatch {
        socket: SocketId,
        expected: Direction,
        actual: Direction,
    },
    #[error("socket {0:?} is not connected to a complete stream")]
    NotConnected(SocketId),
    #[error("unknown socket: {0:?}")]
    UnknownSocket(SocketId),
    #[error("unknown module: {0:?}")]
    UnknownModule(ModuleId),
    #[error("unknown stream: {0:?}")]
    UnknownStream(StreamId),
    #[error(transparent)]
    QueueOverflow(#[from] QueueOverflow),
}

// ---------------------------------------------------------------------------
// Socket kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inlet,
    Outlet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowMode {
    Push,
    Pull,
}

/// The four concrete socket behaviours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketKind {
    PushInlet,
    PullInlet,
    PushOutlet,
    PullOutlet,
}

impl SocketKind {
    pub fn new(direction: Direction, mode: FlowMode) -> Self {
        match (direction, mode) {
            (Direction::Inlet, FlowMode::Push) => SocketKind::PushInlet,
            (Direction::Inlet, FlowMode::Pull) => SocketKind::PullInlet,
            (Direction::Outlet, FlowMode::Push) => SocketKind::PushOutlet,
            (Direction::Outlet, FlowMode::Pull) => SocketKind::PullOutlet,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            SocketKind::PushInlet | SocketKind::PullInlet => Direction::Inlet,
            SocketKind::PushOutlet | SocketKind::PullOutlet => Direction::Outlet,
        }
    }

    pub fn mode(self) -> FlowMode {
        match self {
            SocketKind::PushInlet | SocketKind::PushOutlet => FlowMode::Push,
            SocketKind::PullInlet | SocketKind::PullOutlet => FlowMode::Pull,
        }
    }
}

// ---------------------------------------------------------------------------
// Capacity
// ---------------------------------------------------------------------------

/// Volumetric limit per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capacity {
    Bounded(Fixed64),
    Unbounded,
}

impl Capacity {
    /// A bounded capacity. Negative limits clamp to zero.
    pub fn bounded(limit: Fixed64) -> Self {
        Capacity::Bounded(limit.max(Fixed64::ZERO))
    }

    /// A bounded capacity from a setup value. NaN, infinities and values
    /// outside the fixed-point range are rejected.
    pub fn from_f64(limit: f64) -> Result<Self, ModuleError> {
        f64_to_fixed64(limit)
            .map(Self::bounded)
            .ok_or(ModuleError::InvalidCapacity(limit))
    }

    pub fn is_bounded(self) -> bool {
        matches!(self, Capacity::Bounded(_))
    }

    pub fn limit(self) -> Option<Fixed64> {
        match self {
            Capacity::Bounded(c) => Some(c),
            Capacity::Unbounded => None,
        }
    }

    /// Whether `next` more volume fits after `used` has been moved.
    pub fn admits(self, used: Fixed64, next: Fixed64) -> bool {
        match self {
            Capacity::Unbounded => true,
            Capacity::Bounded(c) => used.saturating_add(next) <= c,
        }
    }

    /// Volume still available after `used`, or None when unbounded.
    pub fn remaining(self, used: Fixed64) -> Option<Fixed64> {
        self.limit().map(|c| (c - used).max(Fixed64::ZERO))
    }

    /// This capacity scaled by `fraction`. Unbounded stays unbounded.
    pub fn scaled(self, fraction: Fixed64) -> Self {
        match self {
            Capacity::Bounded(c) => Capacity::Bounded(c.saturating_mul(fraction)),
            Capacity::Unbounded => Capacity::Unbounded,
        }
    }

    /// Reduce a bounded capacity by `volume`, never below zero.
    pub fn saturating_sub(self, volume: Fixed64) -> Self {
        match self {
            Capacity::Bounded(c) => Capacity::Bounded((c - volume).max(Fixed64::ZERO)),
            Capacity::Unbounded => Capacity::Unbounded,
        }
    }

    /// Sum of two capacities. Unbounded absorbs.
    pub fn combined(self, other: Capacity) -> Self {
        match (self, other) {
            (Capacity::Bounded(a), Capacity::Bounded(b)) => Capacity::Bounded(a.saturating_add(b)),
            _ => Capacity::Unbounded,
        }
    }
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An inlet or outlet endpoint of a module.
#[derive(Debug, Clone)]
pub struct Socket {
    /// The module this socket belongs to.
    pub owner: ModuleId,
    pub name: String,
    pub kind: SocketKind,
    pub capacity: Capacity,
    /// Material waiting at this endpoint.
    pub queue: EventQueue,
    /// The stream this socket is wired to, if any.
    pub(crate) stream: Option<StreamId>,
    /// Per-species share of the module pool routed through this outlet.
    /// `None` means an even split across the module's outlets.
    pub(crate) flow_fractions: Option<Vec<Fixed64>>,
}

impl Socket {
    pub fn new(owner: ModuleId, name: &str, kind: SocketKind, capacity: Capacity) -> Self {
        Self {
            owner,
            name: name.to_string(),
            kind,
            capacity,
            queue: EventQueue::new(),
            stream: None,
            flow_fractions: None,
        }
    }

    pub fn stream(&self) -> Option<StreamId> {
        self.stream
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    pub fn mode(&self) -> FlowMode {
        self.kind.mode()
    }

    pub fn flow_fractions(&self) -> Option<&[Fixed64]> {
        self.flow_fractions.as_deref()
    }

    pub fn set_flow_fractions(&mut self, fractions: Vec<Fixed64>) {
        self.flow_fractions = Some(fractions);
    }

    pub fn clear_flow_fractions(&mut self) {
        self.flow_fractions = None;
    }
}

fn expect_kind(id: SocketId, socket: &Socket, expected: SocketKind) -> Result<(), FlowError> {
    if socket.kind != expected {
        return Err(FlowError::FlowModeMismatch {
            socket: id,
            expected,
            actual: socket.kind,
        });
    }
    Ok(())
}

fn expect_direction(id: SocketId, socket: &Socket, direction: Direction) -> Result<(), FlowError> {
    if socket.direction() != direction {
        return Err(FlowError::DirectionMismatch {
            socket: id,
            expected: direction,
            actual: socket.direction(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Whole-event transfer
// ---------------------------------------------------------------------------

/// Move whole events from `from` to `to` while the running total plus the
/// next event fits within `capacity` and `to` has room for it. Calls
/// `on_move` for every moved event. Returns the moved volume.
pub(crate) fn move_whole_events(
    from: &mut EventQueue,
    to: &mut EventQueue,
    capacity: Capacity,
    mut on_move: impl FnMut(&Event),
) -> Result<Fixed64, FlowError> {
    let mut moved = Fixed64::ZERO;
    while let Some(next) = from.peek() {
        let volume = next.aggregate_volume();
        if !capacity.admits(moved, volume) || !to.admits(volume) {
            break;
        }
        let Some(event) = from.dequeue() else { break };
        on_move(&event);
        moved += volume;
        to.enqueue(event)?;
    }
    Ok(moved)
}

/// Resolve the socket at the other end of `socket`'s stream.
fn mate_of(
    sockets: &SlotMap<SocketId, Socket>,
    streams: &SlotMap<StreamId, Stream>,
    socket: SocketId,
) -> Result<(StreamId, SocketId), FlowError> {
    let stream_id = sockets
        .get(socket)
        .ok_or(FlowError::UnknownSocket(socket))?
        .stream
        .ok_or(FlowError::NotConnected(socket))?;
    let stream = streams
        .get(stream_id)
        .ok_or(FlowError::UnknownStream(stream_id))?;
    let mate = stream
        .other_socket(socket)
        .ok_or(FlowError::NotConnected(socket))?;
    if !sockets.contains_key(mate) {
        return Err(FlowError::UnknownSocket(mate));
    }
    Ok((stream_id, mate))
}

/// Inlet socket queue -> owning module queue, bounded by the socket capacity.
pub fn transfer_inlet(
    sockets: &mut SlotMap<SocketId, Socket>,
    module_queue: &mut EventQueue,
    inlet: SocketId,
) -> Result<Fixed64, FlowError> {
    let socket = sockets.get_mut(inlet).ok_or(FlowError::UnknownSocket(inlet))?;
    expect_direction(inlet, socket, Direction::Inlet)?;
    let capacity = socket.capacity;
    move_whole_events(&mut socket.queue, module_queue, capacity, |_| {})
}

/// Push outlet queue -> mate inlet queue across the stream.
///
/// Resets the stream's flowrates, then records every moved event.
pub fn push(
    sockets: &mut SlotMap<SocketId, Socket>,
    streams: &mut SlotMap<StreamId, Stream>,
    outlet: SocketId,
) -> Result<Fixed64, FlowError> {
    let socket = sockets.get(outlet).ok_or(FlowError::UnknownSocket(outlet))?;
    expect_kind(outlet, socket, SocketKind::PushOutlet)?;
    let (stream_id, mate) = mate_of(sockets, streams, outlet)?;
    let capacity = sockets[outlet].capacity;

    let stream = streams
        .get_mut(stream_id)
        .ok_or(FlowError::UnknownStream(stream_id))?;
    stream.reset_flowrates();

    let mut source = std::mem::take(&mut sockets[outlet].queue);
    let pushed = move_whole_events(&mut source, &mut sockets[mate].queue, capacity, |e| {
        stream.record(e)
    });
    sockets[outlet].queue = source;
    let pushed = pushed?;

    tracing::trace!(?outlet, ?mate, pushed = %pushed, backlog = %sockets[outlet].queue.aggregate_volume(), "push");
    Ok(pushed)
}

/// Pull inlet draws from its mate outlet.
///
/// Copies this inlet's capacity onto the mate (the demand signal), resets the
/// stream's flowrates, then moves whole events under the capacity bound.
pub fn pull(
    sockets: &mut SlotMap<SocketId, Socket>,
    streams: &mut SlotMap<StreamId, Stream>,
    inlet: SocketId,
) -> Result<Fixed64, FlowError> {
    let socket = sockets.get(inlet).ok_or(FlowError::UnknownSocket(inlet))?;
    expect_kind(inlet, socket, SocketKind::PullInlet)?;
    let (stream_id, mate) = mate_of(sockets, streams, inlet)?;
    let capacity = sockets[inlet].capacity;
    sockets[mate].capacity = capacity;

    let stream = streams
        .get_mut(stream_id)
        .ok_or(FlowError::UnknownStream(stream_id))?;
    stream.reset_flowrates();

    let mut source = std::mem::take(&mut sockets[mate].queue);
    let pulled = move_whole_events(&mut source, &mut sockets[inlet].queue, capacity, |e| {
        stream.record(e)
    });
    sockets[mate].queue = source;
    let pulled = pulled?;

    tracing::trace!(?inlet, ?mate, pulled = %pulled, "pull");
    Ok(pulled)
}

// ---------------------------------------------------------------------------
// Outlet apportioning
// ---------------------------------------------------------------------------

/// A module's queued material, opened up for apportioning across outlets.
///
/// Built at the start of postprocess from the module queue. Outlets claim
/// volume from `available`; the drained events are reused as containers for
/// the homogenized outlet events.
#[derive(Debug, Clone, Default)]
pub struct OutletPool {
    /// Pre-transform snapshot the targets are computed from.
    pub snapshot: QueueSnapshot,
    /// Per-species volume not yet claimed by any outlet.
    pub available: Vec<Fixed64>,
    containers: Vec<Event>,
    outlet_count: usize,
}

impl OutletPool {
    /// Drain `queue` into a pool apportioned across `outlet_count` outlets.
    pub fn open(snapshot: QueueSnapshot, queue: &mut EventQueue, outlet_count: usize) -> Self {
        let mut available = queue.species_volumes().to_vec();
        available.resize(snapshot.species_volumes.len().max(available.len()), Fixed64::ZERO);
        let mut containers = queue.drain();
        // Containers are handed out from the back.
        containers.reverse();
        Self {
            snapshot,
            available,
            containers,
            outlet_count,
        }
    }

    /// Unclaimed volume across all species.
    pub fn unclaimed_volume(&self) -> Fixed64 {
        self.available.iter().copied().sum()
    }

    /// Return what no outlet claimed to `queue` as a single residual event.
    pub fn close(self, queue: &mut EventQueue) -> Result<Fixed64, QueueOverflow> {
        let residual = self.unclaimed_volume();
        if residual > Fixed64::ZERO {
            queue.enqueue(Event::from_volumes(self.available))?;
        }
        Ok(residual)
    }

    fn take_container(&mut self, width: usize) -> Event {
        self.containers
            .pop()
            .unwrap_or_else(|| Event::from_volumes(vec![Fixed64::ZERO; width]))
    }
}

/// Split per-species `targets` into `count` equal portions. The last portion
/// takes the remainder, so the portions sum to `targets` exactly.
pub(crate) fn homogenized(targets: &[Fixed64], count: u32) -> Vec<Vec<Fixed64>> {
    if count == 0 {
        return Vec::new();
    }
    let divisor = Fixed64::saturating_from_num(count);
    let share: Vec<Fixed64> = targets.iter().map(|t| *t / divisor).collect();
    let mut remaining = targets.to_vec();
    let mut portions = Vec::with_capacity(count as usize);
    for _ in 1..count {
        for (r, s) in remaining.iter_mut().zip(&share) {
            *r -= *s;
        }
        portions.push(share.clone());
    }
    portions.push(remaining);
    portions
}

/// Module pool -> outlet socket queue.
///
/// Target per species = flow fraction x snapshot volume (even split across
/// outlets when the socket has no fractions), limited by what is still
/// available and scaled down to the outlet capacity and to the room left in
/// the outlet queue. The target is delivered as `quota` volume-homogenized
/// events, where
/// `quota = ceil(snapshot events x target total / snapshot total)`.
pub fn transfer_outlet(
    sockets: &mut SlotMap<SocketId, Socket>,
    pool: &mut OutletPool,
    outlet: SocketId,
) -> Result<Fixed64, FlowError> {
    let socket = sockets.get_mut(outlet).ok_or(FlowError::UnknownSocket(outlet))?;
    expect_direction(outlet, socket, Direction::Outlet)?;

    let width = pool.available.len();
    let even = ratio_or_zero(Fixed64::ONE, Fixed64::saturating_from_num(pool.outlet_count.max(1)));
    let mut targets: Vec<Fixed64> = (0..width)
        .map(|i| {
            let fraction = match &socket.flow_fractions {
                Some(f) => f.get(i).copied().unwrap_or(Fixed64::ZERO),
                None => even,
            };
            let base = pool
                .snapshot
                .species_volumes
                .get(i)
                .copied()
                .unwrap_or(Fixed64::ZERO);
            (fraction.saturating_mul(base)).clamp(Fixed64::ZERO, pool.available[i])
        })
        .collect();

    let mut target_total: Fixed64 = targets.iter().copied().sum();
    let headroom = socket.queue.headroom();
    let limit = socket.capacity.limit().map_or(headroom, |c| c.min(headroom));
    if target_total > limit {
        let scale = ratio_or_zero(limit, target_total);
        for t in &mut targets {
            *t = t.saturating_mul(scale);
        }
        target_total = targets.iter().copied().sum();
        // Rounding may leave a few ulps over the limit; trim the largest.
        if target_total > limit {
            let excess = target_total - limit;
            if let Some(largest) = targets.iter_mut().max() {
                *largest = (*largest - excess).max(Fixed64::ZERO);
            }
            target_total = targets.iter().copied().sum();
        }
    }
    if target_total <= Fixed64::ZERO {
        return Ok(Fixed64::ZERO);
    }

    let share = ratio_or_zero(target_total, pool.snapshot.aggregate_volume());
    let count = Fixed64::saturating_from_num(pool.snapshot.event_count);
    let quota = ceil_to_u32(count.saturating_mul(share)).max(1);

    for volumes in homogenized(&targets, quota) {
        let mut event = pool.take_container(width);
        event.overwrite(&volumes);
        socket.queue.enqueue(event)?;
    }

    for (a, t) in pool.available.iter_mut().zip(&targets) {
        *a -= *t;
    }
    tracing::trace!(?outlet, quota, transferred = %target_total, "outlet transfer");
    Ok(target_total)
}
