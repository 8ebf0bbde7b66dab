//! Directed wires between an outlet socket and an inlet socket.
//!
//! Terminal naming follows the flow: the stream's `inlet` terminal is where
//! material enters it (an outlet socket of the upstream module), its `outlet`
//! terminal is where material leaves (an inlet socket downstream).

use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::{ReadoutId, SocketId, SpeciesId, StreamId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Reasons a socket cannot be attached to a stream.
///
/// Wiring conflicts are recoverable: the network logs them and reports
/// `false` so an interactive caller can abandon the half-built connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WiringConflict {
    #[error("stream {stream:?} already has a socket on that terminal")]
    SlotOccupied { stream: StreamId },
    #[error("socket {socket:?} is already wired to stream {stream:?}")]
    SocketAlreadyWired { socket: SocketId, stream: StreamId },
    #[error("socket {0:?} faces the wrong way for the free terminal")]
    DirectionMismatch(SocketId),
    #[error("socket {socket:?} does not share a flow mode with its mate {mate:?}")]
    ModeMismatch { socket: SocketId, mate: SocketId },
    #[error("sockets {0:?} and {1:?} belong to the same module")]
    SameModule(SocketId, SocketId),
    #[error("unknown socket: {0:?}")]
    UnknownSocket(SocketId),
    #[error("unknown stream: {0:?}")]
    UnknownStream(StreamId),
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Stream {
    /// Upstream outlet socket feeding this stream.
    pub(crate) inlet: Option<SocketId>,
    /// Downstream inlet socket this stream delivers into.
    pub(crate) outlet: Option<SocketId>,
    /// Per-species volume moved across this stream in the current iteration.
    flowrates: Vec<Fixed64>,
    pub(crate) reader: Option<ReadoutId>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inlet(&self) -> Option<SocketId> {
        self.inlet
    }

    pub fn outlet(&self) -> Option<SocketId> {
        self.outlet
    }

    pub fn reader(&self) -> Option<ReadoutId> {
        self.reader
    }

    /// Both terminals connected.
    pub fn is_wired(&self) -> bool {
        self.inlet.is_some() && self.outlet.is_some()
    }

    pub fn contains(&self, socket: SocketId) -> bool {
        self.inlet == Some(socket) || self.outlet == Some(socket)
    }

    /// The socket at the opposite terminal, or `None` if `socket` is not
    /// part of this stream or the other side is empty.
    pub fn other_socket(&self, socket: SocketId) -> Option<SocketId> {
        if self.inlet == Some(socket) {
            self.outlet
        } else if self.outlet == Some(socket) {
            self.inlet
        } else {
            None
        }
    }

    pub fn reset_flowrates(&mut self) {
        self.flowrates.iter_mut().for_each(|f| *f = Fixed64::ZERO);
    }

    /// Accumulate an event's volumes into this iteration's flowrates.
    pub fn record(&mut self, event: &Event) {
        if self.flowrates.len() < event.species_count() {
            self.flowrates.resize(event.species_count(), Fixed64::ZERO);
        }
        for (f, v) in self.flowrates.iter_mut().zip(event.volumes()) {
            *f += *v;
        }
    }

    /// Per-species flowrates, indexed by `SpeciesId`.
    pub fn flowrates(&self) -> &[Fixed64] {
        &self.flowrates
    }

    pub fn species_flowrate(&self, species: SpeciesId) -> Fixed64 {
        self.flowrates
            .get(species.index())
            .copied()
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn total_flowrate(&self) -> Fixed64 {
        self.flowrates.iter().copied().sum()
    }

    /// Clear a terminal holding `socket`. Returns whether anything changed.
    pub(crate) fn detach(&mut self, socket: SocketId) -> bool {
        if self.inlet == Some(socket) {
            self.inlet = None;
            true
        } else if self.outlet == Some(socket) {
            self.outlet = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use slotmap::SlotMap;

    fn two_sockets() -> (SocketId, SocketId) {
        let mut keys: SlotMap<SocketId, ()> = SlotMap::with_key();
        (keys.insert(()), keys.insert(()))
    }

    #[test]
    fn other_socket_resolves_both_ways() {
        let (a, b) = two_sockets();
        let stream = Stream {
            inlet: Some(a),
            outlet: Some(b),
            ..Stream::default()
        };
        assert!(stream.is_wired());
        assert_eq!(stream.other_socket(a), Some(b));
        assert_eq!(stream.other_socket(b), Some(a));
    }

    #[test]
    fn other_socket_of_stranger_is_none() {
        let (a, b) = two_sockets();
        let stream = Stream {
            inlet: Some(a),
            ..Stream::default()
        };
        assert!(!stream.is_wired());
        assert_eq!(stream.other_socket(a), None);
        assert_eq!(stream.other_socket(b), None);
    }

    #[test]
    fn record_accumulates_until_reset() {
        let reg = water_fiber_registry();
        let mut stream = Stream::new();
        stream.record(&mixed_event(&reg, 3.0, 1.0));
        stream.record(&mixed_event(&reg, 2.0, 0.5));
        assert_eq!(stream.species_flowrate(water()), fixed(5.0));
        assert_eq!(stream.species_flowrate(fiber()), fixed(1.5));
        assert_eq!(stream.total_flowrate(), fixed(6.5));

        stream.reset_flowrates();
        assert_eq!(stream.total_flowrate(), Fixed64::ZERO);
        assert_eq!(stream.flowrates().len(), 2);
    }

    #[test]
    fn detach_clears_matching_terminal_only() {
        let (a, b) = two_sockets();
        let mut stream = Stream {
            inlet: Some(a),
            outlet: Some(b),
            ..Stream::default()
        };
        assert!(stream.detach(b));
        assert!(!stream.detach(b));
        assert_eq!(stream.inlet(), Some(a));
        assert_eq!(stream.outlet(), None);
    }
}
