use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a process unit in the flow network.
    pub struct ModuleId;

    /// Identifies an inlet or outlet socket owned by a module.
    pub struct SocketId;

    /// Identifies a stream (directed wire between two sockets).
    pub struct StreamId;

    /// Identifies a flow readout attached to a stream.
    pub struct ReadoutId;
}

/// Identifies a species in the registry. Dense index, cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeciesId(pub u32);

impl SpeciesId {
    /// Position of this species in per-species volume vectors.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
