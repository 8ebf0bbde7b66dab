//! Scheduling configuration and per-run state types.

use crate::fixed::{Fixed64, Ticks};
use crate::queue::EventQueue;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Order in which modules are simulated within one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingOrder {
    /// Modules run in the order they were registered. A chain registered
    /// downstream-first sees its input one iteration late.
    #[default]
    Registration,
    /// Modules run upstream-first. Modules on cycles follow in registration
    /// order.
    Topological,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub scheduling: SchedulingOrder,
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Completed iterations.
    pub iteration: Ticks,
}

/// Totals gathered over one or more iterations. Every counter saturates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub iterations: u64,
    /// Volume created by sources and tanks.
    pub generated: Fixed64,
    /// Volume purged by sinks.
    pub consumed: Fixed64,
    /// Flow errors absorbed (and logged) instead of halting the run.
    pub flow_errors: u32,
}

impl RunReport {
    pub(crate) fn absorb(&mut self, other: RunReport) {
        self.iterations = self.iterations.saturating_add(other.iterations);
        self.generated = self.generated.saturating_add(other.generated);
        self.consumed = self.consumed.saturating_add(other.consumed);
        self.flow_errors = self.flow_errors.saturating_add(other.flow_errors);
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// FNV-1a (64-bit) digest of simulation state. Two runs of the same network
/// produce the same digest iteration by iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Event count followed by every event's per-species volumes in order.
    pub fn write_queue(&mut self, queue: &EventQueue) {
        self.write_u64(queue.len() as u64);
        for event in queue.iter() {
            for v in event.volumes() {
                self.write_fixed64(*v);
            }
        }
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn config_defaults_to_registration_order() {
        assert_eq!(SimulationConfig::default().scheduling, SchedulingOrder::Registration);
    }

    #[test]
    fn report_absorbs_totals() {
        let mut a = RunReport {
            iterations: 1,
            generated: fixed(10.0),
            ..RunReport::default()
        };
        a.absorb(RunReport {
            iterations: 2,
            consumed: fixed(4.0),
            flow_errors: 1,
            ..RunReport::default()
        });
        assert_eq!(a.iterations, 3);
        assert_eq!(a.generated, fixed(10.0));
        assert_eq!(a.consumed, fixed(4.0));
        assert_eq!(a.flow_errors, 1);
    }

    #[test]
    fn hash_is_deterministic_and_order_sensitive() {
        let mut h1 = StateHash::new();
        h1.write_u64(1);
        h1.write_u64(2);
        let mut h2 = StateHash::new();
        h2.write_u64(1);
        h2.write_u64(2);
        let mut h3 = StateHash::new();
        h3.write_u64(2);
        h3.write_u64(1);
        assert_eq!(h1.finish(), h2.finish());
        assert_ne!(h1.finish(), h3.finish());
    }

    #[test]
    fn queue_hash_tracks_contents() {
        let reg = water_fiber_registry();
        let mut q = EventQueue::new();
        let empty = {
            let mut h = StateHash::new();
            h.write_queue(&q);
            h.finish()
        };
        q.enqueue(water_event(&reg, 1.0)).unwrap();
        let mut h = StateHash::new();
        h.write_queue(&q);
        assert_ne!(h.finish(), empty);
    }

    #[test]
    fn absorb_saturates_volume_totals() {
        let big = RunReport {
            iterations: 1,
            generated: fixed(2.0e9),
            consumed: fixed(2.0e9),
            flow_errors: u32::MAX,
        };
        let mut total = RunReport::default();
        total.absorb(big);
        total.absorb(big);
        assert_eq!(total.iterations, 2);
        assert_eq!(total.generated, Fixed64::MAX);
        assert_eq!(total.consumed, Fixed64::MAX);
        assert_eq!(total.flow_errors, u32::MAX);
    }
}
