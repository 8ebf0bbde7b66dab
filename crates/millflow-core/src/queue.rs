//! FIFO queue of events with running volume totals.
//!
//! Totals are maintained incrementally on every enqueue and dequeue. Because
//! fixed-point addition is exact, the running totals always equal the sum over
//! the contained events. A queue never holds more than `Fixed64::MAX` in
//! total; an event that would push it past that is refused.

use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::SpeciesId;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// An event refused because the queue total would overflow. The event is
/// handed back untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event of volume {volume} exceeds queue headroom {headroom}")]
pub struct QueueOverflow {
    pub event: Event,
    pub volume: Fixed64,
    pub headroom: Fixed64,
}

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

/// Event count and per-species totals of a queue at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub event_count: usize,
    pub species_volumes: Vec<Fixed64>,
}

impl QueueSnapshot {
    pub fn aggregate_volume(&self) -> Fixed64 {
        self.species_volumes.iter().copied().sum()
    }
}

/// Ordered collection of events owned by one socket or module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQueue {
    events: VecDeque<Event>,
    /// Running per-species totals. Grows to the widest event seen.
    species_totals: Vec<Fixed64>,
    total: Fixed64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Refused when the queue total would overflow.
    pub fn enqueue(&mut self, event: Event) -> Result<(), QueueOverflow> {
        let volume = event.aggregate_volume();
        let headroom = self.headroom();
        if volume > headroom {
            return Err(QueueOverflow {
                event,
                volume,
                headroom,
            });
        }
        if self.species_totals.len() < event.species_count() {
            self.species_totals.resize(event.species_count(), Fixed64::ZERO);
        }
        for (total, v) in self.species_totals.iter_mut().zip(event.volumes()) {
            *total += *v;
        }
        self.total += volume;
        self.events.push_back(event);
        Ok(())
    }

    /// Volume this queue can still accept.
    pub fn headroom(&self) -> Fixed64 {
        Fixed64::MAX - self.total
    }

    /// Whether an event of `volume` would be accepted.
    pub fn admits(&self, volume: Fixed64) -> bool {
        volume <= self.headroom()
    }

    pub fn dequeue(&mut self) -> Option<Event> {
        let event = self.events.pop_front()?;
        for (total, v) in self.species_totals.iter_mut().zip(event.volumes()) {
            *total -= *v;
        }
        self.total -= event.aggregate_volume();
        Some(event)
    }

    /// View the front event without removing it.
    pub fn peek(&self) -> Option<&Event> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total volume across all queued events.
    pub fn aggregate_volume(&self) -> Fixed64 {
        self.total
    }

    /// Per-species totals across all queued events, indexed by `SpeciesId`.
    pub fn species_volumes(&self) -> &[Fixed64] {
        &self.species_totals
    }

    pub fn species_volume(&self, species: SpeciesId) -> Fixed64 {
        self.species_totals
            .get(species.index())
            .copied()
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Discard every event. Returns the volume that was purged.
    pub fn purge(&mut self) -> Fixed64 {
        let purged = self.total;
        self.events.clear();
        self.species_totals.iter_mut().for_each(|t| *t = Fixed64::ZERO);
        self.total = Fixed64::ZERO;
        purged
    }

    /// Remove and return every event in arrival order.
    pub fn drain(&mut self) -> Vec<Event> {
        let events: Vec<Event> = self.events.drain(..).collect();
        self.species_totals.iter_mut().for_each(|t| *t = Fixed64::ZERO);
        self.total = Fixed64::ZERO;
        events
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            event_count: self.events.len(),
            species_volumes: self.species_totals.clone(),
        }
    }

    /// Recompute totals from scratch. Used by tests to check the running totals.
    pub fn recomputed_volume(&self) -> Fixed64 {
        self.events.iter().map(Event::aggregate_volume).sum()
    }
}
