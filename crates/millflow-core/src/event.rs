//! Discrete packets of material.
//!
//! An [`Event`] carries one volume per registered species. Events are moved
//! between queues by value, so a packet is owned by exactly one queue at a time.

use crate::fixed::Fixed64;
use crate::id::SpeciesId;
use crate::species::SpeciesRegistry;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("no species registered; events cannot be created")]
    NoSpeciesRegistered,
    #[error("unknown species: {0:?}")]
    UnknownSpecies(SpeciesId),
    #[error("negative volume for species {species:?}: {volume}")]
    NegativeVolume { species: SpeciesId, volume: Fixed64 },
    #[error("split fraction outside [0, 1]: {0}")]
    InvalidSplitFraction(Fixed64),
    #[error("volume of species {species:?} would overflow the event total")]
    VolumeOverflow { species: SpeciesId },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A packet of material: one non-negative volume per registered species.
///
/// The volume vector is indexed by [`SpeciesId`] and always spans the full
/// registry the event was created against. The aggregate never exceeds
/// `Fixed64::MAX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    volumes: Vec<Fixed64>,
}

impl Event {
    /// Create an event. Every registered species starts at zero; entries in
    /// `species_volumes` override them.
    pub fn new(
        registry: &SpeciesRegistry,
        species_volumes: &[(SpeciesId, Fixed64)],
    ) -> Result<Self, EventError> {
        let mut event = Self::empty(registry)?;
        for &(species, volume) in species_volumes {
            event.set_species_volume(species, volume)?;
        }
        Ok(event)
    }

    /// Create an all-zero event spanning the registry.
    pub fn empty(registry: &SpeciesRegistry) -> Result<Self, EventError> {
        if registry.is_empty() {
            return Err(EventError::NoSpeciesRegistered);
        }
        Ok(Self {
            volumes: registry.zeroed(),
        })
    }

    /// Build an event directly from a full per-species volume vector.
    /// The caller guarantees non-negative entries sized to the registry.
    pub(crate) fn from_volumes(volumes: Vec<Fixed64>) -> Self {
        debug_assert!(volumes.iter().all(|v| *v >= Fixed64::ZERO));
        Self { volumes }
    }

    /// Sum over all species volumes.
    pub fn aggregate_volume(&self) -> Fixed64 {
        self.volumes.iter().copied().sum()
    }

    pub fn species_volume(&self, species: SpeciesId) -> Option<Fixed64> {
        self.volumes.get(species.index()).copied()
    }

    /// Per-species volumes, indexed by `SpeciesId`.
    pub fn volumes(&self) -> &[Fixed64] {
        &self.volumes
    }

    pub fn species_count(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.iter().all(|v| *v == Fixed64::ZERO)
    }

    pub fn set_species_volume(
        &mut self,
        species: SpeciesId,
        volume: Fixed64,
    ) -> Result<(), EventError> {
        if volume < Fixed64::ZERO {
            return Err(EventError::NegativeVolume { species, volume });
        }
        let current = self
            .species_volume(species)
            .ok_or(EventError::UnknownSpecies(species))?;
        let others = self.aggregate_volume() - current;
        if others.checked_add(volume).is_none() {
            return Err(EventError::VolumeOverflow { species });
        }
        self.volumes[species.index()] = volume;
        Ok(())
    }

    /// Add `delta` (possibly negative) to a species volume. The result must
    /// stay non-negative and representable.
    pub fn add_species_volume(
        &mut self,
        species: SpeciesId,
        delta: Fixed64,
    ) -> Result<(), EventError> {
        let current = self
            .species_volume(species)
            .ok_or(EventError::UnknownSpecies(species))?;
        let volume = current
            .checked_add(delta)
            .ok_or(EventError::VolumeOverflow { species })?;
        self.set_species_volume(species, volume)
    }

    /// Split off `fraction` of a species volume.
    ///
    /// Returns `(removed, retained)` with `removed = fraction * v` and
    /// `retained = v - removed`; the event keeps `retained`.
    pub fn split_species_volume(
        &mut self,
        species: SpeciesId,
        fraction: Fixed64,
    ) -> Result<(Fixed64, Fixed64), EventError> {
        if fraction < Fixed64::ZERO || fraction > Fixed64::ONE {
            return Err(EventError::InvalidSplitFraction(fraction));
        }
        let slot = self
            .volumes
            .get_mut(species.index())
            .ok_or(EventError::UnknownSpecies(species))?;
        let removed = fraction * *slot;
        let retained = *slot - removed;
        *slot = retained;
        Ok((removed, retained))
    }

    /// Overwrite every species volume. Used by outlet homogenization.
    pub(crate) fn overwrite(&mut self, volumes: &[Fixed64]) {
        self.volumes.clear();
        self.volumes.extend_from_slice(volumes);
    }
}
