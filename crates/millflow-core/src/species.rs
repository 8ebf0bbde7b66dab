//! Species registry: the set of materials every event tracks.
//!
//! Built once with [`SpeciesRegistryBuilder`] and frozen into an immutable
//! [`SpeciesRegistry`]. The registry is shared as an `Arc` and passed into
//! event and queue constructors explicitly.

use crate::fixed::{Fixed64, ratio_or_zero};
use crate::id::SpeciesId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Physical state of a species. Drives hydrocyclone separation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Liquid,
    Solid,
    Gas,
}

/// A species definition. Density is mass per unit volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub density: Fixed64,
    pub phase: Phase,
    #[serde(default)]
    pub molar_mass: Option<Fixed64>,
}

impl Species {
    pub fn new(name: &str, density: Fixed64, phase: Phase) -> Self {
        Self {
            name: name.to_string(),
            density,
            phase,
            molar_mass: None,
        }
    }

    pub fn with_molar_mass(mut self, molar_mass: Fixed64) -> Self {
        self.molar_mass = Some(molar_mass);
        self
    }

    /// Mass of `volume` of this species.
    pub fn mass_of(&self, volume: Fixed64) -> Fixed64 {
        self.density.saturating_mul(volume)
    }

    /// Volume occupied by `mass` of this species. Zero density yields zero.
    pub fn volume_of(&self, mass: Fixed64) -> Fixed64 {
        ratio_or_zero(mass, self.density)
    }
}

/// Builder for constructing an immutable [`SpeciesRegistry`].
#[derive(Debug, Default)]
pub struct SpeciesRegistryBuilder {
    species: Vec<Species>,
    name_to_id: HashMap<String, SpeciesId>,
}

impl SpeciesRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a species. Names are unique.
    pub fn register(&mut self, species: Species) -> Result<SpeciesId, RegistryError> {
        if self.name_to_id.contains_key(&species.name) {
            return Err(RegistryError::DuplicateSpecies(species.name));
        }
        let id = SpeciesId(self.species.len() as u32);
        self.name_to_id.insert(species.name.clone(), id);
        self.species.push(species);
        Ok(id)
    }

    /// Lookup a species ID by name.
    pub fn id_of(&self, name: &str) -> Option<SpeciesId> {
        self.name_to_id.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Freeze the builder into an immutable registry.
    pub fn build(self) -> SpeciesRegistry {
        SpeciesRegistry {
            species: self.species,
            name_to_id: self.name_to_id,
        }
    }
}

/// Immutable species registry. Frozen after `build()`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesRegistry {
    species: Vec<Species>,
    name_to_id: HashMap<String, SpeciesId>,
}

impl SpeciesRegistry {
    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id.index())
    }

    pub fn id_of(&self, name: &str) -> Option<SpeciesId> {
        self.name_to_id.get(name).copied()
    }

    pub fn contains(&self, id: SpeciesId) -> bool {
        id.index() < self.species.len()
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// All species IDs in registration order.
    pub fn ids(&self) -> impl Iterator<Item = SpeciesId> + '_ {
        (0..self.species.len() as u32).map(SpeciesId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &Species)> {
        self.species
            .iter()
            .enumerate()
            .map(|(i, s)| (SpeciesId(i as u32), s))
    }

    /// A zeroed per-species volume vector sized to this registry.
    pub fn zeroed(&self) -> Vec<Fixed64> {
        vec![Fixed64::ZERO; self.species.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("species already registered: {0}")]
    DuplicateSpecies(String),
    #[error("unknown species: {0}")]
    UnknownSpecies(String),
}
