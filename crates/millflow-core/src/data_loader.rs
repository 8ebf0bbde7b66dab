//! Species and scheduling configuration from JSON.
//!
//! Feature-gated behind `data-loader`. A document looks like
//!
//! ```json
//! {
//!   "species": [
//!     { "name": "water", "density": 997.5, "phase": "liquid" },
//!     { "name": "fiber", "density": 1200, "phase": "solid" }
//!   ],
//!   "scheduling": "topological"
//! }
//! ```

use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::sim::{SchedulingOrder, SimulationConfig};
use crate::species::{Phase, RegistryError, Species, SpeciesRegistryBuilder};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("species {name} has invalid density {density}")]
    InvalidDensity { name: String, density: f64 },
    #[error("species {name} has invalid molar mass {molar_mass}")]
    InvalidMolarMass { name: String, molar_mass: f64 },
}

// ---------------------------------------------------------------------------
// JSON data structures
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Deserialize)]
pub struct SimulationData {
    #[serde(default)]
    pub species: Vec<SpeciesData>,
    #[serde(default)]
    pub scheduling: SchedulingOrder,
}

#[derive(Debug, serde::Deserialize)]
pub struct SpeciesData {
    pub name: String,
    pub density: f64,
    pub phase: Phase,
    #[serde(default)]
    pub molar_mass: Option<f64>,
}

/// A registry builder plus the scheduler configuration, ready for
/// `Simulation::new`.
#[derive(Debug)]
pub struct LoadedConfig {
    pub species: SpeciesRegistryBuilder,
    pub config: SimulationConfig,
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

pub fn load_config_json(json: &str) -> Result<LoadedConfig, DataLoadError> {
    let data: SimulationData = serde_json::from_str(json)?;
    build_config(data)
}

pub fn load_config_json_bytes(bytes: &[u8]) -> Result<LoadedConfig, DataLoadError> {
    let data: SimulationData = serde_json::from_slice(bytes)?;
    build_config(data)
}

/// A strictly positive value that survives conversion to fixed point.
fn positive_fixed(v: f64) -> Option<Fixed64> {
    f64_to_fixed64(v).filter(|f| *f > Fixed64::ZERO)
}

fn build_config(data: SimulationData) -> Result<LoadedConfig, DataLoadError> {
    let mut builder = SpeciesRegistryBuilder::new();
    for s in data.species {
        let Some(density) = positive_fixed(s.density) else {
            return Err(DataLoadError::InvalidDensity {
                name: s.name,
                density: s.density,
            });
        };
        let mut species = Species::new(&s.name, density, s.phase);
        if let Some(m) = s.molar_mass {
            let Some(molar_mass) = positive_fixed(m) else {
                return Err(DataLoadError::InvalidMolarMass {
                    name: s.name,
                    molar_mass: m,
                });
            };
            species = species.with_molar_mass(molar_mass);
        }
        builder.register(species)?;
    }
    tracing::debug!(species = builder.len(), scheduling = ?data.scheduling, "configuration loaded");
    Ok(LoadedConfig {
        species: builder,
        config: SimulationConfig {
            scheduling: data.scheduling,
        },
    })
}
