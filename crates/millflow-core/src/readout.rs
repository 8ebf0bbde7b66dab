//! Display consumers attached to streams.

use crate::fixed::fixed64_to_f64;
use crate::id::{SpeciesId, StreamId};
use crate::species::SpeciesRegistry;
use crate::stream::Stream;

/// Formats one stream's flowrates after every iteration.
///
/// With `species` set the readout reports that species alone, otherwise the
/// total across all species.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub name: String,
    pub species: Option<SpeciesId>,
    pub(crate) stream: Option<StreamId>,
    text: String,
}

impl Readout {
    pub fn new(name: &str, species: Option<SpeciesId>) -> Self {
        Self {
            name: name.to_string(),
            species,
            stream: None,
            text: String::new(),
        }
    }

    pub fn stream(&self) -> Option<StreamId> {
        self.stream
    }

    /// Text produced by the last update.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn update(&mut self, registry: &SpeciesRegistry, stream: Option<&Stream>) {
        let Some(stream) = stream else {
            self.text = format!("{}: --", self.name);
            return;
        };
        self.text = match self.species {
            Some(id) => {
                let label = registry.get(id).map(|s| s.name.as_str()).unwrap_or("?");
                let rate = fixed64_to_f64(stream.species_flowrate(id));
                format!("{}: {label} {rate:.3}", self.name)
            }
            None => format!("{}: {:.3}", self.name, fixed64_to_f64(stream.total_flowrate())),
        };
    }
}
