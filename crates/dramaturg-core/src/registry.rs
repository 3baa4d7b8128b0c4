//! Station Registry: the immutable, ordered set of seven stations
use crate::data_model::StationId;
use crate::error::PipelineError;
use crate::station::Station;

/// Built once at orchestrator construction; runs only borrow it.
pub struct StationRegistry {
    stations: Vec<Box<dyn Station>>,
}

impl StationRegistry {
    /// Accepts exactly the stations `S1..S7`, in order, each reading only
    /// earlier stations.
    pub fn new(stations: Vec<Box<dyn Station>>) -> Result<Self, PipelineError> {
        if stations.len() != StationId::ALL.len() {
            return Err(PipelineError::Configuration(format!(
                "expected {} stations, got {}",
                StationId::ALL.len(),
                stations.len()
            )));
        }

        for (station, expected) in stations.iter().zip(StationId::ALL) {
            if station.id() != expected {
                return Err(PipelineError::Configuration(format!(
                    "station {} registered where {} was expected",
                    station.id(),
                    expected
                )));
            }
            if let Some(later) = station.depends_on().iter().find(|dep| **dep >= expected) {
                return Err(PipelineError::Configuration(format!(
                    "station {} depends on {}, which does not run before it",
                    expected, later
                )));
            }
        }

        Ok(Self { stations })
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Station> {
        self.stations.iter().map(|s| s.as_ref())
    }

    pub fn get(&self, id: StationId) -> Option<&dyn Station> {
        self.iter().find(|s| s.id() == id)
    }

    pub fn ids(&self) -> Vec<StationId> {
        self.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Pipeline id in the form `extraction→framing→...`
    pub fn pipeline_id(&self) -> String {
        self.iter()
            .map(|s| s.id().name())
            .collect::<Vec<_>>()
            .join("→")
    }
}
