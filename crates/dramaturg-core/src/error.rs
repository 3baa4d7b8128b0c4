//! Unified Error Model
use thiserror::Error;

use crate::data_model::StationId;
use crate::station::{FailureCause, StationError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed or empty submission; caller error, never retryable
    #[error("INPUT/{0}")]
    InvalidInput(String),

    /// A station could not produce even a degraded result
    #[error("STATION/{station}: {cause}")]
    StationFailure { station: StationId, cause: FailureCause },

    /// Cooperative cancellation honored between stations
    #[error("CANCELLED/after {}", format_completed(.completed))]
    Cancelled { completed: Vec<StationId> },

    #[error("CONFIG/{0}")]
    Configuration(String),
}

impl PipelineError {
    /// Transient generation failures and timeouts may be retried by the caller
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::StationFailure { cause, .. } => cause.is_transient(),
            _ => false,
        }
    }

    pub fn failed_station(&self) -> Option<StationId> {
        match self {
            PipelineError::StationFailure { station, .. } => Some(*station),
            _ => None,
        }
    }
}

impl From<StationError> for PipelineError {
    fn from(err: StationError) -> Self {
        PipelineError::StationFailure {
            station: err.station,
            cause: err.cause,
        }
    }
}

fn format_completed(completed: &[StationId]) -> String {
    if completed.is_empty() {
        "no stations".to_string()
    } else {
        completed
            .iter()
            .map(StationId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}
