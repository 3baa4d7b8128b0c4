//! Station Trait: single contract shared by the seven analysis stations
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::context::RunContext;
use crate::data_model::{StageResult, StationId};

/// Read-only view handed to a station: the normalized text, everything the
/// earlier stations produced (in execution order) and the run options.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub text: &'a str,
    pub previous_results: &'a BTreeMap<StationId, StageResult>,
    pub options: &'a Map<String, Value>,
}

impl<'a> StageInput<'a> {
    pub fn previous(&self, id: StationId) -> Option<&'a StageResult> {
        self.previous_results.get(&id)
    }

    /// Output of `upstream`, which must run before `station`
    pub fn require(
        &self,
        station: StationId,
        upstream: StationId,
    ) -> Result<&'a StageResult, StationError> {
        if upstream >= station {
            return Err(StationError::new(
                station,
                FailureCause::Analysis(format!("{} cannot read later station {}", station, upstream)),
            ));
        }
        self.previous(upstream)
            .ok_or_else(|| StationError::new(station, FailureCause::MissingUpstream { upstream }))
    }

    /// Typed payload attached by `upstream` under `key`
    pub fn require_payload<T: serde::de::DeserializeOwned>(
        &self,
        station: StationId,
        upstream: StationId,
        key: &str,
    ) -> Result<T, StationError> {
        self.require(station, upstream)?
            .payload(key)
            .ok_or_else(|| StationError::new(station, FailureCause::MissingUpstream { upstream }))
    }

    pub fn option_str(&self, key: &str) -> Option<&'a str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

/// Contract of one pipeline station.
#[async_trait]
pub trait Station: Send + Sync {
    /// Position in the chain
    fn id(&self) -> StationId;

    /// Short description of what the station produces
    fn description(&self) -> &'static str;

    /// Earlier stations this one reads
    fn depends_on(&self) -> &'static [StationId] {
        &[]
    }

    /// Produce a result from the text and the accumulated earlier results.
    ///
    /// Return `Err` only when not even a degraded result is possible.
    async fn run(&self, input: &StageInput<'_>, ctx: &RunContext) -> Result<StageResult, StationError>;
}

/// Why a station could not produce a result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureCause {
    #[error("input text is empty")]
    EmptyInput,

    #[error("required output of {upstream} is missing")]
    MissingUpstream { upstream: StationId },

    #[error("generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("generation failed ({}): {message}", generation_kind(.transient))]
    Generation { transient: bool, message: String },

    #[error("{0}")]
    Analysis(String),
}

impl FailureCause {
    /// Whether a caller may retry the whole run
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureCause::Timeout { .. } | FailureCause::Generation { transient: true, .. }
        )
    }
}

fn generation_kind(transient: &bool) -> &'static str {
    if *transient {
        "transient"
    } else {
        "fatal"
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("station {station} failed: {cause}")]
pub struct StationError {
    pub station: StationId,
    pub cause: FailureCause,
}

impl StationError {
    pub fn new(station: StationId, cause: FailureCause) -> Self {
        Self { station, cause }
    }
}
