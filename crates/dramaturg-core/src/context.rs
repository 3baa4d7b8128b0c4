//! Run Context: per-run identity, generation capability and cancellation
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::generation::{GenerationClient, ModelParams};

/// Created fresh for every pipeline run and never shared between runs.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    generation: Option<GenerationClient>,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            generation: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_generation(mut self, generation: Option<GenerationClient>) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Generation capability, if the orchestrator was given one
    pub fn generation(&self) -> Option<&GenerationClient> {
        self.generation.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Model parameters for this run; the `model` option overrides the client default
    pub fn model_params(&self, options: &Map<String, Value>) -> ModelParams {
        let mut params = self
            .generation
            .as_ref()
            .map(|g| g.params().clone())
            .unwrap_or_default();
        if let Some(model) = options.get("model").and_then(Value::as_str) {
            params.model = model.to_string();
        }
        params
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
