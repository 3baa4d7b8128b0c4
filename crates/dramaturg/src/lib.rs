//! Dramaturg: seven-station script analysis with uncertainty and compliance
//!
//! Wires the stations, the compliance evaluator and the optional generation
//! capability into a ready-to-run [`Orchestrator`].
//!
//! # Example
//!
//! ```ignore
//! use dramaturg::{standard_orchestrator, AppConfig};
//!
//! let orchestrator = standard_orchestrator(&AppConfig::default(), None)?;
//! let result = orchestrator.run_pipeline("A lonely astronaut discovers a signal.").await?;
//! println!("{}", result.final_report);
//! ```

pub mod config;

pub use config::{AppConfig, CacheConfig, GenerationConfig, ReportConfig, SetupError, CONFIG_ENV};
pub use dramaturg_compliance::{ConstitutionalEvaluator, PrincipleSet};
pub use dramaturg_core::{
    OrchestrationResult, Orchestrator, PipelineError, RawInput, StationId, TextGenerator,
};
pub use dramaturg_stations::ReportFormat;

use dramaturg_core::{GenerationClient, InMemoryCache};
use std::sync::Arc;
use tracing::info;

/// Build the seven-station orchestrator described by `config`.
///
/// Without a generator every station runs its deterministic analysis only.
pub fn standard_orchestrator(
    config: &AppConfig,
    generator: Option<Arc<dyn TextGenerator>>,
) -> Result<Orchestrator, SetupError> {
    config.validate()?;
    let registry = dramaturg_stations::standard_registry(config.report.format)?;
    let evaluator = ConstitutionalEvaluator::new(config.compliance.clone())?;
    let mut orchestrator = Orchestrator::new(registry, Arc::new(evaluator));

    if let Some(generator) = generator {
        let mut client = GenerationClient::new(generator, config.generation.timeout())
            .with_params(config.generation.params());
        if config.cache.capacity > 0 {
            client = client.with_cache(
                Arc::new(InMemoryCache::new(config.cache.capacity)),
                config.cache.ttl(),
            );
        }
        orchestrator = orchestrator.with_generation(client);
    }

    info!(
        pipeline = %orchestrator.registry().pipeline_id(),
        principles = config.compliance.principles.len(),
        threshold = config.compliance.threshold,
        "orchestrator ready"
    );
    Ok(orchestrator)
}
