//! Recommendation generators.
//!
//! - **CatalogGenerator**: fixed built-in recommendations, no network
//! - **LlmRecommendationGenerator**: asks an LLM provider (via `ProviderRouter`)

pub mod catalog;
pub mod llm;

use std::sync::Arc;

use vigil_types::config::{GeneratorConfig, GeneratorSource};
use vigil_types::errors::VigilError;
use vigil_types::traits::RecommendationGenerator;

use crate::llm::ProviderRouter;

pub use catalog::{builtin_patient, builtin_recommendations, CatalogGenerator};
pub use llm::LlmRecommendationGenerator;

/// Build the generator selected by the config.
pub fn from_config(config: &GeneratorConfig) -> Result<Arc<dyn RecommendationGenerator>, VigilError> {
    match config.source {
        GeneratorSource::Catalog => Ok(Arc::new(CatalogGenerator::default())),
        GeneratorSource::Llm => {
            let router = ProviderRouter::from_config(config)?;
            tracing::info!(
                providers = ?router.provider_names(),
                model = config.primary_model(),
                "using LLM recommendation generator"
            );
            Ok(Arc::new(LlmRecommendationGenerator::new(
                Arc::new(router),
                config,
            )))
        }
    }
}
