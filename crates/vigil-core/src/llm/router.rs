//! Provider router with fallback chain.
//!
//! Requests go to the primary provider; on failure each fallback is tried in
//! order until one succeeds or all have been exhausted. A route that names a
//! model overrides the request's model for that provider only.

use std::sync::Arc;

use async_trait::async_trait;

use vigil_types::config::{GeneratorConfig, ProviderKind};
use vigil_types::errors::VigilError;
use vigil_types::traits::LlmProvider;
use vigil_types::{CompletionRequest, CompletionResponse};

use super::{AnthropicProvider, OpenAiProvider};

/// One entry in the fallback chain.
pub struct ProviderRoute {
    /// Label used in logs.
    pub name: String,
    /// Model sent to this provider. `None` keeps the request's model.
    pub model: Option<String>,
    pub provider: Arc<dyn LlmProvider>,
}

impl ProviderRoute {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            name: name.into(),
            model: None,
            provider,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Routes LLM requests to a primary provider with automatic fallback.
pub struct ProviderRouter {
    /// Primary first, then fallbacks.
    routes: Vec<ProviderRoute>,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<(&str, Option<&str>)> = self
            .routes
            .iter()
            .map(|r| (r.name.as_str(), r.model.as_deref()))
            .collect();
        f.debug_struct("ProviderRouter")
            .field("routes", &routes)
            .finish()
    }
}

impl ProviderRouter {
    /// Create a router from routes, primary first.
    ///
    /// # Errors
    ///
    /// Returns `VigilError::Config` if the list is empty.
    pub fn from_routes(routes: Vec<ProviderRoute>) -> Result<Self, VigilError> {
        if routes.is_empty() {
            return Err(VigilError::Config(
                "ProviderRouter requires at least one provider".to_string(),
            ));
        }
        Ok(Self { routes })
    }

    /// Build the primary and fallback providers named in the generator config.
    ///
    /// API keys are read from the environment (`OPENAI_API_KEY`,
    /// `ANTHROPIC_API_KEY`). A fallback without a key is skipped with a
    /// warning; a primary without a key is a config error. Each provider is
    /// asked for its own configured model.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, VigilError> {
        Self::from_config_with(config, |var| std::env::var(var).ok())
    }

    fn from_config_with(
        config: &GeneratorConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, VigilError> {
        let key_for = |kind: ProviderKind| {
            lookup(kind.api_key_env()).filter(|key| !key.trim().is_empty())
        };

        let primary_key = key_for(config.provider).ok_or_else(|| {
            VigilError::Config(format!(
                "{} is not set (required by generator provider '{}')",
                config.provider.api_key_env(),
                config.provider
            ))
        })?;

        let mut routes = vec![ProviderRoute::new(
            config.provider.to_string(),
            build_provider(config.provider, primary_key),
        )
        .with_model(config.primary_model())];

        for fallback in &config.fallbacks {
            let kind = fallback.provider;
            match key_for(kind) {
                Some(key) => routes.push(
                    ProviderRoute::new(kind.to_string(), build_provider(kind, key))
                        .with_model(fallback.model.clone()),
                ),
                None => tracing::warn!(
                    provider = %kind,
                    env = kind.api_key_env(),
                    "fallback provider skipped: API key not set"
                ),
            }
        }

        Self::from_routes(routes)
    }

    /// Provider labels, primary first.
    pub fn provider_names(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.name.as_str()).collect()
    }
}

fn build_provider(kind: ProviderKind, api_key: String) -> Arc<dyn LlmProvider> {
    match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(api_key)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(api_key)),
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, VigilError> {
        let mut last_error = None;

        for route in &self.routes {
            let mut routed = request.clone();
            if let Some(model) = &route.model {
                routed.model = model.clone();
            }

            match route.provider.complete(routed).await {
                Ok(response) => {
                    tracing::debug!(
                        provider = %route.name,
                        model = %response.model,
                        input_tokens = response.usage.input_tokens,
                        output_tokens = response.usage.output_tokens,
                        "LLM completion succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %route.name,
                        error = %e,
                        "LLM provider failed, trying next in fallback chain"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| VigilError::LlmProvider("No providers available".to_string())))
    }
}
