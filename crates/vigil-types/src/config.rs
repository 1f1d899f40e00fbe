/// Configuration types for the Vigil workflow, parsed from a YAML file.
///
/// Every section has defaults, so an absent file or a partial file is valid.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::{RiskLevel, RoutingAction};

/// Default reviewer asked to confirm high-risk recommendations.
pub const DEFAULT_REVIEWER: &str = "Dr. Smith";

/// Default confirmation timeout (seconds).
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;

/// Top-level configuration.
///
/// ```yaml
/// reviewer: Dr. Smith
/// risk_policy:
///   medium: require_confirmation
/// confirmation:
///   timeout_secs: 300
///   on_timeout: reject
/// generator:
///   source: llm
///   provider: openai
///   model: gpt-4o-mini
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    /// Name recorded as approver when the reviewer answers.
    pub reviewer: String,
    /// Per-level overrides of the built-in routing table.
    pub risk_policy: BTreeMap<RiskLevel, RoutingAction>,
    /// Human confirmation behaviour.
    pub confirmation: ConfirmationConfig,
    /// Where recommendations come from.
    pub generator: GeneratorConfig,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            reviewer: DEFAULT_REVIEWER.to_string(),
            risk_policy: BTreeMap::new(),
            confirmation: ConfirmationConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// Human confirmation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Seconds to wait for a valid reply per recommendation. `0` waits forever.
    pub timeout_secs: u64,
    /// What happens when the timeout expires.
    pub on_timeout: TimeoutFallback,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            on_timeout: TimeoutFallback::Reject,
        }
    }
}

/// Outcome applied to a recommendation whose confirmation timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutFallback {
    /// Record a rejection with no human approver.
    Reject,
    /// Leave the recommendation unresolved and continue with the next one.
    Unresolved,
}

/// Recommendation source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Built-in catalog or LLM.
    pub source: GeneratorSource,
    /// Primary LLM provider.
    pub provider: ProviderKind,
    /// Model for the primary provider. Defaults to the provider's default model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens for the completion.
    pub max_tokens: u32,
    /// Providers tried in order when the primary fails, each with its own model.
    pub fallbacks: Vec<FallbackProvider>,
}

impl GeneratorConfig {
    /// Model sent to the primary provider.
    pub fn primary_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            source: GeneratorSource::Catalog,
            provider: ProviderKind::OpenAi,
            model: None,
            temperature: 0.0,
            max_tokens: 2048,
            fallbacks: Vec::new(),
        }
    }
}

/// Where recommendations come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorSource {
    /// Fixed built-in recommendation set, no network.
    Catalog,
    /// Ask an LLM provider.
    Llm,
}

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl ProviderKind {
    /// Model used when the config names none for this provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-haiku-4-5",
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => f.write_str("openai"),
            ProviderKind::Anthropic => f.write_str("anthropic"),
        }
    }
}

/// A fallback provider and the model it is asked for.
///
/// Written either as a bare provider name (`openai`), which uses the
/// provider's default model, or as `{ provider: openai, model: gpt-4o }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FallbackEntry", into = "FallbackEntry")]
pub struct FallbackProvider {
    pub provider: ProviderKind,
    pub model: String,
}

impl FallbackProvider {
    /// Fallback using the provider's default model.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
        }
    }

    pub fn with_model(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FallbackEntry {
    Provider(ProviderKind),
    Detailed {
        provider: ProviderKind,
        #[serde(default)]
        model: Option<String>,
    },
}

impl From<FallbackEntry> for FallbackProvider {
    fn from(entry: FallbackEntry) -> Self {
        match entry {
            FallbackEntry::Provider(provider) => Self::new(provider),
            FallbackEntry::Detailed { provider, model } => match model {
                Some(model) => Self::with_model(provider, model),
                None => Self::new(provider),
            },
        }
    }
}

impl From<FallbackProvider> for FallbackEntry {
    fn from(fallback: FallbackProvider) -> Self {
        FallbackEntry::Detailed {
            provider: fallback.provider,
            model: Some(fallback.model),
        }
    }
}
