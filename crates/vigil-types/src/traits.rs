/// Trait contracts between the workflow engine and its collaborators.
///
/// The engine only sees these interfaces, never concrete generators,
/// channels or providers.
use async_trait::async_trait;

use crate::errors::VigilError;
use crate::records::*;

// ============================================================
// Workflow Collaborators
// ============================================================

/// Produces treatment recommendations for a patient.
///
/// Failure is fatal for the run: the engine does not route anything and does
/// not retry.
#[async_trait]
pub trait RecommendationGenerator: Send + Sync {
    /// Generate recommendations, in the order they should be reviewed.
    async fn generate(
        &self,
        patient: &PatientRecord,
    ) -> Result<Vec<TreatmentRecommendation>, VigilError>;
}

/// Asks a human to confirm a high-risk recommendation.
///
/// Implementations deliver the prompt and block until a reply arrives. They
/// return the raw reply text; parsing and re-prompting on unrecognized replies
/// is the engine's job. Delivery or read failures (including end of input)
/// are `VigilError::ConfirmationChannel`.
#[async_trait]
pub trait HumanConfirmation: Send + Sync {
    /// Present a prompt and wait for the reviewer's reply.
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<HumanReply, VigilError>;
}

// ============================================================
// LLM Provider Trait
// ============================================================

/// Provider-agnostic LLM interface.
///
/// Supports multiple LLM providers (OpenAI, Anthropic) with a unified
/// completion interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a completion request. Returns the model's response.
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, VigilError>;
}
