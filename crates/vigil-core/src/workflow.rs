//! Approval workflow engine.
//!
//! Drives every generated recommendation from `pending` to a terminal
//! decision:
//! 1. Generate recommendations for the patient (fatal on failure)
//! 2. For each recommendation, in generation order, look up the risk policy
//! 3. Auto-approve, or ask the human confirmation channel and block for a reply
//! 4. Re-prompt on unrecognized replies until yes / no / modify
//! 5. Apply the timeout fallback if the reviewer never answers
//! 6. Append the outcome to the caller's ledger
//!
//! Cancellation marks the in-flight and remaining recommendations unresolved;
//! decisions already in the ledger are left as they are.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use vigil_types::config::{TimeoutFallback, VigilConfig, DEFAULT_REVIEWER};
use vigil_types::errors::VigilError;
use vigil_types::*;

use crate::ledger::DecisionLedger;
use crate::policy::RiskPolicy;

/// Configuration for the workflow engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reviewer named in confirmation prompts.
    pub reviewer: String,
    /// Limit on the whole confirmation exchange per recommendation. `None` waits forever.
    pub confirmation_timeout: Option<Duration>,
    /// What to record when the timeout expires.
    pub on_timeout: TimeoutFallback,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reviewer: DEFAULT_REVIEWER.to_string(),
            confirmation_timeout: Some(Duration::from_secs(
                vigil_types::config::DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            )),
            on_timeout: TimeoutFallback::Reject,
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &VigilConfig) -> Self {
        Self {
            reviewer: config.reviewer.clone(),
            confirmation_timeout: match config.confirmation.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            on_timeout: config.confirmation.on_timeout,
        }
    }
}

/// Trait-object collaborators required by the engine.
pub struct EngineDeps {
    /// Source of recommendations.
    pub generator: Arc<dyn RecommendationGenerator>,
    /// Channel asking the human reviewer.
    pub confirmer: Arc<dyn HumanConfirmation>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every recommendation was processed.
    Completed,
    /// The cancel signal fired; remaining recommendations are unresolved.
    Cancelled,
}

/// The approval workflow orchestrator.
///
/// Holds no per-run state: decisions go into the ledger the caller passes in.
pub struct ReviewEngine {
    generator: Arc<dyn RecommendationGenerator>,
    confirmer: Arc<dyn HumanConfirmation>,
    policy: RiskPolicy,
    config: EngineConfig,
}

impl ReviewEngine {
    /// Create an engine with all dependencies injected.
    pub fn new(deps: EngineDeps, policy: RiskPolicy, config: EngineConfig) -> Self {
        tracing::debug!(
            policy = ?policy.entries().collect::<Vec<_>>(),
            reviewer = %config.reviewer,
            timeout = ?config.confirmation_timeout,
            "review engine configured"
        );
        Self {
            generator: deps.generator,
            confirmer: deps.confirmer,
            policy,
            config,
        }
    }

    /// Create an engine from loaded configuration.
    pub fn from_config(deps: EngineDeps, config: &VigilConfig) -> Result<Self, VigilError> {
        let policy = RiskPolicy::with_overrides(&config.risk_policy)?;
        Ok(Self::new(deps, policy, EngineConfig::from_config(config)))
    }

    /// Generate recommendations for a patient and review all of them.
    ///
    /// Generation failure aborts before anything is routed and leaves the
    /// ledger untouched. A confirmation channel failure marks the in-flight
    /// and remaining recommendations unresolved, then propagates.
    pub async fn run(
        &self,
        patient: &PatientRecord,
        ledger: &mut DecisionLedger,
        cancel: watch::Receiver<bool>,
    ) -> Result<RunStatus, VigilError> {
        let recommendations = match self.generator.generate(patient).await {
            Ok(recommendations) => recommendations,
            Err(e) => {
                tracing::error!(patient = %patient.patient_id, error = %e, "recommendation generation failed");
                return Err(match e {
                    VigilError::Generation(_) => e,
                    other => VigilError::Generation(other.to_string()),
                });
            }
        };

        tracing::info!(
            patient = %patient.patient_id,
            count = recommendations.len(),
            "recommendations generated"
        );

        self.review_all(patient, &recommendations, ledger, cancel)
            .await
    }

    /// Review an already generated list, strictly in order.
    pub async fn review_all(
        &self,
        patient: &PatientRecord,
        recommendations: &[TreatmentRecommendation],
        ledger: &mut DecisionLedger,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RunStatus, VigilError> {
        for (index, recommendation) in recommendations.iter().enumerate() {
            let outcome = tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel) => None,
                outcome = self.review_one(patient, recommendation) => Some(outcome),
            };

            match outcome {
                None => {
                    tracing::warn!(
                        remaining = recommendations.len() - index,
                        "review cancelled, marking remaining recommendations unresolved"
                    );
                    mark_unresolved(ledger, &recommendations[index..], UnresolvedReason::Cancelled);
                    return Ok(RunStatus::Cancelled);
                }
                Some(Ok(entry)) => ledger.record(entry),
                Some(Err(e)) => {
                    tracing::error!(
                        recommendation = %recommendation.name,
                        error = %e,
                        "review aborted"
                    );
                    let reason = match e {
                        VigilError::ConfirmationChannel(_) => UnresolvedReason::ChannelFailure,
                        _ => UnresolvedReason::Aborted,
                    };
                    mark_unresolved(ledger, &recommendations[index..], reason);
                    return Err(e);
                }
            }
        }

        tracing::info!(
            decided = ledger.decisions().count(),
            unresolved = ledger.unresolved_count(),
            "review finished"
        );
        Ok(RunStatus::Completed)
    }

    /// Route a single recommendation to its ledger entry.
    pub async fn review_one(
        &self,
        patient: &PatientRecord,
        recommendation: &TreatmentRecommendation,
    ) -> Result<LedgerEntry, VigilError> {
        let pending = PendingDecision::open(recommendation);

        match self.policy.classify_action(recommendation.risk_level) {
            RoutingAction::AutoApprove => {
                let record = pending.resolve(DecisionStatus::Approved, Approver::System, None, 0)?;
                tracing::info!(
                    recommendation = %recommendation.name,
                    risk = %recommendation.risk_level,
                    "auto-approved"
                );
                Ok(LedgerEntry::Decided(record))
            }
            RoutingAction::RequireConfirmation => {
                self.handle_confirmation(patient, recommendation, pending)
                    .await
            }
        }
    }

    /// Handle the human confirmation flow, bounded by the configured timeout.
    async fn handle_confirmation(
        &self,
        patient: &PatientRecord,
        recommendation: &TreatmentRecommendation,
        pending: PendingDecision,
    ) -> Result<LedgerEntry, VigilError> {
        let prompted = AtomicU32::new(0);
        let exchange = self.confirm_until_valid(patient, recommendation, &prompted);

        let result = match self.config.confirmation_timeout {
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(result) => result,
                Err(_) => {
                    return self.apply_timeout_fallback(
                        recommendation,
                        pending,
                        prompted.load(Ordering::Relaxed),
                    );
                }
            },
            None => exchange.await,
        };

        let (reply, response) = result?;
        let approver = if reply.responder.trim().is_empty() {
            Approver::Human(self.config.reviewer.clone())
        } else {
            Approver::Human(reply.responder.clone())
        };
        let modification = match &response {
            ConfirmationResponse::Modify { payload } => payload.clone(),
            _ => None,
        };

        let record = pending.resolve(
            response.status(),
            approver,
            modification,
            prompted.load(Ordering::Relaxed),
        )?;

        tracing::info!(
            recommendation = %recommendation.name,
            risk = %recommendation.risk_level,
            status = record.status.label(),
            approver = %record.approver,
            attempts = record.attempts,
            replied_at = %reply.received_at,
            "confirmation recorded"
        );
        Ok(LedgerEntry::Decided(record))
    }

    /// Prompt until the reviewer gives a recognized reply.
    async fn confirm_until_valid(
        &self,
        patient: &PatientRecord,
        recommendation: &TreatmentRecommendation,
        prompted: &AtomicU32,
    ) -> Result<(HumanReply, ConfirmationResponse), VigilError> {
        let mut prompt = ConfirmationPrompt::new(patient, recommendation, &self.config.reviewer);

        loop {
            prompted.store(prompt.attempt, Ordering::Relaxed);
            let reply = self.confirmer.confirm(&prompt).await?;

            match reply.text.parse::<ConfirmationResponse>() {
                Ok(response) => return Ok((reply, response)),
                Err(invalid) => {
                    tracing::warn!(
                        recommendation = %recommendation.name,
                        attempt = prompt.attempt,
                        error = %invalid,
                        "invalid confirmation response, re-prompting"
                    );
                    prompt = prompt.reissue(&invalid);
                }
            }
        }
    }

    fn apply_timeout_fallback(
        &self,
        recommendation: &TreatmentRecommendation,
        pending: PendingDecision,
        attempts: u32,
    ) -> Result<LedgerEntry, VigilError> {
        tracing::warn!(
            recommendation = %recommendation.name,
            fallback = ?self.config.on_timeout,
            "confirmation timed out"
        );

        match self.config.on_timeout {
            TimeoutFallback::Reject => {
                let record = pending.resolve(
                    DecisionStatus::Rejected,
                    Approver::TimeoutFallback,
                    None,
                    attempts,
                )?;
                Ok(LedgerEntry::Decided(record))
            }
            TimeoutFallback::Unresolved => Ok(LedgerEntry::unresolved(
                recommendation,
                UnresolvedReason::TimedOut,
            )),
        }
    }
}

/// Resolve once the cancel flag is set. Never resolves if the sender is gone.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn mark_unresolved(
    ledger: &mut DecisionLedger,
    recommendations: &[TreatmentRecommendation],
    reason: UnresolvedReason,
) {
    for recommendation in recommendations {
        ledger.record(LedgerEntry::unresolved(recommendation, reason));
    }
}
