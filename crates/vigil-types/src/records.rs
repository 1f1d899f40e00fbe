/// Shared data types used across all Vigil crates.
///
/// Patient input, generated recommendations, the decision state machine, the
/// confirmation exchange and the provider-neutral LLM request/response shapes.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{InvalidResponse, VigilError};

/// Display name of the approver on auto-approved decisions.
pub const SYSTEM_APPROVER: &str = "system (auto-approved)";

/// Display name of the approver on decisions produced by the timeout fallback.
pub const TIMEOUT_APPROVER: &str = "none (confirmation timed out)";

// ============================================================
// Patient & Recommendation Types
// ============================================================

/// Patient data handed to the recommendation generator. Read-only input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Patient identifier (e.g., "P12345").
    pub patient_id: String,
    /// Full name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Active diagnoses.
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Current medications.
    #[serde(default)]
    pub medications: Vec<String>,
    /// Known allergies.
    #[serde(default)]
    pub allergies: Vec<String>,
    /// Free-text history (prior procedures, events).
    #[serde(default)]
    pub medical_history: String,
}

/// Kind of treatment being proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreatmentCategory {
    Medication,
    Procedure,
    Therapy,
    Surgery,
    Lifestyle,
}

impl fmt::Display for TreatmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TreatmentCategory::Medication => "medication",
            TreatmentCategory::Procedure => "procedure",
            TreatmentCategory::Therapy => "therapy",
            TreatmentCategory::Surgery => "surgery",
            TreatmentCategory::Lifestyle => "lifestyle",
        };
        f.write_str(s)
    }
}

/// Clinical risk of a recommendation. Ordered from least to most risky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Every level, least risky first.
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// High and critical recommendations may never be approved without a human.
    pub fn demands_human(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated treatment candidate. Never mutated after the generator returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentRecommendation {
    /// Stable identifier within a run (e.g., "TRT-001").
    #[serde(default)]
    pub treatment_id: String,
    /// Treatment category.
    pub category: TreatmentCategory,
    /// Short name (e.g., "Metformin 500mg").
    pub name: String,
    /// What the treatment involves.
    pub description: String,
    /// Why it is being proposed for this patient.
    #[serde(default)]
    pub rationale: String,
    /// Clinical risk, drives routing.
    pub risk_level: RiskLevel,
    /// Known interactions with the patient's current therapy.
    #[serde(default)]
    pub interactions: Vec<String>,
    /// Alternative treatments.
    #[serde(default)]
    pub alternatives: Vec<String>,
}

// ============================================================
// Routing & Decision Types
// ============================================================

/// What the risk policy says to do with a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingAction {
    /// Approve immediately, no human involved.
    AutoApprove,
    /// Block until a human confirms, rejects or modifies.
    RequireConfirmation,
}

/// Status of a decision. Only `Pending` is non-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
    Modified,
}

impl DecisionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DecisionStatus::Pending)
    }

    /// Uppercase label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            DecisionStatus::Pending => "PENDING",
            DecisionStatus::Approved => "APPROVED",
            DecisionStatus::Rejected => "REJECTED",
            DecisionStatus::Modified => "MODIFIED",
        }
    }
}

/// Who made a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Approver {
    /// The risk policy auto-approved the recommendation.
    System,
    /// A named human reviewer.
    Human(String),
    /// Nobody answered before the confirmation timeout.
    TimeoutFallback,
}

impl Approver {
    pub fn is_human(&self) -> bool {
        matches!(self, Approver::Human(_))
    }
}

impl fmt::Display for Approver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Approver::System => f.write_str(SYSTEM_APPROVER),
            Approver::Human(name) => f.write_str(name),
            Approver::TimeoutFallback => f.write_str(TIMEOUT_APPROVER),
        }
    }
}

/// The immutable terminal outcome for one recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Unique decision identifier.
    pub id: Uuid,
    /// Identifier of the recommendation this decision resolves.
    pub recommendation_id: String,
    /// Name of the recommendation, carried for reporting.
    pub recommendation_name: String,
    /// Risk level the decision was routed on.
    pub risk_level: RiskLevel,
    /// Terminal status. Never `Pending`.
    pub status: DecisionStatus,
    /// Who decided.
    pub approver: Approver,
    /// When the decision became terminal.
    pub decided_at: DateTime<Utc>,
    /// Reviewer-supplied modification, attached as-is.
    pub modification: Option<String>,
    /// Number of confirmation prompts issued (0 for auto-approval).
    pub attempts: u32,
}

/// A recommendation in the `pending` state.
///
/// Resolving consumes the value, so a decision can leave `pending` exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDecision {
    recommendation_id: String,
    recommendation_name: String,
    risk_level: RiskLevel,
}

impl PendingDecision {
    /// Open a pending decision for a recommendation.
    pub fn open(recommendation: &TreatmentRecommendation) -> Self {
        Self {
            recommendation_id: recommendation.treatment_id.clone(),
            recommendation_name: recommendation.name.clone(),
            risk_level: recommendation.risk_level,
        }
    }

    pub fn status(&self) -> DecisionStatus {
        DecisionStatus::Pending
    }

    /// Transition `pending -> {approved | rejected | modified}`.
    ///
    /// Fails if the target status is `Pending`, or if a high/critical
    /// recommendation would be approved or modified by anyone but a human.
    pub fn resolve(
        self,
        status: DecisionStatus,
        approver: Approver,
        modification: Option<String>,
        attempts: u32,
    ) -> Result<DecisionRecord, VigilError> {
        if !status.is_terminal() {
            return Err(VigilError::Internal(format!(
                "decision for '{}' cannot resolve into pending",
                self.recommendation_name
            )));
        }
        if self.risk_level.demands_human() && approver == Approver::System {
            return Err(VigilError::Internal(format!(
                "{} risk recommendation '{}' cannot be decided by the system",
                self.risk_level, self.recommendation_name
            )));
        }
        if self.risk_level.demands_human()
            && matches!(status, DecisionStatus::Approved | DecisionStatus::Modified)
            && !approver.is_human()
        {
            return Err(VigilError::Internal(format!(
                "{} risk recommendation '{}' can only be {} by a human",
                self.risk_level,
                self.recommendation_name,
                status.label().to_lowercase()
            )));
        }

        Ok(DecisionRecord {
            id: Uuid::new_v4(),
            recommendation_id: self.recommendation_id,
            recommendation_name: self.recommendation_name,
            risk_level: self.risk_level,
            status,
            approver,
            decided_at: Utc::now(),
            modification,
            attempts,
        })
    }
}

/// Why a recommendation never reached a terminal decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The run was cancelled before the recommendation was decided.
    Cancelled,
    /// The confirmation timed out and the fallback leaves it unresolved.
    TimedOut,
    /// The confirmation channel failed.
    ChannelFailure,
    /// The run stopped on an unexpected error.
    Aborted,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnresolvedReason::Cancelled => "run cancelled",
            UnresolvedReason::TimedOut => "confirmation timed out",
            UnresolvedReason::ChannelFailure => "confirmation channel failed",
            UnresolvedReason::Aborted => "run aborted",
        };
        f.write_str(s)
    }
}

/// One slot in the decision ledger, in generation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LedgerEntry {
    /// The recommendation reached a terminal decision.
    Decided(DecisionRecord),
    /// The run ended while the recommendation was still pending.
    Unresolved {
        recommendation_id: String,
        recommendation_name: String,
        risk_level: RiskLevel,
        reason: UnresolvedReason,
    },
}

impl LedgerEntry {
    /// Build an unresolved entry for a recommendation.
    pub fn unresolved(recommendation: &TreatmentRecommendation, reason: UnresolvedReason) -> Self {
        LedgerEntry::Unresolved {
            recommendation_id: recommendation.treatment_id.clone(),
            recommendation_name: recommendation.name.clone(),
            risk_level: recommendation.risk_level,
            reason,
        }
    }

    pub fn recommendation_id(&self) -> &str {
        match self {
            LedgerEntry::Decided(record) => &record.recommendation_id,
            LedgerEntry::Unresolved {
                recommendation_id, ..
            } => recommendation_id,
        }
    }

    pub fn recommendation_name(&self) -> &str {
        match self {
            LedgerEntry::Decided(record) => &record.recommendation_name,
            LedgerEntry::Unresolved {
                recommendation_name,
                ..
            } => recommendation_name,
        }
    }

    pub fn decision(&self) -> Option<&DecisionRecord> {
        match self {
            LedgerEntry::Decided(record) => Some(record),
            LedgerEntry::Unresolved { .. } => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, LedgerEntry::Unresolved { .. })
    }
}

// ============================================================
// Confirmation Types
// ============================================================

/// Everything a reviewer needs to decide on one recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationPrompt {
    /// Patient identifier.
    pub patient_id: String,
    /// Patient name.
    pub patient_name: String,
    /// Patient age in years.
    pub patient_age: u32,
    /// Reviewer being asked.
    pub reviewer: String,
    /// The recommendation under review.
    pub recommendation: TreatmentRecommendation,
    /// 1-based prompt number for this recommendation.
    pub attempt: u32,
    /// Explanation of why the previous reply was not accepted, if re-prompting.
    pub notice: Option<String>,
}

impl ConfirmationPrompt {
    /// First prompt for a recommendation.
    pub fn new(
        patient: &PatientRecord,
        recommendation: &TreatmentRecommendation,
        reviewer: &str,
    ) -> Self {
        Self {
            patient_id: patient.patient_id.clone(),
            patient_name: patient.name.clone(),
            patient_age: patient.age,
            reviewer: reviewer.to_string(),
            recommendation: recommendation.clone(),
            attempt: 1,
            notice: None,
        }
    }

    /// Follow-up prompt after an unrecognized reply.
    pub fn reissue(&self, rejected: &InvalidResponse) -> Self {
        Self {
            attempt: self.attempt + 1,
            notice: Some(rejected.to_string()),
            ..self.clone()
        }
    }
}

/// Raw reply from a confirmation channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanReply {
    /// Identity of the human who replied.
    pub responder: String,
    /// Reply text as entered.
    pub text: String,
    /// When the reply was received.
    pub received_at: DateTime<Utc>,
}

impl HumanReply {
    pub fn new(responder: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            responder: responder.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// A recognized confirmation reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationResponse {
    Yes,
    No,
    Modify { payload: Option<String> },
}

impl ConfirmationResponse {
    /// Decision status this reply resolves to.
    pub fn status(&self) -> DecisionStatus {
        match self {
            ConfirmationResponse::Yes => DecisionStatus::Approved,
            ConfirmationResponse::No => DecisionStatus::Rejected,
            ConfirmationResponse::Modify { .. } => DecisionStatus::Modified,
        }
    }
}

impl FromStr for ConfirmationResponse {
    type Err = InvalidResponse;

    /// Accepts `yes`, `no`, `modify`, or `modify: <payload>` / `modify <payload>`,
    /// case-insensitive and trimmed.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let lowered = trimmed.to_lowercase();

        match lowered.as_str() {
            "yes" => return Ok(ConfirmationResponse::Yes),
            "no" => return Ok(ConfirmationResponse::No),
            "modify" => return Ok(ConfirmationResponse::Modify { payload: None }),
            _ => {}
        }

        if lowered.starts_with("modify") {
            // "modify" is ASCII, so the byte offset is valid in the original too.
            let rest = &trimmed["modify".len()..];
            if rest.starts_with(':') || rest.starts_with(char::is_whitespace) {
                let payload = rest.trim_start_matches(':').trim();
                return Ok(ConfirmationResponse::Modify {
                    payload: (!payload.is_empty()).then(|| payload.to_string()),
                });
            }
        }

        Err(InvalidResponse {
            input: trimmed.to_string(),
        })
    }
}

// ============================================================
// LLM Types
// ============================================================

/// A request to an LLM for completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System prompt.
    pub system: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature for sampling.
    pub temperature: Option<f64>,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Roles in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Response from an LLM completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text content.
    pub content: String,
    /// Model identifier that generated this response.
    pub model: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
}

/// Token usage statistics from an LLM call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angioplasty() -> TreatmentRecommendation {
        TreatmentRecommendation {
            treatment_id: "TRT-002".to_string(),
            category: TreatmentCategory::Procedure,
            name: "Coronary Angioplasty".to_string(),
            description: "Widen narrowed coronary arteries".to_string(),
            rationale: String::new(),
            risk_level: RiskLevel::High,
            interactions: vec![],
            alternatives: vec![],
        }
    }

    fn parse(input: &str) -> Result<ConfirmationResponse, InvalidResponse> {
        input.parse::<ConfirmationResponse>()
    }

    #[test]
    fn test_parse_valid_responses() {
        assert_eq!(parse("yes"), Ok(ConfirmationResponse::Yes));
        assert_eq!(parse("  YES \n"), Ok(ConfirmationResponse::Yes));
        assert_eq!(parse("No"), Ok(ConfirmationResponse::No));
        assert_eq!(
            parse("modify"),
            Ok(ConfirmationResponse::Modify { payload: None })
        );
        assert_eq!(
            parse("Modify: use 250mg"),
            Ok(ConfirmationResponse::Modify {
                payload: Some("use 250mg".to_string())
            })
        );
        assert_eq!(
            parse("modify stage in two sessions"),
            Ok(ConfirmationResponse::Modify {
                payload: Some("stage in two sessions".to_string())
            })
        );
    }

    #[test]
    fn test_parse_invalid_responses() {
        for input in ["maybe", "", "y", "yes please", "modifyx", "approve"] {
            let err = parse(input).unwrap_err();
            assert_eq!(err.input, input.trim());
        }
    }

    #[test]
    fn test_response_status_mapping() {
        assert_eq!(ConfirmationResponse::Yes.status(), DecisionStatus::Approved);
        assert_eq!(ConfirmationResponse::No.status(), DecisionStatus::Rejected);
        assert_eq!(
            ConfirmationResponse::Modify { payload: None }.status(),
            DecisionStatus::Modified
        );
    }

    #[test]
    fn test_pending_resolves_once() {
        let pending = PendingDecision::open(&angioplasty());
        assert_eq!(pending.status(), DecisionStatus::Pending);

        let record = pending
            .resolve(
                DecisionStatus::Approved,
                Approver::Human("Dr. Smith".to_string()),
                None,
                1,
            )
            .unwrap();
        assert_eq!(record.status, DecisionStatus::Approved);
        assert_eq!(record.recommendation_id, "TRT-002");
        assert_eq!(record.approver.to_string(), "Dr. Smith");
    }

    #[test]
    fn test_pending_cannot_resolve_to_pending() {
        let err = PendingDecision::open(&angioplasty())
            .resolve(
                DecisionStatus::Pending,
                Approver::Human("Dr. Smith".to_string()),
                None,
                1,
            )
            .unwrap_err();
        assert!(matches!(err, VigilError::Internal(_)));
    }

    #[test]
    fn test_high_risk_never_decided_by_system() {
        let err = PendingDecision::open(&angioplasty())
            .resolve(DecisionStatus::Approved, Approver::System, None, 0)
            .unwrap_err();
        assert!(matches!(err, VigilError::Internal(_)));

        let err = PendingDecision::open(&angioplasty())
            .resolve(DecisionStatus::Approved, Approver::TimeoutFallback, None, 1)
            .unwrap_err();
        assert!(matches!(err, VigilError::Internal(_)));

        // Timeout fallback may reject.
        let record = PendingDecision::open(&angioplasty())
            .resolve(DecisionStatus::Rejected, Approver::TimeoutFallback, None, 1)
            .unwrap();
        assert_eq!(record.approver.to_string(), TIMEOUT_APPROVER);
    }

    #[test]
    fn test_reissue_increments_attempt() {
        let patient = PatientRecord {
            patient_id: "P12345".to_string(),
            name: "John Doe".to_string(),
            age: 67,
            conditions: vec![],
            medications: vec![],
            allergies: vec![],
            medical_history: String::new(),
        };
        let first = ConfirmationPrompt::new(&patient, &angioplasty(), "Dr. Smith");
        assert_eq!(first.attempt, 1);
        assert!(first.notice.is_none());

        let second = first.reissue(&InvalidResponse {
            input: "maybe".to_string(),
        });
        assert_eq!(second.attempt, 2);
        assert!(second.notice.unwrap().contains("maybe"));
        assert_eq!(second.recommendation, first.recommendation);
    }

    #[test]
    fn test_approver_serialization() {
        let json = serde_json::to_value(Approver::Human("Dr. Smith".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "human", "name": "Dr. Smith"}));
        let json = serde_json::to_value(Approver::System).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "system"}));
    }
}
