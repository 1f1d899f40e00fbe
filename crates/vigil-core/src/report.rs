//! Treatment plan summary.
//!
//! A pure projection of the ledger: one line per recommendation in review
//! order. Rendering the same ledger twice gives the same output.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use vigil_types::errors::VigilError;
use vigil_types::{LedgerEntry, RiskLevel};

use crate::ledger::DecisionLedger;

/// Header of the text rendering.
pub const SUMMARY_HEADER: &str = "===== TREATMENT PLAN SUMMARY =====";

/// Label used for entries that never reached a decision.
pub const UNRESOLVED_LABEL: &str = "UNRESOLVED";

/// One recommendation's outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub treatment_id: String,
    pub name: String,
    pub risk_level: RiskLevel,
    /// `APPROVED`, `REJECTED`, `MODIFIED` or `UNRESOLVED`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Ordered summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub lines: Vec<SummaryLine>,
}

impl Summary {
    pub fn from_ledger(ledger: &DecisionLedger) -> Self {
        let lines = ledger
            .entries()
            .iter()
            .map(|entry| match entry {
                LedgerEntry::Decided(record) => SummaryLine {
                    treatment_id: entry.recommendation_id().to_string(),
                    name: record.recommendation_name.clone(),
                    risk_level: record.risk_level,
                    status: record.status.label().to_string(),
                    approver: Some(record.approver.to_string()),
                    decided_at: Some(record.decided_at),
                    modification: record.modification.clone(),
                    reason: None,
                },
                LedgerEntry::Unresolved {
                    recommendation_name,
                    risk_level,
                    reason,
                    ..
                } => SummaryLine {
                    treatment_id: entry.recommendation_id().to_string(),
                    name: recommendation_name.clone(),
                    risk_level: *risk_level,
                    status: UNRESOLVED_LABEL.to_string(),
                    approver: None,
                    decided_at: None,
                    modification: None,
                    reason: Some(reason.to_string()),
                },
            })
            .collect();

        Self { lines }
    }

    /// Number of lines with the given status label.
    pub fn count(&self, label: &str) -> usize {
        self.lines.iter().filter(|l| l.status == label).count()
    }

    /// Plain-text rendering for the terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(SUMMARY_HEADER);
        out.push('\n');

        if self.lines.is_empty() {
            out.push_str("No treatments were recommended.\n");
            return out;
        }

        for line in &self.lines {
            out.push_str(&format!("- {}: {}\n", line.name, line.status));
            if let Some(approver) = &line.approver {
                out.push_str(&format!("  {} by: {}\n", by_label(&line.status), approver));
            }
            if let Some(at) = line.decided_at {
                out.push_str(&format!(
                    "  Date: {}\n",
                    at.to_rfc3339_opts(SecondsFormat::Secs, true)
                ));
            }
            if let Some(modification) = &line.modification {
                out.push_str(&format!("  Modification: {modification}\n"));
            }
            if let Some(reason) = &line.reason {
                out.push_str(&format!("  Reason: {reason}\n"));
            }
        }
        out
    }

    /// Pretty JSON rendering.
    pub fn render_json(&self) -> Result<String, VigilError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn by_label(status: &str) -> &'static str {
    match status {
        "APPROVED" => "Approved",
        "REJECTED" => "Rejected",
        "MODIFIED" => "Modified",
        _ => "Decided",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::*;

    fn recommendation(id: &str, name: &str, risk: RiskLevel) -> TreatmentRecommendation {
        TreatmentRecommendation {
            treatment_id: id.to_string(),
            category: TreatmentCategory::Procedure,
            name: name.to_string(),
            description: String::new(),
            rationale: String::new(),
            risk_level: risk,
            interactions: vec![],
            alternatives: vec![],
        }
    }

    fn sample_ledger() -> DecisionLedger {
        let mut ledger = DecisionLedger::new();

        let metformin = recommendation("TRT-001", "Metformin 500mg", RiskLevel::Low);
        let record = PendingDecision::open(&metformin)
            .resolve(DecisionStatus::Approved, Approver::System, None, 0)
            .unwrap();
        ledger.record(LedgerEntry::Decided(record));

        let angioplasty = recommendation("TRT-002", "Coronary Angioplasty", RiskLevel::High);
        let record = PendingDecision::open(&angioplasty)
            .resolve(
                DecisionStatus::Modified,
                Approver::Human("Dr. Smith".to_string()),
                Some("schedule after stress test".to_string()),
                2,
            )
            .unwrap();
        ledger.record(LedgerEntry::Decided(record));

        let bypass = recommendation("TRT-003", "Bypass graft", RiskLevel::Critical);
        ledger.record(LedgerEntry::unresolved(&bypass, UnresolvedReason::Cancelled));

        ledger
    }

    #[test]
    fn test_projection_preserves_order_and_labels() {
        let summary = Summary::from_ledger(&sample_ledger());
        let labels: Vec<_> = summary
            .lines
            .iter()
            .map(|l| (l.name.as_str(), l.status.as_str()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("Metformin 500mg", "APPROVED"),
                ("Coronary Angioplasty", "MODIFIED"),
                ("Bypass graft", "UNRESOLVED"),
            ]
        );
        assert_eq!(summary.lines[0].approver.as_deref(), Some(SYSTEM_APPROVER));
        assert_eq!(summary.lines[2].reason.as_deref(), Some("run cancelled"));
        assert!(summary.lines[2].approver.is_none());
        assert_eq!(summary.count("UNRESOLVED"), 1);
    }

    #[test]
    fn test_text_rendering() {
        let text = Summary::from_ledger(&sample_ledger()).render_text();
        assert!(text.starts_with(SUMMARY_HEADER));
        assert!(text.contains("- Metformin 500mg: APPROVED\n  Approved by: system (auto-approved)"));
        assert!(text.contains("- Coronary Angioplasty: MODIFIED\n  Modified by: Dr. Smith"));
        assert!(text.contains("  Modification: schedule after stress test"));
        assert!(text.contains("- Bypass graft: UNRESOLVED\n  Reason: run cancelled"));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let ledger = sample_ledger();
        let first = Summary::from_ledger(&ledger);
        let second = Summary::from_ledger(&ledger);
        assert_eq!(first, second);
        assert_eq!(first.render_text(), second.render_text());
        assert_eq!(first.render_json().unwrap(), second.render_json().unwrap());
    }

    #[test]
    fn test_json_rendering() {
        let json = Summary::from_ledger(&sample_ledger()).render_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let lines = value["lines"].as_array().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["status"], "MODIFIED");
        assert_eq!(lines[1]["risk_level"], "high");
        assert_eq!(lines[1]["approver"], "Dr. Smith");
        assert!(lines[2].get("approver").is_none());
        assert_eq!(lines[2]["reason"], "run cancelled");
    }

    #[test]
    fn test_empty_ledger() {
        let text = Summary::from_ledger(&DecisionLedger::new()).render_text();
        assert!(text.contains("No treatments were recommended."));
    }
}
