//! Risk policy: the routing table from risk level to approval path.
//!
//! - `low` and `medium` are auto-approved
//! - `high` and `critical` require human confirmation
//! - Config may tighten the table (route a level to confirmation) but never
//!   auto-approve `high` or `critical`
//! - A level missing from the table requires confirmation (fail-closed)

use std::collections::BTreeMap;

use vigil_types::errors::VigilError;
use vigil_types::{RiskLevel, RoutingAction};

/// Built-in routing table.
pub const DEFAULT_RISK_POLICY: [(RiskLevel, RoutingAction); 4] = [
    (RiskLevel::Low, RoutingAction::AutoApprove),
    (RiskLevel::Medium, RoutingAction::AutoApprove),
    (RiskLevel::High, RoutingAction::RequireConfirmation),
    (RiskLevel::Critical, RoutingAction::RequireConfirmation),
];

/// Lookup table deciding how each risk level is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskPolicy {
    table: BTreeMap<RiskLevel, RoutingAction>,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            table: DEFAULT_RISK_POLICY.into_iter().collect(),
        }
    }
}

impl RiskPolicy {
    /// Build a policy from an explicit table.
    ///
    /// # Errors
    ///
    /// Returns `VigilError::Config` if the table auto-approves `high` or `critical`.
    pub fn from_table(
        table: impl IntoIterator<Item = (RiskLevel, RoutingAction)>,
    ) -> Result<Self, VigilError> {
        let table: BTreeMap<_, _> = table.into_iter().collect();
        for (level, action) in &table {
            if level.demands_human() && *action == RoutingAction::AutoApprove {
                return Err(VigilError::Config(format!(
                    "risk policy cannot auto-approve '{level}' recommendations"
                )));
            }
        }
        Ok(Self { table })
    }

    /// The built-in table with per-level overrides applied on top.
    pub fn with_overrides(
        overrides: &BTreeMap<RiskLevel, RoutingAction>,
    ) -> Result<Self, VigilError> {
        let mut table: BTreeMap<_, _> = DEFAULT_RISK_POLICY.into_iter().collect();
        table.extend(overrides.iter().map(|(level, action)| (*level, *action)));
        Self::from_table(table)
    }

    /// Route a recommendation by its risk level.
    pub fn classify_action(&self, risk_level: RiskLevel) -> RoutingAction {
        self.table
            .get(&risk_level)
            .copied()
            .unwrap_or(RoutingAction::RequireConfirmation)
    }

    /// The full table, least risky level first.
    pub fn entries(&self) -> impl Iterator<Item = (RiskLevel, RoutingAction)> + '_ {
        RiskLevel::ALL
            .into_iter()
            .map(|level| (level, self.classify_action(level)))
    }
}
