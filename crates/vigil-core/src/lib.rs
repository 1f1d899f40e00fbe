/// Risk-gated treatment review core.
///
/// Orchestrates the review pipeline:
/// - **Generator**: patient record in, treatment recommendations out (catalog or LLM)
/// - **Policy**: risk level to routing action lookup table
/// - **Workflow**: sequential engine that auto-approves or asks a human
/// - **Ledger**: caller-owned record of every outcome
/// - **Report**: treatment plan summary rendered as text or JSON
pub mod generator;
pub mod ledger;
pub mod llm;
pub mod policy;
pub mod report;
pub mod workflow;

pub use ledger::DecisionLedger;
pub use policy::RiskPolicy;
pub use report::Summary;
pub use workflow::{EngineConfig, EngineDeps, ReviewEngine, RunStatus};
