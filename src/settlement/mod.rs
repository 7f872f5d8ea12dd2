// Settlement engine: outcome application, commission cascade,
// fancy markets, and the periodic sweeps that drive them
pub mod applier;
pub mod commission;
pub mod fancy;
pub mod orchestrator;

pub use applier::OutcomeApplier;
pub use commission::CommissionEngine;
pub use fancy::FancySettler;
pub use orchestrator::SettlementOrchestrator;
