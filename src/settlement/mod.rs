//! Settlement module
//!
//! Dual-source weather verification, dispute resolution, the verification
//! audit log and bet grading.

mod audit;
mod engine;
mod grading;
mod resolution;
mod settler;
mod types;

pub use audit::{
    prepare_override, resolve_all_disputed, AuditError, BulkStrategy, JsonlVerificationLog,
    MemoryVerificationLog, OverrideRecord, OverrideRequest, VerificationLog, VerificationLogEntry,
};
pub use engine::{reconcile, SettlementEngine};
pub use grading::{grade, prediction_holds};
pub use resolution::{average, confidence, deviation, is_disputed, resolve_dispute, verify_category};
pub use settler::{BetOutcome, RunSummary, SettlementRun, Settler};
pub use types::{
    CategoryVerification, ResolutionMethod, SettlementError, VerificationReport,
    VerificationSummary,
};
