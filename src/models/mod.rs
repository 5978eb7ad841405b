pub mod candidate;
pub mod catalog;
pub mod record;
pub mod report;
pub mod result;

pub use candidate::{
    CandidateValues, Criterion, MatchCandidate, MatchStatus, MatchType, ValidationResults,
};
pub use catalog::{AgeBound, AgeUnit, CatalogProcedure, ProcedureValues, SexRestriction};
pub use record::{
    Address, BillingRecord, CareCharacter, Patient, PerformedProcedureLine,
    ProfessionalParticipation, Sex,
};
pub use report::{AnalysisReport, CheckOutcome, CheckResult, FinancialImpact, ValidationSummary};
pub use result::{
    AnalysisOutcome, FailureKind, InvalidRecord, MatchingStats, ParseResult, PipelineOutcome, StructuralError,
};
