use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::models::{Criterion, MatchCandidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Passed,
    Failed,
    Warned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub criterion: Criterion,
    pub outcome: CheckOutcome,
}

/// Tally of the five checks on the best match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub checks: Vec<CheckResult>,
    pub passed: usize,
    pub failed: usize,
    pub warned: usize,
}

/// Original (declared) value vs suggested value, in centavos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialImpact {
    pub original_value: i64,
    pub suggested_value: i64,
    pub delta: i64,
    /// None when the original value is zero
    pub percent_change: Option<BigDecimal>,
}

/// Per-record output of the matching stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub record_number: String,
    pub best_match: Option<MatchCandidate>,
    pub alternatives: Vec<MatchCandidate>,
    pub issues: Vec<String>,
    pub suggested_actions: Vec<String>,
    pub financial_impact: FinancialImpact,
    pub validation_summary: ValidationSummary,
}

impl AnalysisReport {
    pub fn needs_review(&self) -> bool {
        !self.issues.is_empty()
    }
}
