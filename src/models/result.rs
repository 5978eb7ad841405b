use serde::{Deserialize, Serialize};

use crate::models::{AnalysisReport, BillingRecord, MatchStatus, MatchType};

/// One structural validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralError {
    /// 1-based position of the record in the input
    pub record_index: usize,
    pub field: String,
    pub message: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub record: BillingRecord,
    pub errors: Vec<StructuralError>,
}

/// Outcome of the parsing stage (split, extract, validate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    pub success: bool,
    pub message: Option<String>,
    pub total_processed: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub errors: Vec<StructuralError>,
    pub processing_time_ms: u128,
    pub valid: Vec<BillingRecord>,
    pub invalid: Vec<InvalidRecord>,
}

impl ParseResult {
    pub fn failure(message: String, processing_time_ms: u128) -> Self {
        Self {
            success: false,
            message: Some(message),
            total_processed: 0,
            valid_count: 0,
            invalid_count: 0,
            errors: Vec::new(),
            processing_time_ms,
            valid: Vec::new(),
            invalid: Vec::new(),
        }
    }
}

/// Batch matching statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingStats {
    pub records: usize,
    pub records_with_match: usize,
    pub total_candidates: usize,
    pub exact_candidates: usize,
    pub similar_candidates: usize,
    pub approved_candidates: usize,
    pub pending_candidates: usize,
    pub average_confidence: u32,
}

impl MatchingStats {
    /// Stats over every reported candidate (best plus alternatives).
    pub fn from_reports(reports: &[AnalysisReport]) -> Self {
        let mut stats = MatchingStats {
            records: reports.len(),
            ..Default::default()
        };
        let mut confidence_sum: u64 = 0;

        for report in reports {
            if report.best_match.is_some() {
                stats.records_with_match += 1;
            }
            for candidate in report.best_match.iter().chain(report.alternatives.iter()) {
                stats.total_candidates += 1;
                confidence_sum += u64::from(candidate.confidence);
                match candidate.match_type {
                    MatchType::Exact => stats.exact_candidates += 1,
                    MatchType::Similar => stats.similar_candidates += 1,
                }
                match candidate.status {
                    MatchStatus::Approved => stats.approved_candidates += 1,
                    MatchStatus::Pending => stats.pending_candidates += 1,
                    MatchStatus::Rejected => {}
                }
            }
        }

        if stats.total_candidates > 0 {
            let total = stats.total_candidates as u64;
            stats.average_confidence = ((confidence_sum + total / 2) / total) as u32;
        }
        stats
    }
}

/// Outcome of the matching stage over a batch of valid records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub cancelled: bool,
    pub reports: Vec<AnalysisReport>,
    pub stats: MatchingStats,
    pub processing_time_ms: u128,
}

impl AnalysisOutcome {
    pub fn failure(message: String, processing_time_ms: u128) -> Self {
        Self {
            success: false,
            message: Some(message),
            cancelled: false,
            reports: Vec::new(),
            stats: MatchingStats::default(),
            processing_time_ms,
        }
    }
}

/// Why a whole batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyInput,
    CatalogUnavailable,
    Internal,
}

/// Parse + analysis of one text buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub success: bool,
    pub failure: Option<FailureKind>,
    pub parse: ParseResult,
    pub analysis: AnalysisOutcome,
}
