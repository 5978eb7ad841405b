use bigdecimal::BigDecimal;

use crate::config::MatchingConfig;
use crate::models::{
    AnalysisReport, BillingRecord, CheckOutcome, CheckResult, Criterion, FinancialImpact,
    MatchCandidate, ValidationSummary,
};

pub const ISSUE_NO_MATCH: &str = "no compatible procedure found";
pub const ISSUE_LOW_SCORE: &str = "best match score below 90%";
pub const ACTION_MANUAL_REVIEW: &str = "manual review recommended";
pub const ACTION_PROCEED: &str = "proceed with billing";
pub const ACTION_VERIFY_CODE: &str = "verify procedure code";
pub const ACTION_CONSULT_TABLE: &str = "consult updated reference table";

/// Folds the ranked candidates of one record into its report.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    min_score_threshold: u32,
    max_alternatives: usize,
    declared_unit_baseline: i64,
}

impl ReportBuilder {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            min_score_threshold: config.min_score_threshold,
            max_alternatives: config.max_alternatives,
            declared_unit_baseline: config.declared_unit_baseline,
        }
    }

    /// `candidates` must already be ranked, best first.
    pub fn build(&self, record: &BillingRecord, candidates: Vec<MatchCandidate>) -> AnalysisReport {
        let mut ranked = candidates.into_iter();
        let best_match = ranked.next();
        let alternatives: Vec<MatchCandidate> = ranked.take(self.max_alternatives).collect();

        let issues = self.issues(best_match.as_ref());
        let suggested_actions = self.actions(best_match.as_ref(), &issues);
        let financial_impact = self.financial_impact(record, best_match.as_ref());
        let validation_summary = best_match.as_ref().map(summarize).unwrap_or_default();

        AnalysisReport {
            record_number: record.key().to_string(),
            best_match,
            alternatives,
            issues,
            suggested_actions,
            financial_impact,
            validation_summary,
        }
    }

    fn issues(&self, best: Option<&MatchCandidate>) -> Vec<String> {
        let Some(best) = best else {
            return vec![ISSUE_NO_MATCH.to_string()];
        };

        let mut issues = Vec::new();
        if best.score < 90 {
            issues.push(ISSUE_LOW_SCORE.to_string());
        }
        for criterion in best.validation.failed() {
            let issue = match criterion {
                Criterion::Sex => "patient sex incompatible with procedure",
                Criterion::Age => "patient age outside procedure limits",
                Criterion::Diagnosis => "diagnosis not compatible with procedure",
                Criterion::Authorization | Criterion::Occupation => continue,
            };
            issues.push(issue.to_string());
        }
        issues
    }

    fn actions(&self, best: Option<&MatchCandidate>, issues: &[String]) -> Vec<String> {
        let mut actions = Vec::new();
        if !issues.is_empty() {
            actions.push(ACTION_MANUAL_REVIEW.to_string());
        }
        match best {
            Some(best) if best.score >= self.min_score_threshold => {
                actions.push(ACTION_PROCEED.to_string());
            }
            _ => {
                actions.push(ACTION_VERIFY_CODE.to_string());
                actions.push(ACTION_CONSULT_TABLE.to_string());
            }
        }
        actions
    }

    /// The declared value is a placeholder: one unit per performed line (at
    /// least one) times the configured unit baseline.
    fn financial_impact(&self, record: &BillingRecord, best: Option<&MatchCandidate>) -> FinancialImpact {
        let quantity = record.performed.len().max(1) as i64;
        let original_value = quantity * self.declared_unit_baseline;
        let suggested_value = best.map_or(0, |c| c.values.total);
        let delta = suggested_value - original_value;

        let percent_change = (original_value != 0)
            .then(|| (BigDecimal::from(delta) * BigDecimal::from(100) / BigDecimal::from(original_value)).round(2));

        FinancialImpact {
            original_value,
            suggested_value,
            delta,
            percent_change,
        }
    }
}

/// Sex and age failures count as failed; the rest only warn.
fn summarize(best: &MatchCandidate) -> ValidationSummary {
    let mut summary = ValidationSummary::default();
    for criterion in Criterion::ALL {
        let outcome = if best.validation.get(criterion) {
            summary.passed += 1;
            CheckOutcome::Passed
        } else if criterion.is_hard() {
            summary.failed += 1;
            CheckOutcome::Failed
        } else {
            summary.warned += 1;
            CheckOutcome::Warned
        };
        summary.checks.push(CheckResult { criterion, outcome });
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateValues, MatchStatus, MatchType, ValidationResults};
    use std::str::FromStr;

    fn all_passed() -> ValidationResults {
        ValidationResults {
            sex: true,
            age: true,
            diagnosis: true,
            authorization: true,
            occupation: true,
        }
    }

    fn candidate(code: &str, score: u32, validation: ValidationResults) -> MatchCandidate {
        MatchCandidate {
            record_number: "412511245891-8".into(),
            billed_code: "04.15.02.006-9".into(),
            catalog_code: code.into(),
            description: "X".into(),
            match_type: MatchType::Exact,
            validation,
            unverified_checks: vec![],
            score,
            confidence: score,
            values: CandidateValues {
                ambulatory: 0,
                hospital: 100_000,
                professional: 50_000,
                total: 150_000,
            },
            status: if score >= 90 { MatchStatus::Approved } else { MatchStatus::Pending },
        }
    }

    fn record() -> BillingRecord {
        BillingRecord {
            record_number: Some("412511245891-8".into()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_candidates_report_no_match() {
        let report = ReportBuilder::new(&MatchingConfig::default()).build(&record(), vec![]);
        assert!(report.best_match.is_none());
        assert!(report.alternatives.is_empty());
        assert_eq!(report.issues, vec![ISSUE_NO_MATCH]);
        assert_eq!(
            report.suggested_actions,
            vec![ACTION_MANUAL_REVIEW, ACTION_VERIFY_CODE, ACTION_CONSULT_TABLE]
        );
        assert!(report.validation_summary.checks.is_empty());
        assert_eq!(report.financial_impact.suggested_value, 0);
        assert!(report.needs_review());
    }

    #[test]
    fn approved_best_match_proceeds_without_issues() {
        let report = ReportBuilder::new(&MatchingConfig::default())
            .build(&record(), vec![candidate("04.15.02.006-9", 100, all_passed())]);
        assert!(report.issues.is_empty());
        assert_eq!(report.suggested_actions, vec![ACTION_PROCEED]);
        assert_eq!(report.validation_summary.passed, 5);
        assert!(!report.needs_review());
    }

    #[test]
    fn alternatives_are_capped() {
        let candidates = (0..6)
            .map(|i| candidate(&format!("04.15.02.00{i}-0"), 100 - i, all_passed()))
            .collect();
        let report = ReportBuilder::new(&MatchingConfig::default()).build(&record(), candidates);
        assert_eq!(report.best_match.unwrap().catalog_code, "04.15.02.000-0");
        let alternatives: Vec<_> = report.alternatives.iter().map(|c| c.score).collect();
        assert_eq!(alternatives, vec![99, 98, 97]);
    }

    #[test]
    fn hard_failures_fail_and_soft_failures_warn() {
        let mut validation = all_passed();
        validation.sex = false;
        validation.diagnosis = false;
        let report = ReportBuilder::new(&MatchingConfig::default())
            .build(&record(), vec![candidate("04.15.02.006-9", 80, validation)]);

        let summary = &report.validation_summary;
        assert_eq!((summary.passed, summary.failed, summary.warned), (3, 1, 1));
        assert_eq!(
            report.issues,
            vec![
                ISSUE_LOW_SCORE,
                "patient sex incompatible with procedure",
                "diagnosis not compatible with procedure",
            ]
        );
        assert_eq!(report.suggested_actions, vec![ACTION_MANUAL_REVIEW, ACTION_PROCEED]);
    }

    #[test]
    fn pending_best_match_still_proceeds_with_review() {
        let report = ReportBuilder::new(&MatchingConfig::default())
            .build(&record(), vec![candidate("04.15.02.003-4", 85, all_passed())]);
        assert_eq!(report.issues, vec![ISSUE_LOW_SCORE]);
        assert_eq!(report.suggested_actions, vec![ACTION_MANUAL_REVIEW, ACTION_PROCEED]);
    }

    #[test]
    fn best_below_minimum_threshold_asks_for_code_check() {
        let report = ReportBuilder::new(&MatchingConfig::default())
            .build(&record(), vec![candidate("04.15.02.003-4", 60, all_passed())]);
        assert_eq!(
            report.suggested_actions,
            vec![ACTION_MANUAL_REVIEW, ACTION_VERIFY_CODE, ACTION_CONSULT_TABLE]
        );
    }

    #[test]
    fn financial_impact_uses_declared_baseline() {
        let config = MatchingConfig {
            declared_unit_baseline: 120_000,
            ..Default::default()
        };
        let report = ReportBuilder::new(&config).build(&record(), vec![candidate("04.15.02.006-9", 100, all_passed())]);
        let impact = report.financial_impact;
        assert_eq!(impact.original_value, 120_000);
        assert_eq!(impact.suggested_value, 150_000);
        assert_eq!(impact.delta, 30_000);
        assert_eq!(impact.percent_change, Some(BigDecimal::from_str("25.00").unwrap()));
    }

    #[test]
    fn zero_original_value_has_no_percentage() {
        let report = ReportBuilder::new(&MatchingConfig::default())
            .build(&record(), vec![candidate("04.15.02.006-9", 100, all_passed())]);
        assert_eq!(report.financial_impact.delta, 150_000);
        assert!(report.financial_impact.percent_change.is_none());
    }
}
