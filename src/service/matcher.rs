use chrono::{Datelike, Local, NaiveDate};
use indexmap::IndexSet;
use std::collections::HashSet;

use crate::config::MatchingConfig;
use crate::models::{
    AgeBound, AgeUnit, BillingRecord, CandidateValues, CatalogProcedure, Criterion,
    MatchCandidate, MatchStatus, MatchType, ValidationResults,
};
use crate::parser::shapes::{normalize_diagnosis, strip_punctuation};
use crate::service::catalog::ReferenceCatalog;

/// Validator outcomes for one (record, catalog row) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub validation: ValidationResults,
    pub unverified: Vec<Criterion>,
}

/// Matches billed procedure codes against the reference catalog.
///
/// Age is measured against `reference_date` (today unless overridden), so a
/// fixed date makes matching fully deterministic.
#[derive(Debug, Clone)]
pub struct ProcedureMatcher {
    config: MatchingConfig,
    reference_date: NaiveDate,
}

impl ProcedureMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            config,
            reference_date: Local::now().date_naive(),
        }
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = date;
        self
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Ranked candidates for every procedure code of the record.
    ///
    /// Candidates under the minimum threshold are dropped; a catalog code is
    /// kept once per record (first occurrence wins); ordering is by score,
    /// then discovery order.
    pub fn match_record(&self, record: &BillingRecord, catalog: &ReferenceCatalog) -> Vec<MatchCandidate> {
        let mut kept_codes: IndexSet<String> = IndexSet::new();
        let mut candidates = Vec::new();
        let codes = record.procedure_codes();

        for code in &codes {
            // 1. exact
            let exact = catalog.get(code).map(|p| (p, MatchType::Exact));
            // 2. same 6-digit prefix, bounded
            let similar = catalog
                .with_prefix(code)
                .take(self.config.max_similar_per_code)
                .map(|p| (p, MatchType::Similar));

            for (procedure, match_type) in exact.into_iter().chain(similar) {
                let candidate = self.build_candidate(record, code, procedure, match_type);
                if candidate.status == MatchStatus::Rejected {
                    tracing::debug!(
                        "AIH {}: {} -> {} scored {}, below threshold",
                        record.key(),
                        code,
                        procedure.code,
                        candidate.score
                    );
                    continue;
                }
                if !kept_codes.insert(strip_punctuation(&procedure.code)) {
                    continue;
                }
                candidates.push(candidate);
            }
        }

        // stable: ties keep discovery order
        candidates.sort_by(|a, b| b.score.cmp(&a.score));

        tracing::debug!(
            "AIH {}: {} candidates from {} procedure codes",
            record.key(),
            candidates.len(),
            codes.len()
        );
        candidates
    }

    pub fn build_candidate(
        &self,
        record: &BillingRecord,
        billed_code: &str,
        procedure: &CatalogProcedure,
        match_type: MatchType,
    ) -> MatchCandidate {
        let Evaluation {
            validation,
            unverified,
        } = self.evaluate(record, procedure);
        let score = self.score(&validation, match_type);

        MatchCandidate {
            record_number: record.key().to_string(),
            billed_code: billed_code.to_string(),
            catalog_code: procedure.code.clone(),
            description: procedure.description.clone(),
            match_type,
            validation,
            unverified_checks: unverified,
            score,
            confidence: self.confidence(score, match_type),
            values: CandidateValues::from(procedure.values),
            status: self.status(score),
        }
    }

    /// Run the five validators. Order-independent.
    pub fn evaluate(&self, record: &BillingRecord, procedure: &CatalogProcedure) -> Evaluation {
        let mut validation = ValidationResults::default();
        let mut unverified = Vec::new();

        validation.sex = procedure.sex.allows(record.patient.sex);

        validation.age = match (procedure.has_age_bounds(), record.patient.birth_date) {
            (false, _) => true,
            (true, Some(birth)) => self.age_within(birth, procedure.min_age, procedure.max_age),
            (true, None) => {
                unverified.push(Criterion::Age);
                true
            }
        };

        validation.diagnosis = if procedure.diagnoses.is_empty() {
            true
        } else {
            let allowed: HashSet<String> = procedure.diagnoses.iter().map(|c| normalize_diagnosis(c)).collect();
            record
                .diagnosis_codes()
                .into_iter()
                .any(|c| allowed.contains(&normalize_diagnosis(c)))
        };

        // Facility eligibility is not carried by the AIH, so the group cannot
        // be checked here.
        validation.authorization = true;
        if procedure.requires_authorization || !procedure.authorization_group.is_empty() {
            unverified.push(Criterion::Authorization);
        }

        validation.occupation = if procedure.occupations.is_empty() {
            true
        } else {
            let record_codes = if self.config.cross_check_occupations {
                record.occupation_codes()
            } else {
                Vec::new()
            };
            if record_codes.is_empty() {
                unverified.push(Criterion::Occupation);
                true
            } else {
                record_codes
                    .iter()
                    .any(|c| procedure.occupations.iter().any(|allowed| allowed.as_str() == *c))
            }
        };

        Evaluation {
            validation,
            unverified,
        }
    }

    /// Weighted sum of passed criteria plus the exact bonus, capped at 100.
    pub fn score(&self, validation: &ValidationResults, match_type: MatchType) -> u32 {
        let weights = &self.config.weights;
        let passed: u32 = Criterion::ALL
            .into_iter()
            .filter(|c| validation.get(*c))
            .map(|c| match c {
                Criterion::Sex => weights.sex,
                Criterion::Age => weights.age,
                Criterion::Diagnosis => weights.diagnosis,
                Criterion::Authorization => weights.authorization,
                Criterion::Occupation => weights.occupation,
            })
            .sum();
        let bonus = match match_type {
            MatchType::Exact => self.config.exact_match_bonus,
            MatchType::Similar => 0,
        };
        (passed + bonus).min(100)
    }

    pub fn confidence(&self, score: u32, match_type: MatchType) -> u32 {
        match match_type {
            MatchType::Exact => score,
            MatchType::Similar => (score * self.config.similar_confidence_percent + 50) / 100,
        }
    }

    pub fn status(&self, score: u32) -> MatchStatus {
        if score >= self.config.approval_threshold {
            MatchStatus::Approved
        } else if score >= self.config.min_score_threshold {
            MatchStatus::Pending
        } else {
            MatchStatus::Rejected
        }
    }

    fn age_within(&self, birth: NaiveDate, min: Option<AgeBound>, max: Option<AgeBound>) -> bool {
        let above_min = min.map_or(true, |b| age_in(b.unit, birth, self.reference_date) >= i64::from(b.value));
        let below_max = max.map_or(true, |b| age_in(b.unit, birth, self.reference_date) <= i64::from(b.value));
        above_min && below_max
    }
}

/// Completed units of age at `today`.
pub fn age_in(unit: AgeUnit, birth: NaiveDate, today: NaiveDate) -> i64 {
    let before_birthday_in_month = today.day() < birth.day();
    match unit {
        AgeUnit::Years => {
            let mut years = i64::from(today.year() - birth.year());
            if (today.month(), today.day()) < (birth.month(), birth.day()) {
                years -= 1;
            }
            years
        }
        AgeUnit::Months => {
            let mut months = i64::from(today.year() - birth.year()) * 12
                + i64::from(today.month()) - i64::from(birth.month());
            if before_birthday_in_month {
                months -= 1;
            }
            months
        }
        AgeUnit::Days => (today - birth).num_days(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringWeights;
    use crate::models::{Patient, PerformedProcedureLine, ProcedureValues, Sex, SexRestriction};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn matcher() -> ProcedureMatcher {
        ProcedureMatcher::new(MatchingConfig::default()).with_reference_date(today())
    }

    fn values() -> ProcedureValues {
        ProcedureValues {
            ambulatory: 0,
            hospital: 120_000,
            professional: 35_050,
        }
    }

    fn record(sex: Sex) -> BillingRecord {
        BillingRecord {
            record_number: Some("412511245891-8".into()),
            patient: Patient {
                name: Some("PACIENTE".into()),
                sex: Some(sex),
                birth_date: NaiveDate::from_ymd_opt(1961, 4, 18),
                ..Default::default()
            },
            primary_procedure: Some("04.15.02.006-9".into()),
            primary_diagnosis: Some("M751".into()),
            ..Default::default()
        }
    }

    fn catalog(procedures: Vec<CatalogProcedure>) -> ReferenceCatalog {
        ReferenceCatalog::new(None, procedures)
    }

    #[test]
    fn unrestricted_exact_match_scores_100_and_is_approved() {
        let catalog = catalog(vec![CatalogProcedure::unrestricted("04.15.02.006-9", "ORTOPEDIA", values())]);
        let candidates = matcher().match_record(&record(Sex::Male), &catalog);

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.match_type, MatchType::Exact);
        assert!(c.validation.sex && c.validation.age);
        assert_eq!(c.score, 100);
        assert_eq!(c.confidence, 100);
        assert_eq!(c.status, MatchStatus::Approved);
        assert_eq!(c.values.total, 155_050);
        assert!(c.unverified_checks.is_empty());
    }

    #[test]
    fn female_only_procedure_costs_exactly_the_sex_weight() {
        let mut procedure = CatalogProcedure::unrestricted("04.15.02.006-9", "X", values());
        procedure.sex = SexRestriction::Female;
        let m = matcher();

        let female = m.build_candidate(&record(Sex::Female), "04.15.02.006-9", &procedure, MatchType::Exact);
        let male = m.build_candidate(&record(Sex::Male), "04.15.02.006-9", &procedure, MatchType::Exact);
        assert_eq!(female.score - male.score, ScoringWeights::default().sex);
        assert!(!male.validation.sex);
    }

    #[test]
    fn similar_candidates_are_capped_and_discounted() {
        let mut procedures = vec![CatalogProcedure::unrestricted("04.15.02.006-9", "EXATO", values())];
        for i in 0..8 {
            let code = format!("04.15.02.01{i}-0");
            procedures.push(CatalogProcedure::unrestricted(&code, "SIMILAR", values()));
        }
        let candidates = matcher().match_record(&record(Sex::Male), &catalog(procedures));

        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[0].match_type, MatchType::Exact);
        let similar: Vec<_> = candidates[1..].iter().map(|c| c.catalog_code.as_str()).collect();
        assert_eq!(
            similar,
            vec!["04.15.02.010-0", "04.15.02.011-0", "04.15.02.012-0", "04.15.02.013-0", "04.15.02.014-0"]
        );
        for c in &candidates[1..] {
            assert_eq!(c.score, 85);
            assert_eq!(c.confidence, 77);
            assert_eq!(c.status, MatchStatus::Pending);
        }
    }

    #[test]
    fn exact_never_scores_below_similar_for_same_row() {
        let mut procedure = CatalogProcedure::unrestricted("04.15.02.006-9", "X", values());
        procedure.diagnoses = vec!["Z00".into()];
        let m = matcher();
        let r = record(Sex::Male);
        let exact = m.build_candidate(&r, "04.15.02.006-9", &procedure, MatchType::Exact);
        let similar = m.build_candidate(&r, "04.15.02.001-8", &procedure, MatchType::Similar);
        assert!(exact.score >= similar.score);
        assert!(exact.confidence >= similar.confidence);
    }

    #[test]
    fn score_is_monotonic_in_passed_criteria() {
        let m = matcher();
        for mask in 0u8..32 {
            let mut base = ValidationResults::default();
            for (bit, c) in Criterion::ALL.into_iter().enumerate() {
                base.set(c, mask & (1 << bit) != 0);
            }
            for c in base.failed().collect::<Vec<_>>() {
                let mut more = base;
                more.set(c, true);
                for t in [MatchType::Exact, MatchType::Similar] {
                    assert!(m.score(&more, t) >= m.score(&base, t));
                }
            }
        }
    }

    #[test]
    fn below_threshold_candidates_are_dropped() {
        let mut procedure = CatalogProcedure::unrestricted("04.15.02.001-8", "X", values());
        procedure.sex = SexRestriction::Female;
        procedure.diagnoses = vec!["Z00".into()];
        // similar, sex and diagnosis fail: 15 + 25 + 15 = 55
        let candidates = matcher().match_record(&record(Sex::Male), &catalog(vec![procedure]));
        assert!(candidates.is_empty());
    }

    #[test]
    fn duplicate_catalog_codes_across_lines_keep_first() {
        let mut r = record(Sex::Male);
        r.performed = vec![PerformedProcedureLine {
            sequence: 1,
            procedure_code: "04.15.02.006-9".into(),
            description: String::new(),
            diagnosis_codes: vec![],
            participants: vec![],
        }];
        let catalog = catalog(vec![CatalogProcedure::unrestricted("04.15.02.006-9", "X", values())]);
        assert_eq!(matcher().match_record(&r, &catalog).len(), 1);
    }

    #[test]
    fn ranking_is_by_score_then_discovery_order() {
        let mut restricted = CatalogProcedure::unrestricted("04.15.02.001-8", "DIAG", values());
        restricted.diagnoses = vec!["Z00".into()];
        let catalog = catalog(vec![
            restricted,
            CatalogProcedure::unrestricted("04.15.02.002-6", "A", values()),
            CatalogProcedure::unrestricted("04.15.02.003-4", "B", values()),
        ]);
        let codes: Vec<_> = matcher()
            .match_record(&record(Sex::Male), &catalog)
            .into_iter()
            .map(|c| (c.catalog_code, c.score))
            .collect();
        assert_eq!(
            codes,
            vec![
                ("04.15.02.002-6".to_string(), 85),
                ("04.15.02.003-4".to_string(), 85),
            ]
        );
    }

    #[test]
    fn matching_is_deterministic() {
        let catalog = catalog(
            (0..20)
                .map(|i| CatalogProcedure::unrestricted(&format!("04.15.02.{i:03}-1"), "X", values()))
                .collect(),
        );
        let m = matcher();
        let r = record(Sex::Female);
        assert_eq!(m.match_record(&r, &catalog), m.match_record(&r, &catalog));
    }

    #[test]
    fn age_bounds_use_whole_units() {
        let birth = NaiveDate::from_ymd_opt(2007, 6, 16).unwrap();
        assert_eq!(age_in(AgeUnit::Years, birth, today()), 17);
        assert_eq!(age_in(AgeUnit::Months, birth, today()), 215);

        let mut procedure = CatalogProcedure::unrestricted("04.15.02.006-9", "X", values());
        procedure.min_age = Some(AgeBound::years(18));
        let mut r = record(Sex::Male);
        r.patient.birth_date = Some(birth);
        assert!(!matcher().evaluate(&r, &procedure).validation.age);

        r.patient.birth_date = NaiveDate::from_ymd_opt(2007, 6, 15);
        assert!(matcher().evaluate(&r, &procedure).validation.age);
    }

    #[test]
    fn missing_birth_date_passes_age_but_is_flagged() {
        let mut procedure = CatalogProcedure::unrestricted("04.15.02.006-9", "X", values());
        procedure.max_age = Some(AgeBound {
            value: 24,
            unit: AgeUnit::Months,
        });
        let mut r = record(Sex::Male);
        r.patient.birth_date = None;
        let evaluation = matcher().evaluate(&r, &procedure);
        assert!(evaluation.validation.age);
        assert_eq!(evaluation.unverified, vec![Criterion::Age]);
    }

    #[test]
    fn diagnosis_matches_primary_or_line_codes_ignoring_dots() {
        let mut procedure = CatalogProcedure::unrestricted("04.15.02.006-9", "X", values());
        procedure.diagnoses = vec!["S42.0".into(), "M75.1".into()];
        assert!(matcher().evaluate(&record(Sex::Male), &procedure).validation.diagnosis);

        let mut r = record(Sex::Male);
        r.primary_diagnosis = Some("Z00".into());
        assert!(!matcher().evaluate(&r, &procedure).validation.diagnosis);

        r.performed = vec![PerformedProcedureLine {
            sequence: 1,
            procedure_code: "04.15.02.006-9".into(),
            description: "REDUCAO S420".into(),
            diagnosis_codes: vec!["S420".into()],
            participants: vec![],
        }];
        assert!(matcher().evaluate(&r, &procedure).validation.diagnosis);
    }

    #[test]
    fn authorization_and_occupation_pass_but_are_flagged() {
        let mut procedure = CatalogProcedure::unrestricted("04.15.02.006-9", "X", values());
        procedure.requires_authorization = true;
        procedure.occupations = vec!["225270".into()];
        let evaluation = matcher().evaluate(&record(Sex::Male), &procedure);
        assert!(evaluation.validation.authorization);
        assert!(evaluation.validation.occupation);
        assert_eq!(evaluation.unverified, vec![Criterion::Authorization, Criterion::Occupation]);
    }

    #[test]
    fn occupation_cross_check_when_enabled() {
        use crate::models::ProfessionalParticipation;

        let config = MatchingConfig {
            cross_check_occupations: true,
            ..Default::default()
        };
        let m = ProcedureMatcher::new(config).with_reference_date(today());
        let mut procedure = CatalogProcedure::unrestricted("04.15.02.006-9", "X", values());
        procedure.occupations = vec!["225270".into()];

        let mut r = record(Sex::Male);
        r.performed = vec![PerformedProcedureLine {
            sequence: 1,
            procedure_code: "04.15.02.006-9".into(),
            description: String::new(),
            diagnosis_codes: vec![],
            participants: vec![ProfessionalParticipation {
                document: "000.000.175-74".into(),
                occupation_code: "225151".into(),
                role: "anestesista".into(),
                facility_id: None,
            }],
        }];
        assert!(!m.evaluate(&r, &procedure).validation.occupation);

        r.performed[0].participants[0].occupation_code = "225270".into();
        let evaluation = m.evaluate(&r, &procedure);
        assert!(evaluation.validation.occupation);
        assert!(evaluation.unverified.is_empty());
    }

    #[test]
    fn empty_catalog_yields_no_candidates() {
        let candidates = matcher().match_record(&record(Sex::Male), &ReferenceCatalog::default());
        assert!(candidates.is_empty());
    }
}
