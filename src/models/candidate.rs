use serde::{Deserialize, Serialize};

use crate::models::ProcedureValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Similar,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Similar => "similar",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Approved,
    Pending,
    Rejected,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Approved => "approved",
            MatchStatus::Pending => "pending",
            MatchStatus::Rejected => "rejected",
        }
    }
}

/// The five scoring criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Sex,
    Age,
    Diagnosis,
    Authorization,
    Occupation,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::Sex,
        Criterion::Age,
        Criterion::Diagnosis,
        Criterion::Authorization,
        Criterion::Occupation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Sex => "sex",
            Criterion::Age => "age",
            Criterion::Diagnosis => "diagnosis",
            Criterion::Authorization => "authorization",
            Criterion::Occupation => "occupation",
        }
    }

    /// Sex and age failures disqualify; the others only warn.
    pub fn is_hard(&self) -> bool {
        matches!(self, Criterion::Sex | Criterion::Age)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResults {
    pub sex: bool,
    pub age: bool,
    pub diagnosis: bool,
    pub authorization: bool,
    pub occupation: bool,
}

impl ValidationResults {
    pub fn get(&self, criterion: Criterion) -> bool {
        match criterion {
            Criterion::Sex => self.sex,
            Criterion::Age => self.age,
            Criterion::Diagnosis => self.diagnosis,
            Criterion::Authorization => self.authorization,
            Criterion::Occupation => self.occupation,
        }
    }

    pub fn set(&mut self, criterion: Criterion, passed: bool) {
        match criterion {
            Criterion::Sex => self.sex = passed,
            Criterion::Age => self.age = passed,
            Criterion::Diagnosis => self.diagnosis = passed,
            Criterion::Authorization => self.authorization = passed,
            Criterion::Occupation => self.occupation = passed,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = Criterion> + '_ {
        Criterion::ALL.into_iter().filter(|c| !self.get(*c))
    }
}

/// Candidate values copied from the catalog row, plus their total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidateValues {
    pub ambulatory: i64,
    pub hospital: i64,
    pub professional: i64,
    pub total: i64,
}

impl From<ProcedureValues> for CandidateValues {
    fn from(values: ProcedureValues) -> Self {
        Self {
            ambulatory: values.ambulatory,
            hospital: values.hospital,
            professional: values.professional,
            total: values.total(),
        }
    }
}

/// A billed procedure code paired with one catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub record_number: String,
    /// Code as billed on the AIH
    pub billed_code: String,
    pub catalog_code: String,
    pub description: String,
    pub match_type: MatchType,
    pub validation: ValidationResults,
    /// Criteria that passed only because the data to check them is missing
    pub unverified_checks: Vec<Criterion>,
    pub score: u32,
    pub confidence: u32,
    pub values: CandidateValues,
    pub status: MatchStatus,
}
