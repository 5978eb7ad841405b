use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Patient sex as declared on the AIH. Closed two-value domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    /// Accepts `Masculino`/`M` and `Feminino`/`F`, case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().to_lowercase();
        match value.as_str() {
            "m" | "masculino" => Some(Sex::Male),
            "f" | "feminino" => Some(Sex::Female),
            _ => None,
        }
    }
}

/// Care character, normalised to its two codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CareCharacter {
    /// Source value `1 - Eletivo`
    Elective,
    /// Source value `2 - Urgência`
    Urgent,
}

impl CareCharacter {
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().to_lowercase();
        if value.is_empty() {
            return None;
        }
        let code = value.split([' ', '-']).next().unwrap_or_default();
        if code == "2" || code == "02" || value.contains("urg") || value.contains("emerg") {
            return Some(CareCharacter::Urgent);
        }
        if code == "1" || code == "01" || value.contains("eletiv") {
            return Some(CareCharacter::Elective);
        }
        None
    }

    pub fn code(&self) -> &'static str {
        match self {
            CareCharacter::Elective => "1",
            CareCharacter::Urgent => "2",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// Patient identity block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub chart_number: Option<String>,
    pub name: Option<String>,
    pub cns: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub nationality: Option<String>,
    pub guardian_name: Option<String>,
    pub mother_name: Option<String>,
    pub address: Address,
    pub phone: Option<String>,
}

/// One professional row under a performed procedure line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalParticipation {
    pub document: String,
    pub occupation_code: String,
    pub role: String,
    pub facility_id: Option<String>,
}

/// Procedimento realizado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformedProcedureLine {
    pub sequence: u32,
    pub procedure_code: String,
    pub description: String,
    /// CID-shaped codes referenced in the line text
    pub diagnosis_codes: Vec<String>,
    pub participants: Vec<ProfessionalParticipation>,
}

/// One AIH billing episode.
///
/// Built by the field extractor with every field optional; the structural
/// validator decides whether the record is usable for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub record_number: Option<String>,
    pub situation: Option<String>,
    pub record_type: Option<String>,
    pub authorization_date: Option<NaiveDate>,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
    pub discharge_reason: Option<String>,
    pub authorizer_cns: Option<String>,
    pub requester_cns: Option<String>,
    pub responsible_cns: Option<String>,
    pub patient: Patient,
    pub requested_procedure: Option<String>,
    pub procedure_changed: Option<bool>,
    pub primary_procedure: Option<String>,
    pub primary_diagnosis: Option<String>,
    pub secondary_diagnosis: Option<String>,
    pub specialty: Option<String>,
    pub modality: Option<String>,
    pub care_character: Option<CareCharacter>,
    pub performed: Vec<PerformedProcedureLine>,
}

impl BillingRecord {
    /// Display key used in logs and reports.
    pub fn key(&self) -> &str {
        self.record_number.as_deref().unwrap_or("<sem número>")
    }

    /// Primary performed code followed by every performed line code, in
    /// document order. Empty codes are skipped; repeats are kept.
    pub fn procedure_codes(&self) -> Vec<&str> {
        let mut codes = Vec::with_capacity(self.performed.len() + 1);
        if let Some(primary) = self.primary_procedure.as_deref() {
            if !primary.is_empty() {
                codes.push(primary);
            }
        }
        for line in &self.performed {
            if !line.procedure_code.is_empty() {
                codes.push(line.procedure_code.as_str());
            }
        }
        codes
    }

    /// Primary and secondary diagnosis plus codes referenced by performed lines.
    pub fn diagnosis_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = Vec::new();
        for code in [self.primary_diagnosis.as_deref(), self.secondary_diagnosis.as_deref()]
            .into_iter()
            .flatten()
        {
            codes.push(code);
        }
        for line in &self.performed {
            codes.extend(line.diagnosis_codes.iter().map(String::as_str));
        }
        codes
    }

    /// Occupation codes of every participant on every performed line.
    pub fn occupation_codes(&self) -> Vec<&str> {
        self.performed
            .iter()
            .flat_map(|line| line.participants.iter())
            .map(|p| p.occupation_code.as_str())
            .collect()
    }

    /// Health-card identifiers checked by the structural validator.
    pub fn provider_cards(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("authorizer_cns", self.authorizer_cns.as_deref()),
            ("requester_cns", self.requester_cns.as_deref()),
            ("responsible_cns", self.responsible_cns.as_deref()),
        ]
    }
}
