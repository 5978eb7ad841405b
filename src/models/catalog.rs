use serde::{Deserialize, Serialize};

use crate::models::Sex;

/// Sex restriction of a SIGTAP procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SexRestriction {
    #[default]
    Any,
    Male,
    Female,
}

impl SexRestriction {
    /// `Masculino`, `Feminino`, `Ambos`, `I` (indiferente) or empty.
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim().to_lowercase();
        if value == "m" || value.contains("masculino") {
            SexRestriction::Male
        } else if value == "f" || value.contains("feminino") {
            SexRestriction::Female
        } else {
            SexRestriction::Any
        }
    }

    pub fn allows(&self, sex: Option<Sex>) -> bool {
        match self {
            SexRestriction::Any => true,
            SexRestriction::Male => sex == Some(Sex::Male),
            SexRestriction::Female => sex == Some(Sex::Female),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgeUnit {
    #[default]
    Years,
    Months,
    Days,
}

impl AgeUnit {
    /// `anos`, `meses`, `dias`; anything else is read as years.
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim().to_lowercase();
        if value.starts_with("mes") || value.starts_with("mês") {
            AgeUnit::Months
        } else if value.starts_with("dia") {
            AgeUnit::Days
        } else {
            AgeUnit::Years
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBound {
    pub value: u32,
    pub unit: AgeUnit,
}

impl AgeBound {
    pub fn years(value: u32) -> Self {
        Self {
            value,
            unit: AgeUnit::Years,
        }
    }
}

/// Value components of a procedure, in centavos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcedureValues {
    pub ambulatory: i64,
    pub hospital: i64,
    pub professional: i64,
}

impl ProcedureValues {
    pub fn total(&self) -> i64 {
        self.ambulatory + self.hospital + self.professional
    }
}

/// One row of the SIGTAP reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProcedure {
    pub code: String,
    pub description: String,
    pub complexity: Option<String>,
    pub financing: Option<String>,
    pub values: ProcedureValues,
    pub sex: SexRestriction,
    pub min_age: Option<AgeBound>,
    pub max_age: Option<AgeBound>,
    /// Permitted CBO codes; empty means unrestricted
    pub occupations: Vec<String>,
    /// Permitted CID codes; empty means unrestricted
    pub diagnoses: Vec<String>,
    pub requires_authorization: bool,
    pub authorization_group: Vec<String>,
}

impl CatalogProcedure {
    /// Row with no demographic or eligibility restriction.
    pub fn unrestricted(code: &str, description: &str, values: ProcedureValues) -> Self {
        Self {
            code: code.to_string(),
            description: description.to_string(),
            complexity: None,
            financing: None,
            values,
            sex: SexRestriction::Any,
            min_age: None,
            max_age: None,
            occupations: Vec::new(),
            diagnoses: Vec::new(),
            requires_authorization: false,
            authorization_group: Vec::new(),
        }
    }

    pub fn has_age_bounds(&self) -> bool {
        self.min_age.is_some() || self.max_age.is_some()
    }
}
