//! Label-anchored field extraction.
//!
//! Every field is one `(label, shape, target)` row; one routine walks the
//! table over the block lines. Field order in the source does not matter.

use crate::models::BillingRecord;
use crate::parser::procedures;
use crate::parser::shapes::{FieldValue, ValueShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    RecordNumber,
    Situation,
    RecordType,
    AuthorizationDate,
    AdmissionDate,
    DischargeDate,
    DischargeReason,
    AuthorizerCns,
    RequesterCns,
    ResponsibleCns,
    ChartAndPatientName,
    PatientCns,
    BirthDate,
    Sex,
    Nationality,
    GuardianName,
    MotherName,
    Street,
    StreetNumber,
    Neighborhood,
    Municipality,
    State,
    PostalCode,
    Phone,
    RequestedProcedure,
    ProcedureChanged,
    PrimaryProcedure,
    PrimaryDiagnosis,
    SecondaryDiagnosis,
    Specialty,
    Modality,
    CareCharacter,
}

pub struct FieldRule {
    pub label: &'static str,
    pub shape: ValueShape,
    pub target: Target,
}

const fn rule(label: &'static str, shape: ValueShape, target: Target) -> FieldRule {
    FieldRule {
        label,
        shape,
        target,
    }
}

pub static FIELD_RULES: &[FieldRule] = &[
    // header
    rule("Número da AIH:", ValueShape::CodedToken, Target::RecordNumber),
    rule("Situação:", ValueShape::Text, Target::Situation),
    rule("Tipo:", ValueShape::Text, Target::RecordType),
    rule("Data autorização:", ValueShape::Date, Target::AuthorizationDate),
    // record data
    rule("Data início:", ValueShape::Date, Target::AdmissionDate),
    rule("Data fim:", ValueShape::Date, Target::DischargeDate),
    rule("Motivo encerramento:", ValueShape::Text, Target::DischargeReason),
    rule("CNS autorizador:", ValueShape::HealthCard, Target::AuthorizerCns),
    rule("CNS solicitante:", ValueShape::HealthCard, Target::RequesterCns),
    rule("CNS responsável:", ValueShape::HealthCard, Target::ResponsibleCns),
    // patient
    rule("Prontuário:", ValueShape::NumberAndName, Target::ChartAndPatientName),
    rule("CNS:", ValueShape::HealthCard, Target::PatientCns),
    rule("Nascimento:", ValueShape::Date, Target::BirthDate),
    rule("Sexo:", ValueShape::Sex, Target::Sex),
    rule("Nacionalidade:", ValueShape::Text, Target::Nationality),
    rule("Nome responsável:", ValueShape::Text, Target::GuardianName),
    rule("Nome mãe:", ValueShape::Text, Target::MotherName),
    rule("Endereço:", ValueShape::Text, Target::Street),
    rule("Nº:", ValueShape::Text, Target::StreetNumber),
    rule("Bairro:", ValueShape::Text, Target::Neighborhood),
    rule("Município:", ValueShape::Text, Target::Municipality),
    rule("UF:", ValueShape::Text, Target::State),
    rule("CEP:", ValueShape::Text, Target::PostalCode),
    rule("Telefone:", ValueShape::Text, Target::Phone),
    // admission
    rule("Procedimento solicitado:", ValueShape::CodedToken, Target::RequestedProcedure),
    rule("Mudança de proc.?", ValueShape::Flag, Target::ProcedureChanged),
    rule("Procedimento principal:", ValueShape::CodedToken, Target::PrimaryProcedure),
    rule("CID principal:", ValueShape::Diagnosis, Target::PrimaryDiagnosis),
    rule("CID secundário:", ValueShape::Diagnosis, Target::SecondaryDiagnosis),
    rule("Especialidade:", ValueShape::Text, Target::Specialty),
    rule("Modalidade:", ValueShape::Text, Target::Modality),
    rule("Caráter atendimento:", ValueShape::CareCharacter, Target::CareCharacter),
];

/// Result of extracting one block.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: BillingRecord,
    /// Labels that were absent or whose value did not have the expected shape
    pub missing: Vec<&'static str>,
}

/// Build a record from one text block. Never fails: absent fields stay unset.
pub fn extract_record(block: &str) -> Extraction {
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut record = BillingRecord::default();
    let mut missing = Vec::new();

    for rule in FIELD_RULES {
        let value = lines
            .iter()
            .filter_map(|line| label_value(line, rule.label))
            .find_map(|raw| rule.shape.parse(raw));

        match value {
            Some(value) => assign(&mut record, rule.target, value),
            None => missing.push(rule.label),
        }
    }

    record.performed = procedures::parse_performed(&lines);

    if !missing.is_empty() {
        tracing::debug!(
            "AIH {}: {} labels not found: {:?}",
            record.key(),
            missing.len(),
            missing
        );
    }

    Extraction { record, missing }
}

/// Text following `label` on `line`, cut where the next known label starts.
fn label_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let start = line.find(label)? + label.len();
    let rest = &line[start..];
    let end = FIELD_RULES
        .iter()
        .filter(|r| r.label != label)
        .filter_map(|r| rest.find(r.label))
        .min()
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn assign(record: &mut BillingRecord, target: Target, value: FieldValue) {
    let patient = &mut record.patient;
    match (target, value) {
        (Target::AuthorizationDate, FieldValue::Date(d)) => record.authorization_date = Some(d),
        (Target::AdmissionDate, FieldValue::Date(d)) => record.admission_date = Some(d),
        (Target::DischargeDate, FieldValue::Date(d)) => record.discharge_date = Some(d),
        (Target::BirthDate, FieldValue::Date(d)) => patient.birth_date = Some(d),
        (Target::Sex, FieldValue::Sex(s)) => patient.sex = Some(s),
        (Target::ProcedureChanged, FieldValue::Flag(f)) => record.procedure_changed = Some(f),
        (Target::CareCharacter, FieldValue::Care(c)) => record.care_character = Some(c),
        (Target::ChartAndPatientName, FieldValue::Pair(chart, name)) => {
            patient.chart_number = Some(chart);
            patient.name = Some(name);
        }
        (target, FieldValue::Text(text)) => {
            let slot = match target {
                Target::RecordNumber => &mut record.record_number,
                Target::Situation => &mut record.situation,
                Target::RecordType => &mut record.record_type,
                Target::DischargeReason => &mut record.discharge_reason,
                Target::AuthorizerCns => &mut record.authorizer_cns,
                Target::RequesterCns => &mut record.requester_cns,
                Target::ResponsibleCns => &mut record.responsible_cns,
                Target::PatientCns => &mut patient.cns,
                Target::Nationality => &mut patient.nationality,
                Target::GuardianName => &mut patient.guardian_name,
                Target::MotherName => &mut patient.mother_name,
                Target::Street => &mut patient.address.street,
                Target::StreetNumber => &mut patient.address.number,
                Target::Neighborhood => &mut patient.address.neighborhood,
                Target::Municipality => &mut patient.address.municipality,
                Target::State => &mut patient.address.state,
                Target::PostalCode => &mut patient.address.postal_code,
                Target::Phone => &mut patient.phone,
                Target::RequestedProcedure => &mut record.requested_procedure,
                Target::PrimaryProcedure => &mut record.primary_procedure,
                Target::PrimaryDiagnosis => &mut record.primary_diagnosis,
                Target::SecondaryDiagnosis => &mut record.secondary_diagnosis,
                Target::Specialty => &mut record.specialty,
                Target::Modality => &mut record.modality,
                other => {
                    tracing::warn!("text value has no slot for {:?}", other);
                    return;
                }
            };
            *slot = Some(text);
        }
        (target, value) => {
            tracing::warn!("value {:?} does not fit {:?}", value, target);
        }
    }
}
