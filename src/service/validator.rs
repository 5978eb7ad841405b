use crate::config::ValidationConfig;
use crate::models::{BillingRecord, StructuralError};
use crate::parser::shapes;

/// Structural checks on an extracted record. All rules run; errors are collected.
#[derive(Debug, Clone, Default)]
pub struct StructuralValidator {
    config: ValidationConfig,
}

impl StructuralValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Errors for one record; empty means valid.
    pub fn validate(&self, record: &BillingRecord, record_index: usize) -> Vec<StructuralError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str, value: Option<String>| {
            errors.push(StructuralError {
                record_index,
                field: field.to_string(),
                message: message.to_string(),
                value,
            });
        };

        // 1. record number
        let number = record.record_number.as_deref().unwrap_or_default();
        if !shapes::is_record_number(number) {
            push(
                "record_number",
                "record number missing or not in the 000000000000-0 format",
                record.record_number.clone(),
            );
        }

        // 2. patient name
        let name = record.patient.name.as_deref().unwrap_or_default();
        if name.trim().is_empty() {
            push("patient_name", "patient name is required", record.patient.name.clone());
        }

        // 3. principal procedure
        let primary = record.primary_procedure.as_deref().unwrap_or_default();
        if !shapes::is_procedure_code(primary) {
            push(
                "primary_procedure",
                "primary procedure code missing or not in the 00.00.00.000-0 format",
                record.primary_procedure.clone(),
            );
        }

        // 4. dates
        if let (Some(admission), Some(discharge)) = (record.admission_date, record.discharge_date) {
            if admission > discharge {
                push(
                    "dates",
                    "admission date is after discharge date",
                    Some(format!(
                        "{} > {}",
                        admission.format("%d/%m/%Y"),
                        discharge.format("%d/%m/%Y")
                    )),
                );
            }
        }

        // 5. health cards
        for (field, card) in record.provider_cards() {
            let Some(card) = card else { continue };
            if !shapes::is_health_card(card) {
                push(field, "health card number must have exactly 15 digits", Some(card.to_string()));
            } else if self.config.strict_health_card_checksum && !shapes::health_card_checksum_ok(card) {
                push(field, "health card number fails the check digit", Some(card.to_string()));
            }
        }

        errors
    }
}
