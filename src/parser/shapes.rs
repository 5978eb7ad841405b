//! Value shapes recognised in AIH text and their parsers.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{CareCharacter, Sex};

pub static RECORD_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{12}-\d").unwrap());
pub static RECORD_NUMBER_EXACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{12}-\d$").unwrap());
pub static PROCEDURE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}\.\d{2}\.\d{2}\.\d{3}-\d").unwrap());
pub static PROCEDURE_CODE_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}\.\d{2}\.\d{2}\.\d{3}-\d$").unwrap());
pub static DIAGNOSIS_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]\d{2,3}\b").unwrap());
static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2})/(\d{2})/(\d{4})").unwrap());
static HEALTH_CARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d.\s-]*\d").unwrap());
pub static OCCUPATION_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").unwrap());
static FACILITY_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{7}$").unwrap());
static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s+(.+)$").unwrap());

/// Shape of the value that follows a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// Rest of the value, trimmed
    Text,
    /// DD/MM/YYYY
    Date,
    /// First whitespace-delimited token, whatever its shape
    CodedToken,
    /// First CID-shaped token
    Diagnosis,
    /// Digits, optionally dot- or space-grouped
    HealthCard,
    Sex,
    /// Yes/no flag written as `Sim` or `Não`
    Flag,
    /// `<number> - <name>`
    NumberAndName,
    CareCharacter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Sex(Sex),
    Flag(bool),
    Pair(String, String),
    Care(CareCharacter),
}

impl ValueShape {
    /// Parse a raw label value. `None` when the shape is not found.
    pub fn parse(&self, raw: &str) -> Option<FieldValue> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            ValueShape::Text => Some(FieldValue::Text(raw.to_string())),
            ValueShape::Date => parse_date(raw).map(FieldValue::Date),
            ValueShape::CodedToken => raw
                .split_whitespace()
                .next()
                .map(|token| FieldValue::Text(token.to_string())),
            ValueShape::Diagnosis => DIAGNOSIS_CODE
                .find(raw)
                .map(|m| FieldValue::Text(m.as_str().to_string())),
            ValueShape::HealthCard => HEALTH_CARD
                .find(raw)
                .map(|m| FieldValue::Text(m.as_str().trim().to_string())),
            ValueShape::Sex => Sex::parse(raw).map(FieldValue::Sex),
            ValueShape::Flag => parse_flag(raw).map(FieldValue::Flag),
            ValueShape::NumberAndName => parse_number_and_name(raw),
            ValueShape::CareCharacter => CareCharacter::parse(raw).map(FieldValue::Care),
        }
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let caps = DATE.captures(raw)?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_flag(raw: &str) -> Option<bool> {
    let value = raw.trim_start_matches(':').trim().to_lowercase();
    if value.starts_with("sim") || value == "s" {
        Some(true)
    } else if value.starts_with("não") || value.starts_with("nao") || value == "n" {
        Some(false)
    } else {
        None
    }
}

fn parse_number_and_name(raw: &str) -> Option<FieldValue> {
    let (number, name) = raw.split_once(" - ")?;
    let number = number.trim();
    let name = name.trim();
    if number.is_empty() || name.is_empty() {
        return None;
    }
    Some(FieldValue::Pair(number.to_string(), name.to_string()))
}

/// Digits only.
pub fn strip_punctuation(code: &str) -> String {
    code.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// CID codes are compared without dots, uppercase.
pub fn normalize_diagnosis(code: &str) -> String {
    code.trim().replace('.', "").to_uppercase()
}

pub fn is_record_number(value: &str) -> bool {
    RECORD_NUMBER_EXACT.is_match(value)
}

pub fn is_procedure_code(value: &str) -> bool {
    PROCEDURE_CODE_EXACT.is_match(value)
}

/// Exactly 15 digits once punctuation is stripped.
pub fn is_health_card(value: &str) -> bool {
    let digits = strip_punctuation(value);
    digits.len() == 15
}

/// CNS check: weighted sum (15..1) divisible by 11.
pub fn health_card_checksum_ok(value: &str) -> bool {
    let digits = strip_punctuation(value);
    if digits.len() != 15 {
        return false;
    }
    let sum: u32 = digits
        .chars()
        .zip((1..=15).rev())
        .map(|(c, weight)| c.to_digit(10).unwrap_or(0) * weight)
        .sum();
    sum % 11 == 0
}

/// `(sequence, remainder)` when the line starts with an integer followed by text.
pub fn numbered_line(line: &str) -> Option<(u32, &str)> {
    let caps = NUMBERED_LINE.captures(line)?;
    let sequence = caps.get(1)?.as_str().parse().ok()?;
    Some((sequence, caps.get(2)?.as_str()))
}

/// A participant row has a standalone 6-digit occupation token after the document.
pub fn has_occupation_token(line: &str) -> bool {
    line.split_whitespace().skip(1).any(|t| OCCUPATION_CODE.is_match(t))
}

pub fn is_facility_id(token: &str) -> bool {
    FACILITY_ID.is_match(token)
}
