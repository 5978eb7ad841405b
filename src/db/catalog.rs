use bigdecimal::{BigDecimal, ToPrimitive};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::ProcessingError;
use crate::models::{AgeBound, AgeUnit, CatalogProcedure, ProcedureValues, SexRestriction};
use crate::service::ReferenceCatalog;

/// Procedure row of the active SIGTAP version. Values are stored in centavos.
#[derive(Debug, Clone, FromRow)]
pub struct CatalogRow {
    pub code: String,
    pub description: String,
    pub complexity: Option<String>,
    pub financing: Option<String>,
    pub value_amb: i64,
    pub value_hosp: i64,
    pub value_prof: i64,
    pub gender: Option<String>,
    pub min_age: Option<i32>,
    pub min_age_unit: Option<String>,
    pub max_age: Option<i32>,
    pub max_age_unit: Option<String>,
    pub cbo: Vec<String>,
    pub cid: Vec<String>,
    pub habilitation: Option<String>,
    pub habilitation_group: Vec<String>,
}

impl TryFrom<CatalogRow> for CatalogProcedure {
    type Error = String;

    /// Fails on negative monetary values.
    fn try_from(row: CatalogRow) -> Result<Self, Self::Error> {
        for (column, value) in [
            ("value_amb", row.value_amb),
            ("value_hosp", row.value_hosp),
            ("value_prof", row.value_prof),
        ] {
            if value < 0 {
                return Err(format!("{} {}: negative {} {}", row.code, row.description, column, value));
            }
        }

        let requires_authorization = row
            .habilitation
            .as_deref()
            .is_some_and(|h| !h.trim().is_empty());

        Ok(CatalogProcedure {
            code: row.code,
            description: row.description,
            complexity: row.complexity,
            financing: row.financing,
            values: ProcedureValues {
                ambulatory: row.value_amb,
                hospital: row.value_hosp,
                professional: row.value_prof,
            },
            sex: row.gender.as_deref().map(SexRestriction::parse).unwrap_or_default(),
            min_age: age_bound(row.min_age.and_then(|v| u32::try_from(v).ok()), row.min_age_unit.as_deref()),
            max_age: age_bound(row.max_age.and_then(|v| u32::try_from(v).ok()), row.max_age_unit.as_deref()),
            occupations: row.cbo,
            diagnoses: row.cid,
            requires_authorization,
            authorization_group: row.habilitation_group,
        })
    }
}

/// Zero or absent means no bound.
fn age_bound(value: Option<u32>, unit: Option<&str>) -> Option<AgeBound> {
    let value = value.filter(|v| *v > 0)?;
    Some(AgeBound {
        value,
        unit: unit.map(AgeUnit::parse).unwrap_or_default(),
    })
}

/// Name of the active SIGTAP version, if any.
pub async fn get_active_version(pool: &PgPool) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT version_name
        FROM sigtap_versions
        WHERE is_active = true
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await
}

/// Procedures of the active version, in table order.
pub async fn list_active_procedures(pool: &PgPool) -> Result<Vec<CatalogRow>, sqlx::Error> {
    sqlx::query_as::<_, CatalogRow>(
        r#"
        SELECT p.code,
               p.description,
               p.complexity,
               p.financing,
               coalesce(p.value_amb, 0)::bigint as value_amb,
               coalesce(p.value_hosp, 0)::bigint as value_hosp,
               coalesce(p.value_prof, 0)::bigint as value_prof,
               p.gender,
               p.min_age::int4 as min_age,
               p.min_age_unit,
               p.max_age::int4 as max_age,
               p.max_age_unit,
               coalesce(p.cbo, '{}')::text[] as cbo,
               coalesce(p.cid, '{}')::text[] as cid,
               p.habilitation,
               coalesce(p.habilitation_group, '{}')::text[] as habilitation_group
        FROM sigtap_procedures p
        INNER JOIN sigtap_versions v ON v.id = p.version_id
        WHERE v.is_active = true
        ORDER BY p.id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Load the active version once, as an immutable snapshot.
pub async fn load_active_catalog(pool: &PgPool) -> Result<ReferenceCatalog, ProcessingError> {
    let Some(version) = get_active_version(pool).await? else {
        return Err(ProcessingError::CatalogUnavailable("no active SIGTAP version".to_string()));
    };

    let rows = list_active_procedures(pool).await?;
    tracing::info!("SIGTAP {}: fetched {} procedure rows", version, rows.len());

    let procedures = rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            CatalogProcedure::try_from(row).map_err(|message| ProcessingError::InvalidCatalogRow {
                row: idx + 1,
                message,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ReferenceCatalog::new(Some(version), procedures))
}

/// One line of a catalog CSV export. Values are decimal reais.
#[derive(Debug, Deserialize)]
struct CsvCatalogRow {
    code: String,
    description: String,
    #[serde(default)]
    complexity: String,
    #[serde(default)]
    financing: String,
    #[serde(default)]
    value_amb: String,
    #[serde(default)]
    value_hosp: String,
    #[serde(default)]
    value_prof: String,
    #[serde(default)]
    gender: String,
    #[serde(default)]
    min_age: String,
    #[serde(default)]
    min_age_unit: String,
    #[serde(default)]
    max_age: String,
    #[serde(default)]
    max_age_unit: String,
    #[serde(default)]
    cbo: String,
    #[serde(default)]
    cid: String,
    #[serde(default)]
    habilitation: String,
    #[serde(default)]
    habilitation_group: String,
}

/// Read catalog rows from CSV with a header line. Row numbers in errors are
/// 1-based data rows.
pub fn read_catalog_csv<R: Read>(reader: R) -> Result<Vec<CatalogProcedure>, ProcessingError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut procedures = Vec::new();

    for (idx, result) in reader.deserialize::<CsvCatalogRow>().enumerate() {
        let row_number = idx + 1;
        let row = result?;
        let invalid = |message: String| ProcessingError::InvalidCatalogRow {
            row: row_number,
            message,
        };

        let values = ProcedureValues {
            ambulatory: reais_to_centavos(&row.value_amb).map_err(&invalid)?,
            hospital: reais_to_centavos(&row.value_hosp).map_err(&invalid)?,
            professional: reais_to_centavos(&row.value_prof).map_err(&invalid)?,
        };
        let min_age = parse_age(&row.min_age).map_err(&invalid)?;
        let max_age = parse_age(&row.max_age).map_err(&invalid)?;

        procedures.push(CatalogProcedure {
            code: row.code,
            description: row.description,
            complexity: non_empty(row.complexity),
            financing: non_empty(row.financing),
            values,
            sex: SexRestriction::parse(&row.gender),
            min_age: age_bound(min_age, Some(&row.min_age_unit)),
            max_age: age_bound(max_age, Some(&row.max_age_unit)),
            occupations: split_list(&row.cbo),
            diagnoses: split_list(&row.cid),
            requires_authorization: !row.habilitation.is_empty(),
            authorization_group: split_list(&row.habilitation_group),
        });
    }

    Ok(procedures)
}

pub fn load_catalog_csv(path: &Path, version: Option<String>) -> Result<ReferenceCatalog, ProcessingError> {
    let file = std::fs::File::open(path)?;
    let procedures = read_catalog_csv(file)?;
    tracing::info!("Catalog CSV {}: read {} rows", path.display(), procedures.len());
    Ok(ReferenceCatalog::new(version, procedures))
}

/// Exact decimal conversion: `1234.56` and `1.234,56` both give 123456.
pub fn reais_to_centavos(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else {
        raw.to_string()
    };

    let reais = BigDecimal::from_str(&normalized).map_err(|e| format!("invalid value {raw:?}: {e}"))?;
    let centavos = (reais * BigDecimal::from(100)).round(0);
    match centavos.to_i64() {
        Some(v) if v >= 0 => Ok(v),
        _ => Err(format!("value {raw:?} out of range")),
    }
}

fn parse_age(raw: &str) -> Result<Option<u32>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>()
        .map(Some)
        .map_err(|_| format!("invalid age {raw:?}"))
}

/// `;` or `|` separated code list.
fn split_list(raw: &str) -> Vec<String> {
    raw.split([';', '|'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
