use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application configuration.
///
/// Layered: struct defaults, then `config/aih-matcher.toml` when present, then
/// `AIH__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub matching: MatchingConfig,
    pub validation: ValidationConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres holding the SIGTAP versions; catalog is read from CSV when unset
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub slow_statement_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 20,
            acquire_timeout_secs: 10,
            slow_statement_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub csv_path: Option<String>,
    pub version: Option<String>,
}

/// Points awarded per passing criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub sex: u32,
    pub age: u32,
    pub diagnosis: u32,
    pub authorization: u32,
    pub occupation: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            sex: 10,
            age: 15,
            diagnosis: 20,
            authorization: 25,
            occupation: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Candidates scoring below this are dropped
    pub min_score_threshold: u32,
    pub approval_threshold: u32,
    pub weights: ScoringWeights,
    pub exact_match_bonus: u32,
    pub max_similar_per_code: usize,
    pub max_alternatives: usize,
    /// Confidence of a similar match as a percentage of its score
    pub similar_confidence_percent: u32,
    /// Placeholder unit value (centavos) for the declared original value
    pub declared_unit_baseline: i64,
    pub cross_check_occupations: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_score_threshold: 70,
            approval_threshold: 90,
            weights: ScoringWeights::default(),
            exact_match_bonus: 15,
            max_similar_per_code: 5,
            max_alternatives: 3,
            similar_confidence_percent: 90,
            declared_unit_baseline: 0,
            cross_check_occupations: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub strict_health_card_checksum: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub parallel: bool,
}

impl AppConfig {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/aih-matcher")
    }

    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        Self::layered(file, environment())
    }

    /// Defaults, then the optional file, then `env` on top.
    fn layered(file: &str, env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}

/// `AIH__SECTION__KEY` variables, e.g. `AIH__MATCHING__MIN_SCORE_THRESHOLD`.
fn environment() -> Environment {
    Environment::with_prefix("AIH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
