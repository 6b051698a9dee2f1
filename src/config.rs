//! Process configuration, read once from the environment (after `.env`).
//!
//! Built by the binaries and passed down to constructors; nothing in the
//! library reads the environment on its own.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::transform::ApiFormat;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_API_BASE_URL: &str = "FUEL_API_BASE_URL";
pub const ENV_API_FORMAT: &str = "FUEL_API_FORMAT";
pub const ENV_DEPARTMENTS: &str = "ETL_DEPARTMENTS";
pub const ENV_PAGE_SIZE: &str = "FUEL_API_PAGE_SIZE";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "FUEL_API_TIMEOUT_SECS";
pub const ENV_BACKOFF_MS: &str = "FUEL_API_BACKOFF_MS";
pub const ENV_MAX_RATE_LIMIT_RETRIES: &str = "FUEL_API_MAX_RATE_LIMIT_RETRIES";
pub const ENV_UNIT_PACING_MS: &str = "ETL_UNIT_PACING_MS";
pub const ENV_WORKERS: &str = "ETL_WORKERS";
pub const ENV_LOAD_RETRIES: &str = "ETL_LOAD_RETRIES";
pub const ENV_ARCHIVE_DIR: &str = "ARCHIVE_DIR";
pub const ENV_ARCHIVE_BATCH_SIZE: &str = "ARCHIVE_BATCH_SIZE";
pub const ENV_ARCHIVE_BASE_URL: &str = "ARCHIVE_BASE_URL";

pub const DEFAULT_API_BASE_URL: &str = "https://data.economie.gouv.fr/api/explore/v2.1/catalog/datasets/prix-des-carburants-en-france-flux-instantane-v2/records";
pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://donnees.roulez-eco.fr/opendata/annee";
pub const DEFAULT_DEPARTMENTS: &str = "35";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BACKOFF_MS: u64 = 2000;
pub const DEFAULT_UNIT_PACING_MS: u64 = 500;
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_LOAD_RETRIES: u32 = 1;
pub const DEFAULT_ARCHIVE_DIR: &str = "data/raw";
pub const DEFAULT_ARCHIVE_BATCH_SIZE: usize = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Remote price API settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub format: ApiFormat,
    pub page_size: u32,
    pub request_timeout: Duration,
    pub rate_limit_backoff: Duration,
    /// `None` retries a rate-limited page until it goes through
    pub max_rate_limit_retries: Option<u32>,
}

/// Yearly archive settings
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub dir: PathBuf,
    pub batch_size: usize,
    pub base_url: String,
}

/// Orchestration settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub departments: Vec<String>,
    pub unit_pacing: Duration,
    pub workers: usize,
    pub load_retries: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api: ApiConfig,
    pub archive: ArchiveConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(ENV_DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_DATABASE_URL))?;

        let api = ApiConfig {
            base_url: lookup(ENV_API_BASE_URL).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            format: parse_or(&lookup, ENV_API_FORMAT, ApiFormat::V2)?,
            page_size: positive(ENV_PAGE_SIZE, parse_or(&lookup, ENV_PAGE_SIZE, DEFAULT_PAGE_SIZE)?)?,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                ENV_REQUEST_TIMEOUT_SECS,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            rate_limit_backoff: Duration::from_millis(parse_or(
                &lookup,
                ENV_BACKOFF_MS,
                DEFAULT_BACKOFF_MS,
            )?),
            max_rate_limit_retries: parse_opt(&lookup, ENV_MAX_RATE_LIMIT_RETRIES)?,
        };

        let archive = ArchiveConfig::from_lookup(&lookup)?;

        let departments = parse_departments(
            &lookup(ENV_DEPARTMENTS).unwrap_or_else(|| DEFAULT_DEPARTMENTS.to_string()),
        );

        let pipeline = PipelineConfig {
            departments,
            unit_pacing: Duration::from_millis(parse_or(
                &lookup,
                ENV_UNIT_PACING_MS,
                DEFAULT_UNIT_PACING_MS,
            )?),
            workers: positive(ENV_WORKERS, parse_or(&lookup, ENV_WORKERS, DEFAULT_WORKERS)?)?,
            load_retries: parse_or(&lookup, ENV_LOAD_RETRIES, DEFAULT_LOAD_RETRIES)?,
        };

        Ok(Self {
            database_url,
            api,
            archive,
            pipeline,
        })
    }
}

impl ArchiveConfig {
    /// Archive settings alone; downloading needs no database
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            dir: lookup(ENV_ARCHIVE_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_DIR)),
            batch_size: positive(
                ENV_ARCHIVE_BATCH_SIZE,
                parse_or(lookup, ENV_ARCHIVE_BATCH_SIZE, DEFAULT_ARCHIVE_BATCH_SIZE)?,
            )?,
            base_url: lookup(ENV_ARCHIVE_BASE_URL)
                .unwrap_or_else(|| DEFAULT_ARCHIVE_BASE_URL.to_string()),
        })
    }
}

/// Split a comma separated department list, dropping blanks and repeats
pub fn parse_departments(raw: &str) -> Vec<String> {
    let mut departments: Vec<String> = Vec::new();
    for code in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if !departments.iter().any(|d| d == code) {
            departments.push(code.to_string());
        }
    }
    departments
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn parse_opt<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value,
                reason: e.to_string(),
            }),
    }
}

fn positive<T>(key: &'static str, value: T) -> Result<T, ConfigError>
where
    T: Copy + Default + PartialOrd + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[(ENV_DATABASE_URL, "postgres://localhost/fuel")]))
            .unwrap();

        assert_eq!(config.api.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.api.format, ApiFormat::V2);
        assert_eq!(config.api.rate_limit_backoff, Duration::from_millis(DEFAULT_BACKOFF_MS));
        assert!(config.api.max_rate_limit_retries.is_none());
        assert_eq!(config.archive.batch_size, DEFAULT_ARCHIVE_BATCH_SIZE);
        assert_eq!(config.pipeline.departments, vec!["35".to_string()]);
        assert_eq!(config.pipeline.workers, 1);
    }

    #[test]
    fn test_missing_database_url() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_DATABASE_URL)));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_DATABASE_URL, "postgres://localhost/fuel"),
            (ENV_API_FORMAT, "v1"),
            (ENV_DEPARTMENTS, "35, 22,35,,56"),
            (ENV_MAX_RATE_LIMIT_RETRIES, "5"),
            (ENV_ARCHIVE_BATCH_SIZE, "250"),
        ]))
        .unwrap();

        assert_eq!(config.api.format, ApiFormat::V1);
        assert_eq!(config.pipeline.departments, vec!["35", "22", "56"]);
        assert_eq!(config.api.max_rate_limit_retries, Some(5));
        assert_eq!(config.archive.batch_size, 250);
    }

    #[test]
    fn test_archive_settings_without_database() {
        let archive = ArchiveConfig::from_lookup(&lookup(&[(ENV_ARCHIVE_DIR, "/tmp/archives")]))
            .unwrap();
        assert_eq!(archive.dir, PathBuf::from("/tmp/archives"));
        assert_eq!(archive.base_url, DEFAULT_ARCHIVE_BASE_URL);
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[
            (ENV_DATABASE_URL, "postgres://localhost/fuel"),
            (ENV_PAGE_SIZE, "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(ENV_PAGE_SIZE));

        let err = Config::from_lookup(lookup(&[
            (ENV_DATABASE_URL, "postgres://localhost/fuel"),
            (ENV_ARCHIVE_BATCH_SIZE, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_ARCHIVE_BATCH_SIZE, .. }));
    }
}
