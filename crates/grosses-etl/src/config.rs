// Configuration loading and parsing (etl.toml, optional seasons.toml).

use grosses_core::{SeasonTable, SeasonTableError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::db::is_sql_identifier;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid season table {path}: {source}")]
    SeasonError {
        path: PathBuf,
        source: SeasonTableError,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub throttle: ThrottleConfig,
    pub database: DatabaseConfig,
    pub seasons: SeasonTable,
}

// ---------------------------------------------------------------------------
// etl.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire etl.toml file.
#[derive(Debug, Clone, Deserialize)]
struct EtlFile {
    source: SourceConfig,
    throttle: ThrottleConfig,
    database: DatabaseConfig,
}

/// Where weekly reports are fetched from.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

/// Bounds of the random pause between fetches, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    pub min_secs: f64,
    pub max_secs: f64,
}

/// Destination store. `table` is interpolated into SQL and must be a plain
/// identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub table: String,
}

/// Placeholder path reported for errors in the built-in season table.
const BUNDLED_SEASONS: &str = "<bundled seasons.toml>";

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/etl.toml` and (optionally)
/// `config/seasons.toml`, both relative to `base_dir`. Without a
/// seasons.toml the season table bundled with grosses-core is used.
///
/// Does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- etl.toml (required) ---
    let etl_path = config_dir.join("etl.toml");
    let etl_text = read_file(&etl_path)?;
    let etl_file: EtlFile = toml::from_str(&etl_text).map_err(|e| ConfigError::ParseError {
        path: etl_path.clone(),
        source: e,
    })?;

    // --- seasons.toml (optional) ---
    let seasons_path = config_dir.join("seasons.toml");
    let seasons = if seasons_path.exists() {
        let text = read_file(&seasons_path)?;
        SeasonTable::from_toml(&text).map_err(|e| ConfigError::SeasonError {
            path: seasons_path.clone(),
            source: e,
        })?
    } else {
        SeasonTable::bundled().map_err(|e| ConfigError::SeasonError {
            path: PathBuf::from(BUNDLED_SEASONS),
            source: e,
        })?
    };

    let config = Config {
        source: etl_file.source,
        throttle: etl_file.throttle,
        database: etl_file.database,
        seasons,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` with every file from `defaults/` it does not have yet.
/// Existing files are never overwritten and `*.example` files are skipped.
/// Returns the files that were created.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(vec![])
        } else {
            Err(seed_error(format!(
                "neither defaults/ nor config/ directory found in {}; \
                 pass --config-dir or run from the crate root",
                base_dir.display()
            )))
        };
    }

    fs::create_dir_all(&config_dir)
        .map_err(|e| seed_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let entries = fs::read_dir(&defaults_dir)
        .map_err(|e| seed_error(format!("cannot list {}: {e}", defaults_dir.display())))?;

    let mut copied = Vec::new();
    for entry in entries {
        let source = entry
            .map_err(|e| seed_error(format!("cannot read defaults entry: {e}")))?
            .path();
        let Some(name) = source.file_name().filter(|_| source.is_file()) else {
            continue;
        };
        if Path::new(name).extension().is_some_and(|ext| ext == "example") {
            continue;
        }

        let target = config_dir.join(name);
        if target.exists() {
            continue;
        }
        fs::copy(&source, &target).map_err(|e| {
            seed_error(format!(
                "cannot copy {} to {}: {e}",
                source.display(),
                target.display()
            ))
        })?;
        info!(path = %target.display(), "seeded config file from defaults");
        copied.push(target);
    }

    copied.sort();
    Ok(copied)
}

/// Copy any missing defaults into `base_dir/config`, then load from there.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn seed_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let source = &config.source;
    if !(source.base_url.starts_with("http://") || source.base_url.starts_with("https://")) {
        return Err(invalid(
            "source.base_url",
            format!("must be an http(s) URL, got `{}`", source.base_url),
        ));
    }
    if source.user_agent.trim().is_empty() {
        return Err(invalid("source.user_agent", "must not be empty"));
    }
    if source.timeout_secs == 0 {
        return Err(invalid("source.timeout_secs", "must be > 0"));
    }

    let throttle = &config.throttle;
    for (name, val) in [
        ("throttle.min_secs", throttle.min_secs),
        ("throttle.max_secs", throttle.max_secs),
    ] {
        if !val.is_finite() || val < 0.0 {
            return Err(invalid(name, format!("must be a finite number >= 0, got {val}")));
        }
    }
    if throttle.min_secs > throttle.max_secs {
        return Err(invalid(
            "throttle.min_secs",
            format!(
                "must not exceed throttle.max_secs ({} > {})",
                throttle.min_secs, throttle.max_secs
            ),
        ));
    }

    if config.database.path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }
    if !is_sql_identifier(&config.database.table) {
        return Err(invalid(
            "database.table",
            format!(
                "must be a plain SQL identifier (letters, digits, underscore), got `{}`",
                config.database.table
            ),
        ));
    }

    if config.seasons.tracked().next().is_none() {
        return Err(invalid("seasons", "at least one tracked season is required"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
