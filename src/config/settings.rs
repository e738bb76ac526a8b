//! TOML-based configuration for aggreport.
//!
//! Supports a config file (aggreport.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [search]
//! server = "${ES_HOST}"
//! port = 9200
//! index = "trials"
//! timeout_secs = 30
//!
//! [enrichment]
//! concurrency = 8
//!
//! [lookup]
//! path = "./data/pdq_ncit.csv"
//! source_id_column = 0
//! concept_code_column = 8
//!
//! [pipeline]
//! deadline_secs = 600
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::enrich::DEFAULT_CONCURRENCY;
use crate::lookup::LookupLayout;
use crate::pipeline::PipelineOptions;
use crate::search::DEFAULT_TIMEOUT_SECS;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AGGREPORT_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Search backend connection.
    pub search: SearchSettings,

    /// Per-row count enrichment.
    pub enrichment: EnrichmentSettings,

    /// Cross-reference lookup file.
    pub lookup: LookupSettings,

    /// Whole-run limits.
    pub pipeline: PipelineSettings,
}

/// Search backend connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Host name, or a full base URL with scheme (supports ${ENV_VAR} expansion).
    pub server: String,

    /// Node port, ignored when `server` already carries a scheme.
    pub port: u16,

    /// Index or alias to query.
    pub index: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            server: "elasticsearch".to_string(),
            port: 9200,
            index: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SearchSettings {
    /// Base URL of the backend with environment variables expanded.
    pub fn resolved_url(&self) -> Result<String, SettingsError> {
        let server = expand_env_vars(&self.server)?;
        if server.contains("://") {
            Ok(server.trim_end_matches('/').to_string())
        } else {
            Ok(format!("http://{}:{}", server, self.port))
        }
    }

    /// Index name with environment variables expanded.
    pub fn resolved_index(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.index)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-row count enrichment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    /// Rows enriched at once.
    pub concurrency: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Cross-reference lookup file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupSettings {
    /// Path to the mapping file (supports ${ENV_VAR} expansion).
    pub path: Option<String>,

    /// Column holding the PDQ id.
    pub source_id_column: usize,

    /// Column holding the NCIt concept code.
    pub concept_code_column: usize,

    /// Single-byte field delimiter.
    pub delimiter: char,
}

impl Default for LookupSettings {
    fn default() -> Self {
        let layout = LookupLayout::default();
        Self {
            path: None,
            source_id_column: layout.source_id_column,
            concept_code_column: layout.concept_code_column,
            delimiter: char::from(layout.delimiter),
        }
    }
}

impl LookupSettings {
    /// Mapping file path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }

    /// Column layout of the mapping file.
    pub fn layout(&self) -> Result<LookupLayout, SettingsError> {
        let delimiter = u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                SettingsError::InvalidConfig(format!(
                    "lookup delimiter must be a single ASCII character, got {:?}",
                    self.delimiter
                ))
            })?;

        Ok(LookupLayout {
            source_id_column: self.source_id_column,
            concept_code_column: self.concept_code_column,
            delimiter,
        })
    }
}

/// Whole-run limits.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Budget in seconds for all backend calls of one run.
    pub deadline_secs: Option<u64>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `AGGREPORT_CONFIG`
    /// 2. `./aggreport.toml`
    /// 3. `~/.config/aggreport/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("aggreport.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("aggreport").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Check values that would make a run fail later.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.search.index.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "search.index must be set".to_string(),
            ));
        }
        if self.search.server.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "search.server must be set".to_string(),
            ));
        }
        if self.enrichment.concurrency == 0 {
            return Err(SettingsError::InvalidConfig(
                "enrichment.concurrency must be at least 1".to_string(),
            ));
        }
        self.lookup.layout()?;
        Ok(())
    }

    /// Pipeline options derived from these settings.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            concurrency: self.enrichment.concurrency,
            deadline: self.pipeline.deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name = if chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // lone $
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
