//! Configuration module for aggreport.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, EnrichmentSettings, LookupSettings, PipelineSettings, SearchSettings,
    Settings, SettingsError, CONFIG_ENV_VAR,
};
