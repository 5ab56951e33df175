//! Configuration module for Quarry.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CacheSettings, EngineSettings, FormatSettings, Settings, SettingsError,
    SourceDriver, SourceSettings, TemplateSettings,
};
