//! Configuration management for the schema compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (cql-schema.toml)
//! - Environment variables (CQL_SCHEMA_*)
//!
//! ## Example config file (cql-schema.toml):
//! ```toml
//! [schema]
//! insensitive = true
//!
//! [compiler]
//! trace_queries = true
//! default_limit = 100
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::compiler::CompilerSettings;
use crate::schema::SchemaOptions;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Options applied to every schema built from configuration
    #[serde(default)]
    pub schema: SchemaOptions,

    /// Query compiler settings
    #[serde(default)]
    pub compiler: CompilerSettings,
}

impl SchemaConfig {
    /// Load configuration from the default locations, then `config_path`
    /// when given
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "cql-schema.toml",
            ".cql-schema.toml",
            "config/cql-schema.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "cql-schema", "cql-schema") {
            let xdg_config = config_dir.config_dir().join("cql-schema.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CQL_SCHEMA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
