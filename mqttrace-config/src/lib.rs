//! # mqttrace Configuration System
//!
//! Layered configuration for instrumented MQTT clients.
//!
//! ## Features
//! - **Unified Configuration**: one document for client, analytics and telemetry settings
//! - **Validation**: runtime validation of every section before use
//! - **Environment Awareness**: per-environment override files and `MQTTRACE_*` variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod analytics;
mod client;
mod error;
mod telemetry;
mod validation;

pub use analytics::AnalyticsConfig;
pub use analytics::DetailLevel;
pub use client::ClientConfig;
pub use error::ConfigError;
pub use telemetry::EventOutput;
pub use telemetry::TelemetryConfig;

const BASE_CONFIG: &str = "config/mqttrace.yaml";

/// Top‑level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct MqttraceConfig {
    /// Broker connection parameters.
    #[validate(nested)]
    #[serde(default)]
    pub client: ClientConfig,

    /// Telemetry detail settings.
    #[validate(nested)]
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Logging and event output.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl MqttraceConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/mqttrace.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<environment>.yaml` - Environment‑specific overrides (`MQTTRACE_ENV`).
    /// 4. `MQTTRACE_*` environment variables, `__` separating sections.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(MqttraceConfig::default()));

        if Path::new(BASE_CONFIG).exists() {
            figment = figment.merge(Yaml::file(BASE_CONFIG));
        } else {
            tracing::debug!("{} not found, using default configuration", BASE_CONFIG);
        }

        let env = std::env::var("MQTTRACE_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file, still honouring `MQTTRACE_*`
    /// overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment = Figment::from(Serialized::defaults(MqttraceConfig::default()))
            .merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed("MQTTRACE_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
