//! Configuration loading and validation for the field-vault service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is present but invalid.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// 64 hex characters (32 bytes). When absent an ephemeral key is generated,
    /// unless [`Config::require_encryption_key`] is set.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Refuse to start the server without `ENCRYPTION_KEY`. Enforced by
    /// [`crate::key::load`], so tools that bring their own keys are unaffected.
    #[serde(default)]
    pub require_encryption_key: bool,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// HTTP header used to identify which entity schema to apply.
    #[serde(default = "default_entity_header")]
    pub entity_header_name: String,

    /// Optional OpenAPI document with `x-pii` / `x-phi` annotations.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,

    /// How often (seconds) to reload the schema document.
    #[serde(default = "default_schema_refresh_interval")]
    pub schema_refresh_interval_secs: u64,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP/gRPC endpoint for span export (e.g. `"http://otel-collector:4317"`).
    /// When unset, only JSON logs are written.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_listen_port() -> u16 {
    5000
}
fn default_entity_header() -> String {
    "X-Entity-Type".into()
}
fn default_schema_refresh_interval() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Schema reload interval as a [`Duration`].
    pub fn schema_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.schema_refresh_interval_secs)
    }

    /// The OTLP endpoint, treating a blank value as unset.
    pub fn otlp_endpoint(&self) -> Option<&str> {
        self.otel_exporter_otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.entity_header_name, "ENTITY_HEADER_NAME")?;
        ensure_non_empty(&self.log_level, "LOG_LEVEL")?;

        if axum::http::HeaderName::from_bytes(self.entity_header_name.as_bytes()).is_err() {
            anyhow::bail!("ENTITY_HEADER_NAME is not a valid HTTP header name");
        }
        if self.schema_refresh_interval_secs == 0 {
            anyhow::bail!("SCHEMA_REFRESH_INTERVAL_SECS must be > 0");
        }
        if let Some(endpoint) = self.otlp_endpoint() {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                anyhow::bail!("OTEL_EXPORTER_OTLP_ENDPOINT must be an http(s) URL");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("require_encryption_key", &self.require_encryption_key)
            .field("listen_port", &self.listen_port)
            .field("entity_header_name", &self.entity_header_name)
            .field("schema_path", &self.schema_path)
            .field(
                "schema_refresh_interval_secs",
                &self.schema_refresh_interval_secs,
            )
            .field("log_level", &self.log_level)
            .field(
                "otel_exporter_otlp_endpoint",
                &self.otel_exporter_otlp_endpoint,
            )
            .finish()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            encryption_key: None,
            require_encryption_key: false,
            listen_port: default_listen_port(),
            entity_header_name: default_entity_header(),
            schema_path: None,
            schema_refresh_interval_secs: default_schema_refresh_interval(),
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_listen_port(), 5000);
        assert_eq!(default_entity_header(), "X-Entity-Type");
        assert_eq!(default_schema_refresh_interval(), 300);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_refresh_interval() {
        let cfg = Config {
            schema_refresh_interval_secs: 0,
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_header_name() {
        let cfg = Config {
            entity_header_name: "X Entity".into(),
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn key_requirement_is_left_to_key_loading() {
        // The rotate tool reads its keys from other variables and must still
        // load configuration when the server key is required but absent.
        let cfg = Config {
            require_encryption_key: true,
            encryption_key: None,
            ..base()
        };
        assert!(cfg.validate().is_ok());
        assert!(crate::key::load(cfg.encryption_key.as_deref(), cfg.require_encryption_key).is_err());
    }

    #[test]
    fn validate_checks_otlp_endpoint() {
        let cfg = Config {
            otel_exporter_otlp_endpoint: Some("http://otel-collector:4317".into()),
            ..base()
        };
        assert!(cfg.validate().is_ok());

        let cfg = Config {
            otel_exporter_otlp_endpoint: Some("otel-collector:4317".into()),
            ..base()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            otel_exporter_otlp_endpoint: Some("  ".into()),
            ..base()
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.otlp_endpoint(), None);
    }

    #[test]
    fn debug_redacts_key() {
        let cfg = Config {
            encryption_key: Some("ab".repeat(32)),
            ..base()
        };
        let printed = format!("{cfg:?}");
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("abab"));
    }
}
