//! Operator configuration
//!
//! Every flag can also be provided through the environment.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::controller::ReconcileSettings;
use crate::error::{Error, Result};

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Parser)]
#[command(name = "astro-operator", version, about = "Kubernetes operator for Astro workflows")]
pub struct OperatorConfig {
    /// Only watch Astros in this namespace (default: all namespaces)
    #[arg(long, env = "ASTRO_NAMESPACE")]
    pub namespace: Option<String>,

    /// Seconds between passes while a workflow is progressing
    #[arg(long, env = "ASTRO_REQUEUE_SECS", default_value_t = 30)]
    pub requeue_secs: u64,

    /// Seconds before retrying after a transient runtime error
    #[arg(long, env = "ASTRO_RETRY_SECS", default_value_t = 15)]
    pub retry_secs: u64,

    /// Maximum number of Astros reconciled in parallel (0 = unbounded)
    #[arg(long, env = "ASTRO_CONCURRENCY", default_value_t = 0)]
    pub concurrency: u16,

    /// Name of the Astermule instance recorded on each Astro
    #[arg(long, env = "ASTERMULE_NAME", default_value = "astermule")]
    pub astermule_name: String,

    /// Namespace of the Astermule instance (default: the Astro's namespace)
    #[arg(long, env = "ASTERMULE_NAMESPACE")]
    pub astermule_namespace: Option<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; tracing export is disabled when unset
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Listen address of the read-only status API
    #[arg(long, env = "ASTRO_API_ADDR", default_value = "0.0.0.0:8080")]
    pub api_addr: SocketAddr,
}

impl OperatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.requeue_secs == 0 {
            return Err(Error::ConfigError(
                "requeue interval must be greater than zero".to_string(),
            ));
        }
        if self.retry_secs == 0 {
            return Err(Error::ConfigError(
                "retry interval must be greater than zero".to_string(),
            ));
        }
        if self.astermule_name.trim().is_empty() {
            return Err(Error::ConfigError(
                "astermule name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            requeue_interval: Duration::from_secs(self.requeue_secs),
            retry_interval: Duration::from_secs(self.retry_secs),
            astermule_name: self.astermule_name.clone(),
            astermule_namespace: self.astermule_namespace.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> OperatorConfig {
        OperatorConfig::try_parse_from(std::iter::once("astro-operator").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_flags() {
        let config = parse(&[
            "--namespace",
            "workflows",
            "--requeue-secs",
            "10",
            "--astermule-name",
            "engine",
            "--log-format",
            "json",
        ]);
        assert_eq!(config.namespace.as_deref(), Some("workflows"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());

        let settings = config.reconcile_settings();
        assert_eq!(settings.requeue_interval, Duration::from_secs(10));
        assert_eq!(settings.astermule_name, "engine");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = parse(&["--retry-secs", "0"]);
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }
}
