//! Tool settings loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the stock settings.
//!
//! ```toml
//! region = "eu-west-1"
//!
//! [proxy]
//! log_level = "info"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{ConfigError, Error, Result};

pub const DEFAULT_REGION: &str = "us-west-2";

/// Managed proxy image used by node-hosted services.
pub const MANAGED_PROXY_IMAGE: &str =
    "840364872350.dkr.ecr.us-west-2.amazonaws.com/aws-appmesh-envoy:v1.12.1.1-prod";

/// Upstream proxy image used by serverless services.
pub const UPSTREAM_PROXY_IMAGE: &str = "envoyproxy/envoy:1.12.2";

pub const METRICS_AGENT_IMAGE: &str = "amazon/cloudwatch-agent:latest";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Region the proxies report to and the metrics agent forwards to.
    pub region: String,
    pub proxy: ProxySettings,
    pub metrics: MetricsSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub node_image: String,
    pub serverless_image: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub image: String,
    /// StatsD listen address of the agent.
    pub statsd_address: String,
    pub collection_interval_secs: u32,
    pub aggregation_interval_secs: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Settings {
    /// Load settings from a TOML file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&text)
    }

    /// Parse settings from TOML text and validate them.
    pub fn parse(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text).map_err(ConfigError::Parse)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "region",
                reason: "must not be empty".into(),
            }));
        }
        if self.proxy.node_image.trim().is_empty() || self.proxy.serverless_image.trim().is_empty()
        {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "proxy.image",
                reason: "proxy images must not be empty".into(),
            }));
        }
        if self.metrics.collection_interval_secs == 0
            || self.metrics.aggregation_interval_secs < self.metrics.collection_interval_secs
        {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "metrics",
                reason: format!(
                    "aggregation interval ({}s) must be >= non-zero collection interval ({}s)",
                    self.metrics.aggregation_interval_secs, self.metrics.collection_interval_secs
                ),
            }));
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(Error::Config(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("expected 'pretty' or 'json', got '{other}'"),
            })),
        }
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            proxy: ProxySettings::default(),
            metrics: MetricsSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            node_image: MANAGED_PROXY_IMAGE.into(),
            serverless_image: UPSTREAM_PROXY_IMAGE.into(),
            log_level: "debug".into(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            image: METRICS_AGENT_IMAGE.into(),
            statsd_address: ":8125".into(),
            collection_interval_secs: 10,
            aggregation_interval_secs: 60,
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber. Output goes to stderr so rendered
    /// documents on stdout stay clean.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.region, DEFAULT_REGION);
        assert_eq!(settings.proxy.node_image, MANAGED_PROXY_IMAGE);
        assert_eq!(settings.proxy.serverless_image, UPSTREAM_PROXY_IMAGE);
        assert_eq!(settings.metrics.statsd_address, ":8125");
        assert_eq!(settings.logging.format, "pretty");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = Settings::parse(
            r#"
region = "eu-west-1"

[proxy]
log_level = "info"
"#,
        )
        .unwrap();
        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.proxy.log_level, "info");
        assert_eq!(settings.proxy.node_image, MANAGED_PROXY_IMAGE);
    }

    #[test]
    fn rejects_unknown_log_format() {
        let err = Settings::parse("[logging]\nformat = \"xml\"\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "logging.format",
                ..
            })
        ));
    }

    #[test]
    fn rejects_aggregation_shorter_than_collection() {
        let err = Settings::parse(
            "[metrics]\ncollection_interval_secs = 30\naggregation_interval_secs = 10\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "metrics",
                ..
            })
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = Settings::parse("region = ").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }
}
