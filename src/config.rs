use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_aux::prelude::*;

#[derive(Deserialize)]
pub struct Config {
    pub application: ApplicationConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Deserialize)]
pub struct ApplicationConfig {
    pub name: String,
    pub version: String,
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

#[derive(Deserialize)]
pub struct TelemetryConfig {
    pub otlp_endpoint: String,
    /// Fraction of root traces to sample, between `0.0` and `1.0`.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub sample_rate: f64,
    /// Mirrors spans to stdout and lowers the default log level to `debug`.
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub debug: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub flush_timeout_ms: u64,
    pub loki_url: Option<String>,
}

impl TelemetryConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

impl Config {
    pub fn build() -> Result<Self> {
        let base_path = std::env::current_dir().context("Failed to determine current directory")?;
        let configuration_directory = base_path.join("configs");

        let environment: Environment = std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "dev".into())
            .try_into()
            .map_err(anyhow::Error::msg)
            .context("Failed to parse APP_ENVIRONMENT")?;
        let environment_filename = format!("{}.toml", environment.as_str());

        let mut settings = config::Config::builder()
            .add_source(config::File::from(
                configuration_directory.join("base.toml"),
            ))
            .add_source(
                config::File::from(configuration_directory.join(environment_filename))
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override("application.name", env!("CARGO_PKG_NAME"))?
            .set_override("application.version", env!("CARGO_PKG_VERSION"))?;

        if let Some(endpoint) = get_env_var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            settings = settings.set_override("telemetry.otlp_endpoint", endpoint)?;
        }
        if let Some(loki_url) = get_env_var("LOGGING_LOKI_URL") {
            settings = settings.set_override("telemetry.loki_url", loki_url)?;
        }
        if let Some(sample_rate) = get_env_var("TRACES_SAMPLE_RATE") {
            settings = settings.set_override("telemetry.sample_rate", sample_rate)?;
        }
        if let Some(debug) = get_env_var("TELEMETRY_DEBUG") {
            settings = settings.set_override("telemetry.debug", debug)?;
        }

        let settings = settings.build().context("Failed to build configuration")?;

        settings
            .try_deserialize::<Config>()
            .context("Failed to deserialize configuration")
    }
}

fn get_env_var(name: &str) -> Option<String> {
    let var = std::env::var(name).ok()?;
    if var.is_empty() {
        return None;
    }
    Some(var)
}

#[derive(Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Staging,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "dev",
            Environment::Production => "production",
            Environment::Staging => "staging",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "dev" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            other => Err(format!("{} is not a valid environment", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parses_case_insensitively() {
        for (value, expected) in [
            ("dev", Environment::Development),
            ("Production", Environment::Production),
            ("STAGING", Environment::Staging),
        ] {
            assert_eq!(Environment::try_from(value.to_string()), Ok(expected));
        }
    }

    #[test]
    fn test_environment_rejects_unknown_values() {
        let result = Environment::try_from("qa".to_string());

        assert_eq!(result, Err("qa is not a valid environment".to_string()));
    }

    #[test]
    fn test_application_identity_comes_from_the_package() {
        let configuration = Config::build().unwrap();

        assert_eq!(configuration.application.name, env!("CARGO_PKG_NAME"));
        assert_eq!(configuration.application.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_flush_timeout_is_read_in_milliseconds() {
        let telemetry = TelemetryConfig {
            otlp_endpoint: "http://127.0.0.1:4317".to_string(),
            sample_rate: 1.0,
            debug: false,
            flush_timeout_ms: 1000,
            loki_url: None,
        };

        assert_eq!(telemetry.flush_timeout(), Duration::from_secs(1));
    }
}
