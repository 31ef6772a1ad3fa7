use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::analysis::FileFormat;
use crate::error::ConfigError;
use crate::pricing::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Decimal text; a JSON number is accepted and kept as written.
    #[serde(
        default = "default_credit_unit_price",
        deserialize_with = "string_or_number"
    )]
    pub credit_unit_price: String,
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,
    /// Defaults to `~/.transflow/data/transflow.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    /// Base URL of a remote analysis service. Documents are analyzed
    /// in-process when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_endpoint: Option<String>,
    /// Base URL of a remote job service. The local database is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs_endpoint: Option<String>,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_credit_unit_price() -> String {
    "0.01".to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a decimal string or number, found {}",
            other
        ))),
    }
}

fn default_supported_formats() -> Vec<String> {
    FileFormat::RECOGNIZED
        .iter()
        .map(|f| f.as_str().to_string())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            poll_interval_secs: default_poll_interval_secs(),
            credit_unit_price: default_credit_unit_price(),
            supported_formats: default_supported_formats(),
            database_path: None,
            analysis_endpoint: None,
            jobs_endpoint: None,
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn unit_price(&self) -> Result<Money, ConfigError> {
        self.credit_unit_price
            .parse()
            .map_err(|e: crate::pricing::ParseMoneyError| ConfigError::InvalidUnitPrice {
                value: self.credit_unit_price.clone(),
                reason: e.to_string(),
            })
    }

    /// The allow-list of formats, deduplicated, in configuration order.
    pub fn formats(&self) -> Result<Vec<FileFormat>, ConfigError> {
        let mut formats = Vec::with_capacity(self.supported_formats.len());
        for name in &self.supported_formats {
            let format: FileFormat = name
                .trim()
                .parse()
                .map_err(|_| ConfigError::UnknownFormat(name.clone()))?;
            if format == FileFormat::Unknown {
                return Err(ConfigError::UnknownFormat(name.clone()));
            }
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        Ok(formats)
    }

    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(expand_home(path)),
            None => crate::db::default_database_path(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
