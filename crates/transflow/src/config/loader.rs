use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.poll_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "poll_interval_secs must be at least 1".to_string(),
        });
    }

    config.unit_price()?;

    if config.formats()?.is_empty() {
        return Err(ConfigError::Validation {
            message: "supported_formats must name at least one format".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FileFormat;
    use std::io::Write;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_full_config() {
        let config = load_config_from_str(
            r#"
            {
                "version": "1.0",
                "poll_interval_secs": 30,
                "credit_unit_price": "0.025",
                "supported_formats": ["pdf", "docx"],
                "database_path": "/tmp/transflow.db",
                "jobs_endpoint": "https://jobs.example.com/api"
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.unit_price().unwrap().micros(), 25_000);
        assert_eq!(
            config.formats().unwrap(),
            vec![FileFormat::Pdf, FileFormat::Docx]
        );
        assert_eq!(
            config.jobs_endpoint.as_deref(),
            Some("https://jobs.example.com/api")
        );
    }

    #[test]
    fn test_schema_rejects_unknown_field() {
        let result = load_config_from_str(r#"{ "version": "1.0", "worker_count": 4 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_zero_interval() {
        let result = load_config_from_str(r#"{ "version": "1.0", "poll_interval_secs": 0 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_wrong_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_numeric_unit_price() {
        let config =
            load_config_from_str(r#"{ "version": "1.0", "credit_unit_price": 0.02 }"#).unwrap();
        assert_eq!(config.credit_unit_price, "0.02");
        assert_eq!(config.unit_price().unwrap().micros(), 20_000);

        let config =
            load_config_from_str(r#"{ "version": "1.0", "credit_unit_price": 1 }"#).unwrap();
        assert_eq!(config.unit_price().unwrap().micros(), 1_000_000);
    }

    #[test]
    fn test_schema_rejects_negative_or_non_numeric_price() {
        for price in ["-0.5", "true", r#""free""#] {
            let content = format!(r#"{{ "version": "1.0", "credit_unit_price": {} }}"#, price);
            let result = load_config_from_str(&content);
            assert!(
                matches!(result, Err(ConfigError::SchemaValidation { .. })),
                "price {} was accepted",
                price
            );
        }
    }

    #[test]
    fn test_too_precise_price_is_rejected() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "credit_unit_price": "0.0000001" }"#);
        assert!(matches!(result, Err(ConfigError::InvalidUnitPrice { .. })));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "supported_formats": ["pdf", "odt"] }"#);
        assert!(matches!(result, Err(ConfigError::UnknownFormat(name)) if name == "odt"));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "version": "1.0", "poll_interval_secs": 2 }}"#).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.poll_interval_secs, 2);
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/transflow.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
