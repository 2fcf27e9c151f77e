//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{Result, SyncError};
use std::path::Path;
use tracing::warn;

impl Config {
    /// Load configuration from a file.
    ///
    /// `<ENV.NAME>` placeholders are substituted from the environment before
    /// parsing. Format is detected from the extension: `.json` parses as
    /// JSON, everything else as YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let content = substitute_env(&content);

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| SyncError::Config(format!("Failed to parse JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

/// Replace `<ENV.NAME>` tokens with the value of the environment variable
/// `NAME`. A missing variable substitutes an empty string and logs a warning.
pub fn substitute_env(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("<ENV.") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 5..];
        match after.find('>') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        warn!("environment variable {} is not set, substituting empty", name);
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated token: keep the literal text.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_YAML: &str = r#"
clusters:
  app:
    name: app_db
    host: localhost
    user: postgres
    pass: password
"#;

    #[test]
    fn test_from_yaml_valid() {
        let config = Config::from_yaml(VALID_YAML).unwrap();
        assert_eq!(config.clusters["app"].nodes()[0].name, "app_db");
        assert_eq!(config.clusters["app"].nodes()[0].port, 5432);
    }

    #[test]
    fn test_from_yaml_invalid_rejected() {
        assert!(Config::from_yaml("clusters: {}").is_err());
        assert!(Config::from_yaml("not even yaml: [").is_err());
    }

    #[test]
    fn test_from_json_valid() {
        let json = r#"{
          "clusters": {
            "app": {
              "name": "app_db",
              "host": "localhost",
              "user": "postgres",
              "pass": "password"
            }
          }
        }"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.clusters["app"].nodes()[0].name, "app_db");
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = NamedTempFile::with_suffix(".yml").unwrap();
        file.write_all(VALID_YAML.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.clusters["app"].nodes()[0].user, "postgres");
    }

    #[test]
    fn test_substitute_env_known_variable() {
        std::env::set_var("PG_SCHEMA_SYNC_TEST_HOST", "db.internal");
        let out = substitute_env("host: <ENV.PG_SCHEMA_SYNC_TEST_HOST>");
        assert_eq!(out, "host: db.internal");
    }

    #[test]
    fn test_substitute_env_missing_variable_is_empty() {
        std::env::remove_var("PG_SCHEMA_SYNC_TEST_MISSING");
        let out = substitute_env("pass: '<ENV.PG_SCHEMA_SYNC_TEST_MISSING>'");
        assert_eq!(out, "pass: ''");
    }

    #[test]
    fn test_substitute_env_multiple_tokens() {
        std::env::set_var("PG_SCHEMA_SYNC_TEST_A", "a");
        std::env::set_var("PG_SCHEMA_SYNC_TEST_B", "b");
        let out = substitute_env("<ENV.PG_SCHEMA_SYNC_TEST_A>/<ENV.PG_SCHEMA_SYNC_TEST_B>");
        assert_eq!(out, "a/b");
    }

    #[test]
    fn test_substitute_env_unterminated_token_kept() {
        assert_eq!(substitute_env("x <ENV.UNFINISHED"), "x <ENV.UNFINISHED");
    }
}
