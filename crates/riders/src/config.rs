use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

type ConfigResult<T> = Result<T, String>;

/// Tunables for the rider subsystem. Unknown or missing fields fall back to
/// defaults; a file that fails to parse is replaced wholesale by defaults
/// with a warning, never a startup failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidersConfig {
    /// Percent chance (0-100) of sending the deploy-command tip when an
    /// entitled player places a vehicle.
    pub tip_chance: u8,
    /// Maximum reach of the interactive seat deploy command, in world units.
    pub deploy_reach: f32,
}

impl Default for RidersConfig {
    fn default() -> Self {
        Self {
            tip_chance: 25,
            deploy_reach: 3.0,
        }
    }
}

impl RidersConfig {
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        match serde_path_to_error::deserialize::<_, RidersConfig>(&mut deserializer) {
            Ok(config) => config.validated(),
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                if path.is_empty() || path == "." {
                    Err(format!("parse config json: {source}"))
                } else {
                    Err(format!("parse config json at {path}: {source}"))
                }
            }
        }
    }

    fn validated(self) -> ConfigResult<Self> {
        if self.tip_chance > 100 {
            return Err(format!(
                "validation failed at tip_chance: expected 0-100, got {}",
                self.tip_chance
            ));
        }
        if !self.deploy_reach.is_finite() || self.deploy_reach <= 0.0 {
            return Err(format!(
                "validation failed at deploy_reach: expected positive finite number, got {}",
                self.deploy_reach
            ));
        }
        Ok(self)
    }

    /// Loads from disk, falling back to defaults when the file is missing
    /// or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(path = %path.display(), %error, "config unreadable; using defaults");
                return Self::default();
            }
        };
        match Self::from_json_str(&raw) {
            Ok(config) => config,
            Err(error) => {
                warn!(path = %path.display(), error, "config invalid; using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = RidersConfig::from_json_str("{}").expect("empty object parses");
        assert_eq!(config, RidersConfig::default());

        let config =
            RidersConfig::from_json_str(r#"{"tip_chance": 0}"#).expect("partial object parses");
        assert_eq!(config.tip_chance, 0);
        assert_eq!(config.deploy_reach, 3.0);
    }

    #[test]
    fn parse_errors_name_the_field_path() {
        let error = RidersConfig::from_json_str(r#"{"tip_chance": "lots"}"#)
            .expect_err("string is not a chance");
        assert!(error.contains("tip_chance"), "unexpected error: {error}");
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        assert!(RidersConfig::from_json_str(r#"{"tip_chance": 101}"#).is_err());
        assert!(RidersConfig::from_json_str(r#"{"deploy_reach": -1.0}"#).is_err());
    }

    #[test]
    fn unreadable_or_invalid_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("riders.json");
        assert_eq!(RidersConfig::load_or_default(&missing), RidersConfig::default());

        let invalid = dir.path().join("broken.json");
        std::fs::write(&invalid, "{not json").expect("write");
        assert_eq!(RidersConfig::load_or_default(&invalid), RidersConfig::default());

        let valid = dir.path().join("good.json");
        std::fs::write(&valid, r#"{"tip_chance": 5, "deploy_reach": 2.5}"#).expect("write");
        let config = RidersConfig::load_or_default(&valid);
        assert_eq!(config.tip_chance, 5);
        assert_eq!(config.deploy_reach, 2.5);
    }
}
