//! Configuration loading and representation.

use thiserror::Error;

use clubhouse_organizations::MIN_CODE_LEN;

pub const JOIN_CODE_LENGTH_VAR: &str = "CLUBHOUSE_JOIN_CODE_LENGTH";
pub const JOIN_CODE_ATTEMPTS_VAR: &str = "CLUBHOUSE_JOIN_CODE_ATTEMPTS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be an unsigned integer (got '{value}')")]
    NotANumber { var: &'static str, value: String },

    #[error("{var} must be at least {min} (got {value})")]
    TooSmall {
        var: &'static str,
        min: usize,
        value: usize,
    },
}

/// Runtime settings of the core services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppConfig {
    /// Total length of generated join codes (prefix included).
    pub join_code_length: usize,
    /// Generation attempts before a join-code collision is reported.
    pub join_code_attempts: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            join_code_length: 6,
            join_code_attempts: 5,
        }
    }
}

impl AppConfig {
    /// Load from the process environment, falling back to defaults for unset
    /// variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            join_code_length: parse_var(&lookup, JOIN_CODE_LENGTH_VAR)?
                .unwrap_or(defaults.join_code_length),
            join_code_attempts: parse_var(&lookup, JOIN_CODE_ATTEMPTS_VAR)?
                .unwrap_or(defaults.join_code_attempts),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.join_code_length < MIN_CODE_LEN {
            return Err(ConfigError::TooSmall {
                var: JOIN_CODE_LENGTH_VAR,
                min: MIN_CODE_LEN,
                value: self.join_code_length,
            });
        }
        if self.join_code_attempts < 1 {
            return Err(ConfigError::TooSmall {
                var: JOIN_CODE_ATTEMPTS_VAR,
                min: 1,
                value: self.join_code_attempts,
            });
        }
        Ok(())
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<usize>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::NotANumber { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(AppConfig::from_lookup(lookup(&[])).unwrap(), AppConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (JOIN_CODE_LENGTH_VAR, " 8 "),
            (JOIN_CODE_ATTEMPTS_VAR, "2"),
        ]))
        .unwrap();
        assert_eq!(config.join_code_length, 8);
        assert_eq!(config.join_code_attempts, 2);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(JOIN_CODE_LENGTH_VAR, "six")])),
            Err(ConfigError::NotANumber { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(JOIN_CODE_LENGTH_VAR, "3")])),
            Err(ConfigError::TooSmall { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(JOIN_CODE_ATTEMPTS_VAR, "0")])),
            Err(ConfigError::TooSmall { .. })
        ));
    }
}
