use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MURMUR_JWT_SECRET is unset or still a placeholder")]
    InsecureSecret,

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub reap_interval_secs: u64,
    pub db_retry_attempts: u32,
    pub db_retry_base_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("MURMUR_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::InsecureSecret);
        }

        let cors_origins = lookup("MURMUR_CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            jwt_secret,
            db_path: lookup("MURMUR_DB_PATH")
                .unwrap_or_else(|| "murmur.db".into())
                .into(),
            host: lookup("MURMUR_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&lookup, "MURMUR_PORT", 5000)?,
            cors_origins,
            reap_interval_secs: parse(&lookup, "MURMUR_REAP_INTERVAL_SECS", 60)?,
            db_retry_attempts: parse(&lookup, "MURMUR_DB_RETRY_ATTEMPTS", 5)?,
            db_retry_base_ms: parse(&lookup, "MURMUR_DB_RETRY_BASE_MS", 500)?,
        })
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("MURMUR_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.db_path, PathBuf::from("murmur.db"));
        assert_eq!(cfg.reap_interval_secs, 60);
        assert_eq!(
            cfg.cors_origins,
            vec!["http://localhost:3000", "http://localhost:3001"]
        );
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(matches!(config(&[]), Err(ConfigError::InsecureSecret)));
        assert!(matches!(
            config(&[("MURMUR_JWT_SECRET", "dev-secret-change-me")]),
            Err(ConfigError::InsecureSecret)
        ));
    }

    #[test]
    fn bad_number_names_the_variable() {
        let err = config(&[("MURMUR_JWT_SECRET", "x1"), ("MURMUR_PORT", "http")]).unwrap_err();
        assert_eq!(err.to_string(), "MURMUR_PORT has an invalid value 'http'");
    }
}
