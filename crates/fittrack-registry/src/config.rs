//! Registry configuration, read from the environment at startup

use fittrack_common::cloudflare::DEFAULT_API_BASE;
use std::time::Duration;
use thiserror::Error;

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Listen port
    pub port: u16,
    /// Shared registration secret
    pub registration_secret: String,
    /// Cloud account id
    pub account_id: String,
    /// Cloud API token
    pub api_token: String,
    /// Cloud API base URL
    pub api_base: String,
    /// Compute unit script deployed for every tenant
    pub worker_script_path: String,
    /// Resource-name prefix
    pub worker_prefix: String,
    /// Domain the public subdomains live under
    pub workers_domain: String,
    /// Binding name of the tenant namespace inside the compute unit
    pub kv_binding: String,
    /// Timeout for each cloud API call
    pub request_timeout: Duration,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required variable unset or empty
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// Variable set to an unusable value
    #[error("invalid value for {name}: {value}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

impl RegistryConfig {
    /// Read from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through a lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let port = match get("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name: "PORT", value: v })?,
            None => 3001,
        };

        Ok(Self {
            port,
            registration_secret: required("REGISTRATION_SECRET")?,
            account_id: required("CLOUDFLARE_ACCOUNT_ID")?,
            api_token: required("CLOUDFLARE_API_TOKEN")?,
            api_base: get("CLOUDFLARE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            worker_script_path: get("WORKER_SCRIPT_PATH").unwrap_or_else(|| "worker.js".into()),
            worker_prefix: get("WORKER_PREFIX").unwrap_or_else(|| "fittrack".into()),
            workers_domain: get("WORKERS_DOMAIN").unwrap_or_else(|| "workers.dev".into()),
            kv_binding: "FITTRACK_KV".into(),
            request_timeout: Duration::from_secs(30),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::from_lookup(lookup(&[
            ("REGISTRATION_SECRET", "S"),
            ("CLOUDFLARE_ACCOUNT_ID", "acct"),
            ("CLOUDFLARE_API_TOKEN", "tok"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3001);
        assert_eq!(config.worker_prefix, "fittrack");
        assert_eq!(config.workers_domain, "workers.dev");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = RegistryConfig::from_lookup(lookup(&[
            ("REGISTRATION_SECRET", ""),
            ("CLOUDFLARE_ACCOUNT_ID", "acct"),
            ("CLOUDFLARE_API_TOKEN", "tok"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Missing("REGISTRATION_SECRET")));
    }

    #[test]
    fn test_bad_port() {
        let err = RegistryConfig::from_lookup(lookup(&[
            ("REGISTRATION_SECRET", "S"),
            ("CLOUDFLARE_ACCOUNT_ID", "acct"),
            ("CLOUDFLARE_API_TOKEN", "tok"),
            ("PORT", "http"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }
}
