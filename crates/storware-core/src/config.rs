//! Service configuration management.
//!
//! The configuration is read once at process start from the environment
//! (the binary loads a `.env` file first), validated eagerly and then passed
//! by value to the session manager. Nothing mutates it afterwards.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `STORWARE_HOST` | Base URL of the Backup Service, e.g. `https://backup.example.com` |
//! | `ENCRYPTION_KEY` | Key produced by `storware encrypt-secret` |
//! | `STORWARE_ENCRYPTED_USERNAME` / `STORWARE_ENCRYPTED_PASSWORD` | Encrypted login |
//! | `STORWARE_BASE_PATH` | API prefix, defaults to `/api` |
//! | `STORWARE_MAX_ATTEMPTS`, `STORWARE_RETRY_DELAY_SECS`, `STORWARE_REQUEST_TIMEOUT_SECS` | Retry policy |
//! | `STORWARE_VERIFY_TLS` | Verify server certificates (off by default, test setups use self-signed ones) |

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::auth::RetryPolicy;

pub const HOST_VAR: &str = "STORWARE_HOST";
pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY";
pub const ENCRYPTED_USERNAME_VAR: &str = "STORWARE_ENCRYPTED_USERNAME";
pub const ENCRYPTED_PASSWORD_VAR: &str = "STORWARE_ENCRYPTED_PASSWORD";
const BASE_PATH_VAR: &str = "STORWARE_BASE_PATH";
const MAX_ATTEMPTS_VAR: &str = "STORWARE_MAX_ATTEMPTS";
const RETRY_DELAY_VAR: &str = "STORWARE_RETRY_DELAY_SECS";
const REQUEST_TIMEOUT_VAR: &str = "STORWARE_REQUEST_TIMEOUT_SECS";
const VERIFY_TLS_VAR: &str = "STORWARE_VERIFY_TLS";

/// API prefix used by the Backup Service
pub const DEFAULT_BASE_PATH: &str = "/api";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("STORWARE_HOST is not set")]
    MissingHost,

    #[error("STORWARE_HOST is not a valid http(s) URL: {0}")]
    InvalidHost(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),
}

/// The encrypted key/username/password triple, as provisioned by the operator.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub encryption_key: String,
    pub encrypted_username: String,
    pub encrypted_password: String,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("encryption_key", &redacted(&self.encryption_key))
            .field("encrypted_username", &redacted(&self.encrypted_username))
            .field("encrypted_password", &redacted(&self.encrypted_password))
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub host: String,
    pub base_path: String,
    pub accept_invalid_certs: bool,
    pub retry: RetryPolicy,
    pub credentials: CredentialBundle,
}

impl ServiceConfig {
    /// Build a configuration for `host` with default policy and no credentials
    pub fn new(host: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            host: normalize_host(host)?,
            base_path: DEFAULT_BASE_PATH.to_string(),
            accept_invalid_certs: true,
            retry: RetryPolicy::default(),
            credentials: CredentialBundle::default(),
        })
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = var(HOST_VAR).ok_or(ConfigError::MissingHost)?;
        let mut config = Self::new(&host)?;

        if let Some(base_path) = var(BASE_PATH_VAR) {
            let normalized = normalize_base_path(&base_path);
            if normalized.is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: BASE_PATH_VAR,
                    value: base_path,
                });
            }
            config.base_path = normalized;
        }

        let defaults = RetryPolicy::default();
        let max_attempts = parse_var(&var, MAX_ATTEMPTS_VAR)?.unwrap_or(defaults.max_attempts);
        let retry_delay = parse_var(&var, RETRY_DELAY_VAR)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_delay);
        let request_timeout = parse_var(&var, REQUEST_TIMEOUT_VAR)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        config.retry = RetryPolicy::new(max_attempts, retry_delay, request_timeout)?;

        if let Some(verify) = var(VERIFY_TLS_VAR) {
            config.accept_invalid_certs = !parse_bool(VERIFY_TLS_VAR, &verify)?;
        }

        config.credentials = CredentialBundle {
            encryption_key: var(ENCRYPTION_KEY_VAR).unwrap_or_default(),
            encrypted_username: var(ENCRYPTED_USERNAME_VAR).unwrap_or_default(),
            encrypted_password: var(ENCRYPTED_PASSWORD_VAR).unwrap_or_default(),
        };

        Ok(config)
    }
}

fn normalize_host(host: &str) -> Result<String, ConfigError> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(ConfigError::MissingHost);
    }
    let url = reqwest::Url::parse(host).map_err(|e| ConfigError::InvalidHost(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidHost(host.to_string()));
    }
    Ok(host.to_string())
}

fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

fn parse_var<T, V>(var: &V, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    V: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        })
        .transpose()
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}
