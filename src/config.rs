// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Provider configuration: the platform URL and credentials.
//!
//! Values come from an explicit [`ProviderConfig`] (usually a TOML file) and
//! fall back to the environment. Explicit values always win.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const URL_VARS: &[&str] = &["JFROG_URL", "ARTIFACTORY_URL"];
pub const ACCESS_TOKEN_VARS: &[&str] = &["JFROG_ACCESS_TOKEN", "ARTIFACTORY_ACCESS_TOKEN"];
pub const BYPASS_TLS_VAR: &str = "JFROG_BYPASS_TLS_VERIFICATION";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing URL Configuration. The url was not found in the JFROG_URL/ARTIFACTORY_URL environment variable or the configuration url attribute.")]
    MissingUrl,

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Missing JFrog API key or Access Token. Neither was found in the environment variables or the configuration attributes.")]
    MissingCredentials,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Deprecated by the platform; only used when no access token is available.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub bypass_tls_verification: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    ApiKey(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessToken(_) => f.write_str("AccessToken(***)"),
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

/// Configuration with every fallback applied and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub url: Url,
    pub credentials: Credentials,
    pub bypass_tls_verification: bool,
    pub timeout: Duration,
}

fn first_set(env: &dyn Fn(&str) -> Option<String>, vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|v| env(*v))
        .find(|value| !value.is_empty())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl ProviderConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolves against the process environment.
    pub fn resolve_from_env(&self) -> Result<ResolvedConfig, ConfigError> {
        self.resolve(&|name| std::env::var(name).ok())
    }

    /// Applies environment fallbacks through `env` and validates the result.
    pub fn resolve(&self, env: &dyn Fn(&str) -> Option<String>) -> Result<ResolvedConfig, ConfigError> {
        let raw_url = non_empty(&self.url)
            .or_else(|| first_set(env, URL_VARS))
            .ok_or(ConfigError::MissingUrl)?;
        let url = parse_base_url(&raw_url)?;

        let credentials = match (
            non_empty(&self.access_token).or_else(|| first_set(env, ACCESS_TOKEN_VARS)),
            non_empty(&self.api_key),
        ) {
            (Some(token), _) => Credentials::AccessToken(token),
            (None, Some(key)) => Credentials::ApiKey(key),
            (None, None) => return Err(ConfigError::MissingCredentials),
        };

        let bypass_tls_verification = match self.bypass_tls_verification {
            Some(bypass) => bypass,
            None => env(BYPASS_TLS_VAR).is_some_and(|v| v.eq_ignore_ascii_case("true")),
        };

        Ok(ResolvedConfig {
            url,
            credentials,
            bypass_tls_verification,
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }
}

/// Parses the platform URL and makes it usable as a base for relative endpoints.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
