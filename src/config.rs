use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::defaults::DEFAULT_SINCE;
use crate::records::parse_timestamp;

// -------------------------------------------------------------------------------------------------
// ConfigError
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
    NoRepositories,
    EmptyField { index: usize, field: &'static str },
    InvalidSince(String),
    InvalidApiUrl(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "error reading {}: {source}", path.display()),
            ConfigError::Json(e) => write!(f, "error parsing JSON configuration: {e}"),
            ConfigError::Yaml(e) => write!(f, "error parsing YAML configuration: {e}"),
            ConfigError::NoRepositories => write!(f, "no repositories are configured"),
            ConfigError::EmptyField { index, field } => {
                write!(f, "repository entry {index} has an empty {field:?}")
            }
            ConfigError::InvalidSince(s) => write!(f, "invalid since timestamp {s:?}"),
            ConfigError::InvalidApiUrl(s) => write!(f, "invalid API URL {s:?}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Json(e) => Some(e),
            ConfigError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// RepositoryConfig
// -------------------------------------------------------------------------------------------------
/// A repository to collect metrics from
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RepositoryConfig {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepositoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

// -------------------------------------------------------------------------------------------------
// Config
// -------------------------------------------------------------------------------------------------
#[derive(Deserialize)]
struct RawConfig {
    github_token: Option<String>,
    repositories: Vec<RepositoryConfig>,
    since: Option<String>,
    api_url: Option<String>,
}

/// Collection settings
#[derive(Debug)]
pub struct Config {
    /// The token to authenticate with; when absent, the environment is consulted
    pub github_token: Option<SecretString>,

    /// The repositories to collect, in order
    pub repositories: Vec<RepositoryConfig>,

    /// The lower bound on collected activity
    pub since: DateTime<Utc>,

    /// The base URL of the GitHub REST API
    pub api_url: Url,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Files ending in `.yaml` or `.yml` are read as YAML; everything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(s).map_err(ConfigError::Json)?;
        Self::validate(raw)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(s).map_err(ConfigError::Yaml)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }
        for (index, r) in raw.repositories.iter().enumerate() {
            if r.owner.trim().is_empty() {
                return Err(ConfigError::EmptyField { index, field: "owner" });
            }
            if r.repo.trim().is_empty() {
                return Err(ConfigError::EmptyField { index, field: "repo" });
            }
        }

        let since = raw.since.as_deref().unwrap_or(DEFAULT_SINCE);
        let since = parse_timestamp(since).map_err(|_e| ConfigError::InvalidSince(since.to_string()))?;

        let api_url = raw.api_url.as_deref().unwrap_or("https://api.github.com");
        let api_url = Url::parse(api_url).map_err(|_e| ConfigError::InvalidApiUrl(api_url.to_string()))?;

        let github_token = raw
            .github_token
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        Ok(Config {
            github_token,
            repositories: raw.repositories,
            since,
            api_url,
        })
    }
}
