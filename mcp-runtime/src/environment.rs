//! Environment → base URL resolution.
//!
//! Precedence, highest first: explicit per-call override, process-wide
//! override, the environment table entry, the process-wide default base URL.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::error::ConfigError;

pub const DEVELOPMENT_URL: &str = "http://localhost:3001";
pub const STAGING_URL: &str = "https://staging-api.treasury-agent.dev";
pub const PRODUCTION_URL: &str = "https://api.treasury-agent.dev";

/// Environment used when neither the call nor the configuration names one.
pub const FALLBACK_ENVIRONMENT: Environment = Environment::Staging;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Fixed environment → base URL mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentTable {
    urls: BTreeMap<Environment, String>,
}

impl Default for EnvironmentTable {
    fn default() -> Self {
        let urls = BTreeMap::from([
            (Environment::Development, DEVELOPMENT_URL.to_string()),
            (Environment::Staging, STAGING_URL.to_string()),
            (Environment::Production, PRODUCTION_URL.to_string()),
        ]);
        Self { urls }
    }
}

impl EnvironmentTable {
    /// Replace one entry. Used to point an environment somewhere else in tests.
    pub fn with_url(mut self, environment: Environment, url: impl Into<String>) -> Self {
        self.urls.insert(environment, url.into());
        self
    }

    pub fn get(&self, environment: Environment) -> Option<&str> {
        self.urls
            .get(&environment)
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentResolver {
    table: EnvironmentTable,
    default_environment: Option<Environment>,
    default_base_url: Option<String>,
    base_url_override: Option<String>,
}

impl Default for EnvironmentResolver {
    fn default() -> Self {
        Self::new(EnvironmentTable::default())
    }
}

impl EnvironmentResolver {
    pub fn new(table: EnvironmentTable) -> Self {
        Self {
            table,
            default_environment: None,
            default_base_url: None,
            base_url_override: None,
        }
    }

    pub fn with_default_environment(mut self, environment: Option<Environment>) -> Self {
        self.default_environment = environment;
        self
    }

    pub fn with_default_base_url(mut self, url: Option<String>) -> Self {
        self.default_base_url = non_empty(url);
        self
    }

    pub fn with_base_url_override(mut self, url: Option<String>) -> Self {
        self.base_url_override = non_empty(url);
        self
    }

    pub fn default_environment(&self) -> Environment {
        self.default_environment.unwrap_or(FALLBACK_ENVIRONMENT)
    }

    /// Base URL used when the environment lookup yields nothing.
    fn fallback_base_url(&self) -> Option<&str> {
        self.default_base_url
            .as_deref()
            .or_else(|| self.table.get(self.default_environment()))
    }

    pub fn resolve(
        &self,
        explicit_environment: Option<&str>,
        explicit_base_url_override: Option<&str>,
    ) -> Result<String, ConfigError> {
        if let Some(url) = explicit_base_url_override.filter(|url| !url.trim().is_empty()) {
            return Ok(url.trim().to_string());
        }
        if let Some(url) = &self.base_url_override {
            return Ok(url.clone());
        }

        let environment_name = explicit_environment
            .map(str::to_string)
            .unwrap_or_else(|| self.default_environment().to_string());
        let from_table = environment_name
            .parse::<Environment>()
            .ok()
            .and_then(|environment| self.table.get(environment));

        from_table
            .or_else(|| self.fallback_base_url())
            .map(str::to_string)
            .ok_or(ConfigError::NoBaseUrl {
                environment: environment_name,
            })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
