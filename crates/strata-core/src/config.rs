//! Driver configuration.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (STRATA_ prefix)
//! 2. Values supplied programmatically
//! 3. Defaults

use serde::Deserialize;

use crate::error::{GraphError, Result};

/// Connection settings handed to a driver constructor.
///
/// The relational backend reads credentials from the connection string; the
/// native graph backend takes them from the dedicated fields.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    pub connection_string: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl DriverConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        DriverConfig {
            connection_string: connection_string.into(),
            user: None,
            password: None,
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Load from `STRATA_`-prefixed environment variables, e.g.
    /// `STRATA_CONNECTION_STRING`, `STRATA_MAX_CONNECTIONS`.
    pub fn from_env() -> Result<Self> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("STRATA"))
            .build()
            .map_err(|e| GraphError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| GraphError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pool_expectations() {
        let config = DriverConfig::new("bolt://localhost:7687");
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.fetch_size, 256);
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(config.user.is_none());
    }

    #[test]
    fn credentials_are_attached_by_builder() {
        let config =
            DriverConfig::new("bolt://localhost:7687").with_credentials("neo4j", "secret");
        assert_eq!(config.user.as_deref(), Some("neo4j"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }
}
