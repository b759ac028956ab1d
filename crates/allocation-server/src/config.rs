//! Server configuration
//!
//! Layered from built-in defaults, an optional TOML file and `ALLOCATION__`
//! environment variables (double underscore separates sections, e.g.
//! `ALLOCATION__ENGINE__MAX_CONCURRENT=3`).

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use chat_allocation_core::config::{DispatchConfig, EngineConfig};
use chat_allocation_core::AllocationConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};
use crate::logging::LoggingConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ALLOCATION";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http: HttpConfig,
    pub omnichannel: OmnichannelConfig,
    pub engine: EngineConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_address: String,
}

/// Omnichannel API credentials and client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OmnichannelConfig {
    pub base_url: String,
    pub app_id: String,
    pub secret_key: String,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

impl ServerConfig {
    /// Load from an optional file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.allocation().validate()?;
        self.bind_address()?;

        if self.omnichannel.base_url.is_empty() {
            return Err(ServerError::config("omnichannel.base_url must not be empty"));
        }

        if self.omnichannel.app_id.trim().is_empty() || self.omnichannel.secret_key.trim().is_empty() {
            return Err(ServerError::config("omnichannel.app_id and omnichannel.secret_key must be set"));
        }

        if self.omnichannel.timeout_secs == 0 {
            return Err(ServerError::config("omnichannel.timeout_secs must be greater than 0"));
        }

        Ok(())
    }

    /// Engine and dispatch sections as the core expects them
    pub fn allocation(&self) -> AllocationConfig {
        AllocationConfig {
            engine: self.engine.clone(),
            dispatch: self.dispatch.clone(),
        }
    }

    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.http
            .bind_address
            .parse()
            .map_err(|e| ServerError::config(format!("invalid http.bind_address '{}': {}", self.http.bind_address, e)))
    }
}

impl OmnichannelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for OmnichannelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://omnichannel.qiscus.com".to_string(),
            app_id: String::new(),
            secret_key: String::new(),
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.omnichannel.app_id = "app".to_string();
        config.omnichannel.secret_key = "secret".to_string();
        config
    }

    #[test]
    fn defaults_match_the_hosted_service() {
        let config = with_credentials();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address().unwrap().port(), 8080);
        assert_eq!(config.omnichannel.timeout(), Duration::from_secs(30));
        assert_eq!(config.allocation().engine.max_concurrent, 2);
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let mut config = with_credentials();
        config.http.bind_address = "localhost".to_string();
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn engine_errors_surface_through_server_validation() {
        let mut config = with_credentials();
        config.engine.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(ServerError::Allocation(_))));
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let config = ServerConfig::default();
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        let mut config = with_credentials();
        config.omnichannel.secret_key = "  ".to_string();
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }
}
