//! HTTP client utilities.

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;

/// Default user agent sent with every request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with timeouts applied to every request
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a client with default timeouts
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::from_config(&HttpConfig::default())
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_deref().unwrap_or(USER_AGENT))
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_crate() {
        assert!(USER_AGENT.starts_with("paper-mesh/"));
    }

    #[test]
    fn test_client_from_config() {
        let config = HttpConfig {
            timeout_secs: 1,
            connect_timeout_secs: 1,
            user_agent: Some("test-agent".to_string()),
        };
        assert!(HttpClient::from_config(&config).is_ok());
    }
}
