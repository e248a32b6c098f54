use anyhow::{Context, Result};

/// Gateway configuration
///
/// The token endpoint is authenticated with a static client id/secret pair
/// (HTTP Basic), not the expiring user token.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Base URL of the protected form-builder API
    pub api_base_url: String,

    /// Full URL of the token refresh endpoint
    pub token_endpoint: String,

    /// Static client credential for the token endpoint
    pub client_id: String,
    pub client_secret: String,

    // Timeouts (seconds)
    pub connect_timeout: u64,
    pub request_timeout: u64,
}

impl GatewayConfig {
    /// Load configuration from the environment with priority: ENV > defaults
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = GatewayConfig {
            api_base_url: std::env::var("FORMGATE_API_BASE_URL")
                .context("FORMGATE_API_BASE_URL is required")?,

            token_endpoint: std::env::var("FORMGATE_TOKEN_ENDPOINT")
                .context("FORMGATE_TOKEN_ENDPOINT is required")?,

            client_id: std::env::var("FORMGATE_CLIENT_ID")
                .context("FORMGATE_CLIENT_ID is required")?,

            client_secret: std::env::var("FORMGATE_CLIENT_SECRET")
                .context("FORMGATE_CLIENT_SECRET is required")?,

            connect_timeout: std::env::var("FORMGATE_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            request_timeout: std::env::var("FORMGATE_REQUEST_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        };

        config.validate()?;
        Ok(config)
    }

    /// Build a configuration directly (embedders and tests)
    pub fn new(
        api_base_url: impl Into<String>,
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            connect_timeout: 30,
            request_timeout: 300,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("http") {
            anyhow::bail!("FORMGATE_API_BASE_URL must be an http(s) URL: {}", self.api_base_url);
        }

        if !self.token_endpoint.starts_with("http") {
            anyhow::bail!("FORMGATE_TOKEN_ENDPOINT must be an http(s) URL: {}", self.token_endpoint);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_constructor_defaults() {
        let config = GatewayConfig::new(
            "https://api.example.com",
            "https://auth.example.com/oauth/token",
            "admin-console",
            "s3cret",
        );

        assert_eq!(config.connect_timeout, 30);
        assert_eq!(config.request_timeout, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_http_base_url() {
        let config = GatewayConfig::new(
            "ftp://api.example.com",
            "https://auth.example.com/oauth/token",
            "admin-console",
            "s3cret",
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_token_endpoint() {
        let config = GatewayConfig::new(
            "https://api.example.com",
            "token.example.com",
            "admin-console",
            "s3cret",
        );
        assert!(config.validate().is_err());
    }
}
