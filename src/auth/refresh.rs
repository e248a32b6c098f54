// Token refresh logic

use anyhow::{Context, Result};
use reqwest::Client;

use crate::config::GatewayConfig;

use super::types::{BodyKind, CredentialPair, RefreshOutcome, RefreshRequest, RefreshedSession, TokenResponse};

/// Client for the token refresh endpoint.
///
/// The refresh call is authenticated with the static client id/secret
/// (HTTP Basic), never with the expiring user token.
pub struct RefreshClient {
    client: Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
}

impl RefreshClient {
    pub fn new(client: Client, config: &GatewayConfig) -> Self {
        Self {
            client,
            token_endpoint: config.token_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// Exchange a refresh token for a new credential pair.
    ///
    /// Transport-level failures (connect, timeout) surface as `Err`; every
    /// response from the endpoint, success or rejection, maps to a
    /// `RefreshOutcome`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome> {
        tracing::debug!(endpoint = %self.token_endpoint, "Refreshing access token");

        let form = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
        };

        let response = self
            .client
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&form)
            .send()
            .await
            .context("Failed to send token refresh request")?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .context("Failed to read token refresh response body")?;

        // Classified exactly once, here at the transport boundary
        let body = BodyKind::classify(&raw);

        let value = match body {
            BodyKind::NonJson(raw) => {
                tracing::error!(
                    status = status.as_u16(),
                    "Token endpoint returned a non-JSON body"
                );
                return Ok(RefreshOutcome::Invalid(raw));
            }
            BodyKind::Json(value) => value,
        };

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                body = %value,
                "Token refresh rejected"
            );
            return Ok(RefreshOutcome::Denied {
                status: status.as_u16(),
                body: value.to_string(),
            });
        }

        let data: TokenResponse = match serde_json::from_value(value.clone()) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh response missing expected fields");
                return Ok(RefreshOutcome::Denied {
                    status: status.as_u16(),
                    body: value.to_string(),
                });
            }
        };

        if data.access_token.is_empty() {
            return Ok(RefreshOutcome::Denied {
                status: status.as_u16(),
                body: "response does not contain access_token".to_string(),
            });
        }

        tracing::info!("Access token refreshed");

        Ok(RefreshOutcome::Refreshed(RefreshedSession {
            pair: CredentialPair {
                access_token: Some(data.access_token),
                refresh_token: data.refresh_token,
            },
            user_name: data.user_name,
            user_role: data.user_role,
        }))
    }
}
