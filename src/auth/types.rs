// Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The token pair held by the credential store.
///
/// A request may be attempted only while `access_token` is present; a
/// `refresh_token` alone is insufficient to call protected endpoints but is
/// sufficient to attempt a refresh. Both fields are cleared together on
/// sign-out, on refresh failure, and on an unrecoverable 401.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// True when both tokens are absent
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Persisted credential record: the pair plus bookkeeping written by the
/// store alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(flatten)]
    pub pair: CredentialPair,
    pub updated_at: DateTime<Utc>,
}

/// Token endpoint success response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_name: Option<String>,
    pub user_role: Option<String>,
}

/// Token endpoint refresh request (form-encoded)
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub grant_type: &'static str,
    pub refresh_token: &'a str,
}

/// A freshly refreshed session: the replacement pair plus the identity
/// fields the token endpoint echoes back.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub pair: CredentialPair,
    pub user_name: Option<String>,
    pub user_role: Option<String>,
}

/// Result of one refresh attempt against the token endpoint.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// New credential pair issued
    Refreshed(RefreshedSession),

    /// The endpoint answered with a non-JSON (markup) body: the endpoint
    /// itself is unreachable or misconfigured, not the token merely expired
    Invalid(String),

    /// Structured JSON rejection (expired/revoked refresh token, bad client
    /// credential)
    Denied { status: u16, body: String },
}

/// Classification of a response body, decided once at the transport
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyKind {
    Json(serde_json::Value),
    NonJson(String),
}

impl BodyKind {
    /// Classify a raw response body. Markup bodies (reverse-proxy error
    /// pages, login redirects rendered as HTML) start with `<` after
    /// leading whitespace; everything else must parse as JSON to count.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('<') {
            return BodyKind::NonJson(raw.to_string());
        }

        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => BodyKind::Json(value),
            Err(_) => BodyKind::NonJson(raw.to_string()),
        }
    }
}
