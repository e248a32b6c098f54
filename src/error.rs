// Error handling module
// Defines the gateway's outcome taxonomy

use thiserror::Error;

/// Errors surfaced by the gateway to its caller.
///
/// The variants are deliberately distinct: the UI-level response differs for
/// each of them, so they must never be collapsed into one error type.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No access or refresh token in the store; no network call was made.
    /// Caller should route to login.
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    /// A 401 survived one refresh-and-retry cycle. Caller should clear its
    /// auth state and route to login, preserving other UI state.
    #[error("session expired")]
    SessionExpired,

    /// The refresh endpoint returned a non-JSON (markup) body. This
    /// indicates a backend outage or misconfiguration, not an expired
    /// session; caller should surface a transient error, not force re-login.
    #[error("refresh endpoint returned a malformed response")]
    RefreshMalformed { body: String },

    /// Any non-auth HTTP error from the protected API, passed through
    /// unchanged.
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// Network-level failure from the HTTP client.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Truly exceptional conditions (e.g. credential store I/O).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// True when the caller should present the session-expired path
    /// (force re-login).
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            GatewayError::SessionExpired | GatewayError::MissingCredentials(_)
        )
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
