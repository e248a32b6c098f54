use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::auth::{CredentialPair, CredentialStore, RefreshClient, RefreshOutcome};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// One logical call against the protected API.
///
/// The descriptor is opaque to the gateway: method, path, body and
/// caller-supplied headers pass through unchanged. The gateway only adds or
/// overwrites the Authorization header.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    pub fn header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Authenticated request gateway.
///
/// Wraps every outbound call to the form-builder API: attaches the bearer
/// credential from the injected store, performs at most one
/// refresh-and-replay cycle on a 401, clears credentials and raises the
/// session-expired signal when the cycle fails.
pub struct AuthGateway {
    /// Shared HTTP client with connection pooling
    client: Client,

    config: GatewayConfig,

    /// Injected credential persistence; read at the start of every attempt
    store: Arc<dyn CredentialStore>,

    refresh_client: RefreshClient,

    /// Serializes refreshes so N concurrent 401s produce one refresh call
    refresh_lock: Mutex<()>,

    /// Level-triggered session-expired signal for the UI shell
    session_tx: watch::Sender<bool>,
}

impl AuthGateway {
    pub fn new(config: GatewayConfig, store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        // Redirects stay disabled so a 401 is observed as the original
        // status rather than being masked by an auth redirect.
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        let refresh_client = RefreshClient::new(client.clone(), &config);
        let (session_tx, _) = watch::channel(false);

        Ok(Self {
            client,
            config,
            store,
            refresh_client,
            refresh_lock: Mutex::new(()),
            session_tx,
        })
    }

    /// Execute a request with at most one refresh-and-replay cycle.
    ///
    /// Per logical call the order is strictly: dispatch, then (only on a
    /// 401) refresh, then one replay. The replay's 401 is terminal; there is
    /// never a second refresh.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response> {
        let request_id = Uuid::new_v4();

        // Fast fail: with no stored tokens at all, a dispatch would 401 and
        // then have no refresh token to recover with. Skip the network.
        let pair = self.store.read()?;
        let access_token = match (&pair.access_token, &pair.refresh_token) {
            (Some(access), Some(_)) => access.clone(),
            (None, _) => return Err(GatewayError::MissingCredentials("no access token stored")),
            (_, None) => return Err(GatewayError::MissingCredentials("no refresh token stored")),
        };

        // Explicit guard for the at-most-one-refresh invariant
        let mut refreshed_once = false;
        let mut token = access_token;

        loop {
            let response = self.dispatch(&descriptor, &token, request_id).await?;
            let status = response.status();

            if status != StatusCode::UNAUTHORIZED {
                return Self::map_response(response).await;
            }

            if refreshed_once {
                tracing::warn!(
                    request_id = %request_id,
                    "Replay was rejected again after refresh, session expired"
                );
                // The freshly issued pair was rejected outright; it is dead.
                // Destroy it so the next call fast-fails to login instead of
                // re-dispatching with a known-bad token.
                self.store.clear()?;
                self.raise_session_expired();
                return Err(GatewayError::SessionExpired);
            }
            refreshed_once = true;

            token = self.refresh_credentials(&token, request_id).await?;
            tracing::debug!(request_id = %request_id, "Replaying request with refreshed token");
        }
    }

    /// Sign in: store a freshly issued pair and clear the expired flag
    pub fn sign_in(&self, pair: CredentialPair) -> Result<()> {
        self.store.write(&pair)?;
        self.session_tx.send_replace(false);
        Ok(())
    }

    /// Sign out: destroy both tokens
    pub fn sign_out(&self) -> Result<()> {
        self.store.clear()?;
        Ok(())
    }

    /// Observe the session-expired signal. Late subscribers see the current
    /// state immediately.
    pub fn subscribe_session_expired(&self) -> watch::Receiver<bool> {
        self.session_tx.subscribe()
    }

    /// Current value of the session-expired signal
    pub fn session_expired(&self) -> bool {
        *self.session_tx.borrow()
    }

    /// Clear the session-expired flag without touching the store
    pub fn reset_session(&self) {
        self.session_tx.send_replace(false);
    }

    fn raise_session_expired(&self) {
        self.session_tx.send_replace(true);
    }

    /// Build and send one attempt. Caller headers are preserved; only the
    /// Authorization header is overwritten.
    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        access_token: &str,
        request_id: Uuid,
    ) -> Result<Response> {
        let url = join_url(&self.config.api_base_url, &descriptor.path);

        tracing::debug!(
            request_id = %request_id,
            method = %descriptor.method,
            url = %url,
            "Dispatching request"
        );

        let mut headers = descriptor.headers.clone();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|e| GatewayError::Internal(anyhow::anyhow!("invalid access token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);

        let mut builder = self
            .client
            .request(descriptor.method.clone(), &url)
            .headers(headers);

        if let Some(ref body) = descriptor.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;

        tracing::debug!(
            request_id = %request_id,
            status = %response.status(),
            "Received response"
        );

        Ok(response)
    }

    /// Run one refresh under the in-flight lock and persist the result.
    /// Returns the access token to replay with.
    async fn refresh_credentials(&self, stale_token: &str, request_id: Uuid) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        // Another call may have finished its refresh while this one waited
        // for the lock; the stored token is then already the replacement.
        let current = self.store.read()?;
        if let Some(ref access) = current.access_token {
            if access != stale_token {
                tracing::debug!(
                    request_id = %request_id,
                    "Token already refreshed by a concurrent call"
                );
                return Ok(access.clone());
            }
        }

        let refresh_token = match current.refresh_token {
            Some(token) => token,
            None => {
                tracing::warn!(request_id = %request_id, "No refresh token available");
                self.raise_session_expired();
                return Err(GatewayError::SessionExpired);
            }
        };

        tracing::info!(request_id = %request_id, "Access token rejected, attempting refresh");

        match self.refresh_client.refresh(&refresh_token).await {
            Ok(RefreshOutcome::Refreshed(session)) => {
                self.store.write(&session.pair)?;
                if let Some(ref user) = session.user_name {
                    tracing::debug!(request_id = %request_id, user = %user, "Session refreshed");
                }
                session
                    .pair
                    .access_token
                    .ok_or_else(|| GatewayError::Internal(anyhow::anyhow!("refreshed pair has no access token")))
            }

            // Markup body: the token endpoint itself is down or
            // misconfigured. Credentials stay intact, no replay.
            Ok(RefreshOutcome::Invalid(body)) => {
                tracing::error!(
                    request_id = %request_id,
                    "Token endpoint returned non-JSON body, treating as backend fault"
                );
                Err(GatewayError::RefreshMalformed { body })
            }

            Ok(RefreshOutcome::Denied { status, body }) => {
                tracing::warn!(
                    request_id = %request_id,
                    status = status,
                    body = %body,
                    "Refresh denied, clearing credentials"
                );
                self.store.clear()?;
                self.raise_session_expired();
                Err(GatewayError::SessionExpired)
            }

            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Refresh request failed");
                self.store.clear()?;
                self.raise_session_expired();
                Err(GatewayError::SessionExpired)
            }
        }
    }

    /// Map a settled non-401 response: 2xx passes through, anything else
    /// surfaces verbatim as an API error.
    async fn map_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            status = status.as_u16(),
            body = %body,
            "Request failed with non-auth error"
        );
        Err(GatewayError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;

    fn test_gateway(store: Arc<dyn CredentialStore>) -> AuthGateway {
        let config = GatewayConfig::new(
            "https://api.example.com",
            "https://auth.example.com/oauth/token",
            "admin-console",
            "s3cret",
        );
        AuthGateway::new(config, store).unwrap()
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.example.com", "/forms"),
            "https://api.example.com/forms"
        );
        assert_eq!(
            join_url("https://api.example.com/", "forms/42"),
            "https://api.example.com/forms/42"
        );
    }

    #[test]
    fn test_descriptor_builders() {
        let descriptor = RequestDescriptor::get("/forms")
            .header(
                reqwest::header::ACCEPT,
                HeaderValue::from_static("application/json"),
            );
        assert_eq!(descriptor.method, Method::GET);
        assert_eq!(descriptor.path, "/forms");
        assert!(descriptor.body.is_none());
        assert_eq!(descriptor.headers.len(), 1);

        let descriptor = RequestDescriptor::post("/forms", serde_json::json!({"name": "intake"}));
        assert_eq!(descriptor.method, Method::POST);
        assert!(descriptor.body.is_some());
    }

    #[tokio::test]
    async fn test_session_signal_lifecycle() {
        let gateway = test_gateway(Arc::new(MemoryStore::new()));

        assert!(!gateway.session_expired());

        gateway.raise_session_expired();
        assert!(gateway.session_expired());

        let rx = gateway.subscribe_session_expired();
        assert!(*rx.borrow());

        gateway.reset_session();
        assert!(!gateway.session_expired());
    }

    #[tokio::test]
    async fn test_sign_in_resets_session_signal() {
        let store = Arc::new(MemoryStore::new());
        let gateway = test_gateway(store.clone());

        gateway.raise_session_expired();
        gateway
            .sign_in(CredentialPair::new("access", "refresh"))
            .unwrap();

        assert!(!gateway.session_expired());
        assert_eq!(
            store.read().unwrap(),
            CredentialPair::new("access", "refresh")
        );
    }

    #[tokio::test]
    async fn test_sign_out_clears_store() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("a", "r")));
        let gateway = test_gateway(store.clone());

        gateway.sign_out().unwrap();
        assert!(store.read().unwrap().is_empty());
    }
}
