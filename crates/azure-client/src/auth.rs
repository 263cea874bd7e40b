//! Service principal authentication
//!
//! Acquires ARM access tokens with the OAuth2 client credentials flow and
//! caches them until shortly before they expire.

use crate::error::AzureError;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Service principal credentials of one Azure subscription
#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    /// Azure AD tenant ID
    pub tenant_id: String,
    /// Application (client) ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Subscription ID
    pub subscription_id: String,
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

/// Endpoints of an Azure cloud (public, China, government, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureEnvironment {
    /// Resource Manager endpoint, e.g. `https://management.azure.com`
    pub resource_manager_url: String,
    /// Active Directory authority, e.g. `https://login.microsoftonline.com`
    pub authority_url: String,
}

impl Default for AzureEnvironment {
    fn default() -> Self {
        Self {
            resource_manager_url: "https://management.azure.com".to_string(),
            authority_url: "https://login.microsoftonline.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Caching token source for one service principal
pub(crate) struct TokenProvider {
    credentials: AzureCredentials,
    token_url: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub(crate) fn new(credentials: AzureCredentials, environment: &AzureEnvironment) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            environment.authority_url.trim_end_matches('/'),
            credentials.tenant_id
        );
        let scope = format!("{}/.default", environment.resource_manager_url.trim_end_matches('/'));
        Self {
            credentials,
            token_url,
            scope,
            cached: Mutex::new(None),
        }
    }

    pub(crate) fn subscription_id(&self) -> &str {
        &self.credentials.subscription_id
    }

    /// Returns a valid bearer token, fetching a new one when needed
    pub(crate) async fn token(&self, client: &Client) -> Result<String, AzureError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting ARM token for client {}", self.credentials.client_id);
        let response = client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AzureError::Authentication(format!(
                "token request failed: {status} - {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        let refresh_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at,
        });

        Ok(token.access_token)
    }
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("credentials", &self.credentials)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}
