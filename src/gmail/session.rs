//! OAuth access-token session for the Gmail API.
//!
//! A [`TokenSession`] is created explicitly and handed to every Gmail call.
//! It holds at most one bearer token, obtained through an
//! [`IdentityProvider`] and kept until [`TokenSession::disconnect`]. There is
//! no expiry tracking: an expired token only shows up as a 401 from Gmail.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::config::GmailConfig;
use crate::error::{GmailError, Result};

const CONSENT_PROMPT: &str = "consent";

/// What the identity provider's bootstrap step yields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderMetadata {
    pub authorization_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub prompt: String,
}

impl ConsentRequest {
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// External identity provider seam.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// One-time bootstrap. Errors surface as `ScriptLoadFailure`.
    async fn load(&self) -> Result<ProviderMetadata>;

    /// Interactive consent. Errors surface as `OAuthFailure`.
    async fn request_access_token(
        &self,
        metadata: &ProviderMetadata,
        request: &ConsentRequest,
    ) -> Result<String>;
}

pub struct TokenSession {
    config: GmailConfig,
    provider: Arc<dyn IdentityProvider>,
    bootstrap: OnceCell<ProviderMetadata>,
    // holds the failure of the last finished attempt
    consent_gate: Mutex<Option<GmailError>>,
    finished_attempts: AtomicU64,
    token: RwLock<Option<String>>,
}

impl std::fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSession")
            .field("client_id", &self.config.client_id)
            .field("bootstrapped", &self.bootstrap.initialized())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl TokenSession {
    pub fn new(config: GmailConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config,
            provider,
            bootstrap: OnceCell::new(),
            consent_gate: Mutex::new(None),
            finished_attempts: AtomicU64::new(0),
            token: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &GmailConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.cached_token().is_some()
    }

    /// Returns the cached token, or runs bootstrap and consent to get one.
    ///
    /// Concurrent first-time callers share a single attempt: whoever waits on
    /// the gate gets the outcome of the attempt that finished meanwhile,
    /// either its cached token or its error.
    pub async fn connect(&self) -> Result<String> {
        self.config.validate()?;

        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let observed = self.finished_attempts.load(Ordering::Acquire);
        let mut last_failure = self.consent_gate.lock().await;
        if let Some(token) = self.cached_token() {
            debug!("gmail token became available while waiting on consent gate");
            return Ok(token);
        }
        if self.finished_attempts.load(Ordering::Acquire) != observed {
            if let Some(error) = last_failure.as_ref() {
                debug!("sharing the failure of the consent attempt that ran while waiting");
                return Err(error.clone());
            }
        }

        let outcome = self.run_consent_flow().await;
        *last_failure = outcome.as_ref().err().cloned();
        self.finished_attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn run_consent_flow(&self) -> Result<String> {
        let metadata = self.bootstrap().await?;
        let request = self.consent_request();

        let token = self
            .provider
            .request_access_token(metadata, &request)
            .await
            .map_err(|error| {
                warn!("gmail oauth consent failed: {error}");
                match error {
                    GmailError::OAuthFailure(_) => error,
                    other => GmailError::OAuthFailure(other.to_string()),
                }
            })?;

        if token.trim().is_empty() {
            return Err(GmailError::OAuthFailure(
                "identity provider returned an empty access token".to_string(),
            ));
        }

        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        info!("gmail session connected");
        Ok(token)
    }

    /// Drops the cached token. The bootstrap stays loaded.
    pub fn disconnect(&self) {
        let previous = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            info!("gmail session disconnected");
        }
    }

    /// `Bearer <token>` for the Authorization header.
    pub fn authorization(&self) -> Result<String> {
        self.cached_token()
            .map(|token| format!("Bearer {token}"))
            .ok_or(GmailError::NotAuthenticated)
    }

    fn cached_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn bootstrap(&self) -> Result<&ProviderMetadata> {
        self.bootstrap
            .get_or_try_init(|| async {
                debug!("loading identity provider bootstrap");
                self.provider.load().await.map_err(|error| match error {
                    GmailError::ScriptLoadFailure(_) => error,
                    other => GmailError::ScriptLoadFailure(other.to_string()),
                })
            })
            .await
    }

    fn consent_request(&self) -> ConsentRequest {
        ConsentRequest {
            client_id: self.config.client_id.clone(),
            scopes: self
                .config
                .scopes()
                .iter()
                .map(|scope| scope.to_string())
                .collect(),
            prompt: CONSENT_PROMPT.to_string(),
        }
    }
}
