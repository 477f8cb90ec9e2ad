use std::ops::RangeInclusive;

use crate::error::{GmailError, Result};

pub const CLIENT_ID_ENV: &str = "TRIAGE_GOOGLE_CLIENT_ID";
pub const API_BASE_ENV: &str = "TRIAGE_GMAIL_API_BASE";
pub const DISCOVERY_URL_ENV: &str = "TRIAGE_GOOGLE_DISCOVERY_URL";

pub const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
pub const DEFAULT_DISCOVERY_URL: &str =
    "https://accounts.google.com/.well-known/openid-configuration";

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

const REDIRECT_PORT_START: u16 = 8080;
const REDIRECT_PORT_END: u16 = 8090;

/// Static settings for talking to Google: who we are and where the APIs live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmailConfig {
    pub client_id: String,
    pub api_base: String,
    pub discovery_url: String,
    pub redirect_ports: RangeInclusive<u16>,
}

impl GmailConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
            redirect_ports: REDIRECT_PORT_START..=REDIRECT_PORT_END,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Fails with `ConfigMissing` when the client id is blank.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(GmailError::ConfigMissing(format!(
                "google client id is empty ({CLIENT_ID_ENV})"
            )));
        }
        Ok(())
    }

    pub fn scopes(&self) -> [&'static str; 2] {
        [GMAIL_READONLY_SCOPE, GMAIL_SEND_SCOPE]
    }
}
