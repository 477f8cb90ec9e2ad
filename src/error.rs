use thiserror::Error;

const REDACTED_BODY_MAX_LEN: usize = 200;

pub type Result<T> = std::result::Result<T, GmailError>;

#[derive(Debug, Clone, Error)]
pub enum GmailError {
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    #[error("identity provider bootstrap failed: {0}")]
    ScriptLoadFailure(String),

    #[error("oauth consent failed: {0}")]
    OAuthFailure(String),

    #[error("not authenticated with gmail; connect first")]
    NotAuthenticated,

    #[error("gmail request failed{}: {message}", status_suffix(.status))]
    NetworkFailure {
        status: Option<u16>,
        message: String,
    },

    #[error("cannot derive reply recipient: {0}")]
    MissingRecipient(String),

    #[error("gmail send failed{}: {message}", status_suffix(.status))]
    SendFailure {
        status: Option<u16>,
        message: String,
    },
}

impl GmailError {
    pub(crate) fn network(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn send(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::SendFailure {
            status,
            message: message.into(),
        }
    }

    /// True when Gmail rejected the bearer token. The session is left as is;
    /// callers decide whether to disconnect and reconnect.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::NetworkFailure { status, .. } | Self::SendFailure { status, .. } => {
                matches!(status, Some(401) | Some(403))
            }
            _ => false,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" (status {code})"))
        .unwrap_or_default()
}

pub(crate) fn redact_response_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= REDACTED_BODY_MAX_LEN {
        return trimmed.to_string();
    }

    let mut cut = REDACTED_BODY_MAX_LEN;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…[truncated {} bytes]", &trimmed[..cut], trimmed.len())
}
