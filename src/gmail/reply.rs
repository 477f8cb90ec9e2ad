//! Threaded replies: recipient and subject derivation, RFC-822 assembly and
//! submission through `messages.send`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{GmailError, Result};
use crate::gmail::api::{GmailSendRequest, GmailSendResponse};
use crate::gmail::client::GmailClient;
use crate::gmail::inbox::MessageListItem;
use crate::gmail::mime::encode_base64url;
use crate::gmail::session::TokenSession;

const FALLBACK_SUBJECT: &str = "Resposta";

static ANGLE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("compile angle address regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRequest {
    pub thread_id: String,
    pub from_header: Option<String>,
    pub subject: Option<String>,
    pub message_id_header: Option<String>,
    pub body: String,
}

impl ReplyRequest {
    /// Reply to a listed message, addressed to its sender.
    pub fn from_item(item: &MessageListItem, body: impl Into<String>) -> Self {
        Self {
            thread_id: item.thread_id.clone(),
            from_header: item.from.clone(),
            subject: item.subject.clone(),
            message_id_header: item.message_id_header.clone(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    pub id: String,
    pub thread_id: String,
}

/// `Name <addr>` → `addr`; a bracket-less header containing `@` is used as is.
pub fn extract_recipient(from_header: Option<&str>) -> Result<String> {
    let raw = from_header.map(str::trim).unwrap_or_default();

    if let Some(address) = ANGLE_ADDRESS
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim())
        .filter(|address| !address.is_empty())
    {
        return Ok(address.to_string());
    }

    if raw.contains('@') {
        return Ok(raw.to_string());
    }

    Err(GmailError::MissingRecipient(if raw.is_empty() {
        "original message has no From header".to_string()
    } else {
        format!("no email address in From header '{raw}'")
    }))
}

/// Keeps an existing `Re:` prefix (any case), otherwise adds `Re: `.
pub fn reply_subject(subject: Option<&str>) -> String {
    match subject.filter(|s| !s.is_empty()) {
        Some(s) if s.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("re:")) => s.to_string(),
        Some(s) => format!("Re: {s}"),
        None => format!("Re: {FALLBACK_SUBJECT}"),
    }
}

/// RFC-822 text: To, Subject, Content-Type, then In-Reply-To/References when
/// the original Message-ID is known; CRLF line endings; blank line; body.
pub fn build_raw_message(
    to: &str,
    subject: &str,
    message_id_header: Option<&str>,
    body: &str,
) -> String {
    let mut headers = vec![
        format!("To: {}", single_line(to)),
        format!("Subject: {}", single_line(subject)),
        "Content-Type: text/plain; charset=UTF-8".to_string(),
    ];

    if let Some(message_id) = message_id_header.filter(|id| !id.trim().is_empty()) {
        let message_id = single_line(message_id);
        headers.push(format!("In-Reply-To: {message_id}"));
        headers.push(format!("References: {message_id}"));
    }

    format!("{}\r\n\r\n{body}", headers.join("\r\n"))
}

// header values must not smuggle in extra header lines
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}

impl GmailClient {
    /// Sends `request.body` as a reply inside `request.thread_id`.
    pub async fn send_reply(
        &self,
        session: &TokenSession,
        request: &ReplyRequest,
    ) -> Result<SentMessage> {
        session.connect().await?;

        let to = extract_recipient(request.from_header.as_deref())?;
        let subject = reply_subject(request.subject.as_deref());
        let raw = build_raw_message(
            &to,
            &subject,
            request.message_id_header.as_deref(),
            &request.body,
        );
        let encoded = encode_base64url(&raw);

        let payload = GmailSendRequest {
            thread_id: &request.thread_id,
            raw: &encoded,
        };
        let url = self.url("/users/me/messages/send");
        let body = self
            .post_json(session, &url, &payload, "send reply")
            .await
            .map_err(into_send_failure)?;

        let response = parse_send_response(&body);
        let sent = SentMessage {
            id: response.id.unwrap_or_default(),
            thread_id: response
                .thread_id
                .unwrap_or_else(|| request.thread_id.clone()),
        };
        info!(thread_id = %sent.thread_id, "gmail reply sent");
        Ok(sent)
    }
}

// the message is already sent; an unreadable acknowledgement is not an error
fn parse_send_response(body: &str) -> GmailSendResponse {
    serde_json::from_str(body).unwrap_or_else(|error| {
        debug!("send response is not the expected JSON ({error}), using request thread");
        GmailSendResponse::default()
    })
}

fn into_send_failure(error: GmailError) -> GmailError {
    match error {
        GmailError::NetworkFailure { status, message } => GmailError::send(status, message),
        other => other,
    }
}
