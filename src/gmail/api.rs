//! Gmail REST v1 wire types. Only the fields this crate reads are modelled;
//! unknown fields are ignored by serde.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GmailMessageList {
    #[serde(default)]
    pub messages: Vec<GmailMessageStub>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GmailMessageStub {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailMessage {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
    pub snippet: Option<String>,
    pub payload: Option<GmailPayload>,
}

/// One node of a message's MIME tree.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GmailPayload {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub headers: Option<Vec<GmailHeader>>,
    pub body: Option<GmailBody>,
    pub parts: Option<Vec<GmailPayload>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GmailBody {
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GmailSendRequest<'a> {
    #[serde(rename = "threadId")]
    pub thread_id: &'a str,
    pub raw: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GmailSendResponse {
    pub id: Option<String>,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

/// Case-insensitive header lookup; the first match wins.
pub fn header_value(payload: Option<&GmailPayload>, name: &str) -> Option<String> {
    payload?
        .headers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}
