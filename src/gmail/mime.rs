//! Locating and decoding body parts inside a Gmail MIME payload tree.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use tracing::debug;

use crate::gmail::api::{GmailMessage, GmailPayload};

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded text of the first pre-order node whose `mimeType` equals
/// `mime_type` exactly and which carries inline body data.
pub fn resolve_body(payload: &GmailPayload, mime_type: &str) -> Option<String> {
    find_body_data(payload, mime_type).map(decode_base64url)
}

/// Raw base64url data of the first matching node. Uses an explicit stack so
/// arbitrarily deep trees cannot overflow the call stack.
pub fn find_body_data<'a>(payload: &'a GmailPayload, mime_type: &str) -> Option<&'a str> {
    let mut stack = vec![payload];

    while let Some(node) = stack.pop() {
        if node.mime_type.as_deref() == Some(mime_type) {
            if let Some(data) = inline_data(node) {
                return Some(data);
            }
        }

        if let Some(parts) = &node.parts {
            // reversed so the left-most child is visited first
            stack.extend(parts.iter().rev());
        }
    }

    None
}

fn inline_data(node: &GmailPayload) -> Option<&str> {
    node.body
        .as_ref()
        .and_then(|body| body.data.as_deref())
        .filter(|data| !data.is_empty())
}

/// Readable text of a full message: plain text, then unsanitized HTML, then
/// the snippet, then the empty string.
pub fn message_text(message: &GmailMessage) -> String {
    let snippet = || message.snippet.clone().unwrap_or_default();

    let Some(payload) = &message.payload else {
        return snippet();
    };

    if let Some(plain) = resolve_body(payload, TEXT_PLAIN) {
        return plain;
    }

    if let Some(html) = resolve_body(payload, TEXT_HTML) {
        debug!(message_id = %message.id, "no text/plain part, returning text/html body");
        return html;
    }

    snippet()
}

/// Decodes Gmail's base64url body data. Never fails: bytes that are not
/// UTF-8 come back as one char per byte, and data that is not base64 at all
/// is returned untouched.
pub fn decode_base64url(data: &str) -> String {
    let mut standard: String = data
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while standard.len() % 4 != 0 {
        standard.push('=');
    }

    let bytes = match LENIENT_STANDARD.decode(&standard) {
        Ok(bytes) => bytes,
        Err(error) => {
            debug!("body data is not valid base64url ({error}), returning as-is");
            return data.to_string();
        }
    };

    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(error) => error.into_bytes().into_iter().map(char::from).collect(),
    }
}

/// Standard base64 with `-`/`_` substituted and trailing `=` stripped.
pub fn encode_base64url(text: &str) -> String {
    URL_SAFE_NO_PAD.encode(text.as_bytes())
}
