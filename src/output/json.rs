use anyhow::Result;
use serde_json::json;

use crate::gmail::{MessageListItem, SentMessage};

pub fn format_inbox(items: &[MessageListItem]) -> Result<String> {
    Ok(serde_json::to_string_pretty(items)?)
}

pub fn format_message_text(message_id: &str, text: &str) -> Result<String> {
    Ok(serde_json::to_string_pretty(&json!({
        "id": message_id,
        "text": text,
    }))?)
}

pub fn format_sent(sent: &SentMessage) -> Result<String> {
    Ok(serde_json::to_string_pretty(sent)?)
}
