pub mod json;
pub mod table;

use anyhow::Result;

use crate::gmail::{MessageListItem, SentMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Table
        }
    }
}

pub fn format_inbox(format: OutputFormat, items: &[MessageListItem]) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_inbox(items)),
        OutputFormat::Json => json::format_inbox(items),
    }
}

pub fn format_message_text(format: OutputFormat, message_id: &str, text: &str) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_message_text(message_id, text)),
        OutputFormat::Json => json::format_message_text(message_id, text),
    }
}

pub fn format_sent(format: OutputFormat, sent: &SentMessage) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_sent(sent)),
        OutputFormat::Json => json::format_sent(sent),
    }
}
