use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::gmail::{MessageListItem, SentMessage};

const ID_WIDTH: usize = 16;
const FROM_WIDTH: usize = 28;
const SUBJECT_WIDTH: usize = 52;

pub fn format_inbox(items: &[MessageListItem]) -> String {
    if items.is_empty() {
        return "Inbox is empty.".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<id$}  {:<from$}  {:<subject$}\n",
        "ID",
        "From",
        "Subject",
        id = ID_WIDTH,
        from = FROM_WIDTH,
        subject = SUBJECT_WIDTH,
    ));
    out.push_str(&format!(
        "{}  {}  {}\n",
        "-".repeat(ID_WIDTH),
        "-".repeat(FROM_WIDTH),
        "-".repeat(SUBJECT_WIDTH)
    ));

    for item in items {
        let id = truncate_for_width(&item.id, ID_WIDTH);
        let from = truncate_for_width(item.from.as_deref().unwrap_or("(unknown)"), FROM_WIDTH);
        let subject = truncate_for_width(
            item.subject.as_deref().unwrap_or("(no subject)"),
            SUBJECT_WIDTH,
        );

        // width-aware padding; `{:<n}` counts chars, not terminal columns
        out.push_str(&pad_to_width(&id, ID_WIDTH));
        out.push_str("  ");
        out.push_str(&pad_to_width(&from, FROM_WIDTH));
        out.push_str("  ");
        out.push_str(&subject);
        out.push('\n');
    }

    out
}

pub fn format_message_text(message_id: &str, text: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("ID: {message_id}\n"));
    out.push('\n');
    out.push_str("Body\n");
    out.push_str("----\n");
    if text.trim().is_empty() {
        out.push_str("(empty)");
    } else {
        out.push_str(text);
    }
    out.push('\n');
    out
}

pub fn format_sent(sent: &SentMessage) -> String {
    if sent.id.is_empty() {
        return format!("Reply sent in thread {}.", sent.thread_id);
    }
    format!("Reply {} sent in thread {}.", sent.id, sent.thread_id)
}

fn pad_to_width(value: &str, width: usize) -> String {
    let current = UnicodeWidthStr::width(value);
    let mut out = value.to_string();
    if current < width {
        out.push_str(&" ".repeat(width - current));
    }
    out
}

fn truncate_for_width(value: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(value) <= max_width {
        return value.to_string();
    }

    if max_width <= 1 {
        return "…".to_string();
    }

    let mut out = String::new();
    let mut width = 0usize;
    for c in value.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw + 1 > max_width {
            break;
        }
        out.push(c);
        width += cw;
    }
    out.push('…');
    out
}
