use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::gmail::api::{header_value, GmailMessage, GmailMessageList};
use crate::gmail::client::GmailClient;
use crate::gmail::mime::message_text;
use crate::gmail::session::TokenSession;

/// Gmail's upper bound for `messages.list?maxResults`.
pub const MAX_PAGE_SIZE: u32 = 500;
const MAX_CONCURRENT_METADATA_FETCHES: usize = 40;
const METADATA_HEADERS: [&str; 3] = ["Subject", "From", "Message-ID"];

/// One inbox entry with the headers needed to show and answer it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageListItem {
    pub id: String,
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id_header: Option<String>,
}

impl From<GmailMessage> for MessageListItem {
    fn from(message: GmailMessage) -> Self {
        let payload = message.payload.as_ref();
        let subject = header_value(payload, "Subject");
        let from = header_value(payload, "From");
        let message_id_header = header_value(payload, "Message-ID");

        Self {
            id: message.id,
            thread_id: message.thread_id,
            snippet: message.snippet,
            subject,
            from,
            message_id_header,
        }
    }
}

impl GmailClient {
    /// Up to `max_results` inbox messages with Subject/From/Message-ID, in the
    /// order Gmail listed them. One failed request fails the whole listing.
    pub async fn list_inbox(
        &self,
        session: &TokenSession,
        max_results: u32,
    ) -> Result<Vec<MessageListItem>> {
        session.connect().await?;

        let max_results = max_results.min(MAX_PAGE_SIZE);
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let url = self.url(&format!(
            "/users/me/messages?maxResults={max_results}&q={}",
            urlencoding::encode("in:inbox")
        ));
        let list: GmailMessageList = self.get_json(session, &url, "list inbox").await?;
        debug!("inbox listing returned {} ids", list.messages.len());

        // completion order is arbitrary and the first error aborts the rest;
        // results carry their listing index and are re-sorted afterwards
        let mut indexed: Vec<(usize, MessageListItem)> =
            stream::iter(list.messages.into_iter().enumerate())
                .map(|(index, stub)| async move {
                    self.fetch_metadata(session, &stub.id)
                        .await
                        .map(|item| (index, item))
                })
                .buffer_unordered(MAX_CONCURRENT_METADATA_FETCHES)
                .try_collect()
                .await?;
        indexed.sort_unstable_by_key(|(index, _)| *index);
        let items: Vec<MessageListItem> = indexed.into_iter().map(|(_, item)| item).collect();

        info!("listed {} inbox messages", items.len());
        Ok(items)
    }

    pub async fn get_message_metadata(
        &self,
        session: &TokenSession,
        message_id: &str,
    ) -> Result<MessageListItem> {
        session.connect().await?;
        self.fetch_metadata(session, message_id).await
    }

    /// Plain-text body, else raw HTML body, else snippet, else "".
    pub async fn get_message_text(
        &self,
        session: &TokenSession,
        message_id: &str,
    ) -> Result<String> {
        session.connect().await?;

        let url = self.url(&format!(
            "/users/me/messages/{}?format=full",
            urlencoding::encode(message_id)
        ));
        let message: GmailMessage = self.get_json(session, &url, "read message").await?;
        Ok(message_text(&message))
    }

    async fn fetch_metadata(
        &self,
        session: &TokenSession,
        message_id: &str,
    ) -> Result<MessageListItem> {
        let headers = METADATA_HEADERS
            .iter()
            .map(|name| format!("&metadataHeaders={name}"))
            .collect::<String>();
        let url = self.url(&format!(
            "/users/me/messages/{}?format=metadata{headers}",
            urlencoding::encode(message_id)
        ));

        let message: GmailMessage = self
            .get_json(session, &url, "fetch message metadata")
            .await?;
        Ok(message.into())
    }
}
