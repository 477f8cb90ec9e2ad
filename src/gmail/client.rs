use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::GmailConfig;
use crate::error::{redact_response_body, GmailError, Result};
use crate::gmail::session::TokenSession;

/// Thin HTTP layer over the Gmail REST API. Holds no credentials: each call
/// reads the bearer header from the [`TokenSession`] it is given.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: Client,
    api_base: String,
}

impl GmailClient {
    pub fn new(config: &GmailConfig) -> Self {
        Self::with_http_client(Client::new(), &config.api_base)
    }

    pub fn with_http_client(http: Client, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        session: &TokenSession,
        url: &str,
        what: &str,
    ) -> Result<T> {
        let request = self.http.get(url);
        let body = self.execute(session, request, what).await?;
        decode(&body, what)
    }

    pub(crate) async fn post_json<B: serde::Serialize + ?Sized>(
        &self,
        session: &TokenSession,
        url: &str,
        payload: &B,
        what: &str,
    ) -> Result<String> {
        let request = self.http.post(url).json(payload);
        self.execute(session, request, what).await
    }

    /// Sends with the session's bearer header; any transport error or
    /// non-2xx status is a `NetworkFailure`. No retries.
    async fn execute(
        &self,
        session: &TokenSession,
        request: RequestBuilder,
        what: &str,
    ) -> Result<String> {
        let authorization = session.authorization()?;
        debug!("gmail request: {what}");

        let response = request
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|error| GmailError::network(None, format!("{what}: {error}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            GmailError::network(
                Some(status.as_u16()),
                format!("{what}: read body: {error}"),
            )
        })?;

        if !status.is_success() {
            return Err(GmailError::network(
                Some(status.as_u16()),
                format!("{what}: {}", redact_response_body(&body)),
            ));
        }

        Ok(body)
    }
}

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|error| {
        GmailError::network(
            None,
            format!("decode {what}: {error} body={}", redact_response_body(body)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{decode, GmailClient};
    use crate::config::GmailConfig;
    use crate::error::GmailError;
    use crate::gmail::api::GmailMessageList;

    #[test]
    fn urls_are_joined_onto_trimmed_base() {
        let config = GmailConfig::new("id").with_api_base("http://mock/gmail/v1/");
        let client = GmailClient::new(&config);
        assert_eq!(client.api_base(), "http://mock/gmail/v1");
        assert_eq!(
            client.url("/users/me/messages"),
            "http://mock/gmail/v1/users/me/messages"
        );
    }

    #[test]
    fn undecodable_success_body_is_network_failure() {
        let error = decode::<GmailMessageList>("<html>oops</html>", "list inbox")
            .expect_err("not json");
        assert!(matches!(error, GmailError::NetworkFailure { status: None, .. }));
        assert!(error.to_string().contains("decode list inbox"));
    }
}
