//! Browser-based implicit (token) flow against Google's identity service.
//!
//! The token comes back in the redirect URL fragment, which browsers never
//! send to a server. The loopback listener therefore answers the first hit
//! with a page that re-requests `/callback?<fragment>`.

use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GmailConfig;
use crate::error::{redact_response_body, GmailError, Result};
use crate::gmail::session::{ConsentRequest, IdentityProvider, ProviderMetadata};

const FORWARD_FRAGMENT_PAGE: &str = "<!doctype html><html><body>\
<p>Completing Gmail sign-in&hellip;</p>\
<script>var f = window.location.hash.substring(1);\
window.location.replace('/callback?' + (f || 'error=missing_fragment'));</script>\
</body></html>";
const DONE_PAGE: &str =
    "<!doctype html><html><body><h1>Gmail connected. You can close this window.</h1></body></html>";
const FAILED_PAGE: &str =
    "<!doctype html><html><body><h1>Gmail sign-in failed. You can close this window.</h1></body></html>";

/// Opens the consent URL for the user.
pub type BrowserLauncher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct LoopbackIdentityProvider {
    http: Client,
    discovery_url: String,
    redirect_ports: RangeInclusive<u16>,
    launcher: Option<BrowserLauncher>,
}

impl std::fmt::Debug for LoopbackIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackIdentityProvider")
            .field("discovery_url", &self.discovery_url)
            .field("redirect_ports", &self.redirect_ports)
            .field("opens_browser", &self.launcher.is_some())
            .finish()
    }
}

impl LoopbackIdentityProvider {
    pub fn new(config: &GmailConfig) -> Self {
        Self {
            http: Client::new(),
            discovery_url: config.discovery_url.clone(),
            redirect_ports: config.redirect_ports.clone(),
            launcher: Some(Arc::new(|url: &str| open::that(url))),
        }
    }

    /// Only log the consent URL instead of launching a browser.
    pub fn without_browser(mut self) -> Self {
        self.launcher = None;
        self
    }

    /// Hands the consent URL to `launcher` instead of the system browser.
    pub fn with_browser_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    async fn bind_redirect_listener(&self) -> Result<(TcpListener, u16)> {
        for port in self.redirect_ports.clone() {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
                return Ok((listener, port));
            }
        }
        Err(GmailError::OAuthFailure(format!(
            "could not bind a loopback redirect port in {}-{}",
            self.redirect_ports.start(),
            self.redirect_ports.end()
        )))
    }

    async fn wait_for_redirect(&self, listener: TcpListener) -> Result<RedirectParams> {
        loop {
            let (stream, peer) = listener.accept().await.map_err(|error| {
                GmailError::OAuthFailure(format!("accept oauth redirect: {error}"))
            })?;
            debug!(%peer, "oauth redirect connection");

            match handle_redirect_connection(stream).await {
                Ok(Some(params)) => return Ok(params),
                Ok(None) => continue,
                Err(error) => warn!("ignoring malformed oauth redirect request: {error}"),
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for LoopbackIdentityProvider {
    async fn load(&self) -> Result<ProviderMetadata> {
        let response = self
            .http
            .get(&self.discovery_url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|error| {
                GmailError::ScriptLoadFailure(format!(
                    "request {}: {error}",
                    self.discovery_url
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            GmailError::ScriptLoadFailure(format!("read discovery document: {error}"))
        })?;
        if !status.is_success() {
            return Err(GmailError::ScriptLoadFailure(format!(
                "discovery document status={} body={}",
                status,
                redact_response_body(&body)
            )));
        }

        serde_json::from_str(&body).map_err(|error| {
            GmailError::ScriptLoadFailure(format!("decode discovery document: {error}"))
        })
    }

    async fn request_access_token(
        &self,
        metadata: &ProviderMetadata,
        request: &ConsentRequest,
    ) -> Result<String> {
        let (listener, port) = self.bind_redirect_listener().await?;
        let redirect_uri = format!("http://localhost:{port}");
        let state = Uuid::new_v4().simple().to_string();
        let auth_url = consent_url(metadata, request, &redirect_uri, &state);

        info!("authorize gmail access in your browser: {auth_url}");
        if let Some(launch) = &self.launcher {
            if let Err(error) = launch(&auth_url) {
                warn!("failed to open browser ({error}); open the URL manually");
            }
        }

        let params = self.wait_for_redirect(listener).await?;
        params.into_token(&state)
    }
}

fn consent_url(
    metadata: &ProviderMetadata,
    request: &ConsentRequest,
    redirect_uri: &str,
    state: &str,
) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=token&scope={}&prompt={}&include_granted_scopes=true&state={}",
        metadata.authorization_endpoint,
        urlencoding::encode(&request.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&request.scope_param()),
        urlencoding::encode(&request.prompt),
        state,
    )
}

/// Reads one HTTP request. Returns the redirect parameters once the request
/// carries a token or an error; otherwise serves the fragment-forwarding page.
async fn handle_redirect_connection(
    mut stream: TcpStream,
) -> std::io::Result<Option<RedirectParams>> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // drain headers; closing with unread input resets the connection
    let mut header = String::new();
    loop {
        header.clear();
        if reader.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
    }

    let params = parse_request_line(&request_line);
    let (status, page) = match &params {
        Some(p) if p.access_token.is_some() && p.error.is_none() => ("200 OK", DONE_PAGE),
        Some(_) => ("400 Bad Request", FAILED_PAGE),
        None => ("200 OK", FORWARD_FRAGMENT_PAGE),
    };

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{page}",
        page.len()
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(params)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RedirectParams {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    state: Option<String>,
}

impl RedirectParams {
    fn into_token(self, expected_state: &str) -> Result<String> {
        if let Some(error) = self.error {
            return Err(GmailError::OAuthFailure(
                self.error_description.unwrap_or(error),
            ));
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(GmailError::OAuthFailure(
                "oauth redirect state does not match the request".to_string(),
            ));
        }
        self.access_token.ok_or_else(|| {
            GmailError::OAuthFailure("identity provider returned no access_token".to_string())
        })
    }
}

/// `GET /callback?access_token=...&state=... HTTP/1.1` → params. `None` when
/// the query carries neither a token nor an error.
fn parse_request_line(request_line: &str) -> Option<RedirectParams> {
    let target = request_line.split_whitespace().nth(1)?;
    let (_, query) = target.split_once('?')?;

    let mut params = RedirectParams::default();
    for pair in query.split('&') {
        let (key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(&raw_value.replace('+', " "))
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw_value.to_string());
        match key {
            "access_token" => params.access_token = Some(value),
            "error" => params.error = Some(value),
            "error_description" => params.error_description = Some(value),
            "state" => params.state = Some(value),
            _ => {}
        }
    }

    if params.access_token.is_none() && params.error.is_none() {
        return None;
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::{consent_url, parse_request_line, RedirectParams};
    use crate::error::GmailError;
    use crate::gmail::session::{ConsentRequest, ProviderMetadata};

    #[test]
    fn consent_url_carries_token_flow_parameters() {
        let url = consent_url(
            &ProviderMetadata {
                authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            },
            &ConsentRequest {
                client_id: "abc.apps.googleusercontent.com".to_string(),
                scopes: vec!["scope-a".to_string(), "scope-b".to_string()],
                prompt: "consent".to_string(),
            },
            "http://localhost:8080",
            "st4te",
        );

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("response_type=token"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("scope=scope-a%20scope-b"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080"));
        assert!(url.ends_with("state=st4te"));
    }

    #[test]
    fn bare_landing_request_has_no_params() {
        assert!(parse_request_line("GET / HTTP/1.1\r\n").is_none());
        assert!(parse_request_line("GET /favicon.ico HTTP/1.1\r\n").is_none());
        assert!(parse_request_line("").is_none());
    }

    #[test]
    fn callback_with_token_is_parsed_and_decoded() {
        let params = parse_request_line(
            "GET /callback?access_token=ya29.a%2Fb&token_type=Bearer&state=s1&expires_in=3599 HTTP/1.1",
        )
        .expect("params");
        assert_eq!(params.access_token.as_deref(), Some("ya29.a/b"));
        assert_eq!(params.into_token("s1").expect("token"), "ya29.a/b");
    }

    #[test]
    fn provider_error_wins_over_everything_else() {
        let params = parse_request_line(
            "GET /callback?error=access_denied&error_description=User+denied+access HTTP/1.1",
        )
        .expect("params");
        let error = params.into_token("s1").expect_err("denied");
        assert!(matches!(error, GmailError::OAuthFailure(ref m) if m == "User denied access"));
    }

    #[test]
    fn state_mismatch_is_rejected() {
        let params = RedirectParams {
            access_token: Some("tok".to_string()),
            state: Some("other".to_string()),
            ..RedirectParams::default()
        };
        assert!(matches!(
            params.into_token("expected"),
            Err(GmailError::OAuthFailure(_))
        ));
    }
}
