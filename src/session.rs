//! Session context holding the HTTP client and lazily fetched credentials.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::config::{DownloadConfig, Endpoints};
use crate::error::{Error, Result};

/// Text that precedes the website token inside the script bundle.
const WT_MARKER: &str = "wt: \"";

/// Envelope shared by every JSON API response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope {
    pub status: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    token: String,
}

/// Builds the HTTP client shared by every request of a session.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client(config: &DownloadConfig) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30));
    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build()
}

/// Everything a walk needs to talk to the service.
///
/// Both credentials are fetched on first use and then reused for the
/// lifetime of the session; a failed fetch leaves the credential unset so a
/// later call tries again.
#[derive(Debug)]
pub struct Session {
    http: reqwest::Client,
    endpoints: Endpoints,
    api_token: OnceCell<String>,
    access_token: OnceCell<String>,
}

impl Session {
    /// Creates a session with a client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &DownloadConfig, endpoints: Endpoints) -> Result<Self> {
        Ok(Self::with_client(build_http_client(config)?, endpoints))
    }

    /// Creates a session around an existing client.
    #[must_use]
    pub fn with_client(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self {
            http,
            endpoints,
            api_token: OnceCell::new(),
            access_token: OnceCell::new(),
        }
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns the configured endpoints.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Returns the account token, creating a guest account on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the account endpoint is unreachable, answers
    /// with a non-`ok` status, or returns no token.
    pub async fn api_token(&self) -> Result<&str> {
        self.api_token
            .get_or_try_init(|| self.fetch_api_token())
            .await
            .map(String::as_str)
    }

    /// Returns the website token ("wt"), scraping it from the script bundle
    /// on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the script cannot be fetched or does not
    /// contain the token.
    pub async fn access_token(&self) -> Result<&str> {
        self.access_token
            .get_or_try_init(|| self.fetch_access_token())
            .await
            .map(String::as_str)
    }

    async fn fetch_api_token(&self) -> Result<String> {
        let url = self.endpoints.accounts_url();
        let envelope: ApiEnvelope = self
            .http
            .post(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Auth(format!("cannot reach {url}: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Auth(format!("unreadable account response: {e}")))?;

        if envelope.status != "ok" {
            return Err(Error::Auth(format!(
                "cannot get token (status {})",
                envelope.status
            )));
        }

        let account: AccountData = envelope
            .data
            .ok_or_else(|| Error::Auth("account response has no data".to_string()))
            .and_then(|data| {
                serde_json::from_value(data)
                    .map_err(|e| Error::Auth(format!("account response has no token: {e}")))
            })?;
        if account.token.is_empty() {
            return Err(Error::Auth("cannot get token: empty".to_string()));
        }

        log::info!("Obtained account token");
        log::debug!("Account token: {}", account.token);
        Ok(account.token)
    }

    async fn fetch_access_token(&self) -> Result<String> {
        let url = self.endpoints.script_url();
        let script = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Auth(format!("cannot reach {url}: {e}")))?
            .text()
            .await
            .map_err(|e| Error::Auth(format!("unreadable script bundle: {e}")))?;

        let token = extract_website_token(&script)
            .ok_or_else(|| Error::Auth("cannot get wt: marker not found".to_string()))?;
        if token.is_empty() {
            return Err(Error::Auth("cannot get wt: empty".to_string()));
        }

        log::info!("Obtained website token");
        log::debug!("Website token: {token}");
        Ok(token.to_string())
    }
}

/// Extracts the quoted literal following `wt: "` in a script body.
#[must_use]
pub fn extract_website_token(script: &str) -> Option<&str> {
    let (_, rest) = script.split_once(WT_MARKER)?;
    Some(rest.split_once('"').map_or(rest, |(token, _)| token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_for(server: &MockServer) -> Session {
        Session::new(&DownloadConfig::default(), Endpoints::single(&server.uri())).unwrap()
    }

    #[test]
    fn extract_token_after_marker() {
        let js = r#"var a=1;appdata={wt: "4fd6sg89d7s6",lang:"en"};"#;
        assert_eq!(extract_website_token(js), Some("4fd6sg89d7s6"));
    }

    #[test]
    fn extract_token_uses_first_marker() {
        let js = r#"x = {wt: "first"}; y = {wt: "second"};"#;
        assert_eq!(extract_website_token(js), Some("first"));
    }

    #[test]
    fn extract_token_missing_marker() {
        assert_eq!(extract_website_token("var wt = 'nope';"), None);
        assert_eq!(extract_website_token(""), None);
    }

    #[test]
    fn extract_token_unterminated_takes_rest() {
        assert_eq!(extract_website_token("wt: \"abc"), Some("abc"));
    }

    #[tokio::test]
    async fn api_token_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "data": { "id": "acc", "token": "tok-123" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server);
        assert_eq!(session.api_token().await.unwrap(), "tok-123");
        assert_eq!(session.api_token().await.unwrap(), "tok-123");
    }

    #[tokio::test]
    async fn api_token_non_ok_status_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "error-rateLimit" })),
            )
            .mount(&server)
            .await;

        let err = session_for(&server).api_token().await.unwrap_err();
        assert!(matches!(err, Error::Auth(ref msg) if msg.contains("error-rateLimit")));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn api_token_http_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = session_for(&server).api_token().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn access_token_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dist/js/alljs.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"function f(){return {wt: "website-token",x:1}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server);
        assert_eq!(session.access_token().await.unwrap(), "website-token");
        assert_eq!(session.access_token().await.unwrap(), "website-token");
    }

    #[tokio::test]
    async fn access_token_missing_marker_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dist/js/alljs.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
            .mount(&server)
            .await;

        let err = session_for(&server).access_token().await.unwrap_err();
        assert!(matches!(err, Error::Auth(ref msg) if msg.contains("wt")));
    }

    #[tokio::test]
    async fn empty_api_token_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "data": { "token": "" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "data": { "token": "real" }
            })))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let err = session.api_token().await.unwrap_err();
        assert!(matches!(err, Error::Auth(ref msg) if msg.contains("empty")));
        assert_eq!(session.api_token().await.unwrap(), "real");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_website_token_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dist/js/alljs.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{wt: ""}"#))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dist/js/alljs.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{wt: "filled"}"#))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let err = session.access_token().await.unwrap_err();
        assert!(matches!(err, Error::Auth(ref msg) if msg.contains("empty")));
        assert_eq!(session.access_token().await.unwrap(), "filled");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_on_next_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dist/js/alljs.js"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dist/js/alljs.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{wt: "late"}"#))
            .mount(&server)
            .await;

        let session = session_for(&server);
        assert!(session.access_token().await.is_err());
        assert_eq!(session.access_token().await.unwrap(), "late");
    }
}
