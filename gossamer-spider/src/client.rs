use crate::error::{Result, SpiderError};
use rand::seq::IndexedRandom;
use reqwest::header::USER_AGENT;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// Pool of plausible browser identities a client rotates through. Has no
/// effect on correctness, only on how requests look to the remote end.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.10; rv:40.0) Gecko/20100101 Firefox/40.0",
    "Mozilla/5.0 (compatible, MSIE 11, Windows NT 6.3; Trident/7.0; rv:11.0) like Gecko",
    "Mozilla/5.0 (Windows NT 6.1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/41.0.2228.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/41.0.2227.0 Safari/537.36",
];

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// HTTP client for a single crawl run. Both connection contexts are built
/// up front and torn down when the client is dropped; the identity header
/// is shared between them and may be refreshed mid-run. In-flight requests
/// may observe either the old or the new identity, which is fine.
///
/// No retries happen here. A caller that wants resilience wraps its own
/// policy around `fetch`.
pub struct FetchClient {
    client: reqwest::Client,
    blocking: reqwest::blocking::Client,
    user_agent: RwLock<String>,
}

impl FetchClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        let connect_timeout = Duration::from_secs((timeout_secs / 2).max(1));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        // The blocking context owns its own runtime and must be built off
        // any async runtime thread.
        let blocking = std::thread::spawn(move || {
            reqwest::blocking::Client::builder()
                .timeout(timeout)
                .connect_timeout(connect_timeout)
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .expect("Failed to create blocking HTTP client")
        })
        .join()
        .expect("Blocking HTTP client construction panicked");

        Self {
            client,
            blocking,
            user_agent: RwLock::new(random_user_agent().to_string()),
        }
    }

    /// Pins the identity header instead of the randomly chosen one.
    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        *self.user_agent.write().unwrap() = user_agent.into();
        self
    }

    pub fn user_agent(&self) -> String {
        self.user_agent.read().unwrap().clone()
    }

    /// Re-rolls the identity header for all subsequent requests in both
    /// modes. Requests already in flight keep whichever value they read.
    pub fn refresh_user_agent(&self) {
        let fresh = random_user_agent().to_string();
        debug!("Rotating user agent to {:?}", fresh);
        *self.user_agent.write().unwrap() = fresh;
    }

    /// Fetches a page body. Non-2xx/3xx statuses and transport failures
    /// both come back as errors; the caller decides whether that is fatal
    /// for the job or just for this URL.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() && !status.is_redirection() {
            return Err(SpiderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Fetches a binary body (image downloads).
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching bytes from {}", url);
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() && !status.is_redirection() {
            return Err(SpiderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Synchronous variant of [`fetch`](Self::fetch) for callers without a
    /// runtime. Must not be called from inside the async runtime.
    pub fn fetch_blocking(&self, url: &str) -> Result<String> {
        debug!("Fetching {} (blocking)", url);
        let response = self
            .blocking
            .get(url)
            .header(USER_AGENT, self.user_agent())
            .send()?;
        let status = response.status();
        if !status.is_success() && !status.is_redirection() {
            return Err(SpiderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new()
    }
}

fn random_user_agent() -> &'static str {
    DEFAULT_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DEFAULT_USER_AGENTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn chosen_user_agent_comes_from_the_pool() {
        let client = FetchClient::new();
        let agent = client.user_agent();
        assert!(DEFAULT_USER_AGENTS.contains(&agent.as_str()));
    }

    #[test]
    fn refresh_keeps_user_agent_inside_the_pool() {
        let client = FetchClient::new();
        for _ in 0..8 {
            client.refresh_user_agent();
            assert!(DEFAULT_USER_AGENTS.contains(&client.user_agent().as_str()));
        }
    }

    #[test]
    fn explicit_user_agent_wins_over_rotation() {
        let client = FetchClient::new().with_user_agent("gossamer-test/1.0");
        assert_eq!(client.user_agent(), "gossamer-test/1.0");
    }

    #[test]
    fn blocking_fetch_reports_transport_errors() {
        // Port 1 is never listening; this must surface as a transport
        // failure, not a panic.
        let client = FetchClient::with_timeout(2);
        let result = client.fetch_blocking("http://127.0.0.1:1/");
        assert!(matches!(result, Err(SpiderError::Transport(_))));
    }

    #[tokio::test]
    async fn fetch_returns_the_body_on_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&mock_server)
            .await;

        let client = FetchClient::new();
        let body = client
            .fetch(&format!("{}/page", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn fetch_maps_error_statuses_to_http_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = FetchClient::new();
        let result = client.fetch(&format!("{}/missing", mock_server.uri())).await;
        match result {
            Err(SpiderError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected HttpStatus error, got {:?}", other.map(|_| "body")),
        }
    }

    #[tokio::test]
    async fn fetch_sends_the_current_identity_header() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(wiremock::matchers::header("user-agent", "gossamer-test/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("seen"))
            .mount(&mock_server)
            .await;

        let client = FetchClient::new().with_user_agent("gossamer-test/1.0");
        let body = client.fetch(&mock_server.uri()).await.unwrap();
        assert_eq!(body, "seen");
    }
}
