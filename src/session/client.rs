//! HTTP session bound to one upstream host.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_tracing::TracingMiddleware;
use url::Url;

use crate::error::NiaError;
use crate::rate_limit::{RateLimitFeedback, RequestGate};

/// A session with one upstream host.
///
/// The session does not own a limiter; each call names the
/// [`RequestGate`] to wait on, so endpoints of the same host can use different
/// budgets and callers can spend a [`Reservation`](crate::rate_limit::Reservation).
///
/// The session never retries. Transient failures are returned to the caller,
/// who decides whether spending another call is worth it.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use niabot_api_client::rate_limit::RateLimit;
/// use niabot_api_client::session::ApiSession;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let session = ApiSession::builder("https://api.mojang.com").build();
///     let limiter = RateLimit::new("mojang", 60, Duration::from_secs(60));
///
///     let profile: Option<serde_json::Value> = session
///         .get(&limiter, &["users", "profiles", "minecraft", "Notch"], &())
///         .await?;
///     println!("{:?}", profile);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ApiSession {
    http_client: ClientWithMiddleware,
    base_url: String,
    rate_limiting: bool,
}

impl ApiSession {
    /// Create a session with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::builder(base_url).build()
    }

    /// Create a new session builder.
    pub fn builder(base_url: impl Into<String>) -> ApiSessionBuilder {
        ApiSessionBuilder::new(base_url)
    }

    /// The upstream base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests wait on their gate before being sent.
    pub fn rate_limiting(&self) -> bool {
        self.rate_limiting
    }

    /// Build the URL for `segments` below the base URL.
    ///
    /// Each segment is percent-encoded on its own, so user input such as
    /// guild names with spaces cannot escape its path segment.
    pub fn url<Q>(&self, segments: &[&str], params: &Q) -> Result<Url, NiaError>
    where
        Q: serde::Serialize + ?Sized,
    {
        let mut url = self.path_url(segments)?;
        let query_string = serde_urlencoded::to_string(params)
            .map_err(|e| NiaError::InvalidArgument(e.to_string()))?;
        if !query_string.is_empty() {
            url.set_query(Some(&query_string));
        }
        Ok(url)
    }

    fn path_url(&self, segments: &[&str]) -> Result<Url, NiaError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| NiaError::InvalidArgument(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Make a GET request with query parameters.
    ///
    /// Returns `Ok(None)` if the upstream answers 404 or 204.
    pub async fn get<T, G, Q>(
        &self,
        gate: &G,
        segments: &[&str],
        params: &Q,
    ) -> Result<Option<T>, NiaError>
    where
        T: serde::de::DeserializeOwned,
        G: RequestGate,
        Q: serde::Serialize + ?Sized,
    {
        let url = self.url(segments, params)?;
        self.execute(gate, self.http_client.get(url)).await
    }

    /// Make a POST request with a JSON body.
    ///
    /// Returns `Ok(None)` if the upstream answers 404 or 204.
    pub async fn post_json<T, G, B>(
        &self,
        gate: &G,
        segments: &[&str],
        body: &B,
    ) -> Result<Option<T>, NiaError>
    where
        T: serde::de::DeserializeOwned,
        G: RequestGate,
        B: serde::Serialize + ?Sized,
    {
        let url = self.path_url(segments)?;
        self.execute(gate, self.http_client.post(url).json(body))
            .await
    }

    /// Wait on the gate, send, reconcile, then parse.
    async fn execute<T, G>(&self, gate: &G, request: RequestBuilder) -> Result<Option<T>, NiaError>
    where
        T: serde::de::DeserializeOwned,
        G: RequestGate,
    {
        if self.rate_limiting {
            gate.admit().await?;
        }

        let response = request.send().await?;
        let status = response.status();
        let feedback = RateLimitFeedback::from_headers(response.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            // Local and remote budgets disagree; trust the upstream.
            let exhausted = feedback.exhausted();
            gate.reconcile(&exhausted);
            let retry_after_ms = exhausted.reset_after.map(|d| d.as_millis() as u64);
            tracing::warn!(
                path = response.url().path(),
                retry_after_ms,
                "upstream rate limit hit despite local budgeting"
            );
            return Err(NiaError::RateLimited { retry_after_ms });
        }

        if !feedback.is_empty() {
            gate.reconcile(&feedback);
        }

        self.parse_response(response).await
    }

    /// Parse a response from the upstream.
    async fn parse_response<T>(&self, response: reqwest::Response) -> Result<Option<T>, NiaError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(NiaError::Status { status, body });
        }

        serde_json::from_str(&body).map(Some).map_err(|e| {
            NiaError::InvalidResponse(format!("Failed to parse response: {}. Body: {}", e, body))
        })
    }
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSession")
            .field("base_url", &self.base_url)
            .field("rate_limiting", &self.rate_limiting)
            .finish()
    }
}

/// Builder for [`ApiSession`].
pub struct ApiSessionBuilder {
    base_url: String,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    rate_limiting: bool,
}

impl ApiSessionBuilder {
    /// Create a new builder with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: None,
            timeout: None,
            rate_limiting: true,
        }
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set a total timeout for each request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable waiting on gates.
    pub fn rate_limiting(mut self, enabled: bool) -> Self {
        self.rate_limiting = enabled;
        self
    }

    /// Build the session.
    pub fn build(self) -> ApiSession {
        // Build default headers.
        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("niabot-api-client/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("niabot-api-client"));
        headers.insert(USER_AGENT, header_value);

        // Build the HTTP client with tracing middleware.
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let reqwest_client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        let client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        ApiSession {
            http_client: client,
            base_url: self.base_url,
            rate_limiting: self.rate_limiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_segments_and_query() {
        let session = ApiSession::new("https://api.wynncraft.com");
        let url = session
            .url(&["v3", "guild", "The Aquarium"], &[("identifier", "name")])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.wynncraft.com/v3/guild/The%20Aquarium?identifier=name"
        );
    }

    #[test]
    fn test_url_without_query() {
        let session = ApiSession::new("https://sessionserver.mojang.com/");
        let url = session
            .url(&["session", "minecraft", "profile", "abc"], &())
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://sessionserver.mojang.com/session/minecraft/profile/abc"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let session = ApiSession::new("not a url");
        assert!(matches!(
            session.url(&["x"], &()),
            Err(NiaError::Url(_))
        ));
    }
}
