//! Wynncraft API client implementation.

use std::sync::Arc;
use std::time::Duration;

use crate::error::NiaError;
use crate::rate_limit::{
    RateLimitConfig, RateLimitRegistry, RequestGate, Reservation, ReservableRateLimit,
};
use crate::session::ApiSession;
use crate::wynncraft::endpoints::{API_VERSION, GUILD, GUILD_PREFIX, PLAYER, WYNNCRAFT_BASE_URL};

/// The Wynncraft v3 API client.
///
/// Responses are generic: decode them into whatever payload type the caller
/// defines, or into [`serde_json::Value`].
///
/// # Example
///
/// ```rust,no_run
/// use niabot_api_client::wynncraft::WynncraftClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = WynncraftClient::new();
///
///     // Make sure the whole batch fits into the current budget.
///     let members = ["Salted", "Nerfuria"];
///     let reservation = client.reserve(members.len() as u32)?;
///     for name in members {
///         let stats: Option<serde_json::Value> = client
///             .get_reserved(&reservation, &format!("/player/{}", name), &())
///             .await?;
///         println!("{}: {}", name, stats.is_some());
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct WynncraftClient {
    session: ApiSession,
    limiter: Arc<ReservableRateLimit>,
}

impl WynncraftClient {
    /// Create a new client with the default host and budget.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> WynncraftClientBuilder {
        WynncraftClientBuilder::new()
    }

    /// Send a GET request below `/v3`, waiting on the shared budget.
    ///
    /// `path` must start with `/`. Returns `None` if the upstream answers 404.
    pub async fn get<T, Q>(&self, path: &str, params: &Q) -> Result<Option<T>, NiaError>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        self.get_with(self.limiter.as_ref(), &split_path(path)?, params)
            .await
    }

    /// Send a GET request below `/v3`, spending one call of `reservation`.
    ///
    /// The reservation must come from this client's [`reserve`](Self::reserve).
    pub async fn get_reserved<T, Q>(
        &self,
        reservation: &Reservation,
        path: &str,
        params: &Q,
    ) -> Result<Option<T>, NiaError>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        if !Arc::ptr_eq(reservation.limiter(), &self.limiter) {
            return Err(NiaError::InvalidArgument(
                "reservation belongs to another limiter".to_string(),
            ));
        }
        self.get_with(reservation, &split_path(path)?, params).await
    }

    /// Get the stats of a player by username or UUID.
    pub async fn player<T>(&self, player: &str) -> Result<Option<T>, NiaError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.get_with(self.limiter.as_ref(), &[API_VERSION, PLAYER, player], &())
            .await
    }

    /// Get the stats of a guild by name.
    pub async fn guild<T>(&self, name: &str) -> Result<Option<T>, NiaError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.get_with(self.limiter.as_ref(), &[API_VERSION, GUILD, name], &())
            .await
    }

    /// Get the stats of a guild by its prefix.
    pub async fn guild_by_prefix<T>(&self, prefix: &str) -> Result<Option<T>, NiaError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut segments = vec![API_VERSION];
        segments.extend_from_slice(GUILD_PREFIX);
        segments.push(prefix);
        self.get_with(self.limiter.as_ref(), &segments, &()).await
    }

    /// Reserve `amount` requests for a batch.
    ///
    /// Fails with [`NiaError::InsufficientCapacity`] if the budget cannot
    /// cover the whole batch right now.
    pub fn reserve(&self, amount: u32) -> Result<Reservation, NiaError> {
        self.limiter.reserve(amount)
    }

    /// Requests currently free for unreserved callers.
    pub fn calculate_remaining_requests(&self) -> u32 {
        self.limiter.calculate_remaining_calls()
    }

    /// Time until the upstream budget resets.
    pub fn ratelimit_reset_time(&self) -> Duration {
        self.limiter.ratelimit_reset_time()
    }

    /// The shared budget.
    pub fn limiter(&self) -> &Arc<ReservableRateLimit> {
        &self.limiter
    }

    /// Add the budget of this client to `registry`.
    pub fn register_limiters(&self, registry: &RateLimitRegistry) {
        registry.register(&self.limiter);
    }

    async fn get_with<T, G, Q>(
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
        self.session.get(gate, segments, params).await
    }
}

impl Default for WynncraftClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`WynncraftClient`].
pub struct WynncraftClientBuilder {
    base_url: String,
    user_agent: Option<String>,
    config: RateLimitConfig,
}

impl WynncraftClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: WYNNCRAFT_BASE_URL.to_string(),
            user_agent: None,
            config: RateLimitConfig::default(),
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

    /// Set the budgets.
    pub fn rate_limits(mut self, config: RateLimitConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> WynncraftClient {
        let mut session = ApiSession::builder(self.base_url).rate_limiting(self.config.enabled);
        if let Some(user_agent) = self.user_agent {
            session = session.user_agent(user_agent);
        }

        WynncraftClient {
            session: session.build(),
            limiter: Arc::new(ReservableRateLimit::from_budget(
                "wynncraft",
                self.config.wynncraft,
            )),
        }
    }
}

impl Default for WynncraftClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a `/`-separated path into segments below `/v3`.
fn split_path(path: &str) -> Result<Vec<&str>, NiaError> {
    if !path.starts_with('/') {
        return Err(NiaError::InvalidArgument(format!(
            "path must start with '/': {}",
            path
        )));
    }
    Ok(std::iter::once(API_VERSION)
        .chain(path.split('/').filter(|segment| !segment.is_empty()))
        .collect())
}
