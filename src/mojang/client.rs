//! Mojang API client implementation.

use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::error::NiaError;
use crate::mojang::endpoints::{
    CRAFATAR_URL, MOJANG_API_URL, PROFILE_BY_NAME, PROFILE_BY_UUID, PROFILES_BY_NAMES,
    SESSIONSERVER_URL,
};
use crate::mojang::types::Profile;
use crate::rate_limit::limits::mojang::MAX_BULK_USERNAMES;
use crate::rate_limit::{RateLimit, RateLimitConfig, RateLimitRegistry};
use crate::session::ApiSession;

/// Longest name the bulk endpoint accepts without rejecting the whole batch.
const MAX_USERNAME_LEN: usize = 25;

/// The Mojang API client.
///
/// Each endpoint has its own budget; all of them are owned by the client and
/// shared by its clones.
///
/// # Example
///
/// ```rust,no_run
/// use niabot_api_client::mojang::MojangClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = MojangClient::new();
///
///     match client.username_to_uuid("Notch").await? {
///         Some(uuid) => println!("Notch is {}", uuid),
///         None => println!("no such player"),
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MojangClient {
    api: ApiSession,
    sessionserver: ApiSession,
    profile_limit: Arc<RateLimit>,
    bulk_limit: Arc<RateLimit>,
    sessionserver_limit: Arc<RateLimit>,
}

impl MojangClient {
    /// Create a new client with the default hosts and budgets.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> MojangClientBuilder {
        MojangClientBuilder::new()
    }

    /// Get the UUID of a player by username.
    ///
    /// Returns `None` if no such player exists. The UUID has no dashes.
    pub async fn username_to_uuid(&self, username: &str) -> Result<Option<String>, NiaError> {
        if !is_valid_username(username) {
            return Ok(None);
        }

        let mut segments = PROFILE_BY_NAME.to_vec();
        segments.push(username);
        let profile: Option<Profile> = self
            .api
            .get(self.profile_limit.as_ref(), &segments, &())
            .await?;
        Ok(profile.map(|p| p.id))
    }

    /// Get the UUIDs of up to ten players by username in one request.
    ///
    /// Returns `(case corrected username, uuid without dashes)` for every name
    /// that exists. Names that cannot be valid usernames are skipped instead of
    /// failing the whole batch.
    pub async fn usernames_to_uuids<S>(
        &self,
        usernames: &[S],
    ) -> Result<Option<Vec<(String, String)>>, NiaError>
    where
        S: AsRef<str>,
    {
        if usernames.len() > MAX_BULK_USERNAMES {
            return Err(NiaError::InvalidArgument(format!(
                "at most {} usernames per request, got {}",
                MAX_BULK_USERNAMES,
                usernames.len()
            )));
        }

        let names: Vec<&str> = usernames
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| is_valid_username(name))
            .collect();
        if names.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let profiles: Option<Vec<Profile>> = self
            .api
            .post_json(self.bulk_limit.as_ref(), PROFILES_BY_NAMES, &names)
            .await?;
        Ok(profiles.map(|profiles| profiles.into_iter().map(Into::into).collect()))
    }

    /// Resolve any number of usernames, ten per request.
    ///
    /// Batches are sent concurrently and each one waits on the bulk budget.
    pub async fn resolve_usernames<S>(
        &self,
        usernames: &[S],
    ) -> Result<Vec<(String, String)>, NiaError>
    where
        S: AsRef<str>,
    {
        let batches = try_join_all(
            usernames
                .chunks(MAX_BULK_USERNAMES)
                .map(|chunk| self.usernames_to_uuids(chunk)),
        )
        .await?;

        Ok(batches.into_iter().flatten().flatten().collect())
    }

    /// Get the username of a player by UUID, with or without dashes.
    ///
    /// Returns `None` if no such player exists.
    pub async fn uuid_to_username(&self, uuid: &str) -> Result<Option<String>, NiaError> {
        let uuid = uuid.replace('-', "");
        if uuid.len() != 32 || !uuid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(NiaError::InvalidArgument(format!("not a uuid: {}", uuid)));
        }

        let mut segments = PROFILE_BY_UUID.to_vec();
        segments.push(&uuid);
        let profile: Option<Profile> = self
            .sessionserver
            .get(self.sessionserver_limit.as_ref(), &segments, &())
            .await?;
        Ok(profile.map(|p| p.name))
    }

    /// Budget of single username lookups.
    pub fn profile_limit(&self) -> &Arc<RateLimit> {
        &self.profile_limit
    }

    /// Budget of bulk username lookups.
    pub fn bulk_limit(&self) -> &Arc<RateLimit> {
        &self.bulk_limit
    }

    /// Budget of session server lookups.
    pub fn sessionserver_limit(&self) -> &Arc<RateLimit> {
        &self.sessionserver_limit
    }

    /// Add every budget of this client to `registry`.
    pub fn register_limiters(&self, registry: &RateLimitRegistry) {
        registry.register(&self.profile_limit);
        registry.register(&self.bulk_limit);
        registry.register(&self.sessionserver_limit);
    }
}

impl Default for MojangClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`MojangClient`].
pub struct MojangClientBuilder {
    api_url: String,
    sessionserver_url: String,
    user_agent: Option<String>,
    config: RateLimitConfig,
}

impl MojangClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            api_url: MOJANG_API_URL.to_string(),
            sessionserver_url: SESSIONSERVER_URL.to_string(),
            user_agent: None,
            config: RateLimitConfig::default(),
        }
    }

    /// Set the api.mojang.com base URL (useful for testing with a mock server).
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the session server base URL.
    pub fn sessionserver_url(mut self, url: impl Into<String>) -> Self {
        self.sessionserver_url = url.into();
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
    pub fn build(self) -> MojangClient {
        let session = |url: String| {
            let mut builder = ApiSession::builder(url).rate_limiting(self.config.enabled);
            if let Some(user_agent) = &self.user_agent {
                builder = builder.user_agent(user_agent.clone());
            }
            builder.build()
        };

        MojangClient {
            api: session(self.api_url.clone()),
            sessionserver: session(self.sessionserver_url.clone()),
            profile_limit: Arc::new(RateLimit::from_budget(
                "mojang-profiles",
                self.config.mojang_profiles,
            )),
            bulk_limit: Arc::new(RateLimit::from_budget("mojang-bulk", self.config.mojang_bulk)),
            sessionserver_limit: Arc::new(RateLimit::from_budget(
                "mojang-sessionserver",
                self.config.sessionserver,
            )),
        }
    }
}

impl Default for MojangClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert the dashes into an undashed UUID (8-4-4-4-12).
///
/// Anything that is not 32 ASCII characters is returned unchanged.
pub fn format_uuid(uuid: &str) -> String {
    if uuid.len() != 32 || !uuid.is_ascii() {
        return uuid.to_string();
    }
    [&uuid[..8], &uuid[8..12], &uuid[12..16], &uuid[16..20], &uuid[20..]].join("-")
}

/// Crafatar avatar URL of a player.
pub fn uuid_to_avatar(uuid: &str) -> String {
    format!("{}/avatars/{}?overlay=True", CRAFATAR_URL, uuid)
}

fn is_valid_username(name: &str) -> bool {
    (1..=MAX_USERNAME_LEN).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uuid() {
        assert_eq!(
            format_uuid("069a79f444e94726a5befca90e38aaf5"),
            "069a79f4-44e9-4726-a5be-fca90e38aaf5"
        );
        assert_eq!(format_uuid("short"), "short");
    }

    #[test]
    fn test_uuid_to_avatar() {
        assert_eq!(
            uuid_to_avatar("069a79f444e94726a5befca90e38aaf5"),
            "https://crafatar.com/avatars/069a79f444e94726a5befca90e38aaf5?overlay=True"
        );
    }

    #[test]
    fn test_username_validation() {
        assert!(is_valid_username("Notch"));
        assert!(is_valid_username("some_player_01"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("../admin"));
        assert!(!is_valid_username("a name"));
        assert!(!is_valid_username(&"x".repeat(26)));
    }

    #[tokio::test]
    async fn test_registers_three_limiters() {
        let client = MojangClient::new();
        let registry = RateLimitRegistry::new();
        client.register_limiters(&registry);
        client.register_limiters(&registry);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.total_free_capacity(), 60 + 20 + 200);
    }
}
