//! Every upstream client of the bot, built from one configuration.

use crate::mojang::MojangClient;
use crate::rate_limit::{LimiterStatus, RateLimitConfig, RateLimitRegistry};
use crate::wynncraft::WynncraftClient;

/// The upstream clients and the registry of their budgets.
///
/// Construct it once at startup and hand clones of the clients to the
/// command handlers and workers that need them. The registry only observes
/// the budgets; the clients own them.
///
/// # Example
///
/// ```rust
/// use niabot_api_client::ApiClients;
/// use niabot_api_client::rate_limit::RateLimitConfig;
///
/// let clients = ApiClients::from_config(RateLimitConfig::default());
/// assert_eq!(clients.total_free_capacity(), 60 + 20 + 200 + 120);
/// ```
#[derive(Debug)]
pub struct ApiClients {
    mojang: MojangClient,
    wynncraft: WynncraftClient,
    registry: RateLimitRegistry,
}

impl ApiClients {
    /// Wrap already built clients and register their budgets.
    pub fn new(mojang: MojangClient, wynncraft: WynncraftClient) -> Self {
        let registry = RateLimitRegistry::new();
        mojang.register_limiters(&registry);
        wynncraft.register_limiters(&registry);
        tracing::debug!(limiters = registry.len(), "upstream clients ready");

        Self {
            mojang,
            wynncraft,
            registry,
        }
    }

    /// Build every client against the production hosts.
    pub fn from_config(config: RateLimitConfig) -> Self {
        let mojang = MojangClient::builder().rate_limits(config.clone()).build();
        let wynncraft = WynncraftClient::builder().rate_limits(config).build();
        Self::new(mojang, wynncraft)
    }

    /// The Mojang client.
    pub fn mojang(&self) -> &MojangClient {
        &self.mojang
    }

    /// The Wynncraft client.
    pub fn wynncraft(&self) -> &WynncraftClient {
        &self.wynncraft
    }

    /// The registry of every budget.
    pub fn registry(&self) -> &RateLimitRegistry {
        &self.registry
    }

    /// Free calls summed over every budget, for health reporting.
    pub fn total_free_capacity(&self) -> u64 {
        self.registry.total_free_capacity()
    }

    /// Per-budget status, for health reporting.
    pub fn limiter_status(&self) -> Vec<LimiterStatus> {
        self.registry.snapshot()
    }
}

impl Default for ApiClients {
    fn default() -> Self {
        Self::from_config(RateLimitConfig::default())
    }
}
