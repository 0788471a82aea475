//! # Niabot API Client
//!
//! Rate-limit-aware async clients for the upstream REST APIs of a Wynncraft
//! Discord bot.
//!
//! ## Features
//!
//! - Sliding window budgets for hosts without feedback (Mojang)
//! - Budgets reconciled against server-reported remaining calls (Wynncraft)
//! - Reservations that guarantee capacity for a batch of requests
//! - A registry of every budget for health reporting
//! - Generic payloads: decode responses into your own `serde` types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use niabot_api_client::ApiClients;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let clients = ApiClients::default();
//!
//!     let uuid = clients.mojang().username_to_uuid("Salted").await?;
//!     println!("uuid: {:?}", uuid);
//!
//!     let guild: Option<serde_json::Value> = clients.wynncraft().guild("Nerfuria").await?;
//!     println!("guild found: {}", guild.is_some());
//!
//!     println!("free calls: {}", clients.total_free_capacity());
//!     Ok(())
//! }
//! ```

pub mod clients;
pub mod error;
pub mod mojang;
pub mod rate_limit;
pub mod session;
pub mod wynncraft;

// Re-export commonly used types at crate root
pub use clients::ApiClients;
pub use error::NiaError;

/// Result type alias using NiaError
pub type Result<T> = std::result::Result<T, NiaError>;
