//! Mojang API clients.
//!
//! Username and UUID resolution goes through two hosts with separate budgets:
//!
//! - `api.mojang.com` for username → UUID lookups (single and bulk)
//! - `sessionserver.mojang.com` for UUID → username lookups
//!
//! Mojang reports nothing about the remaining budget, so every endpoint sits
//! behind a plain [`RateLimit`](crate::rate_limit::RateLimit).

mod client;
pub mod endpoints;
mod types;

pub use client::{MojangClient, MojangClientBuilder, format_uuid, uuid_to_avatar};
pub use types::Profile;
