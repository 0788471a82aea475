//! Mojang API endpoint constants.

/// Base URL for username lookups.
pub const MOJANG_API_URL: &str = "https://api.mojang.com";

/// Base URL for profile lookups by UUID.
pub const SESSIONSERVER_URL: &str = "https://sessionserver.mojang.com";

/// Avatar renderer used for embeds.
pub const CRAFATAR_URL: &str = "https://crafatar.com";

/// Path of a single username lookup, followed by the username.
pub const PROFILE_BY_NAME: &[&str] = &["users", "profiles", "minecraft"];

/// Path of a bulk username lookup.
pub const PROFILES_BY_NAMES: &[&str] = &["profiles", "minecraft"];

/// Path of a session server profile lookup, followed by the UUID.
pub const PROFILE_BY_UUID: &[&str] = &["session", "minecraft", "profile"];
