//! Wynncraft API endpoint constants.

/// Base URL for the Wynncraft API.
pub const WYNNCRAFT_BASE_URL: &str = "https://api.wynncraft.com";

/// Version prefix of every path.
pub const API_VERSION: &str = "v3";

/// Player stats, followed by a username or UUID.
pub const PLAYER: &str = "player";

/// Guild stats, followed by the guild name.
pub const GUILD: &str = "guild";

/// Guild stats looked up by prefix, followed by the prefix.
pub const GUILD_PREFIX: &[&str] = &["guild", "prefix"];
