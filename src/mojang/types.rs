//! Mojang response types.

use serde::Deserialize;

/// A player profile as returned by every Mojang lookup.
///
/// The session server also sends skin properties; they are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    /// UUID without dashes.
    pub id: String,
    /// Case-corrected username.
    pub name: String,
}

impl From<Profile> for (String, String) {
    fn from(profile: Profile) -> Self {
        (profile.name, profile.id)
    }
}
