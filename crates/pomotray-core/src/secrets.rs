//! Credentials read from the process environment.
//!
//! The CLI loads a `.env` file first, so these may also come from there.

use crate::error::GatewayError;

pub const FIREBASE_DB_URL: &str = "FIREBASE_DB_URL";
pub const FIREBASE_AUTH: &str = "FIREBASE_AUTH";
pub const SPOTIFY_DEVICE_NAME: &str = "SPOTIFY_DEVICE_NAME";
pub const SPOTIFY_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const SPOTIFY_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const SPOTIFY_REFRESH_TOKEN: &str = "SPOTIFY_REFRESH_TOKEN";
pub const TICKTICK_COOKIE: &str = "TICKTICK_COOKIE";

/// Value of `name`, treating empty as unset.
pub fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required(name: &'static str) -> Result<String, GatewayError> {
    optional(name).ok_or(GatewayError::MissingSecret(name))
}

/// Everything needed to talk to Spotify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub device_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl SpotifyCredentials {
    pub fn from_env() -> Result<Self, GatewayError> {
        Ok(Self {
            device_name: required(SPOTIFY_DEVICE_NAME)?,
            client_id: required(SPOTIFY_CLIENT_ID)?,
            client_secret: required(SPOTIFY_CLIENT_SECRET)?,
            refresh_token: required(SPOTIFY_REFRESH_TOKEN)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_names_the_variable() {
        let err = required("POMOTRAY_TEST_SURELY_UNSET_VARIABLE").unwrap_err();
        assert!(matches!(
            err,
            GatewayError::MissingSecret("POMOTRAY_TEST_SURELY_UNSET_VARIABLE")
        ));
    }
}
