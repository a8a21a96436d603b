use crate::cd::Backend;
use crate::credentials;
use tracing::{debug, info, warn};

pub const DEFAULT_SERVER: &str = "musicbrainz.org";

/// Application configuration
/// In debug builds a .env file is loaded first; values come from the environment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    /// MusicBrainz host, without scheme
    pub server: String,
    /// Disc device; the platform default when unset
    pub device: Option<String>,
    /// ISRC tool; probed on PATH when unset
    pub backend: Option<Backend>,
    /// Command used to open the DiscID attach page
    pub browser: Option<String>,
    /// API token, from the environment only. See [`Config::token`].
    pub token: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                info!("Config: loaded .env file");
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = get("ISRCSYNC_BACKEND").and_then(|name| match name.parse() {
            Ok(backend) => Some(backend),
            Err(e) => {
                warn!("Config: ignoring ISRCSYNC_BACKEND: {}", e);
                None
            }
        });

        let config = Self {
            server: get("ISRCSYNC_SERVER").unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            device: get("ISRCSYNC_DEVICE"),
            backend,
            browser: get("ISRCSYNC_BROWSER"),
            token: get("ISRCSYNC_TOKEN"),
        };
        debug!(
            "Config: server={} device={:?} backend={:?}",
            config.server, config.device, config.backend
        );
        config
    }

    /// The token from the environment, or else the one in the keychain
    pub fn token(&self) -> Option<String> {
        if let Some(token) = &self.token {
            return Some(token.clone());
        }
        match credentials::retrieve_token(&self.server) {
            Ok(token) => Some(token),
            Err(e) => {
                debug!("Config: no stored token: {}", e);
                None
            }
        }
    }
}
