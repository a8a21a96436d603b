//! MusicBrainz API token storage in the system keychain

use thiserror::Error;
use tracing::{debug, info};

const SERVICE: &str = "isrcsync";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("Token is empty")]
    Empty,
    #[error("No token stored for {0}")]
    NotFound(String),
}

/// One keychain entry per MusicBrainz server
pub struct TokenStore {
    entry: keyring::Entry,
    server: String,
}

impl TokenStore {
    pub fn new(server: &str) -> Result<Self, CredentialError> {
        let entry = keyring::Entry::new(SERVICE, server)?;
        Ok(Self {
            entry,
            server: server.to_string(),
        })
    }

    /// Store the token securely in the system keychain
    pub fn store(&self, token: &str) -> Result<(), CredentialError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CredentialError::Empty);
        }
        debug!("Storing token for {} in keychain", self.server);
        self.entry.set_password(token)?;
        info!("🔑 Stored API token for {}", self.server);
        Ok(())
    }

    pub fn get(&self) -> Result<String, CredentialError> {
        match self.entry.get_password() {
            Ok(token) => Ok(token),
            Err(keyring::Error::NoEntry) => {
                debug!("No token in keychain for {}", self.server);
                Err(CredentialError::NotFound(self.server.clone()))
            }
            Err(e) => Err(CredentialError::Keyring(e)),
        }
    }

    /// Delete the stored token. Deleting a missing token is not an error.
    pub fn delete(&self) -> Result<(), CredentialError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                info!("🔑 Removed API token for {}", self.server);
                Ok(())
            }
            Err(e) => Err(CredentialError::Keyring(e)),
        }
    }
}

pub fn store_token(server: &str, token: &str) -> Result<(), CredentialError> {
    TokenStore::new(server)?.store(token)
}

pub fn retrieve_token(server: &str) -> Result<String, CredentialError> {
    TokenStore::new(server)?.get()
}

pub fn remove_token(server: &str) -> Result<(), CredentialError> {
    TokenStore::new(server)?.delete()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_store_creation() {
        // creating the entry does not touch the keychain itself
        assert!(TokenStore::new("musicbrainz.org").is_ok());
    }

    #[test]
    fn test_blank_token_is_rejected() {
        let store = TokenStore::new("test.musicbrainz.org").unwrap();
        assert!(matches!(store.store("   "), Err(CredentialError::Empty)));
    }
}
