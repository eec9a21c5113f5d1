use std::fmt;

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

use crate::api::ConnectError;
use crate::config::CredentialBundle;
use crate::crypto::{self, SecretKey};

/// Keychain service name under which the encryption key is kept
const SERVICE_NAME: &str = "storware-reports";

/// Keychain account holding the encryption key
const KEY_ACCOUNT: &str = "encryption-key";

/// Plaintext login. Lives only as long as the authentication and is never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decrypt both values of the bundle with its key
    pub fn from_bundle(bundle: &CredentialBundle) -> Result<Self, ConnectError> {
        let username = crypto::decrypt(&bundle.encryption_key, &bundle.encrypted_username)?;
        let password = crypto::decrypt(&bundle.encryption_key, &bundle.encrypted_password)?;
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok(Self { username, password })
            }
            _ => Err(ConnectError::CredentialsUnavailable),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// OS keychain storage for the encryption key, as an alternative to `ENCRYPTION_KEY`.
///
/// Uses the native store of the platform: Keychain on macOS, Credential Manager
/// on Windows and the kernel session keyring on Linux.
#[derive(Debug, Clone)]
pub struct KeyStore {
    service: String,
    account: String,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME, KEY_ACCOUNT)
    }
}

impl KeyStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry, KeyStoreError> {
        Ok(Entry::new(&self.service, &self.account)?)
    }

    /// Store the encryption key in the OS keychain
    pub fn store_key(&self, key: &SecretKey) -> Result<(), KeyStoreError> {
        self.entry()?.set_password(&key.encoded())?;
        debug!(service = %self.service, "Encryption key stored in keychain");
        Ok(())
    }

    /// Retrieve the encryption key, `None` if it was never stored
    pub fn load_key(&self) -> Result<Option<String>, KeyStoreError> {
        match self.entry()?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
