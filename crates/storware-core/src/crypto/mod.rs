//! Symmetric secret encryption for credentials kept in the environment.
//!
//! Credentials are provisioned once by an operator (`storware encrypt-secret`)
//! and stored as opaque tokens. At startup the session manager recovers the
//! plaintext with [`decrypt`] and discards it as soon as the login finished.

pub mod secret;

pub use secret::{decrypt, encrypt, DecryptError, EncryptError, SecretKey};
