//! Authentication against the Backup Service.
//!
//! This module provides:
//! - `Credentials`: decrypted login, built from the encrypted `CredentialBundle`
//! - `SessionManager`: login with retry/backoff, producing a `SessionHandle`
//! - `KeyStore`: optional OS keychain storage for the encryption key
//!
//! A session is authenticated exactly once per process. There is no
//! re-authentication: a session dropped by the server is not detected.

pub mod credentials;
pub mod retry;
pub mod session;

pub use credentials::{Credentials, KeyStore, KeyStoreError};
pub use retry::{
    run_with_retry, run_with_retry_if, RetryExhausted, RetryPolicy, Sleeper, TokioSleeper,
};
pub use session::{connect, SessionHandle, SessionManager};
