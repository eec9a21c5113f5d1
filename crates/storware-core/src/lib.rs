//! Client and reporting layer for the Storware backup service.
//!
//! The core of the crate is the authenticated session manager: it decrypts
//! the operator-provisioned credentials, logs in with retry/backoff and hands
//! out a [`SessionHandle`] through which every reporting query flows.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use storware_core::{connect, ServiceConfig, StorwareClient};
//!
//! let config = ServiceConfig::from_env()?;
//! let client = StorwareClient::new(connect(&config).await?);
//! let vms = client.list_vms().await?;
//! println!("{} VMs", vms.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod models;
pub mod report;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use api::{
    AuthError, ConnectError, HttpTransport, LoginFailure, RequestError, StorwareClient, Transport,
    TransportError,
};
pub use auth::{connect, Credentials, RetryPolicy, SessionHandle, SessionManager};
pub use config::{ConfigError, CredentialBundle, ServiceConfig};
pub use crypto::{decrypt, encrypt, DecryptError, SecretKey};
pub use report::{CollectError, InventoryFailureMode, ReportCollector};
