//! REST API access for the Backup Service.
//!
//! - `transport`: the HTTP capability (`Transport`) and its `reqwest` implementation
//! - `client`: typed endpoints used by the reports (`StorwareClient`)
//! - `error`: failure types for login, requests and session setup

pub mod client;
pub mod error;
pub mod transport;

pub use reqwest::{Method, StatusCode};

pub use client::StorwareClient;
pub use error::{AuthError, ConnectError, LoginFailure, RequestError};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, TransportError};
