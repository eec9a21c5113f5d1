use reqwest::StatusCode;
use thiserror::Error;

use super::transport::TransportError;
use crate::config::ConfigError;
use crate::crypto::DecryptError;

/// Why a single login attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("login rejected with HTTP {0}")]
    Status(StatusCode),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Host or base path unset. Raised before any network call.
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("authentication failed after {attempts} attempt(s): {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: LoginFailure,
    },
}

/// Failure of a request made with an authenticated session. The session stays usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("network error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl RequestError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        RequestError::HttpStatus {
            status,
            body: Self::truncate_body(body),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Network errors, server errors, timeouts and rate limits may pass on a
    /// later attempt. Other client errors, undecodable bodies and rejected
    /// arguments fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            RequestError::Transport(_) => true,
            RequestError::HttpStatus { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            RequestError::Decode(_) | RequestError::InvalidArgument(_) => false,
        }
    }
}

/// Everything that can stop a process from obtaining an authenticated session
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("credentials unavailable - set ENCRYPTION_KEY, STORWARE_ENCRYPTED_USERNAME and STORWARE_ENCRYPTED_PASSWORD")]
    CredentialsUnavailable,

    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
