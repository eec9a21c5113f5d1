use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

use super::credentials::Credentials;
use super::retry::{run_with_retry, RetryPolicy, Sleeper, TokioSleeper};
use crate::api::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::api::{AuthError, ConnectError, LoginFailure, RequestError};
use crate::config::{CredentialBundle, ServiceConfig};

/// Login endpoint, relative to the API base path
pub const LOGIN_PATH: &str = "/session/login";

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Turns credentials into an authenticated [`SessionHandle`].
#[derive(Clone)]
pub struct SessionManager {
    host: String,
    base_path: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl SessionManager {
    pub fn new(host: &str, base_path: &str, policy: RetryPolicy) -> Self {
        Self {
            host: host.trim().trim_end_matches('/').to_string(),
            base_path: base_path.trim().to_string(),
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.host, &config.base_path, config.retry)
    }

    /// Replace the sleep between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Log in, retrying network errors and non-2xx answers up to the policy limit.
    ///
    /// A missing host or base path fails immediately without a network call.
    pub async fn authenticate<T: Transport>(
        &self,
        transport: T,
        credentials: &Credentials,
    ) -> Result<SessionHandle<T>, AuthError> {
        if self.host.is_empty() {
            error!("Configuration error: Backup Service host is not set");
            return Err(AuthError::MissingConfiguration("host is not set".to_string()));
        }
        if self.base_path.is_empty() {
            error!("Configuration error: API base path is not set");
            return Err(AuthError::MissingConfiguration(
                "base path is not set".to_string(),
            ));
        }

        let url = format!("{}{}{}", self.host, self.base_path, LOGIN_PATH);
        let headers = default_headers();
        let body = serde_json::json!({
            "login": credentials.username(),
            "password": credentials.password(),
        });
        let timeout = self.policy.request_timeout;
        let max_attempts = self.policy.max_attempts;
        let transport_ref = &transport;

        info!(
            host = %self.host,
            max_attempts,
            worst_case_wait_secs = self.policy.worst_case_wait().as_secs(),
            "Logging in to the Backup Service"
        );

        let outcome = run_with_retry(&self.policy, self.sleeper.as_ref(), "login", |attempt| {
            let request = ApiRequest {
                method: Method::POST,
                url: url.clone(),
                headers: headers.clone(),
                body: Some(body.clone()),
                timeout,
            };
            async move {
                info!(attempt, max_attempts, "Authenticating");
                let response = transport_ref.send(request).await?;
                if response.is_success() {
                    Ok(())
                } else {
                    Err(LoginFailure::Status(response.status()))
                }
            }
        })
        .await;

        match outcome {
            Ok(((), attempts)) => {
                info!(attempts, "Authentication succeeded, session ready");
                Ok(SessionHandle {
                    host: self.host.clone(),
                    base_path: self.base_path.clone(),
                    headers,
                    timeout,
                    policy: self.policy,
                    attempts,
                    transport,
                })
            }
            Err(exhausted) => {
                error!(
                    attempts = exhausted.attempts,
                    "Maximum number of authentication attempts reached"
                );
                Err(AuthError::ExhaustedRetries {
                    attempts: exhausted.attempts,
                    last: exhausted.last,
                })
            }
        }
    }

    /// Decrypt the bundle and authenticate. The plaintext is dropped before returning.
    pub async fn connect<T: Transport>(
        &self,
        bundle: &CredentialBundle,
        transport: T,
    ) -> Result<SessionHandle<T>, ConnectError> {
        let credentials = Credentials::from_bundle(bundle)?;
        let handle = self.authenticate(transport, &credentials).await?;
        Ok(handle)
    }
}

/// Build the HTTP transport described by `config` and authenticate with it.
pub async fn connect(config: &ServiceConfig) -> Result<SessionHandle<HttpTransport>, ConnectError> {
    info!(host = %config.host, "Starting Backup Service client");
    let transport = HttpTransport::new(config.accept_invalid_certs, config.retry.request_timeout)?;
    SessionManager::from_config(config)
        .connect(&config.credentials, transport)
        .await
}

/// An authenticated session. All API calls after login go through it.
pub struct SessionHandle<T> {
    host: String,
    base_path: String,
    headers: HeaderMap,
    timeout: Duration,
    policy: RetryPolicy,
    attempts: u32,
    transport: T,
}

impl<T: Transport> SessionHandle<T> {
    /// Full URL of an API path such as `/tasks`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.host, self.base_path, path)
    }

    /// Number of login attempts it took to obtain this session
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issue a single request with the session's headers and timeout. Never retried here.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, RequestError> {
        let request = ApiRequest {
            method,
            url: self.url(path),
            headers: self.headers.clone(),
            body: body.cloned(),
            timeout: self.timeout,
        };
        debug!(method = %request.method, path, "API request");

        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(RequestError::from_status(response.status(), &response.text()))
        }
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, RequestError> {
        let response = self.request(Method::GET, path, None).await?;
        response
            .json()
            .map_err(|e| RequestError::Decode(format!("{}: {}", path, e)))
    }

    pub async fn post_json<R: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, RequestError> {
        let body = serde_json::to_value(body).map_err(|e| RequestError::Decode(e.to_string()))?;
        let response = self.request(Method::POST, path, Some(&body)).await?;
        response
            .json()
            .map_err(|e| RequestError::Decode(format!("{}: {}", path, e)))
    }
}
