//! Scripted transport and sleeper for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::transport::{ApiRequest, ApiResponse, Transport, TransportError};
use crate::auth::Sleeper;

#[derive(Default)]
struct MockState {
    responses: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

/// Replays queued responses in order and records every request.
/// Clones share the same queue and log.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub(crate) fn push_status(&self, status: StatusCode) {
        self.push(Ok(ApiResponse::new(status, Vec::new())));
    }

    pub(crate) fn push_json(&self, status: StatusCode, body: serde_json::Value) {
        self.push(Ok(ApiResponse::new(status, body.to_string())));
    }

    pub(crate) fn push_error(&self, err: TransportError) {
        self.push(Err(err));
    }

    fn push(&self, response: Result<ApiResponse, TransportError>) {
        self.state.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.state.requests.lock().unwrap().push(request);
        self.state
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no scripted response".into())))
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
