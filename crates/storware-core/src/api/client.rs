//! Typed access to the Backup Service REST endpoints used by the reports.
//!
//! Every call goes through the authenticated [`SessionHandle`]. Only the
//! volumetry query is retried: the chargeback endpoint aggregates a lot of
//! data and is the one that times out in practice.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{RequestError, Transport};
use crate::auth::{run_with_retry_if, SessionHandle, Sleeper, TokioSleeper};
use crate::models::{ProjectBackupSize, Task, VirtualMachine, VolumetryQuery};

const VMS_PATH: &str = "/virtual-machines";
const TASKS_PATH: &str = "/tasks";
const BACKUP_SIZE_PATH: &str = "/chargeback-reporting/backup-size/vm";

pub struct StorwareClient<T> {
    session: SessionHandle<T>,
    sleeper: Arc<dyn Sleeper>,
}

impl<T: Transport> StorwareClient<T> {
    pub fn new(session: SessionHandle<T>) -> Self {
        Self {
            session,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleep between volumetry attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn session(&self) -> &SessionHandle<T> {
        &self.session
    }

    /// Validate that a string looks like a GUID (UUID format).
    /// GUIDs should be 36 characters with dashes: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    fn is_valid_guid(s: &str) -> bool {
        if s.len() != 36 {
            return false;
        }
        s.chars().enumerate().all(|(i, c)| {
            if i == 8 || i == 13 || i == 18 || i == 23 {
                c == '-'
            } else {
                c.is_ascii_hexdigit()
            }
        })
    }

    /// Fetch the full VM inventory
    pub async fn list_vms(&self) -> Result<Vec<VirtualMachine>, RequestError> {
        info!("Fetching VM inventory");
        let vms: Vec<VirtualMachine> = self.session.get_json(VMS_PATH).await?;
        debug!(count = vms.len(), "VM inventory received");
        Ok(vms)
    }

    /// Fetch the raw details of one VM, `None` if the Backup Service does not know it
    pub async fn vm_details(&self, guid: &str) -> Result<Option<serde_json::Value>, RequestError> {
        let guid = guid.trim();
        if !Self::is_valid_guid(guid) {
            return Err(RequestError::InvalidArgument(format!(
                "'{}' is not a valid VM GUID",
                guid
            )));
        }

        info!(guid, "Fetching VM details");
        match self
            .session
            .get_json(&format!("{}/{}", VMS_PATH, guid))
            .await
        {
            Ok(details) => Ok(Some(details)),
            Err(e) if e.is_not_found() => {
                warn!(guid, "No VM found with this GUID");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the recent tasks executed by the Backup Service
    pub async fn list_tasks(&self) -> Result<Vec<Task>, RequestError> {
        info!("Fetching task list");
        let tasks: Vec<Task> = self.session.get_json(TASKS_PATH).await?;
        debug!(count = tasks.len(), "Task list received");
        Ok(tasks)
    }

    /// Fetch backup volumetry grouped by project.
    ///
    /// Retried with the session's policy as long as the failure is
    /// [retryable](RequestError::is_retryable).
    pub async fn backup_size_by_project(
        &self,
        query: &VolumetryQuery,
    ) -> Result<Vec<ProjectBackupSize>, RequestError> {
        info!(
            from = %query.from.format("%Y-%m-%d %H:%M"),
            to = %query.to.format("%Y-%m-%d %H:%M"),
            "Fetching volumetry report"
        );
        let body = query.request_body();
        let (session, body) = (&self.session, &body);

        let (projects, attempts) = run_with_retry_if(
            session.policy(),
            self.sleeper.as_ref(),
            "volumetry report",
            RequestError::is_retryable,
            move |_| session.post_json::<Vec<ProjectBackupSize>, _>(BACKUP_SIZE_PATH, body),
        )
        .await
        .map_err(|exhausted| exhausted.last)?;

        debug!(projects = projects.len(), attempts, "Volumetry report received");
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use reqwest::{Method, StatusCode};

    use super::*;
    use crate::auth::{Credentials, RetryPolicy, SessionManager};
    use crate::test_support::{MockTransport, RecordingSleeper};

    const VM_GUID: &str = "0e65066c-ab20-4da0-b3bf-79dfd0668049";

    async fn client(
        transport: &MockTransport,
        sleeper: &Arc<RecordingSleeper>,
    ) -> StorwareClient<MockTransport> {
        transport.push_status(StatusCode::OK);
        let manager =
            SessionManager::new("https://backup.example.com", "/api", RetryPolicy::default());
        let session = manager
            .with_sleeper(sleeper.clone())
            .authenticate(transport.clone(), &Credentials::new("alice", "secret"))
            .await
            .ok()
            .unwrap();
        StorwareClient::new(session).with_sleeper(sleeper.clone())
    }

    #[test]
    fn test_is_valid_guid() {
        type Client = StorwareClient<MockTransport>;
        assert!(Client::is_valid_guid("0E65066C-AB20-4DA0-B3BF-79DFD0668049"));
        assert!(Client::is_valid_guid(VM_GUID));
        assert!(!Client::is_valid_guid(""));
        assert!(!Client::is_valid_guid("not-a-guid"));
        assert!(!Client::is_valid_guid("0E65066CAB204DA0B3BF79DFD0668049"));
        assert!(!Client::is_valid_guid("../../../session/logout-0000000000000"));
    }

    #[tokio::test]
    async fn test_list_vms() {
        let transport = MockTransport::default();
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(&transport, &sleeper).await;
        transport.push_json(
            StatusCode::OK,
            serde_json::json!([{"guid": VM_GUID, "name": "web-01"}]),
        );

        let vms = client.list_vms().await.unwrap();
        assert_eq!(vms.len(), 1);
        assert_eq!(vms[0].display_name(), "web-01");

        let request = transport.requests().pop().unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, "https://backup.example.com/api/virtual-machines");
    }

    #[tokio::test]
    async fn test_vm_details_not_found() {
        let transport = MockTransport::default();
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(&transport, &sleeper).await;
        transport.push_status(StatusCode::NOT_FOUND);

        assert_eq!(client.vm_details(VM_GUID).await.unwrap(), None);
        assert_eq!(
            transport.requests().pop().unwrap().url,
            format!("https://backup.example.com/api/virtual-machines/{}", VM_GUID)
        );
    }

    #[tokio::test]
    async fn test_vm_details_rejects_invalid_guid() {
        let transport = MockTransport::default();
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(&transport, &sleeper).await;

        let err = client.vm_details("abc/def").await.unwrap_err();
        assert!(matches!(err, RequestError::InvalidArgument(_)));
        // Only the login went out
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_list_tasks_server_error() {
        let transport = MockTransport::default();
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(&transport, &sleeper).await;
        transport.push_status(StatusCode::BAD_GATEWAY);

        let err = client.list_tasks().await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_volumetry_is_retried() {
        let transport = MockTransport::default();
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(&transport, &sleeper).await;
        transport.push_status(StatusCode::GATEWAY_TIMEOUT);
        transport.push_json(
            StatusCode::OK,
            serde_json::json!([{"guid": "p-1", "name": "Finance", "size": 2048}]),
        );

        let to = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let query = VolumetryQuery::ending_at(to, 24);
        let projects = client.backup_size_by_project(&query).await.unwrap();

        assert_eq!(projects[0].size, Some(2048));
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(5)]);

        let request = transport.requests().pop().unwrap();
        assert_eq!(
            request.url,
            "https://backup.example.com/api/chargeback-reporting/backup-size/vm"
        );
        let body = request.body.unwrap();
        assert_eq!(body["groupBy"], "project");
        assert_eq!(body["to"], 1_714_608_000_000_i64);
    }

    #[tokio::test]
    async fn test_volumetry_gives_up_after_policy_limit() {
        let transport = MockTransport::default();
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(&transport, &sleeper).await;
        for _ in 0..3 {
            transport.push_status(StatusCode::INTERNAL_SERVER_ERROR);
        }

        let query = VolumetryQuery::ending_at(Utc::now(), 1);
        let err = client.backup_size_by_project(&query).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        // login + 3 attempts
        assert_eq!(transport.calls(), 4);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn test_volumetry_decode_failure_is_not_retried() {
        let transport = MockTransport::default();
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(&transport, &sleeper).await;
        transport.push_json(StatusCode::OK, serde_json::json!({"unexpected": "shape"}));
        transport.push_json(StatusCode::OK, serde_json::json!([]));

        let query = VolumetryQuery::ending_at(Utc::now(), 1);
        let err = client.backup_size_by_project(&query).await.unwrap_err();

        assert!(matches!(err, RequestError::Decode(_)));
        // login + a single attempt
        assert_eq!(transport.calls(), 2);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_volumetry_forbidden_is_not_retried() {
        let transport = MockTransport::default();
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(&transport, &sleeper).await;
        transport.push_status(StatusCode::FORBIDDEN);

        let query = VolumetryQuery::ending_at(Utc::now(), 1);
        let err = client.backup_size_by_project(&query).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(transport.calls(), 2);
        assert!(sleeper.delays().is_empty());
    }
}
