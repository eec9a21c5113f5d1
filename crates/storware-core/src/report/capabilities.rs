use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::api::{RequestError, StorwareClient, Transport};
use crate::models::{ProjectBackupSize, ProjectReport, VirtualMachine, VolumetryQuery};

/// Where the VM inventory comes from
#[async_trait]
pub trait VmInventorySource: Send + Sync {
    async fn list_vms(&self) -> Result<Vec<VirtualMachine>, RequestError>;
}

/// Where backup volumetry per project comes from
#[async_trait]
pub trait VolumetrySource: Send + Sync {
    async fn backup_size_by_project(
        &self,
        query: &VolumetryQuery,
    ) -> Result<Vec<ProjectBackupSize>, RequestError>;
}

#[async_trait]
impl<T: Transport> VmInventorySource for StorwareClient<T> {
    async fn list_vms(&self) -> Result<Vec<VirtualMachine>, RequestError> {
        StorwareClient::list_vms(self).await
    }
}

#[async_trait]
impl<T: Transport> VolumetrySource for StorwareClient<T> {
    async fn backup_size_by_project(
        &self,
        query: &VolumetryQuery,
    ) -> Result<Vec<ProjectBackupSize>, RequestError> {
        StorwareClient::backup_size_by_project(self, query).await
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Turns a finished report into a document
pub trait DocumentRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn file_extension(&self) -> &'static str;

    fn render(&self, reports: &[ProjectReport]) -> Result<Vec<u8>, RenderError>;
}

/// Pretty-printed JSON with four-space indentation
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl DocumentRenderer for JsonRenderer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, reports: &[ProjectReport]) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        reports.serialize(&mut serializer)?;
        out.push(b'\n');
        Ok(out)
    }
}

/// A report generation request to run later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportJob {
    pub project_guids: Vec<String>,
    pub query: VolumetryQuery,
    pub include_vms: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("task queue unavailable: {0}")]
    Unavailable(String),

    #[error("job rejected: {0}")]
    Rejected(String),
}

/// Deferred execution of report jobs
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, job: ReportJob) -> Result<JobId, QueueError>;
}
