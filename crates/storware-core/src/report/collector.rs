use std::collections::HashMap;

use thiserror::Error;
use tracing::{info, warn};

use super::capabilities::{VmInventorySource, VolumetrySource};
use crate::api::RequestError;
use crate::models::{ProjectReport, VirtualMachine, VmSummary, VolumetryQuery};

/// What to do when the VM inventory cannot be fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InventoryFailureMode {
    /// Warn and produce the report without VM details
    #[default]
    BestEffort,
    /// Abort the report
    FailFast,
}

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("failed to fetch VM inventory: {0}")]
    Inventory(#[source] RequestError),

    #[error("failed to fetch volumetry report: {0}")]
    Volumetry(#[source] RequestError),
}

/// Builds the per-project volumetry report, optionally listing each project's VMs.
pub struct ReportCollector<'a> {
    inventory: &'a dyn VmInventorySource,
    volumetry: &'a dyn VolumetrySource,
    inventory_mode: InventoryFailureMode,
}

impl<'a> ReportCollector<'a> {
    pub fn new(inventory: &'a dyn VmInventorySource, volumetry: &'a dyn VolumetrySource) -> Self {
        Self {
            inventory,
            volumetry,
            inventory_mode: InventoryFailureMode::default(),
        }
    }

    pub fn with_inventory_mode(mut self, mode: InventoryFailureMode) -> Self {
        self.inventory_mode = mode;
        self
    }

    pub async fn collect(
        &self,
        query: &VolumetryQuery,
        include_vms: bool,
    ) -> Result<Vec<ProjectReport>, CollectError> {
        info!(include_vms, "Starting data collection");

        let vms = if include_vms {
            self.fetch_inventory().await?
        } else {
            Vec::new()
        };

        let projects = self
            .volumetry
            .backup_size_by_project(query)
            .await
            .map_err(CollectError::Volumetry)?;

        info!(projects = projects.len(), "Combining volumetry and inventory");
        let mut reports: Vec<ProjectReport> = Vec::with_capacity(projects.len());
        let mut by_guid: HashMap<String, usize> = HashMap::new();
        for project in &projects {
            let report = ProjectReport::from(project);
            match project.guid.as_ref().and_then(|guid| by_guid.get(guid)) {
                // A repeated guid keeps its first position and its latest values
                Some(&index) => reports[index] = report,
                None => {
                    if let Some(ref guid) = project.guid {
                        by_guid.insert(guid.clone(), reports.len());
                    }
                    reports.push(report);
                }
            }
        }

        for vm in &vms {
            if let Some(&index) = vm.project_guid().and_then(|guid| by_guid.get(guid)) {
                reports[index].vms.push(VmSummary::from(vm));
            }
        }

        info!(projects = reports.len(), "Data collection finished");
        Ok(reports)
    }

    async fn fetch_inventory(&self) -> Result<Vec<VirtualMachine>, CollectError> {
        match self.inventory.list_vms().await {
            Ok(vms) => {
                if vms.is_empty() {
                    warn!("VM inventory is empty, the report will not list any VM");
                }
                Ok(vms)
            }
            Err(e) => match self.inventory_mode {
                InventoryFailureMode::BestEffort => {
                    warn!(
                        error = %e,
                        "Could not fetch the VM inventory, the report will not include VM details"
                    );
                    Ok(Vec::new())
                }
                InventoryFailureMode::FailFast => Err(CollectError::Inventory(e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use reqwest::StatusCode;

    use super::*;
    use crate::models::{NamedRef, ProjectBackupSize};

    struct FakeInventory(Result<Vec<VirtualMachine>, RequestError>);

    #[async_trait]
    impl VmInventorySource for FakeInventory {
        async fn list_vms(&self) -> Result<Vec<VirtualMachine>, RequestError> {
            self.0.clone()
        }
    }

    struct FakeVolumetry(Result<Vec<ProjectBackupSize>, RequestError>);

    #[async_trait]
    impl VolumetrySource for FakeVolumetry {
        async fn backup_size_by_project(
            &self,
            _query: &VolumetryQuery,
        ) -> Result<Vec<ProjectBackupSize>, RequestError> {
            self.0.clone()
        }
    }

    fn project(guid: &str, name: &str, size: u64) -> ProjectBackupSize {
        ProjectBackupSize {
            guid: Some(guid.to_string()),
            name: Some(name.to_string()),
            size: Some(size),
        }
    }

    fn vm(guid: &str, name: &str, project_guid: Option<&str>) -> VirtualMachine {
        VirtualMachine {
            guid: Some(guid.to_string()),
            name: Some(name.to_string()),
            project: project_guid.map(|g| NamedRef {
                guid: Some(g.to_string()),
                name: None,
            }),
            protection_status: None,
        }
    }

    fn query() -> VolumetryQuery {
        VolumetryQuery::ending_at(Utc::now(), 24)
    }

    fn server_error() -> RequestError {
        RequestError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom")
    }

    #[tokio::test]
    async fn test_allocates_vms_to_projects() {
        let inventory = FakeInventory(Ok(vec![
            vm("vm-1", "web-01", Some("p-1")),
            vm("vm-2", "db-01", Some("p-2")),
            vm("vm-3", "orphan", Some("p-unknown")),
            vm("vm-4", "no-project", None),
            vm("vm-5", "web-02", Some("p-1")),
        ]));
        let volumetry = FakeVolumetry(Ok(vec![
            project("p-1", "Finance", 1024),
            project("p-2", "HR", 0),
        ]));

        let reports = ReportCollector::new(&inventory, &volumetry)
            .collect(&query(), true)
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].project_name, "Finance");
        assert_eq!(reports[0].total_backup_size_readable, "1.00 KB");
        let finance_vms: Vec<&str> = reports[0].vms.iter().map(|v| v.vm_name.as_str()).collect();
        assert_eq!(finance_vms, vec!["web-01", "web-02"]);
        assert_eq!(
            reports[1].vms,
            vec![VmSummary {
                vm_name: "db-01".into(),
                vm_guid: "vm-2".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_without_vms_skips_inventory() {
        // Inventory would fail, but is never asked
        let inventory = FakeInventory(Err(server_error()));
        let volumetry = FakeVolumetry(Ok(vec![project("p-1", "Finance", 1)]));

        let reports = ReportCollector::new(&inventory, &volumetry)
            .with_inventory_mode(InventoryFailureMode::FailFast)
            .collect(&query(), false)
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert!(reports[0].vms.is_empty());
    }

    #[tokio::test]
    async fn test_best_effort_inventory_failure() {
        let inventory = FakeInventory(Err(server_error()));
        let volumetry = FakeVolumetry(Ok(vec![project("p-1", "Finance", 1)]));

        let reports = ReportCollector::new(&inventory, &volumetry)
            .collect(&query(), true)
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert!(reports[0].vms.is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_inventory_failure() {
        let inventory = FakeInventory(Err(server_error()));
        let volumetry = FakeVolumetry(Ok(vec![project("p-1", "Finance", 1)]));

        let err = ReportCollector::new(&inventory, &volumetry)
            .with_inventory_mode(InventoryFailureMode::FailFast)
            .collect(&query(), true)
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::Inventory(_)));
    }

    #[tokio::test]
    async fn test_volumetry_failure_aborts() {
        let inventory = FakeInventory(Ok(Vec::new()));
        let volumetry = FakeVolumetry(Err(server_error()));

        let err = ReportCollector::new(&inventory, &volumetry)
            .collect(&query(), true)
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::Volumetry(_)));
    }

    #[tokio::test]
    async fn test_duplicate_project_guid_keeps_latest_values() {
        let inventory = FakeInventory(Ok(vec![vm("vm-1", "web-01", Some("p-1"))]));
        let volumetry = FakeVolumetry(Ok(vec![
            project("p-1", "Finance", 1),
            project("p-2", "HR", 2),
            project("p-1", "Finance (renamed)", 3),
        ]));

        let reports = ReportCollector::new(&inventory, &volumetry)
            .collect(&query(), true)
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].project_name, "Finance (renamed)");
        assert_eq!(reports[0].total_backup_size_bytes, 3);
        assert_eq!(reports[0].vms.len(), 1);
    }
}
