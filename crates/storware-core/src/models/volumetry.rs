use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{VirtualMachine, NOT_AVAILABLE};
use crate::utils::format_bytes;

/// Grouping requested from the chargeback endpoint
const GROUP_BY_PROJECT: &str = "project";

/// Reporting window for a volumetry query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumetryQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl VolumetryQuery {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Window of `hours` ending at `to`
    pub fn ending_at(to: DateTime<Utc>, hours: i64) -> Self {
        Self {
            from: to - Duration::hours(hours),
            to,
        }
    }

    pub(crate) fn request_body(&self) -> VolumetryRequest {
        VolumetryRequest {
            group_by: GROUP_BY_PROJECT,
            from: self.from.timestamp_millis(),
            to: self.to.timestamp_millis(),
            ..Default::default()
        }
    }
}

/// Chargeback request body. Empty guid lists mean "no filter".
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VolumetryRequest {
    group_by: &'static str,
    from: i64,
    to: i64,
    backup_destination_guids: Vec<String>,
    backup_policy_guids: Vec<String>,
    hypervisor_cluster_guids: Vec<String>,
    hypervisor_manager_guids: Vec<String>,
    hypervisor_guids: Vec<String>,
    virtual_machine_guids: Vec<String>,
    project_guids: Vec<String>,
}

/// One project entry of the chargeback response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectBackupSize {
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Bytes. Fractional sizes are rounded, non-numeric ones are unknown.
    #[serde(default, deserialize_with = "lenient_size")]
    pub size: Option<u64>,
}

fn lenient_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as u64)
        }),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSummary {
    pub vm_name: String,
    pub vm_guid: String,
}

impl From<&VirtualMachine> for VmSummary {
    fn from(vm: &VirtualMachine) -> Self {
        Self {
            vm_name: vm.display_name().to_string(),
            vm_guid: vm.display_guid().to_string(),
        }
    }
}

/// Report line for one project, as written to the JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project_name: String,
    pub project_guid: String,
    pub total_backup_size_bytes: u64,
    pub total_backup_size_readable: String,
    pub vms: Vec<VmSummary>,
}

impl From<&ProjectBackupSize> for ProjectReport {
    fn from(project: &ProjectBackupSize) -> Self {
        let size = project.size.unwrap_or(0);
        Self {
            project_name: project.name.as_deref().unwrap_or(NOT_AVAILABLE).to_string(),
            project_guid: project.guid.as_deref().unwrap_or(NOT_AVAILABLE).to_string(),
            total_backup_size_bytes: size,
            total_backup_size_readable: format_bytes(size),
            vms: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_request_body() {
        let to = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let query = VolumetryQuery::ending_at(to, 24);
        let body = serde_json::to_value(query.request_body()).unwrap();

        assert_eq!(body["groupBy"], "project");
        assert_eq!(body["from"], 1_714_521_600_000_i64);
        assert_eq!(body["to"], 1_714_608_000_000_i64);
        for key in [
            "backupDestinationGuids",
            "backupPolicyGuids",
            "hypervisorClusterGuids",
            "hypervisorManagerGuids",
            "hypervisorGuids",
            "virtualMachineGuids",
            "projectGuids",
        ] {
            assert_eq!(body[key], serde_json::json!([]), "{}", key);
        }
    }

    #[test]
    fn test_size_accepts_integers_and_floats() {
        let projects: Vec<ProjectBackupSize> = serde_json::from_str(
            r#"[
                {"guid": "a", "size": 2048},
                {"guid": "b", "size": 1536.6},
                {"guid": "c", "size": 2.0e3},
                {"guid": "d", "size": "big"},
                {"guid": "e", "size": -5},
                {"guid": "f", "size": null},
                {"guid": "g"}
            ]"#,
        )
        .unwrap();

        let sizes: Vec<Option<u64>> = projects.iter().map(|p| p.size).collect();
        assert_eq!(
            sizes,
            vec![Some(2048), Some(1537), Some(2000), None, None, None, None]
        );
    }

    #[test]
    fn test_project_report_defaults() {
        let project: ProjectBackupSize = serde_json::from_str(r#"{"guid":"p-1"}"#).unwrap();
        let report = ProjectReport::from(&project);
        assert_eq!(report.project_name, "N/A");
        assert_eq!(report.project_guid, "p-1");
        assert_eq!(report.total_backup_size_bytes, 0);
        assert_eq!(report.total_backup_size_readable, "0.00 B");
    }

    #[test]
    fn test_project_report_serializes_snake_case() {
        let project = ProjectBackupSize {
            guid: Some("p-1".into()),
            name: Some("Finance".into()),
            size: Some(1536),
        };
        let json = serde_json::to_value(ProjectReport::from(&project)).unwrap();
        assert_eq!(json["project_name"], "Finance");
        assert_eq!(json["total_backup_size_bytes"], 1536);
        assert_eq!(json["total_backup_size_readable"], "1.50 KB");
        assert_eq!(json["vms"], serde_json::json!([]));
    }
}
