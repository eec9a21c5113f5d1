//! Data models for Backup Service entities.
//!
//! - `VirtualMachine`: inventory entries, with their owning project
//! - `Task`: backup/restore tasks shown by the task monitor
//! - `ProjectBackupSize`, `VolumetryQuery`: chargeback volumetry grouped by project
//! - `ProjectReport`: the combined volumetry report written by collectors

pub mod task;
pub mod vm;
pub mod volumetry;

pub use task::{Task, TaskFilter, TaskStatus};
pub use vm::{NamedRef, VirtualMachine, VmFilter};
pub use volumetry::{ProjectBackupSize, ProjectReport, VmSummary, VolumetryQuery};

/// Placeholder for values the API did not return
pub const NOT_AVAILABLE: &str = "N/A";
