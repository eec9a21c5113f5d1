//! Report collection on top of the Backup Service client.
//!
//! Collectors depend on capability traits rather than on the HTTP client, so
//! inventory, volumetry, rendering and scheduling can be swapped or mocked
//! independently.

pub mod capabilities;
pub mod collector;

pub use capabilities::{
    DocumentRenderer, JobId, JsonRenderer, QueueError, RenderError, ReportJob, TaskQueue,
    VmInventorySource, VolumetrySource,
};
pub use collector::{CollectError, InventoryFailureMode, ReportCollector};
