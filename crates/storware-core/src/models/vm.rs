use serde::{Deserialize, Serialize};

use super::NOT_AVAILABLE;

/// Reference to another entity by guid and name (project, status, type...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project: Option<NamedRef>,
    #[serde(default)]
    pub protection_status: Option<NamedRef>,
}

impl VirtualMachine {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    pub fn display_guid(&self) -> &str {
        self.guid.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    pub fn display_protection_status(&self) -> &str {
        self.protection_status
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn project_guid(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.guid.as_deref())
    }
}

/// Inventory listing filter. `head` takes precedence over `tail`.
#[derive(Debug, Clone, Default)]
pub struct VmFilter {
    pub name_contains: Option<String>,
    pub head: Option<usize>,
    pub tail: Option<usize>,
}

impl VmFilter {
    pub fn apply<'a>(&self, vms: &'a [VirtualMachine]) -> Vec<&'a VirtualMachine> {
        let needle = self.name_contains.as_ref().map(|s| s.to_lowercase());
        let mut matched: Vec<&VirtualMachine> = vms
            .iter()
            .filter(|vm| match needle {
                Some(ref needle) => vm
                    .name
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(needle.as_str()),
                None => true,
            })
            .collect();

        if let Some(head) = self.head.filter(|n| *n > 0) {
            matched.truncate(head);
        } else if let Some(tail) = self.tail.filter(|n| *n > 0) {
            let skip = matched.len().saturating_sub(tail);
            matched.drain(..skip);
        }
        matched
    }
}
