//! Planned change for one resource

use crate::schema::AttrChange;
use serde::Serialize;

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update the resource in place
    Update,
    /// Delete and create again, a force-new attribute changed
    Replace,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub resource_type: String,
    pub action: ActionType,
    pub changes: Vec<AttrChange>,
}

impl Plan {
    pub fn has_changes(&self) -> bool {
        self.action != ActionType::NoOp
    }

    /// Names of the attributes forcing a replacement
    pub fn replace_reasons(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.requires_replace)
            .map(|c| c.name.as_str())
            .collect()
    }
}
