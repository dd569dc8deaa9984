use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::device::DeviceInfo;
use super::entity::EntityCategory;
use super::entity::Platform;

/// Last reported state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub platform: Platform,

    /// Human-readable name
    pub name: String,

    /// Stable identifier assigned by the owning integration
    pub unique_id: String,

    /// False while the backing device is offline or missing
    pub available: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<EntityCategory>,

    /// Primary value ("on"/"off", a number, a mode, ...)
    pub state: Value,

    pub attributes: serde_json::Map<String, Value>,

    pub device: DeviceInfo,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: BTreeMap<String, EntityState>,
}
