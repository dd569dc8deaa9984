//! Entity builders, one module per platform.
//!
//! Each bucket of a classification feeds one platform. A platform looks at
//! every device in its bucket, probes for optional features, and builds zero
//! or more entities for it. Entities hold only the identity of their device;
//! state is always read from the manager's current snapshot.

mod binary_sensor;
mod button;
mod fan;
mod humidifier;
mod light;
mod number;
mod sensor;
mod switch;

use serde_json::Value;

use super::capabilities::CapabilityLookup;
use super::classify::Bucket;
use super::device::DeviceRecord;
use super::device::Mapping;
use super::manager::DeviceCall;
use crate::engine::DeviceInfo;
use crate::engine::EntityCategory;
use crate::engine::EntityCommand;
use crate::engine::EntityState;
use crate::engine::Platform;

const MANUFACTURER: &str = "VeSync";

/// Identity of the device behind an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityBase {
    /// Base unique id of the device (`cid` plus sub-device number)
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub sw_version: Option<String>,
}

impl EntityBase {
    pub fn new(device: &DeviceRecord) -> Self {
        Self {
            device_id: device.base_unique_id(),
            device_name: device.device_name.clone(),
            device_type: device.device_type.clone(),
            sw_version: device.current_firm_version.clone(),
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(
            self.device_id.clone(),
            self.device_name.clone(),
            MANUFACTURER,
            self.device_type.clone(),
        )
        .with_sw_version(self.sw_version.clone())
    }

    /// `<device id><suffix>`
    pub fn unique_id(&self, suffix: &str) -> String {
        format!("{}{}", self.device_id, suffix)
    }

    /// `<device name> <label>`
    pub fn name(&self, label: &str) -> String {
        format!("{} {}", self.device_name, label)
    }
}

/// What an entity currently reads from its device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityReading {
    pub state: Value,
    pub attributes: Mapping,
}

impl EntityReading {
    pub fn new(state: Value) -> Self {
        Self {
            state,
            attributes: Mapping::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Add `value` only when it is present.
    pub fn attr_opt(mut self, key: &str, value: Option<&Value>) -> Self {
        if let Some(v) = value {
            self.attributes.insert(key.to_string(), v.clone());
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{entity} does not support {command}")]
    Unsupported {
        entity: String,
        command: &'static str,
    },

    #[error("{0}")]
    InvalidArgument(String),
}

/// "on"/"off" state value.
pub fn on_off(on: bool) -> Value {
    Value::from(if on { "on" } else { "off" })
}

/// An entity exposed by the VeSync integration.
pub trait VeSyncEntity: Send + Sync {
    fn base(&self) -> &EntityBase;

    fn platform(&self) -> Platform;

    fn unique_id(&self) -> String {
        self.base().device_id.clone()
    }

    fn name(&self) -> String {
        self.base().device_name.clone()
    }

    fn category(&self) -> Option<EntityCategory> {
        None
    }

    /// Read the entity's state out of its device record.
    fn read(&self, device: &DeviceRecord) -> EntityReading;

    /// Translate a command into the device calls that carry it out.
    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        Err(CommandError::Unsupported {
            entity: self.name(),
            command: command.name(),
        })
    }

    /// Full state for the engine. `None` means the device has disappeared.
    fn entity_state(&self, device: Option<&DeviceRecord>) -> EntityState {
        let (available, reading) = match device {
            Some(d) => (d.is_online(), self.read(d)),
            None => (false, EntityReading::default()),
        };
        EntityState {
            platform: self.platform(),
            name: self.name(),
            unique_id: self.unique_id(),
            available,
            category: self.category(),
            state: reading.state,
            attributes: reading.attributes,
            device: self.base().device_info(),
        }
    }
}

/// Plain on/off commands shared by toggle-like entities.
fn toggle_command(
    entity: &dyn VeSyncEntity,
    command: &EntityCommand,
    on: &[DeviceCall],
    off: &[DeviceCall],
) -> Result<Vec<DeviceCall>, CommandError> {
    match command {
        EntityCommand::TurnOn { .. } => Ok(on.to_vec()),
        EntityCommand::TurnOff => Ok(off.to_vec()),
        _ => Err(CommandError::Unsupported {
            entity: entity.name(),
            command: command.name(),
        }),
    }
}

/// Build the entities for every device in `bucket`.
pub fn setup_entities(
    bucket: Bucket,
    devices: &[&DeviceRecord],
    caps: &dyn CapabilityLookup,
) -> Vec<Box<dyn VeSyncEntity>> {
    match bucket {
        Bucket::Switches => switch::setup_entities(devices, caps),
        Bucket::Fans => fan::setup_entities(devices, caps),
        Bucket::Lights => light::setup_entities(devices, caps),
        Bucket::Sensors => sensor::setup_entities(devices, caps),
        Bucket::Humidifiers => humidifier::setup_entities(devices),
        Bucket::Numbers => number::setup_entities(devices, caps),
        Bucket::BinarySensors => binary_sensor::setup_entities(devices),
        Bucket::Buttons => button::setup_entities(devices),
    }
}
