//! Device records as reported by the VeSync device manager.
//!
//! A [`DeviceRecord`] is a read-only view of one physical device. The
//! manager owns the records; everything else in the integration borrows them.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use strum::Display;
use strum::EnumIter;
use strum::EnumString;

/// Free-form key/value mapping used for `config`, `details` and `attributes`.
pub type Mapping = serde_json::Map<String, Value>;

/// Raw device family, as grouped by the device manager.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceFamily {
    Fans,
    Bulbs,
    Outlets,
    Switches,
    Kitchen,
}

/// Optional control methods a device may expose.
///
/// Entities probe for these before offering the matching control.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceMethod {
    TurnOn,
    TurnOff,
    UpdateEnergy,
    SetAutoMode,
    SetManualMode,
    SetMistLevel,
    SetHumidity,
    SetHumidityMode,
    SetWarmLevel,
    AutomaticStopOn,
    AutomaticStopOff,
    TurnOnDisplay,
    TurnOffDisplay,
    ChildLockOn,
    ChildLockOff,
    ChangeFanSpeed,
    AutoMode,
    ManualMode,
    SleepMode,
    SetNightLight,
    SetNightLightBrightness,
    SetBrightness,
    SetColorTemp,
    End,
}

fn default_connection_status() -> String {
    "online".to_string()
}

/// A single physical device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Cloud identifier of the device
    pub cid: String,

    #[serde(default)]
    pub uuid: Option<String>,

    #[serde(default)]
    pub mac_id: Option<String>,

    pub device_name: String,

    /// Model code, e.g. "Core300S" or "ESW15-USA"
    pub device_type: String,

    /// Outlet index on multi-outlet devices
    #[serde(default)]
    pub sub_device_no: Option<i64>,

    #[serde(default = "default_connection_status")]
    pub connection_status: String,

    #[serde(default)]
    pub device_status: String,

    #[serde(default)]
    pub current_firm_version: Option<String>,

    /// Model capability flags and persistent settings
    #[serde(default)]
    pub config: Mapping,

    /// Live telemetry
    #[serde(default)]
    pub details: Mapping,

    /// Top-level device attributes (power, night_light, fryer_status, ...)
    #[serde(default)]
    pub attributes: Mapping,

    /// Control methods this device exposes
    #[serde(default)]
    pub methods: BTreeSet<DeviceMethod>,
}

impl DeviceRecord {
    /// Identifier shared by every entity built from this device.
    pub fn base_unique_id(&self) -> String {
        match self.sub_device_no {
            Some(n) => format!("{}{}", self.cid, n),
            None => self.cid.clone(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.connection_status == "online"
    }

    pub fn is_on(&self) -> bool {
        self.device_status == "on"
    }

    /// Non-null value from `details`.
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key).filter(|v| !v.is_null())
    }

    /// Non-null value from `config`.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key).filter(|v| !v.is_null())
    }

    /// Non-null top-level attribute.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }
}

/// One consistent view of every device the manager knows about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(default)]
    pub fans: Vec<DeviceRecord>,

    #[serde(default)]
    pub bulbs: Vec<DeviceRecord>,

    #[serde(default)]
    pub outlets: Vec<DeviceRecord>,

    #[serde(default)]
    pub switches: Vec<DeviceRecord>,

    #[serde(default)]
    pub kitchen: Vec<DeviceRecord>,
}

impl DeviceSnapshot {
    pub fn family(&self, family: DeviceFamily) -> &[DeviceRecord] {
        match family {
            DeviceFamily::Fans => &self.fans,
            DeviceFamily::Bulbs => &self.bulbs,
            DeviceFamily::Outlets => &self.outlets,
            DeviceFamily::Switches => &self.switches,
            DeviceFamily::Kitchen => &self.kitchen,
        }
    }

    pub fn family_mut(&mut self, family: DeviceFamily) -> &mut Vec<DeviceRecord> {
        match family {
            DeviceFamily::Fans => &mut self.fans,
            DeviceFamily::Bulbs => &mut self.bulbs,
            DeviceFamily::Outlets => &mut self.outlets,
            DeviceFamily::Switches => &mut self.switches,
            DeviceFamily::Kitchen => &mut self.kitchen,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fans.is_empty()
            && self.bulbs.is_empty()
            && self.outlets.is_empty()
            && self.switches.is_empty()
            && self.kitchen.is_empty()
    }

    /// Every device with its family, in classification order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceFamily, &DeviceRecord)> {
        use strum::IntoEnumIterator;

        DeviceFamily::iter().flat_map(move |f| self.family(f).iter().map(move |d| (f, d)))
    }

    /// Look up a device by its base unique id.
    pub fn find(&self, unique_id: &str) -> Option<&DeviceRecord> {
        self.iter()
            .map(|(_, d)| d)
            .find(|d| d.base_unique_id() == unique_id)
    }

    pub fn find_mut(&mut self, unique_id: &str) -> Option<&mut DeviceRecord> {
        self.fans
            .iter_mut()
            .chain(self.bulbs.iter_mut())
            .chain(self.outlets.iter_mut())
            .chain(self.switches.iter_mut())
            .chain(self.kitchen.iter_mut())
            .find(|d| d.base_unique_id() == unique_id)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Minimal online device of the given model.
    pub fn device(cid: &str, device_type: &str) -> DeviceRecord {
        DeviceRecord {
            cid: cid.to_string(),
            uuid: Some(format!("uuid-{}", cid)),
            mac_id: Some("aa:bb:cc:dd:ee:ff".to_string()),
            device_name: format!("Device {}", cid),
            device_type: device_type.to_string(),
            sub_device_no: None,
            connection_status: "online".to_string(),
            device_status: "on".to_string(),
            current_firm_version: Some("1.0.0".to_string()),
            config: Mapping::new(),
            details: Mapping::new(),
            attributes: Mapping::new(),
            methods: BTreeSet::new(),
        }
    }

    pub fn with_detail(mut dev: DeviceRecord, key: &str, value: Value) -> DeviceRecord {
        dev.details.insert(key.to_string(), value);
        dev
    }

    pub fn with_config(mut dev: DeviceRecord, key: &str, value: Value) -> DeviceRecord {
        dev.config.insert(key.to_string(), value);
        dev
    }

    pub fn with_attribute(mut dev: DeviceRecord, key: &str, value: Value) -> DeviceRecord {
        dev.attributes.insert(key.to_string(), value);
        dev
    }

    pub fn with_methods(mut dev: DeviceRecord, methods: &[DeviceMethod]) -> DeviceRecord {
        dev.methods.extend(methods.iter().copied());
        dev
    }
}
