//! Device classification.
//!
//! Assigns every device in a [`DeviceSnapshot`] to the buckets (entity
//! platforms) it is exposed under. One physical device usually fans out into
//! several buckets: a humidifier is a humidifier, but also carries numbers
//! (mist level), switches (display), sensors (humidity) and binary sensors
//! (out of water).
//!
//! Classification is a pure function of the snapshot and the capability
//! tables. Devices whose model is not recognised are logged and left out of
//! every bucket; they never fail the pass.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use strum::Display;
use strum::EnumIter;
use strum::IntoEnumIterator;
use tracing::debug;
use tracing::warn;

use super::capabilities::CapabilityLookup;
use super::capabilities::PlugKind;
use super::device::DeviceFamily;
use super::device::DeviceRecord;
use super::device::DeviceSnapshot;
use super::diagnostics;
use super::probe;
use crate::engine::Platform;

/// Output category a device can be placed in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Bucket {
    Switches,
    Fans,
    Lights,
    Sensors,
    Humidifiers,
    Numbers,
    BinarySensors,
    Buttons,
}

impl Bucket {
    /// The entity platform that consumes this bucket.
    pub fn platform(&self) -> Platform {
        match self {
            Bucket::Switches => Platform::Switch,
            Bucket::Fans => Platform::Fan,
            Bucket::Lights => Platform::Light,
            Bucket::Sensors => Platform::Sensor,
            Bucket::Humidifiers => Platform::Humidifier,
            Bucket::Numbers => Platform::Number,
            Bucket::BinarySensors => Platform::BinarySensor,
            Bucket::Buttons => Platform::Button,
        }
    }
}

/// Why a device was left out of every bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "module", rename_all = "snake_case")]
pub enum UnclassifiedReason {
    /// No capability table entry for the model code
    UnknownModel,
    /// The model is known but its driver module is not supported here
    UnsupportedModule(&'static str),
    /// The model is known, but not as a member of the family it was listed in
    WrongFamily,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unclassified<'a> {
    pub family: DeviceFamily,
    pub device: &'a DeviceRecord,
    pub reason: UnclassifiedReason,
}

/// Bucket -> devices, borrowed from the snapshot it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationResult<'a> {
    buckets: BTreeMap<Bucket, Vec<&'a DeviceRecord>>,
    unclassified: Vec<Unclassified<'a>>,
}

impl<'a> ClassificationResult<'a> {
    /// Devices in `bucket`, in source order.
    pub fn get(&self, bucket: Bucket) -> &[&'a DeviceRecord] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty buckets in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &[&'a DeviceRecord])> {
        self.buckets
            .iter()
            .filter(|(_, devices)| !devices.is_empty())
            .map(|(bucket, devices)| (*bucket, devices.as_slice()))
    }

    /// Every bucket the given device landed in.
    pub fn buckets_of(&self, device: &DeviceRecord) -> Vec<Bucket> {
        self.iter()
            .filter(|(_, devices)| devices.iter().any(|d| std::ptr::eq(*d, device)))
            .map(|(bucket, _)| bucket)
            .collect()
    }

    pub fn unclassified(&self) -> &[Unclassified<'a>] {
        &self.unclassified
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// Base unique ids per bucket, in order.
    pub fn ids(&self, bucket: Bucket) -> Vec<String> {
        self.get(bucket).iter().map(|d| d.base_unique_id()).collect()
    }

    /// JSON summary, listing every bucket (empty ones included).
    pub fn to_json(&self) -> Value {
        let mut out = serde_json::Map::new();
        for bucket in Bucket::iter() {
            let devices: Vec<Value> = self
                .get(bucket)
                .iter()
                .map(|d| {
                    json!({
                        "id": d.base_unique_id(),
                        "name": d.device_name,
                        "device_type": d.device_type,
                    })
                })
                .collect();
            out.insert(bucket.to_string(), Value::Array(devices));
        }
        let unclassified: Vec<Value> = self
            .unclassified
            .iter()
            .map(|u| {
                json!({
                    "family": u.family,
                    "name": u.device.device_name,
                    "device_type": u.device.device_type,
                    "why": u.reason,
                })
            })
            .collect();
        out.insert("unclassified".to_string(), Value::Array(unclassified));
        Value::Object(out)
    }

    /// Add `device` to `bucket` unless a device with the same base unique id
    /// is already there.
    fn push(&mut self, bucket: Bucket, device: &'a DeviceRecord) {
        let id = device.base_unique_id();
        let devices = self.buckets.entry(bucket).or_default();
        if devices.iter().any(|d| d.base_unique_id() == id) {
            debug!("{} is already in {}, skipping duplicate", id, bucket);
            return;
        }
        devices.push(device);
    }

    fn push_all(&mut self, buckets: &[Bucket], device: &'a DeviceRecord) {
        for bucket in buckets {
            self.push(*bucket, device);
        }
    }

    fn skip(&mut self, family: DeviceFamily, device: &'a DeviceRecord, reason: UnclassifiedReason) {
        match reason {
            UnclassifiedReason::UnknownModel => warn!(
                "Unknown {} device type {} {} (enable debug for more info)",
                family, device.device_name, device.device_type
            ),
            UnclassifiedReason::UnsupportedModule(module) => warn!(
                "Unsupported {} device {} {}: module {} is not handled",
                family, device.device_name, device.device_type, module
            ),
            UnclassifiedReason::WrongFamily => warn!(
                "{} device {} has model {} from another family, skipping",
                family, device.device_name, device.device_type
            ),
        }
        self.unclassified.push(Unclassified {
            family,
            device,
            reason,
        });
    }
}

/// Buckets every classified fan-family device joins besides its primary one.
const FAN_SECONDARY: &[Bucket] = &[
    Bucket::Numbers,
    Bucket::Switches,
    Bucket::Sensors,
    Bucket::BinarySensors,
];

const AIR_FRYER_BUCKETS: &[Bucket] = &[
    Bucket::Sensors,
    Bucket::BinarySensors,
    Bucket::Switches,
    Bucket::Buttons,
];

/// Classify a snapshot into buckets.
pub fn classify<'a>(
    snapshot: &'a DeviceSnapshot,
    caps: &dyn CapabilityLookup,
) -> ClassificationResult<'a> {
    if tracing::enabled!(tracing::Level::DEBUG) {
        debug!(
            "Found the following devices: {}",
            diagnostics::redacted_snapshot(snapshot)
        );
    }

    let mut result = ClassificationResult::default();

    for fan in &snapshot.fans {
        let Some(features) = caps.fan_features(&fan.device_type) else {
            result.skip(DeviceFamily::Fans, fan, UnclassifiedReason::UnknownModel);
            continue;
        };

        // VeSync reports humidifiers as fans
        if features.is_humidifier() {
            result.push(Bucket::Humidifiers, fan);
        } else if features.is_air_purifier() {
            result.push(Bucket::Fans, fan);
        } else {
            result.skip(
                DeviceFamily::Fans,
                fan,
                UnclassifiedReason::UnsupportedModule(features.module),
            );
            continue;
        }

        result.push_all(FAN_SECONDARY, fan);
        if probe::has_night_light(fan, Some(features)) {
            result.push(Bucket::Lights, fan);
        }
    }

    for bulb in &snapshot.bulbs {
        match caps.plug_kind(&bulb.device_type) {
            Some(PlugKind::BulbDimmable | PlugKind::BulbTunableWhite) => {
                result.push(Bucket::Lights, bulb)
            }
            Some(_) => result.skip(DeviceFamily::Bulbs, bulb, UnclassifiedReason::WrongFamily),
            None => result.skip(DeviceFamily::Bulbs, bulb, UnclassifiedReason::UnknownModel),
        }
    }

    for outlet in &snapshot.outlets {
        match caps.plug_kind(&outlet.device_type) {
            // power and energy usage are exposed as sensors
            Some(_) => result.push_all(&[Bucket::Switches, Bucket::Sensors], outlet),
            None => result.skip(
                DeviceFamily::Outlets,
                outlet,
                UnclassifiedReason::UnknownModel,
            ),
        }
    }

    for switch in &snapshot.switches {
        match caps.plug_kind(&switch.device_type) {
            Some(kind) if kind.is_dimmable() => result.push(Bucket::Lights, switch),
            Some(_) => result.push(Bucket::Switches, switch),
            None => result.skip(
                DeviceFamily::Switches,
                switch,
                UnclassifiedReason::UnknownModel,
            ),
        }
    }

    for appliance in &snapshot.kitchen {
        match caps.kitchen_features(&appliance.device_type) {
            Some(features) if features.is_air_fryer() => {
                result.push_all(AIR_FRYER_BUCKETS, appliance)
            }
            Some(features) => result.skip(
                DeviceFamily::Kitchen,
                appliance,
                UnclassifiedReason::UnsupportedModule(features.module),
            ),
            None => result.skip(
                DeviceFamily::Kitchen,
                appliance,
                UnclassifiedReason::UnknownModel,
            ),
        }
    }

    result
}
