//! Feature probes.
//!
//! A probe answers "does this device have optional feature X" without ever
//! failing: a missing key, a null value or a missing method all read as
//! "absent".

use serde_json::Value;

use super::capabilities::FanFeatures;
use super::device::DeviceMethod;
use super::device::DeviceRecord;

/// Which mapping of a [`DeviceRecord`] to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dictionary {
    Details,
    Config,
}

/// True if `key` is present in the chosen mapping with a non-null value.
pub fn has_feature(device: &DeviceRecord, dictionary: Dictionary, key: &str) -> bool {
    match dictionary {
        Dictionary::Details => device.detail(key).is_some(),
        Dictionary::Config => device.config_value(key).is_some(),
    }
}

/// True if `key` is present in either `details` or `config`.
pub fn has_any_feature(device: &DeviceRecord, key: &str) -> bool {
    has_feature(device, Dictionary::Details, key) || has_feature(device, Dictionary::Config, key)
}

pub fn has_method(device: &DeviceRecord, method: DeviceMethod) -> bool {
    device.methods.contains(&method)
}

pub fn has_attribute(device: &DeviceRecord, key: &str) -> bool {
    device.attribute(key).is_some()
}

/// Loose truthiness: null, false, zero, "" and empty containers are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// True if the device carries a usable night light.
///
/// Either the device reports a truthy `night_light` attribute, or its model
/// table lists the `nightlight` feature.
pub fn has_night_light(device: &DeviceRecord, features: Option<&FanFeatures>) -> bool {
    device.attribute("night_light").is_some_and(is_truthy)
        || features.is_some_and(|f| f.has_feature("nightlight"))
}

/// Read an integer out of a JSON value, accepting numeric strings.
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
