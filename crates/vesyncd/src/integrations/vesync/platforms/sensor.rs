use serde_json::Value;

use super::EntityBase;
use super::EntityReading;
use super::VeSyncEntity;
use crate::engine::EntityCategory;
use crate::engine::Platform;
use crate::integrations::vesync::capabilities::CapabilityLookup;
use crate::integrations::vesync::capabilities::PlugKind;
use crate::integrations::vesync::device::DeviceRecord;

/// Static description of one sensor kind.
struct SensorDescription {
    suffix: &'static str,
    label: &'static str,
    device_class: Option<&'static str>,
    state_class: Option<&'static str>,
    category: Option<EntityCategory>,
    unit: fn(&DeviceRecord) -> Option<&'static str>,
    exists: fn(&DeviceRecord, &dyn CapabilityLookup) -> bool,
    value: fn(&DeviceRecord) -> Value,
}

const SENSORS: &[SensorDescription] = &[
    SensorDescription {
        suffix: "-power",
        label: "current power",
        device_class: Some("power"),
        state_class: Some("measurement"),
        category: Some(EntityCategory::Diagnostic),
        unit: watts,
        exists: is_outlet,
        value: power,
    },
    SensorDescription {
        suffix: "-energy",
        label: "energy use today",
        device_class: Some("energy"),
        state_class: Some("total_increasing"),
        category: Some(EntityCategory::Diagnostic),
        unit: kilowatt_hours,
        exists: is_outlet,
        value: energy_today,
    },
    SensorDescription {
        suffix: "-humidity",
        label: "current humidity",
        device_class: Some("humidity"),
        state_class: Some("measurement"),
        category: None,
        unit: percent,
        exists: has_humidity,
        value: humidity,
    },
    SensorDescription {
        suffix: "-air-quality",
        label: "air quality",
        device_class: Some("aqi"),
        state_class: None,
        category: None,
        unit: no_unit,
        exists: has_air_quality,
        value: air_quality,
    },
    SensorDescription {
        suffix: "-filter-life",
        label: "filter life",
        device_class: None,
        state_class: Some("measurement"),
        category: Some(EntityCategory::Diagnostic),
        unit: percent,
        exists: has_filter_life,
        value: filter_life,
    },
    SensorDescription {
        suffix: "-current_temp",
        label: "current temperature",
        device_class: Some("temperature"),
        state_class: Some("measurement"),
        category: None,
        unit: temperature,
        exists: |d, _| d.attribute("current_temp").is_some(),
        value: |d| fryer_value(d, "current_temp"),
    },
    SensorDescription {
        suffix: "-cook_set_temp",
        label: "set temperature",
        device_class: Some("temperature"),
        state_class: Some("measurement"),
        category: None,
        unit: temperature,
        exists: |d, _| d.attribute("cook_set_temp").is_some(),
        value: |d| fryer_value(d, "cook_set_temp"),
    },
    SensorDescription {
        suffix: "-cook_last_time",
        label: "cook remaining",
        device_class: Some("duration"),
        state_class: Some("measurement"),
        category: None,
        unit: minutes,
        exists: |d, _| d.attribute("cook_last_time").is_some(),
        value: |d| fryer_value(d, "cook_last_time"),
    },
    SensorDescription {
        suffix: "-preheat_last_time",
        label: "preheat remaining",
        device_class: Some("duration"),
        state_class: Some("measurement"),
        category: None,
        unit: minutes,
        exists: |d, _| d.attribute("preheat_last_time").is_some(),
        value: |d| fryer_value(d, "preheat_last_time"),
    },
    SensorDescription {
        suffix: "-cook_status",
        label: "cook status",
        device_class: None,
        state_class: None,
        category: None,
        unit: no_unit,
        exists: |d, _| d.attribute("cook_status").is_some(),
        value: |d| fryer_value(d, "cook_status"),
    },
];

fn no_unit(_: &DeviceRecord) -> Option<&'static str> {
    None
}

fn watts(_: &DeviceRecord) -> Option<&'static str> {
    Some("W")
}

fn kilowatt_hours(_: &DeviceRecord) -> Option<&'static str> {
    Some("kWh")
}

fn percent(_: &DeviceRecord) -> Option<&'static str> {
    Some("%")
}

fn minutes(_: &DeviceRecord) -> Option<&'static str> {
    Some("min")
}

/// The fryer reports its display unit as `temp_unit`.
fn temperature(device: &DeviceRecord) -> Option<&'static str> {
    match device.attribute("temp_unit").and_then(Value::as_str) {
        Some(unit) if unit.eq_ignore_ascii_case("fahrenheit") || unit.eq_ignore_ascii_case("f") => {
            Some("°F")
        }
        _ => Some("°C"),
    }
}

fn is_outlet(device: &DeviceRecord, caps: &dyn CapabilityLookup) -> bool {
    caps.plug_kind(&device.device_type) == Some(PlugKind::Outlet)
}

fn has_humidity(device: &DeviceRecord, _: &dyn CapabilityLookup) -> bool {
    device.detail("humidity").is_some()
}

fn has_air_quality(device: &DeviceRecord, _: &dyn CapabilityLookup) -> bool {
    lookup(device, "air_quality_value").is_some() || lookup(device, "air_quality").is_some()
}

fn has_filter_life(device: &DeviceRecord, _: &dyn CapabilityLookup) -> bool {
    lookup(device, "filter_life").is_some()
}

/// Attribute first, then details.
fn lookup<'a>(device: &'a DeviceRecord, key: &str) -> Option<&'a Value> {
    device.attribute(key).or_else(|| device.detail(key))
}

fn power(device: &DeviceRecord) -> Value {
    device.attribute("power").cloned().unwrap_or(Value::Null)
}

fn energy_today(device: &DeviceRecord) -> Value {
    device
        .attribute("energy_today")
        .cloned()
        .unwrap_or(Value::Null)
}

fn humidity(device: &DeviceRecord) -> Value {
    device.detail("humidity").cloned().unwrap_or(Value::Null)
}

fn air_quality(device: &DeviceRecord) -> Value {
    let value = lookup(device, "air_quality_value").or_else(|| lookup(device, "air_quality"));
    match value {
        Some(Value::String(s)) => Value::from(capitalize(s)),
        Some(v) => v.clone(),
        None => Value::Null,
    }
}

/// Filter life is either a plain percentage or an object with a `percent` key.
fn filter_life(device: &DeviceRecord) -> Value {
    match lookup(device, "filter_life") {
        Some(Value::Object(obj)) => obj.get("percent").cloned().unwrap_or(Value::Null),
        Some(v) => v.clone(),
        None => Value::Null,
    }
}

fn fryer_value(device: &DeviceRecord, key: &str) -> Value {
    device.attribute(key).cloned().unwrap_or(Value::Null)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub(super) fn setup_entities(
    devices: &[&DeviceRecord],
    caps: &dyn CapabilityLookup,
) -> Vec<Box<dyn VeSyncEntity>> {
    let mut entities: Vec<Box<dyn VeSyncEntity>> = Vec::new();
    for dev in devices {
        for description in SENSORS {
            if (description.exists)(dev, caps) {
                entities.push(Box::new(Sensor {
                    base: EntityBase::new(dev),
                    description,
                }));
            }
        }
    }
    entities
}

struct Sensor {
    base: EntityBase,
    description: &'static SensorDescription,
}

impl VeSyncEntity for Sensor {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn unique_id(&self) -> String {
        self.base.unique_id(self.description.suffix)
    }

    fn name(&self) -> String {
        self.base.name(self.description.label)
    }

    fn category(&self) -> Option<EntityCategory> {
        self.description.category
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        let description = self.description;
        let mut reading = EntityReading::new((description.value)(device))
            .attr("unit_of_measurement", (description.unit)(device))
            .attr("device_class", description.device_class)
            .attr("state_class", description.state_class);

        if description.suffix == "-filter-life" {
            if let Some(Value::Object(obj)) = lookup(device, "filter_life") {
                for (key, value) in obj {
                    reading.attributes.insert(key.clone(), value.clone());
                }
            }
        }
        reading
    }
}
