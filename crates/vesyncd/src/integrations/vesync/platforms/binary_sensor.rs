use serde_json::Value;

use super::EntityBase;
use super::EntityReading;
use super::VeSyncEntity;
use super::on_off;
use crate::engine::EntityCategory;
use crate::engine::Platform;
use crate::integrations::vesync::device::DeviceRecord;
use crate::integrations::vesync::probe::Dictionary;
use crate::integrations::vesync::probe::has_attribute;
use crate::integrations::vesync::probe::has_feature;
use crate::integrations::vesync::probe::is_truthy;

/// Fryer state reported while idle.
const FRYER_IDLE: &str = "standby";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    OutOfWater,
    WaterTankLifted,
    Heating,
    Cooking,
    Running,
}

impl Flag {
    fn suffix(&self) -> &'static str {
        match self {
            Flag::OutOfWater => "-out_of_water",
            Flag::WaterTankLifted => "-water_tank_lifted",
            Flag::Heating => "-is_heating",
            Flag::Cooking => "-is_cooking",
            Flag::Running => "-is_running",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Flag::OutOfWater => "out of water",
            Flag::WaterTankLifted => "water tank lifted",
            Flag::Heating => "preheating",
            Flag::Cooking => "cooking",
            Flag::Running => "running",
        }
    }

    fn device_class(&self) -> &'static str {
        match self {
            Flag::OutOfWater | Flag::WaterTankLifted => "problem",
            Flag::Heating => "heat",
            Flag::Cooking | Flag::Running => "running",
        }
    }

    fn read(&self, device: &DeviceRecord) -> bool {
        let status = device.attribute("fryer_status").and_then(Value::as_str);
        let fryer_flag = |key: &str, derived: bool| match device.attribute(key) {
            Some(value) => is_truthy(value),
            None => derived,
        };

        match self {
            Flag::OutOfWater => device.detail("water_lacks").is_some_and(is_truthy),
            Flag::WaterTankLifted => device.detail("water_tank_lifted").is_some_and(is_truthy),
            Flag::Heating => fryer_flag("is_heating", status == Some("heating")),
            Flag::Cooking => fryer_flag("is_cooking", status == Some("cooking")),
            Flag::Running => fryer_flag(
                "is_running",
                status.is_some_and(|s| s != FRYER_IDLE),
            ),
        }
    }
}

fn flags(device: &DeviceRecord) -> Vec<Flag> {
    let mut found = Vec::new();
    if has_feature(device, Dictionary::Details, "water_lacks") {
        found.push(Flag::OutOfWater);
    }
    if has_feature(device, Dictionary::Details, "water_tank_lifted") {
        found.push(Flag::WaterTankLifted);
    }
    if has_attribute(device, "fryer_status") {
        found.extend([Flag::Heating, Flag::Cooking, Flag::Running]);
    }
    found
}

pub(super) fn setup_entities(devices: &[&DeviceRecord]) -> Vec<Box<dyn VeSyncEntity>> {
    let mut entities: Vec<Box<dyn VeSyncEntity>> = Vec::new();
    for dev in devices {
        for flag in flags(dev) {
            entities.push(Box::new(BinarySensor {
                base: EntityBase::new(dev),
                flag,
            }));
        }
    }
    entities
}

struct BinarySensor {
    base: EntityBase,
    flag: Flag,
}

impl VeSyncEntity for BinarySensor {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::BinarySensor
    }

    fn unique_id(&self) -> String {
        self.base.unique_id(self.flag.suffix())
    }

    fn name(&self) -> String {
        self.base.name(self.flag.label())
    }

    fn category(&self) -> Option<EntityCategory> {
        Some(EntityCategory::Diagnostic)
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        EntityReading::new(on_off(self.flag.read(device)))
            .attr("device_class", self.flag.device_class())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::integrations::vesync::device::fixtures::*;

    #[test]
    fn test_humidifier_water_flags() {
        let dev = with_detail(device("h1", "Classic300S"), "water_lacks", json!(true));
        let dev = with_detail(dev, "water_tank_lifted", json!(false));
        let entities = setup_entities(&[&dev]);

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].unique_id(), "h1-out_of_water");
        assert_eq!(entities[0].read(&dev).state, json!("on"));
        assert_eq!(entities[1].unique_id(), "h1-water_tank_lifted");
        assert_eq!(entities[1].read(&dev).state, json!("off"));
    }

    #[test]
    fn test_fryer_flags_derived_from_status() {
        let fryer = with_attribute(device("k1", "CS158-AF"), "fryer_status", json!("heating"));
        let entities = setup_entities(&[&fryer]);
        let states: Vec<Value> = entities.iter().map(|e| e.read(&fryer).state).collect();
        assert_eq!(states, vec![json!("on"), json!("off"), json!("on")]);

        let idle = with_attribute(fryer.clone(), "fryer_status", json!("standby"));
        let states: Vec<Value> = entities.iter().map(|e| e.read(&idle).state).collect();
        assert_eq!(states, vec![json!("off"), json!("off"), json!("off")]);
    }

    #[test]
    fn test_fryer_flag_attribute_wins() {
        let fryer = with_attribute(device("k1", "CS158-AF"), "fryer_status", json!("standby"));
        let fryer = with_attribute(fryer, "is_cooking", json!(true));
        let entities = setup_entities(&[&fryer]);
        assert_eq!(entities[1].read(&fryer).state, json!("on"));
    }

    #[test]
    fn test_no_flags() {
        let outlet = device("o1", "ESW15-USA");
        assert!(setup_entities(&[&outlet]).is_empty());
    }
}
