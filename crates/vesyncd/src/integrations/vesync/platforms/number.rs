use serde_json::Value;

use super::CommandError;
use super::EntityBase;
use super::EntityReading;
use super::VeSyncEntity;
use super::humidifier::MAX_HUMIDITY;
use super::humidifier::MIN_HUMIDITY;
use crate::engine::EntityCategory;
use crate::engine::EntityCommand;
use crate::engine::Platform;
use crate::integrations::vesync::capabilities::CapabilityLookup;
use crate::integrations::vesync::capabilities::FanFeatures;
use crate::integrations::vesync::device::DeviceRecord;
use crate::integrations::vesync::manager::DeviceCall;
use crate::integrations::vesync::probe::Dictionary;
use crate::integrations::vesync::probe::as_int;
use crate::integrations::vesync::probe::has_feature;

/// Which device setting a number entity controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    MistLevel,
    TargetHumidity,
    WarmMistLevel,
    FanSpeed,
}

impl Setting {
    fn suffix(&self) -> &'static str {
        match self {
            Setting::MistLevel => "-mist-level",
            Setting::TargetHumidity => "-target-level",
            Setting::WarmMistLevel => "-warm-mist",
            Setting::FanSpeed => "-fan-speed-level",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Setting::MistLevel => "mist level",
            Setting::TargetHumidity => "target humidity level",
            Setting::WarmMistLevel => "warm mist level",
            Setting::FanSpeed => "fan speed level",
        }
    }

    fn current(&self, device: &DeviceRecord) -> Option<i64> {
        match self {
            Setting::MistLevel => device.detail("mist_virtual_level").and_then(as_int),
            Setting::TargetHumidity => device.config_value("auto_target_humidity").and_then(as_int),
            Setting::WarmMistLevel => device.detail("warm_mist_level").and_then(as_int),
            Setting::FanSpeed => device
                .attribute("speed")
                .or_else(|| device.attribute("fan_level"))
                .and_then(as_int),
        }
    }

    fn call(&self, value: u8) -> DeviceCall {
        match self {
            Setting::MistLevel => DeviceCall::SetMistLevel(value),
            Setting::TargetHumidity => DeviceCall::SetHumidity(value),
            Setting::WarmMistLevel => DeviceCall::SetWarmLevel(value),
            Setting::FanSpeed => DeviceCall::ChangeFanSpeed(value),
        }
    }
}

/// First and last entry of a level table.
fn bounds(levels: &[u8]) -> Option<(u8, u8)> {
    Some((*levels.first()?, *levels.last()?))
}

/// Settings the device exposes, with their allowed range.
fn settings(device: &DeviceRecord, features: Option<&FanFeatures>) -> Vec<(Setting, (u8, u8))> {
    let mut found = Vec::new();

    if has_feature(device, Dictionary::Details, "mist_virtual_level") {
        let range = features.and_then(|f| bounds(f.mist_levels)).unwrap_or((1, 9));
        found.push((Setting::MistLevel, range));
    }
    if has_feature(device, Dictionary::Config, "auto_target_humidity") {
        found.push((Setting::TargetHumidity, (MIN_HUMIDITY, MAX_HUMIDITY)));
    }
    if has_feature(device, Dictionary::Details, "warm_mist_level") {
        let range = features
            .and_then(|f| bounds(f.warm_mist_levels))
            .unwrap_or((0, 3));
        found.push((Setting::WarmMistLevel, range));
    }
    if let Some(range) = features.and_then(|f| bounds(f.levels)) {
        found.push((Setting::FanSpeed, range));
    }
    found
}

pub(super) fn setup_entities(
    devices: &[&DeviceRecord],
    caps: &dyn CapabilityLookup,
) -> Vec<Box<dyn VeSyncEntity>> {
    let mut entities: Vec<Box<dyn VeSyncEntity>> = Vec::new();
    for dev in devices {
        for (setting, (min, max)) in settings(dev, caps.fan_features(&dev.device_type)) {
            entities.push(Box::new(NumberEntity {
                base: EntityBase::new(dev),
                setting,
                min,
                max,
            }));
        }
    }
    entities
}

struct NumberEntity {
    base: EntityBase,
    setting: Setting,
    min: u8,
    max: u8,
}

impl NumberEntity {
    fn validate(&self, value: f64) -> Result<u8, CommandError> {
        let in_range = value >= f64::from(self.min) && value <= f64::from(self.max);
        if value.fract() != 0.0 || !in_range {
            return Err(CommandError::InvalidArgument(format!(
                "{} is not a whole number between {} and {}",
                value, self.min, self.max
            )));
        }
        Ok(value as u8)
    }
}

impl VeSyncEntity for NumberEntity {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Number
    }

    fn unique_id(&self) -> String {
        self.base.unique_id(self.setting.suffix())
    }

    fn name(&self) -> String {
        self.base.name(self.setting.label())
    }

    fn category(&self) -> Option<EntityCategory> {
        Some(EntityCategory::Config)
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        let state = self
            .setting
            .current(device)
            .map(Value::from)
            .unwrap_or(Value::Null);
        EntityReading::new(state)
            .attr("min", self.min)
            .attr("max", self.max)
            .attr("step", 1)
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        match command {
            EntityCommand::SetValue { value } => {
                let value = self.validate(*value)?;
                Ok(vec![self.setting.call(value)])
            }
            _ => Err(CommandError::Unsupported {
                entity: self.name(),
                command: command.name(),
            }),
        }
    }
}
