use serde_json::Value;
use tracing::warn;

use super::CommandError;
use super::EntityBase;
use super::EntityReading;
use super::VeSyncEntity;
use super::on_off;
use crate::engine::EntityCommand;
use crate::engine::Platform;
use crate::integrations::vesync::capabilities::CapabilityLookup;
use crate::integrations::vesync::device::DeviceRecord;
use crate::integrations::vesync::manager::DeviceCall;
use crate::integrations::vesync::probe::as_int;

const MODE_AUTO: &str = "auto";
const MODE_SLEEP: &str = "sleep";
const MODE_MANUAL: &str = "manual";

/// Speed range used when the model table has no levels; off is not included.
const SPEED_RANGE: (u8, u8) = (1, 3);

/// Speed used by a bare `turn_on`.
const DEFAULT_PERCENTAGE: u8 = 50;

/// Device attributes passed through to the fan state.
const EXTRA_ATTRIBUTES: &[&str] = &[
    "active_time",
    "screen_status",
    "child_lock",
    "night_light",
    "air_quality",
    "mode",
    "filter_life",
];

pub(super) fn setup_entities(
    devices: &[&DeviceRecord],
    caps: &dyn CapabilityLookup,
) -> Vec<Box<dyn VeSyncEntity>> {
    let mut entities: Vec<Box<dyn VeSyncEntity>> = Vec::new();
    for dev in devices {
        let Some(features) = caps.fan_features(&dev.device_type) else {
            warn!(
                "{} - Unknown device type - {}",
                dev.device_name, dev.device_type
            );
            continue;
        };

        let speed_range = match (features.levels.first(), features.levels.last()) {
            (Some(low), Some(high)) => (*low, *high),
            _ => SPEED_RANGE,
        };
        let preset_modes = [MODE_AUTO, MODE_SLEEP]
            .into_iter()
            .filter(|m| features.modes.contains(m))
            .collect();

        entities.push(Box::new(PurifierFan {
            base: EntityBase::new(dev),
            speed_range,
            preset_modes,
        }));
    }
    entities
}

/// Number of speeds in `range`, inclusive.
fn speed_count(range: (u8, u8)) -> u32 {
    u32::from(range.1.saturating_sub(range.0)) + 1
}

/// Speed level to a 0-100 percentage. Levels outside the range read as 0 or 100.
fn level_to_percentage(range: (u8, u8), level: i64) -> i64 {
    let offset = i64::from(range.0) - 1;
    let level = level.clamp(offset, i64::from(range.1));
    (level - offset) * 100 / i64::from(speed_count(range))
}

/// Percentage to the speed level that covers it, rounding up.
fn percentage_to_level(range: (u8, u8), percentage: u8) -> u8 {
    let offset = f64::from(range.0) - 1.0;
    let level = f64::from(speed_count(range)) * f64::from(percentage) / 100.0 + offset;
    level.ceil().clamp(f64::from(range.0), f64::from(range.1)) as u8
}

/// Air purifier.
struct PurifierFan {
    base: EntityBase,
    speed_range: (u8, u8),
    preset_modes: Vec<&'static str>,
}

impl PurifierFan {
    fn set_percentage(&self, device: &DeviceRecord, percentage: u8) -> Vec<DeviceCall> {
        if percentage == 0 {
            return vec![DeviceCall::TurnOff];
        }

        let mut calls = Vec::new();
        if !device.is_on() {
            calls.push(DeviceCall::TurnOn);
        }
        calls.push(DeviceCall::ManualMode);
        calls.push(DeviceCall::ChangeFanSpeed(percentage_to_level(
            self.speed_range,
            percentage.min(100),
        )));
        calls
    }

    fn set_preset_mode(
        &self,
        device: &DeviceRecord,
        preset_mode: &str,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        if !self.preset_modes.contains(&preset_mode) {
            return Err(CommandError::InvalidArgument(format!(
                "{} is not one of the valid preset modes: {:?}",
                preset_mode, self.preset_modes
            )));
        }

        let mut calls = Vec::new();
        if !device.is_on() {
            calls.push(DeviceCall::TurnOn);
        }
        calls.push(if preset_mode == MODE_AUTO {
            DeviceCall::AutoMode
        } else {
            DeviceCall::SleepMode
        });
        Ok(calls)
    }
}

impl VeSyncEntity for PurifierFan {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Fan
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        let mode = device.attribute("mode").and_then(Value::as_str);

        let percentage = match (mode, device.attribute("fan_level").and_then(as_int)) {
            (Some(MODE_MANUAL), Some(level)) => {
                Value::from(level_to_percentage(self.speed_range, level))
            }
            _ => Value::Null,
        };
        let preset_mode = match mode {
            Some(m @ (MODE_AUTO | MODE_SLEEP)) => Value::from(m),
            _ => Value::Null,
        };

        let mut reading = EntityReading::new(on_off(device.is_on()))
            .attr("percentage", percentage)
            .attr("preset_mode", preset_mode)
            .attr("preset_modes", self.preset_modes.clone())
            .attr("speed_count", speed_count(self.speed_range));
        for key in EXTRA_ATTRIBUTES {
            reading = reading.attr_opt(key, device.attribute(key));
        }
        reading
    }

    fn command(
        &self,
        device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        match command {
            EntityCommand::TurnOn {
                preset_mode: Some(preset_mode),
                ..
            } => self.set_preset_mode(device, preset_mode),
            EntityCommand::TurnOn { percentage, .. } => {
                Ok(self.set_percentage(device, percentage.unwrap_or(DEFAULT_PERCENTAGE)))
            }
            EntityCommand::TurnOff => Ok(vec![DeviceCall::TurnOff]),
            EntityCommand::SetPercentage { percentage } => {
                Ok(self.set_percentage(device, *percentage))
            }
            EntityCommand::SetPresetMode { preset_mode } => {
                self.set_preset_mode(device, preset_mode)
            }
            _ => Err(CommandError::Unsupported {
                entity: self.name(),
                command: command.name(),
            }),
        }
    }
}
