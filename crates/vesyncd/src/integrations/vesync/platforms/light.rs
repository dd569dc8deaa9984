use serde_json::Value;

use super::CommandError;
use super::EntityBase;
use super::EntityReading;
use super::VeSyncEntity;
use super::on_off;
use crate::engine::EntityCategory;
use crate::engine::EntityCommand;
use crate::engine::Platform;
use crate::integrations::vesync::capabilities::CapabilityLookup;
use crate::integrations::vesync::capabilities::PlugKind;
use crate::integrations::vesync::device::DeviceRecord;
use crate::integrations::vesync::manager::DeviceCall;
use crate::integrations::vesync::probe::as_int;
use crate::integrations::vesync::probe::has_night_light;

/// Coldest supported color temperature, in mireds.
const MIN_MIREDS: u16 = 154;
/// Warmest supported color temperature, in mireds.
const MAX_MIREDS: u16 = 370;

const NIGHT_LIGHT_ON: u8 = 255;
const NIGHT_LIGHT_DIM: u8 = 125;

/// Module whose night light only knows on, dim and off.
const AIR_BYPASS: &str = "VeSyncAirBypass";

pub(super) fn setup_entities(
    devices: &[&DeviceRecord],
    caps: &dyn CapabilityLookup,
) -> Vec<Box<dyn VeSyncEntity>> {
    let mut entities: Vec<Box<dyn VeSyncEntity>> = Vec::new();
    for dev in devices {
        match caps.plug_kind(&dev.device_type) {
            Some(PlugKind::BulbDimmable | PlugKind::WallDimmer) => {
                entities.push(Box::new(DimmableLight {
                    base: EntityBase::new(dev),
                }));
            }
            Some(PlugKind::BulbTunableWhite) => {
                entities.push(Box::new(TunableWhiteLight {
                    base: EntityBase::new(dev),
                }));
            }
            _ => {}
        }

        let features = caps.fan_features(&dev.device_type);
        if has_night_light(dev, features) {
            entities.push(Box::new(NightLight {
                base: EntityBase::new(dev),
                module: features.map(|f| f.module),
            }));
        }
    }
    entities
}

/// Device brightness (1-100 percent) to entity brightness (0-255).
fn vesync_to_ha(value: i64) -> u8 {
    let percent = value.clamp(1, 100) as f64;
    (percent / 100.0 * 255.0).round() as u8
}

/// Entity brightness (0-255) to device brightness (1-100 percent).
fn ha_to_vesync(brightness: u8) -> u8 {
    let brightness = f64::from(brightness.max(1));
    (brightness / 255.0 * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Device color temperature percentage (0 = warm, 100 = cold) to mireds.
fn pct_to_mireds(pct: i64) -> u16 {
    let cold = pct.clamp(0, 100) as f64 / 100.0;
    let span = f64::from(MAX_MIREDS - MIN_MIREDS);
    (f64::from(MAX_MIREDS) - cold * span).round() as u16
}

/// Mireds to the device color temperature percentage.
fn mireds_to_pct(mireds: u16) -> u8 {
    let mireds = mireds.clamp(MIN_MIREDS, MAX_MIREDS);
    let warm = f64::from(mireds - MIN_MIREDS) / f64::from(MAX_MIREDS - MIN_MIREDS);
    (100.0 - warm * 100.0).round() as u8
}

fn brightness_attr(device: &DeviceRecord) -> Value {
    match device.attribute("brightness").and_then(as_int) {
        Some(value) => Value::from(vesync_to_ha(value)),
        None => Value::Null,
    }
}

/// Dimmable bulb or wall dimmer.
struct DimmableLight {
    base: EntityBase,
}

impl VeSyncEntity for DimmableLight {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Light
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        EntityReading::new(on_off(device.is_on()))
            .attr("brightness", brightness_attr(device))
            .attr("color_mode", "brightness")
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        match command {
            EntityCommand::TurnOn {
                brightness: Some(b),
                ..
            } => Ok(vec![DeviceCall::SetBrightness(ha_to_vesync(*b))]),
            EntityCommand::TurnOn { .. } => Ok(vec![DeviceCall::TurnOn]),
            EntityCommand::TurnOff => Ok(vec![DeviceCall::TurnOff]),
            _ => Err(CommandError::Unsupported {
                entity: self.name(),
                command: command.name(),
            }),
        }
    }
}

/// Tunable white bulb.
struct TunableWhiteLight {
    base: EntityBase,
}

impl VeSyncEntity for TunableWhiteLight {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Light
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        let color_temp = match device.attribute("color_temp_pct").and_then(as_int) {
            Some(pct) => Value::from(pct_to_mireds(pct)),
            None => Value::Null,
        };
        EntityReading::new(on_off(device.is_on()))
            .attr("brightness", brightness_attr(device))
            .attr("color_temp", color_temp)
            .attr("min_mireds", MIN_MIREDS)
            .attr("max_mireds", MAX_MIREDS)
            .attr("color_mode", "color_temp")
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        match command {
            EntityCommand::TurnOn {
                brightness,
                color_temp,
                ..
            } => {
                let mut calls = Vec::new();
                if let Some(mireds) = color_temp {
                    calls.push(DeviceCall::SetColorTemp(mireds_to_pct(*mireds)));
                }
                if let Some(b) = brightness {
                    calls.push(DeviceCall::SetBrightness(ha_to_vesync(*b)));
                }
                // Adjusting either attribute turns the bulb on
                if calls.is_empty() {
                    calls.push(DeviceCall::TurnOn);
                }
                Ok(calls)
            }
            EntityCommand::TurnOff => Ok(vec![DeviceCall::TurnOff]),
            _ => Err(CommandError::Unsupported {
                entity: self.name(),
                command: command.name(),
            }),
        }
    }
}

/// Night light built into a purifier or humidifier.
struct NightLight {
    base: EntityBase,
    module: Option<&'static str>,
}

impl NightLight {
    fn is_air_bypass(&self) -> bool {
        self.module == Some(AIR_BYPASS)
    }

    fn brightness(&self, device: &DeviceRecord) -> u8 {
        if self.is_air_bypass() {
            let mode = device
                .detail("night_light")
                .or_else(|| device.attribute("night_light"))
                .and_then(Value::as_str);
            match mode {
                Some("on") => NIGHT_LIGHT_ON,
                Some("dim") => NIGHT_LIGHT_DIM,
                _ => 0,
            }
        } else {
            match device.detail("night_light_brightness").and_then(as_int) {
                Some(0) | None => 0,
                Some(value) => vesync_to_ha(value),
            }
        }
    }
}

impl VeSyncEntity for NightLight {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Light
    }

    fn unique_id(&self) -> String {
        self.base.unique_id("-night-light")
    }

    fn name(&self) -> String {
        self.base.name("night light")
    }

    fn category(&self) -> Option<EntityCategory> {
        Some(EntityCategory::Config)
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        let brightness = self.brightness(device);
        EntityReading::new(on_off(brightness > 0))
            .attr("brightness", brightness)
            .attr("color_mode", "brightness")
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        match (command, self.is_air_bypass()) {
            (EntityCommand::TurnOn { brightness, .. }, true) => {
                let mode = match brightness {
                    Some(b) if *b < NIGHT_LIGHT_ON => "dim",
                    _ => "on",
                };
                Ok(vec![DeviceCall::SetNightLight(mode.to_string())])
            }
            (EntityCommand::TurnOn { brightness, .. }, false) => {
                let level = brightness.map(ha_to_vesync).unwrap_or(100);
                Ok(vec![DeviceCall::SetNightLightBrightness(level)])
            }
            (EntityCommand::TurnOff, true) => {
                Ok(vec![DeviceCall::SetNightLight("off".to_string())])
            }
            (EntityCommand::TurnOff, false) => Ok(vec![DeviceCall::SetNightLightBrightness(0)]),
            _ => Err(CommandError::Unsupported {
                entity: self.name(),
                command: command.name(),
            }),
        }
    }
}
