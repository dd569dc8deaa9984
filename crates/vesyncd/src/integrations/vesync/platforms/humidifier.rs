use serde_json::Value;

use super::CommandError;
use super::EntityBase;
use super::EntityReading;
use super::VeSyncEntity;
use super::on_off;
use crate::engine::EntityCommand;
use crate::engine::Platform;
use crate::integrations::vesync::device::DeviceRecord;
use crate::integrations::vesync::manager::DeviceCall;
use crate::integrations::vesync::probe::as_int;
use crate::integrations::vesync::probe::is_truthy;

pub(super) const MIN_HUMIDITY: u8 = 30;
pub(super) const MAX_HUMIDITY: u8 = 80;

/// Entity mode to device mode.
const MODES: &[(&str, &str)] = &[("auto", "auto"), ("normal", "manual"), ("sleep", "sleep")];

/// Detail keys renamed on the way into the state attributes.
const RENAMED_DETAILS: &[(&str, &str)] = &[("humidity", "current_humidity")];

/// Attribute names owned by the humidifier entity itself.
const RESERVED: &[&str] = &[
    "mode",
    "target_humidity",
    "available_modes",
    "min_humidity",
    "max_humidity",
];

pub(super) fn setup_entities(devices: &[&DeviceRecord]) -> Vec<Box<dyn VeSyncEntity>> {
    devices
        .iter()
        .map(|dev| {
            Box::new(Humidifier {
                base: EntityBase::new(dev),
            }) as Box<dyn VeSyncEntity>
        })
        .collect()
}

fn entity_mode(device_mode: &str) -> Option<&'static str> {
    MODES
        .iter()
        .find(|(_, dev)| *dev == device_mode)
        .map(|(entity, _)| *entity)
}

fn device_mode(entity_mode: &str) -> Option<&'static str> {
    MODES
        .iter()
        .find(|(entity, _)| *entity == entity_mode)
        .map(|(_, dev)| *dev)
}

struct Humidifier {
    base: EntityBase,
}

impl VeSyncEntity for Humidifier {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Humidifier
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        let on = match device.detail("enabled") {
            Some(enabled) => is_truthy(enabled),
            None => device.is_on(),
        };
        let mode = device
            .detail("mode")
            .and_then(Value::as_str)
            .and_then(entity_mode);
        let available: Vec<&str> = MODES.iter().map(|(entity, _)| *entity).collect();

        let mut reading = EntityReading::new(on_off(on))
            .attr("mode", mode)
            .attr(
                "target_humidity",
                device.config_value("auto_target_humidity").and_then(as_int),
            )
            .attr("available_modes", available)
            .attr("min_humidity", MIN_HUMIDITY)
            .attr("max_humidity", MAX_HUMIDITY);

        for (key, value) in &device.details {
            let key = match RENAMED_DETAILS.iter().find(|(from, _)| *from == key.as_str()) {
                Some((_, to)) => (*to).to_string(),
                None if RESERVED.contains(&key.as_str()) => format!("vs_{}", key),
                None => key.clone(),
            };
            reading.attributes.insert(key, value.clone());
        }
        reading
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        match command {
            EntityCommand::TurnOn { .. } => Ok(vec![DeviceCall::TurnOn]),
            EntityCommand::TurnOff => Ok(vec![DeviceCall::TurnOff]),
            EntityCommand::SetHumidity { humidity } => {
                if !(MIN_HUMIDITY..=MAX_HUMIDITY).contains(humidity) {
                    return Err(CommandError::InvalidArgument(format!(
                        "{} is not between {} and {} (inclusive)",
                        humidity, MIN_HUMIDITY, MAX_HUMIDITY
                    )));
                }
                Ok(vec![DeviceCall::SetHumidity(*humidity)])
            }
            EntityCommand::SetMode { mode } => match device_mode(mode) {
                Some(dev) => Ok(vec![DeviceCall::SetHumidityMode(dev.to_string())]),
                None => Err(CommandError::InvalidArgument(format!(
                    "{} is not one of the valid available modes",
                    mode
                ))),
            },
            _ => Err(CommandError::Unsupported {
                entity: self.name(),
                command: command.name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::integrations::vesync::device::fixtures::*;

    fn classic() -> DeviceRecord {
        let dev = with_detail(device("h1", "Classic300S"), "humidity", json!(41));
        let dev = with_detail(dev, "mode", json!("manual"));
        let dev = with_detail(dev, "mist_virtual_level", json!(4));
        with_config(dev, "auto_target_humidity", json!(55))
    }

    #[test]
    fn test_read_maps_mode_and_details() {
        let dev = classic();
        let entities = setup_entities(&[&dev]);
        let reading = entities[0].read(&dev);

        assert_eq!(reading.state, json!("on"));
        assert_eq!(reading.attributes["mode"], json!("normal"));
        assert_eq!(reading.attributes["vs_mode"], json!("manual"));
        assert_eq!(reading.attributes["target_humidity"], json!(55));
        assert_eq!(reading.attributes["current_humidity"], json!(41));
        assert_eq!(reading.attributes["mist_virtual_level"], json!(4));
        assert!(!reading.attributes.contains_key("humidity"));
        assert_eq!(
            reading.attributes["available_modes"],
            json!(["auto", "normal", "sleep"])
        );
    }

    #[test]
    fn test_enabled_detail_wins_over_status() {
        let dev = with_detail(classic(), "enabled", json!(false));
        let entities = setup_entities(&[&dev]);
        assert_eq!(entities[0].read(&dev).state, json!("off"));
    }

    #[test]
    fn test_set_humidity_range() {
        let dev = classic();
        let entities = setup_entities(&[&dev]);

        assert_eq!(
            entities[0]
                .command(&dev, &EntityCommand::SetHumidity { humidity: 80 })
                .unwrap(),
            vec![DeviceCall::SetHumidity(80)]
        );
        assert!(matches!(
            entities[0].command(&dev, &EntityCommand::SetHumidity { humidity: 29 }),
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_set_mode() {
        let dev = classic();
        let entities = setup_entities(&[&dev]);

        assert_eq!(
            entities[0]
                .command(
                    &dev,
                    &EntityCommand::SetMode {
                        mode: "normal".to_string()
                    }
                )
                .unwrap(),
            vec![DeviceCall::SetHumidityMode("manual".to_string())]
        );
        assert!(
            entities[0]
                .command(
                    &dev,
                    &EntityCommand::SetMode {
                        mode: "turbo".to_string()
                    }
                )
                .is_err()
        );
    }
}
