use serde_json::Value;

use super::CommandError;
use super::EntityBase;
use super::EntityReading;
use super::VeSyncEntity;
use crate::engine::EntityCommand;
use crate::engine::Platform;
use crate::integrations::vesync::device::DeviceRecord;
use crate::integrations::vesync::manager::DeviceCall;
use crate::integrations::vesync::probe::has_attribute;

pub(super) fn setup_entities(devices: &[&DeviceRecord]) -> Vec<Box<dyn VeSyncEntity>> {
    devices
        .iter()
        .filter(|dev| has_attribute(dev, "cook_set_temp"))
        .map(|dev| {
            Box::new(EndCookButton {
                base: EntityBase::new(dev),
            }) as Box<dyn VeSyncEntity>
        })
        .collect()
}

/// Stops the current cook or preheat cycle.
struct EndCookButton {
    base: EntityBase,
}

impl VeSyncEntity for EndCookButton {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Button
    }

    fn unique_id(&self) -> String {
        self.base.unique_id("-end")
    }

    fn name(&self) -> String {
        self.base.name("end cooking or preheating")
    }

    fn read(&self, _device: &DeviceRecord) -> EntityReading {
        EntityReading::new(Value::Null)
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        match command {
            EntityCommand::Press => Ok(vec![DeviceCall::End]),
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

    #[test]
    fn test_end_button() {
        let fryer = with_attribute(device("k1", "CS158-AF"), "cook_set_temp", json!(180));
        let idle = device("k2", "CS158-AF");
        let entities = setup_entities(&[&fryer, &idle]);

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].unique_id(), "k1-end");
        assert_eq!(entities[0].name(), "Device k1 end cooking or preheating");
        assert_eq!(
            entities[0].command(&fryer, &EntityCommand::Press).unwrap(),
            vec![DeviceCall::End]
        );
        assert!(entities[0].command(&fryer, &EntityCommand::TurnOff).is_err());
    }
}
