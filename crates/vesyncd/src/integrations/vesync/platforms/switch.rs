use serde_json::Value;

use super::CommandError;
use super::EntityBase;
use super::EntityReading;
use super::VeSyncEntity;
use super::on_off;
use super::toggle_command;
use crate::engine::EntityCategory;
use crate::engine::EntityCommand;
use crate::engine::Platform;
use crate::integrations::vesync::capabilities::CapabilityLookup;
use crate::integrations::vesync::capabilities::PlugKind;
use crate::integrations::vesync::device::DeviceMethod;
use crate::integrations::vesync::device::DeviceRecord;
use crate::integrations::vesync::manager::DeviceCall;
use crate::integrations::vesync::probe::has_attribute;
use crate::integrations::vesync::probe::has_method;
use crate::integrations::vesync::probe::is_truthy;

const ENERGY_ATTRIBUTES: &[&str] = &[
    "voltage",
    "weekly_energy_total",
    "monthly_energy_total",
    "yearly_energy_total",
];

pub(super) fn setup_entities(
    devices: &[&DeviceRecord],
    caps: &dyn CapabilityLookup,
) -> Vec<Box<dyn VeSyncEntity>> {
    let mut entities: Vec<Box<dyn VeSyncEntity>> = Vec::new();
    for dev in devices {
        match caps.plug_kind(&dev.device_type) {
            Some(PlugKind::Outlet) => entities.push(Box::new(OutletSwitch::new(dev))),
            Some(PlugKind::Switch) => entities.push(Box::new(LightSwitch::new(dev))),
            _ => {}
        }
        for toggle in Toggle::ALL {
            if has_method(dev, toggle.probe()) {
                entities.push(Box::new(ConfigToggle::new(dev, *toggle)));
            }
        }
        if has_attribute(dev, "fryer_status") {
            entities.push(Box::new(AirFryerCooking::new(dev)));
        }
    }
    entities
}

/// Smart outlet. Exposes energy totals once the outlet has reported them.
struct OutletSwitch {
    base: EntityBase,
}

impl OutletSwitch {
    fn new(dev: &DeviceRecord) -> Self {
        Self {
            base: EntityBase::new(dev),
        }
    }
}

impl VeSyncEntity for OutletSwitch {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        let mut reading = EntityReading::new(on_off(device.is_on()));
        if has_attribute(device, "weekly_energy_total") {
            for key in ENERGY_ATTRIBUTES {
                reading = reading.attr_opt(key, device.attribute(key));
            }
        }
        reading
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        toggle_command(self, command, &[DeviceCall::TurnOn], &[DeviceCall::TurnOff])
    }
}

/// In-wall light switch (non-dimming).
struct LightSwitch {
    base: EntityBase,
}

impl LightSwitch {
    fn new(dev: &DeviceRecord) -> Self {
        Self {
            base: EntityBase::new(dev),
        }
    }
}

impl VeSyncEntity for LightSwitch {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        EntityReading::new(on_off(device.is_on()))
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        toggle_command(self, command, &[DeviceCall::TurnOn], &[DeviceCall::TurnOff])
    }
}

/// Configuration toggles on fans and humidifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toggle {
    AutoMode,
    AutomaticStop,
    Display,
    ChildLock,
}

impl Toggle {
    const ALL: &'static [Toggle] = &[
        Toggle::AutoMode,
        Toggle::AutomaticStop,
        Toggle::Display,
        Toggle::ChildLock,
    ];

    /// Method whose presence enables the toggle.
    fn probe(&self) -> DeviceMethod {
        match self {
            Toggle::AutoMode => DeviceMethod::SetAutoMode,
            Toggle::AutomaticStop => DeviceMethod::AutomaticStopOn,
            Toggle::Display => DeviceMethod::TurnOnDisplay,
            Toggle::ChildLock => DeviceMethod::ChildLockOn,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Toggle::AutoMode => "-auto-mode",
            Toggle::AutomaticStop => "-automatic-stop",
            Toggle::Display => "-display",
            Toggle::ChildLock => "-child-lock",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Toggle::AutoMode => "auto mode",
            Toggle::AutomaticStop => "automatic stop",
            Toggle::Display => "display",
            Toggle::ChildLock => "child lock",
        }
    }

    fn is_on(&self, device: &DeviceRecord) -> bool {
        match self {
            Toggle::AutoMode => device.detail("mode").and_then(Value::as_str) == Some("auto"),
            Toggle::AutomaticStop => device.config_value("automatic_stop").is_some_and(is_truthy),
            Toggle::Display => device.detail("display").is_some_and(is_truthy),
            Toggle::ChildLock => device.detail("child_lock").is_some_and(is_truthy),
        }
    }

    fn on_calls(&self) -> Vec<DeviceCall> {
        match self {
            Toggle::AutoMode => vec![DeviceCall::SetAutoMode],
            Toggle::AutomaticStop => vec![DeviceCall::AutomaticStopOn],
            Toggle::Display => vec![DeviceCall::TurnOnDisplay],
            Toggle::ChildLock => vec![DeviceCall::ChildLockOn],
        }
    }

    fn off_calls(&self) -> Vec<DeviceCall> {
        match self {
            // Leaving auto mode drops back to the lowest manual mist level
            Toggle::AutoMode => vec![DeviceCall::SetManualMode, DeviceCall::SetMistLevel(1)],
            Toggle::AutomaticStop => vec![DeviceCall::AutomaticStopOff],
            Toggle::Display => vec![DeviceCall::TurnOffDisplay],
            Toggle::ChildLock => vec![DeviceCall::ChildLockOff],
        }
    }
}

struct ConfigToggle {
    base: EntityBase,
    toggle: Toggle,
}

impl ConfigToggle {
    fn new(dev: &DeviceRecord, toggle: Toggle) -> Self {
        Self {
            base: EntityBase::new(dev),
            toggle,
        }
    }
}

impl VeSyncEntity for ConfigToggle {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn unique_id(&self) -> String {
        self.base.unique_id(self.toggle.suffix())
    }

    fn name(&self) -> String {
        self.base.name(self.toggle.label())
    }

    fn category(&self) -> Option<EntityCategory> {
        Some(EntityCategory::Config)
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        EntityReading::new(on_off(self.toggle.is_on(device)))
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        toggle_command(
            self,
            command,
            &self.toggle.on_calls(),
            &self.toggle.off_calls(),
        )
    }
}

/// Air fryer cook cycle. Can be stopped remotely, but not started.
struct AirFryerCooking {
    base: EntityBase,
}

impl AirFryerCooking {
    fn new(dev: &DeviceRecord) -> Self {
        Self {
            base: EntityBase::new(dev),
        }
    }
}

impl VeSyncEntity for AirFryerCooking {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn unique_id(&self) -> String {
        self.base.unique_id("-cooking")
    }

    fn name(&self) -> String {
        self.base.name("cooking")
    }

    fn read(&self, device: &DeviceRecord) -> EntityReading {
        let status = device.attribute("fryer_status").and_then(Value::as_str);
        EntityReading::new(on_off(matches!(status, Some("cooking" | "heating"))))
            .attr_opt("fryer_status", device.attribute("fryer_status"))
    }

    fn command(
        &self,
        _device: &DeviceRecord,
        command: &EntityCommand,
    ) -> Result<Vec<DeviceCall>, CommandError> {
        match command {
            EntityCommand::TurnOff => Ok(vec![DeviceCall::End]),
            EntityCommand::TurnOn { .. } => Err(CommandError::InvalidArgument(format!(
                "{}: cooking can only be started on the appliance",
                self.name()
            ))),
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
    use crate::integrations::vesync::capabilities::StaticCapabilities;
    use crate::integrations::vesync::device::fixtures::*;

    fn names(entities: &[Box<dyn VeSyncEntity>]) -> Vec<String> {
        entities.iter().map(|e| e.unique_id()).collect()
    }

    #[test]
    fn test_outlet_and_light_switch() {
        let outlet = device("o1", "ESW15-USA");
        let light_switch = device("s1", "ESWL01");
        let entities = setup_entities(&[&outlet, &light_switch], &StaticCapabilities);

        assert_eq!(names(&entities), vec!["o1", "s1"]);
        assert_eq!(
            entities[1].command(&light_switch, &EntityCommand::TurnOff).unwrap(),
            vec![DeviceCall::TurnOff]
        );
        assert!(matches!(
            entities[1].command(&light_switch, &EntityCommand::Press),
            Err(CommandError::Unsupported { command: "press", .. })
        ));
    }

    #[test]
    fn test_outlet_energy_attributes() {
        let plain = device("o1", "ESW15-USA");
        let entities = setup_entities(&[&plain], &StaticCapabilities);
        assert!(entities[0].read(&plain).attributes.is_empty());

        let metered = with_attribute(
            with_attribute(plain.clone(), "weekly_energy_total", json!(1.5)),
            "voltage",
            json!(120.1),
        );
        let reading = entities[0].read(&metered);
        assert_eq!(reading.attributes["voltage"], json!(120.1));
        assert_eq!(reading.attributes["weekly_energy_total"], json!(1.5));
        assert!(!reading.attributes.contains_key("yearly_energy_total"));
    }

    #[test]
    fn test_humidifier_toggles() {
        let humidifier = with_detail(
            with_methods(
                device("h1", "Classic300S"),
                &[
                    DeviceMethod::SetAutoMode,
                    DeviceMethod::AutomaticStopOn,
                    DeviceMethod::TurnOnDisplay,
                ],
            ),
            "mode",
            json!("auto"),
        );
        let entities = setup_entities(&[&humidifier], &StaticCapabilities);

        assert_eq!(
            names(&entities),
            vec!["h1-auto-mode", "h1-automatic-stop", "h1-display"]
        );
        assert!(
            entities
                .iter()
                .all(|e| e.category() == Some(EntityCategory::Config))
        );
        assert_eq!(entities[0].name(), "Device h1 auto mode");
        assert_eq!(entities[0].read(&humidifier).state, json!("on"));
        assert_eq!(entities[1].read(&humidifier).state, json!("off"));
        assert_eq!(
            entities[0].command(&humidifier, &EntityCommand::TurnOff).unwrap(),
            vec![DeviceCall::SetManualMode, DeviceCall::SetMistLevel(1)]
        );
    }

    #[test]
    fn test_child_lock_follows_details() {
        let purifier = with_detail(
            with_methods(device("p1", "Core300S"), &[DeviceMethod::ChildLockOn]),
            "child_lock",
            json!(true),
        );
        let entities = setup_entities(&[&purifier], &StaticCapabilities);

        assert_eq!(names(&entities), vec!["p1-child-lock"]);
        assert_eq!(entities[0].read(&purifier).state, json!("on"));
        assert_eq!(
            entities[0]
                .command(&purifier, &EntityCommand::turn_on())
                .unwrap(),
            vec![DeviceCall::ChildLockOn]
        );
    }

    #[test]
    fn test_air_fryer_cooking_switch() {
        let fryer = with_attribute(device("k1", "CS158-AF"), "fryer_status", json!("cooking"));
        let entities = setup_entities(&[&fryer], &StaticCapabilities);

        assert_eq!(names(&entities), vec!["k1-cooking"]);
        assert_eq!(entities[0].read(&fryer).state, json!("on"));
        assert_eq!(
            entities[0].command(&fryer, &EntityCommand::TurnOff).unwrap(),
            vec![DeviceCall::End]
        );
        assert!(matches!(
            entities[0].command(&fryer, &EntityCommand::turn_on()),
            Err(CommandError::InvalidArgument(_))
        ));
    }
}
