//! Type-safe message system for vesyncd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use serde::Deserialize;
use serde::Serialize;

use super::state::EntityState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered, with its initial state
    EntityDiscovered {
        entity_id: String,
        integration_name: String,
        state: EntityState,
    },

    /// An entity's state changed
    EntityStateChanged {
        entity_id: String,
        state: EntityState,
    },
}

/// A request to change an entity.
///
/// Which commands an entity accepts depends on its platform; the rest are
/// rejected by the owning integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EntityCommand {
    TurnOn {
        /// 0-255
        #[serde(default)]
        brightness: Option<u8>,
        /// Mireds
        #[serde(default)]
        color_temp: Option<u16>,
        #[serde(default)]
        percentage: Option<u8>,
        #[serde(default)]
        preset_mode: Option<String>,
    },
    TurnOff,
    SetPercentage {
        percentage: u8,
    },
    SetPresetMode {
        preset_mode: String,
    },
    SetHumidity {
        humidity: u8,
    },
    SetMode {
        mode: String,
    },
    SetValue {
        value: f64,
    },
    Press,
}

impl EntityCommand {
    /// Plain `turn_on` with no arguments.
    pub fn turn_on() -> Self {
        EntityCommand::TurnOn {
            brightness: None,
            color_temp: None,
            percentage: None,
            preset_mode: None,
        }
    }

    /// Wire name of the command, e.g. `set_percentage`.
    pub fn name(&self) -> &'static str {
        match self {
            EntityCommand::TurnOn { .. } => "turn_on",
            EntityCommand::TurnOff => "turn_off",
            EntityCommand::SetPercentage { .. } => "set_percentage",
            EntityCommand::SetPresetMode { .. } => "set_preset_mode",
            EntityCommand::SetHumidity { .. } => "set_humidity",
            EntityCommand::SetMode { .. } => "set_mode",
            EntityCommand::SetValue { .. } => "set_value",
            EntityCommand::Press => "press",
        }
    }
}

/// Integration-wide services that are not tied to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    /// Look for devices added to the account since startup
    UpdateDevices,
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    /// Command addressed to one entity
    Command {
        entity_id: String,
        command: EntityCommand,
    },

    /// Service call for the integration as a whole
    Service(Service),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd: EntityCommand =
            serde_json::from_value(json!({"command": "turn_on", "brightness": 128})).unwrap();
        assert_eq!(
            cmd,
            EntityCommand::TurnOn {
                brightness: Some(128),
                color_temp: None,
                percentage: None,
                preset_mode: None,
            }
        );

        let cmd: EntityCommand =
            serde_json::from_value(json!({"command": "set_value", "value": 4})).unwrap();
        assert_eq!(cmd, EntityCommand::SetValue { value: 4.0 });

        assert!(serde_json::from_value::<EntityCommand>(json!({"command": "explode"})).is_err());
    }
}
