//! Static per-model capability tables.
//!
//! These mirror the feature tables shipped with the VeSync device library:
//! each model code maps to the driver module that handles it plus the
//! optional features and level ranges that module supports.

use serde::Serialize;
use strum::Display;
use strum::EnumString;

use super::device::DeviceFamily;
use super::device::DeviceMethod;

/// Modules that drive humidifiers (reported by the cloud as fans).
pub const HUMIDIFIER_MODULES: &[&str] = &["VeSyncHumid200300S", "VeSyncHumid200S"];

/// Modules that drive air purifiers.
pub const AIR_PURIFIER_MODULES: &[&str] = &["VeSyncAirBypass", "VeSyncAir131"];

/// Modules that drive air fryers.
pub const AIR_FRYER_MODULES: &[&str] = &["VeSyncAirFryer158"];

/// Capability entry for a fan-family model (purifiers and humidifiers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanFeatures {
    pub module: &'static str,
    pub models: &'static [&'static str],
    pub features: &'static [&'static str],
    /// Purifier operating modes
    pub modes: &'static [&'static str],
    /// Purifier fan speed levels
    pub levels: &'static [u8],
    /// Humidifier mist modes
    pub mist_modes: &'static [&'static str],
    pub mist_levels: &'static [u8],
    pub warm_mist_levels: &'static [u8],
}

impl FanFeatures {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_humidifier(&self) -> bool {
        HUMIDIFIER_MODULES.contains(&self.module)
    }

    pub fn is_air_purifier(&self) -> bool {
        AIR_PURIFIER_MODULES.contains(&self.module)
    }
}

/// Capability entry for a kitchen appliance model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KitchenFeatures {
    pub module: &'static str,
    pub models: &'static [&'static str],
    pub features: &'static [&'static str],
}

impl KitchenFeatures {
    pub fn is_air_fryer(&self) -> bool {
        AIR_FRYER_MODULES.contains(&self.module)
    }
}

/// What a bulb, outlet or wall switch model presents as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PlugKind {
    BulbDimmable,
    BulbTunableWhite,
    Outlet,
    Switch,
    #[strum(serialize = "walldimmer")]
    #[serde(rename = "walldimmer")]
    WallDimmer,
}

impl PlugKind {
    pub fn is_dimmable(&self) -> bool {
        matches!(self, PlugKind::WallDimmer)
    }
}

/// Read-only lookup into the model capability tables.
///
/// Supplied by the device manager; the classifier and entity builders never
/// see anything but this trait.
pub trait CapabilityLookup: Send + Sync {
    fn fan_features(&self, device_type: &str) -> Option<&FanFeatures>;

    fn kitchen_features(&self, device_type: &str) -> Option<&KitchenFeatures>;

    fn plug_kind(&self, device_type: &str) -> Option<PlugKind>;
}

const LEVELS_1_3: &[u8] = &[1, 2, 3];
const LEVELS_1_4: &[u8] = &[1, 2, 3, 4];
const MIST_1_9: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8, 9];
const WARM_0_3: &[u8] = &[0, 1, 2, 3];

const FAN_FEATURES: &[FanFeatures] = &[
    FanFeatures {
        module: "VeSyncAirBypass",
        models: &["Core200S", "LAP-C201S-AUSR", "LAP-C202S-WUSR"],
        features: &[],
        modes: &["sleep", "off"],
        levels: LEVELS_1_3,
        mist_modes: &[],
        mist_levels: &[],
        warm_mist_levels: &[],
    },
    FanFeatures {
        module: "VeSyncAirBypass",
        models: &["Core300S", "LAP-C301S-WJP"],
        features: &["air_quality"],
        modes: &["sleep", "off", "auto"],
        levels: LEVELS_1_3,
        mist_modes: &[],
        mist_levels: &[],
        warm_mist_levels: &[],
    },
    FanFeatures {
        module: "VeSyncAirBypass",
        models: &["Core400S", "LAP-C401S-WJP", "LAP-C401S-WUSR", "LAP-C401S-WAAA"],
        features: &["air_quality"],
        modes: &["sleep", "off", "auto"],
        levels: LEVELS_1_4,
        mist_modes: &[],
        mist_levels: &[],
        warm_mist_levels: &[],
    },
    FanFeatures {
        module: "VeSyncAirBypass",
        models: &["Core600S", "LAP-C601S-WUS", "LAP-C601S-WUSR", "LAP-C601S-WEU"],
        features: &["air_quality"],
        modes: &["sleep", "off", "auto"],
        levels: LEVELS_1_4,
        mist_modes: &[],
        mist_levels: &[],
        warm_mist_levels: &[],
    },
    FanFeatures {
        module: "VeSyncAir131",
        models: &["LV-PUR131S", "LV-RH131S"],
        features: &["air_quality"],
        modes: &["manual", "auto", "sleep", "off"],
        levels: LEVELS_1_3,
        mist_modes: &[],
        mist_levels: &[],
        warm_mist_levels: &[],
    },
    FanFeatures {
        module: "VeSyncHumid200300S",
        models: &["Classic300S", "LUH-A601S-WUSB"],
        features: &["nightlight"],
        modes: &[],
        levels: &[],
        mist_modes: &["auto", "sleep", "manual"],
        mist_levels: MIST_1_9,
        warm_mist_levels: &[],
    },
    FanFeatures {
        module: "VeSyncHumid200S",
        models: &["Classic200S"],
        features: &[],
        modes: &[],
        levels: &[],
        mist_modes: &["auto", "manual"],
        mist_levels: MIST_1_9,
        warm_mist_levels: &[],
    },
    FanFeatures {
        module: "VeSyncHumid200300S",
        models: &["Dual200S", "LUH-D301S-WUSR", "LUH-D301S-WJP", "LUH-D301S-WEU"],
        features: &[],
        modes: &[],
        levels: &[],
        mist_modes: &["auto", "manual"],
        mist_levels: &[1, 2],
        warm_mist_levels: &[],
    },
    FanFeatures {
        module: "VeSyncHumid200300S",
        models: &[
            "LUH-A602S-WUSR",
            "LUH-A602S-WUS",
            "LUH-A602S-WEUR",
            "LUH-A602S-WEU",
            "LUH-A602S-WJP",
        ],
        features: &["warm_mist", "nightlight"],
        modes: &[],
        levels: &[],
        mist_modes: &["humidity", "sleep", "manual"],
        mist_levels: MIST_1_9,
        warm_mist_levels: WARM_0_3,
    },
    FanFeatures {
        module: "VeSyncHumid200300S",
        models: &["LUH-O451S-WUS"],
        features: &["warm_mist"],
        modes: &[],
        levels: &[],
        mist_modes: &["auto", "sleep", "manual"],
        mist_levels: MIST_1_9,
        warm_mist_levels: WARM_0_3,
    },
];

const KITCHEN_FEATURES: &[KitchenFeatures] = &[KitchenFeatures {
    module: "VeSyncAirFryer158",
    models: &["CS137-AF/CS158-AF", "CS158-AF", "CS137-AF", "CS358-AF"],
    features: &["cook", "resume", "end"],
}];

const PLUG_KINDS: &[(&str, PlugKind)] = &[
    ("ESL100", PlugKind::BulbDimmable),
    ("ESL100CW", PlugKind::BulbTunableWhite),
    ("ESO15-TB", PlugKind::Outlet),
    ("ESW03-USA", PlugKind::Outlet),
    ("ESW01-EU", PlugKind::Outlet),
    ("ESW15-USA", PlugKind::Outlet),
    ("wifi-switch-1.3", PlugKind::Outlet),
    ("ESWL01", PlugKind::Switch),
    ("ESWL03", PlugKind::Switch),
    ("ESD16", PlugKind::WallDimmer),
    ("ESWD16", PlugKind::WallDimmer),
];

/// The built-in capability tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCapabilities;

impl CapabilityLookup for StaticCapabilities {
    fn fan_features(&self, device_type: &str) -> Option<&FanFeatures> {
        FAN_FEATURES.iter().find(|f| f.models.contains(&device_type))
    }

    fn kitchen_features(&self, device_type: &str) -> Option<&KitchenFeatures> {
        KITCHEN_FEATURES
            .iter()
            .find(|f| f.models.contains(&device_type))
    }

    fn plug_kind(&self, device_type: &str) -> Option<PlugKind> {
        PLUG_KINDS
            .iter()
            .find(|(model, _)| *model == device_type)
            .map(|(_, kind)| *kind)
    }
}

/// Control methods exposed by devices of the given family and model.
///
/// Used by managers that cannot introspect the device driver directly to
/// fill in [`DeviceRecord::methods`](super::device::DeviceRecord::methods).
pub fn default_methods(
    caps: &dyn CapabilityLookup,
    family: DeviceFamily,
    device_type: &str,
) -> &'static [DeviceMethod] {
    use DeviceMethod::*;

    match family {
        DeviceFamily::Fans => match caps.fan_features(device_type).map(|f| f.module) {
            Some("VeSyncAirBypass") => &[
                TurnOn,
                TurnOff,
                ChangeFanSpeed,
                AutoMode,
                ManualMode,
                SleepMode,
                ChildLockOn,
                ChildLockOff,
                TurnOnDisplay,
                TurnOffDisplay,
                SetNightLight,
            ],
            Some("VeSyncAir131") => &[
                TurnOn,
                TurnOff,
                ChangeFanSpeed,
                AutoMode,
                ManualMode,
                SleepMode,
                TurnOnDisplay,
                TurnOffDisplay,
            ],
            Some("VeSyncHumid200300S") => &[
                TurnOn,
                TurnOff,
                SetAutoMode,
                SetManualMode,
                SetMistLevel,
                SetHumidity,
                SetHumidityMode,
                SetWarmLevel,
                AutomaticStopOn,
                AutomaticStopOff,
                TurnOnDisplay,
                TurnOffDisplay,
                SetNightLightBrightness,
            ],
            Some("VeSyncHumid200S") => &[
                TurnOn,
                TurnOff,
                SetAutoMode,
                SetManualMode,
                SetMistLevel,
                SetHumidity,
                SetHumidityMode,
                AutomaticStopOn,
                AutomaticStopOff,
                TurnOnDisplay,
                TurnOffDisplay,
            ],
            _ => &[],
        },
        DeviceFamily::Kitchen => match caps.kitchen_features(device_type) {
            Some(k) if k.is_air_fryer() => &[End],
            _ => &[],
        },
        DeviceFamily::Outlets => &[TurnOn, TurnOff, UpdateEnergy],
        DeviceFamily::Bulbs | DeviceFamily::Switches => match caps.plug_kind(device_type) {
            Some(PlugKind::BulbTunableWhite) => &[TurnOn, TurnOff, SetBrightness, SetColorTemp],
            Some(PlugKind::BulbDimmable) | Some(PlugKind::WallDimmer) => {
                &[TurnOn, TurnOff, SetBrightness]
            }
            Some(_) => &[TurnOn, TurnOff],
            None => &[],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_lookup_by_alias() {
        let caps = StaticCapabilities;
        let core = caps.fan_features("LAP-C401S-WUSR").unwrap();
        assert_eq!(core.module, "VeSyncAirBypass");
        assert_eq!(core.levels, &[1, 2, 3, 4]);
        assert!(core.is_air_purifier());
        assert!(!core.is_humidifier());

        let lv600 = caps.fan_features("LUH-A602S-WUS").unwrap();
        assert!(lv600.is_humidifier());
        assert!(lv600.has_feature("warm_mist"));
        assert!(lv600.has_feature("nightlight"));

        assert!(caps.fan_features("ESL100").is_none());
    }

    #[test]
    fn test_kitchen_and_plug_lookup() {
        let caps = StaticCapabilities;
        assert!(caps.kitchen_features("CS158-AF").unwrap().is_air_fryer());
        assert!(caps.kitchen_features("CS999").is_none());

        assert_eq!(caps.plug_kind("ESWD16"), Some(PlugKind::WallDimmer));
        assert!(caps.plug_kind("ESWD16").unwrap().is_dimmable());
        assert!(!caps.plug_kind("ESWL01").unwrap().is_dimmable());
        assert_eq!(caps.plug_kind("unknown"), None);
    }

    #[test]
    fn test_plug_kind_names() {
        assert_eq!(PlugKind::WallDimmer.to_string(), "walldimmer");
        assert_eq!(PlugKind::BulbTunableWhite.to_string(), "bulb-tunable-white");
        assert_eq!("outlet".parse::<PlugKind>().unwrap(), PlugKind::Outlet);
    }

    #[test]
    fn test_default_methods() {
        let caps = StaticCapabilities;
        let purifier = default_methods(&caps, DeviceFamily::Fans, "Core300S");
        assert!(purifier.contains(&DeviceMethod::ChildLockOn));
        assert!(!purifier.contains(&DeviceMethod::SetAutoMode));

        let humidifier = default_methods(&caps, DeviceFamily::Fans, "Classic200S");
        assert!(humidifier.contains(&DeviceMethod::SetAutoMode));
        assert!(!humidifier.contains(&DeviceMethod::SetWarmLevel));

        assert!(default_methods(&caps, DeviceFamily::Fans, "unknown").is_empty());
        assert_eq!(
            default_methods(&caps, DeviceFamily::Kitchen, "CS158-AF"),
            &[DeviceMethod::End]
        );
    }
}
