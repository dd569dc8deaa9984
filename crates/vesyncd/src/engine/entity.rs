//! Entity vocabulary shared by the engine and integrations.

use serde::Deserialize;
use serde::Serialize;
use strum::Display;
use strum::EnumIter;
use strum::EnumString;

/// Entity platform, i.e. the kind of thing an entity is.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Switch,
    Fan,
    Light,
    Sensor,
    Humidifier,
    Number,
    BinarySensor,
    Button,
}

/// Secondary entities are tagged so frontends can tuck them away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

/// Lowercase the name and collapse every run of non-alphanumerics into `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("unnamed");
    }
    slug
}

/// Entity id for an entity with the given display name, e.g. `switch.kitchen_plug`.
pub fn entity_id(platform: Platform, name: &str) -> String {
    format!("{}.{}", platform, slugify(name))
}
