use serde::Serialize;

/// The physical device an entity belongs to.
///
/// Several entities (a fan, its child lock switch, its air quality sensor)
/// share one `DeviceInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    pub fn new(id: String, name: String, manufacturer: &str, model: String) -> Self {
        Self {
            id,
            name,
            manufacturer: manufacturer.to_string(),
            model,
            sw_version: None,
        }
    }

    pub fn with_sw_version(mut self, sw_version: Option<String>) -> Self {
        self.sw_version = sw_version;
        self
    }
}
