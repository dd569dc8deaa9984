//! The device manager seam.
//!
//! Talking to the VeSync cloud (login, polling, device calls) is the job of a
//! [`DeviceManager`]. The integration only ever sees the trait. This crate
//! ships [`SnapshotManager`], which serves devices from a JSON snapshot on
//! disk and echoes calls back into its in-memory copy.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use strum::IntoEnumIterator;
use tracing::debug;
use tracing::info;

use super::capabilities::CapabilityLookup;
use super::capabilities::StaticCapabilities;
use super::capabilities::default_methods;
use super::device::DeviceFamily;
use super::device::DeviceMethod;
use super::device::DeviceRecord;
use super::device::DeviceSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Unable to login to the VeSync server: {0}")]
    Login(String),

    #[error("Failed to read device snapshot {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse device snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device {device} does not support {method}")]
    Unsupported { device: String, method: DeviceMethod },

    #[error("Not logged in")]
    NotLoggedIn,
}

/// A single call on a device, with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "value", rename_all = "snake_case")]
pub enum DeviceCall {
    TurnOn,
    TurnOff,
    UpdateEnergy,
    SetAutoMode,
    SetManualMode,
    SetMistLevel(u8),
    SetHumidity(u8),
    SetHumidityMode(String),
    SetWarmLevel(u8),
    AutomaticStopOn,
    AutomaticStopOff,
    TurnOnDisplay,
    TurnOffDisplay,
    ChildLockOn,
    ChildLockOff,
    ChangeFanSpeed(u8),
    AutoMode,
    ManualMode,
    SleepMode,
    SetNightLight(String),
    SetNightLightBrightness(u8),
    SetBrightness(u8),
    SetColorTemp(u8),
    End,
}

impl DeviceCall {
    /// The method this call invokes.
    pub fn method(&self) -> DeviceMethod {
        match self {
            DeviceCall::TurnOn => DeviceMethod::TurnOn,
            DeviceCall::TurnOff => DeviceMethod::TurnOff,
            DeviceCall::UpdateEnergy => DeviceMethod::UpdateEnergy,
            DeviceCall::SetAutoMode => DeviceMethod::SetAutoMode,
            DeviceCall::SetManualMode => DeviceMethod::SetManualMode,
            DeviceCall::SetMistLevel(_) => DeviceMethod::SetMistLevel,
            DeviceCall::SetHumidity(_) => DeviceMethod::SetHumidity,
            DeviceCall::SetHumidityMode(_) => DeviceMethod::SetHumidityMode,
            DeviceCall::SetWarmLevel(_) => DeviceMethod::SetWarmLevel,
            DeviceCall::AutomaticStopOn => DeviceMethod::AutomaticStopOn,
            DeviceCall::AutomaticStopOff => DeviceMethod::AutomaticStopOff,
            DeviceCall::TurnOnDisplay => DeviceMethod::TurnOnDisplay,
            DeviceCall::TurnOffDisplay => DeviceMethod::TurnOffDisplay,
            DeviceCall::ChildLockOn => DeviceMethod::ChildLockOn,
            DeviceCall::ChildLockOff => DeviceMethod::ChildLockOff,
            DeviceCall::ChangeFanSpeed(_) => DeviceMethod::ChangeFanSpeed,
            DeviceCall::AutoMode => DeviceMethod::AutoMode,
            DeviceCall::ManualMode => DeviceMethod::ManualMode,
            DeviceCall::SleepMode => DeviceMethod::SleepMode,
            DeviceCall::SetNightLight(_) => DeviceMethod::SetNightLight,
            DeviceCall::SetNightLightBrightness(_) => DeviceMethod::SetNightLightBrightness,
            DeviceCall::SetBrightness(_) => DeviceMethod::SetBrightness,
            DeviceCall::SetColorTemp(_) => DeviceMethod::SetColorTemp,
            DeviceCall::End => DeviceMethod::End,
        }
    }
}

/// Upstream collaborator that owns the devices.
///
/// The manager owns every [`DeviceRecord`]; callers borrow them through
/// [`DeviceManager::snapshot`] between refreshes.
#[async_trait]
pub trait DeviceManager: Send + Sync {
    /// Authenticate against the account
    async fn login(&mut self) -> Result<(), ManagerError>;

    /// Refresh the device lists and their state
    async fn update(&mut self) -> Result<(), ManagerError>;

    /// Current device lists
    fn snapshot(&self) -> &DeviceSnapshot;

    /// Model capability tables
    fn capabilities(&self) -> &dyn CapabilityLookup;

    /// Invoke a call on the device with the given base unique id
    async fn execute(&mut self, device_id: &str, call: &DeviceCall) -> Result<(), ManagerError>;
}

/// Check that `device_id` exists and exposes the method behind `call`.
fn check_call<'a>(
    snapshot: &'a mut DeviceSnapshot,
    device_id: &str,
    call: &DeviceCall,
) -> Result<&'a mut DeviceRecord, ManagerError> {
    let device = snapshot
        .find_mut(device_id)
        .ok_or_else(|| ManagerError::DeviceNotFound(device_id.to_string()))?;
    if !device.methods.contains(&call.method()) {
        return Err(ManagerError::Unsupported {
            device: device.device_name.clone(),
            method: call.method(),
        });
    }
    Ok(device)
}

/// Reflect a call in the device's reported state.
///
/// Used by managers that have no live device to read the result back from.
pub fn echo_call(device: &mut DeviceRecord, call: &DeviceCall) {
    let details = &mut device.details;
    match call {
        DeviceCall::TurnOn => device.device_status = "on".to_string(),
        DeviceCall::TurnOff => device.device_status = "off".to_string(),
        DeviceCall::UpdateEnergy => {}
        DeviceCall::SetAutoMode => {
            details.insert("mode".to_string(), json!("auto"));
        }
        DeviceCall::SetManualMode => {
            details.insert("mode".to_string(), json!("manual"));
        }
        DeviceCall::SetHumidityMode(mode) => {
            details.insert("mode".to_string(), json!(mode));
        }
        DeviceCall::SetMistLevel(level) => {
            details.insert("mist_virtual_level".to_string(), json!(level));
        }
        DeviceCall::SetWarmLevel(level) => {
            details.insert("warm_mist_level".to_string(), json!(level));
        }
        DeviceCall::SetHumidity(target) => {
            device
                .config
                .insert("auto_target_humidity".to_string(), json!(target));
        }
        DeviceCall::AutomaticStopOn | DeviceCall::AutomaticStopOff => {
            let on = matches!(call, DeviceCall::AutomaticStopOn);
            device.config.insert("automatic_stop".to_string(), json!(on));
        }
        DeviceCall::TurnOnDisplay | DeviceCall::TurnOffDisplay => {
            let on = matches!(call, DeviceCall::TurnOnDisplay);
            details.insert("display".to_string(), json!(on));
        }
        DeviceCall::ChildLockOn | DeviceCall::ChildLockOff => {
            let on = matches!(call, DeviceCall::ChildLockOn);
            details.insert("child_lock".to_string(), json!(on));
        }
        DeviceCall::ChangeFanSpeed(level) => {
            device.attributes.insert("fan_level".to_string(), json!(level));
            device.attributes.insert("speed".to_string(), json!(level));
            device.attributes.insert("mode".to_string(), json!("manual"));
        }
        DeviceCall::AutoMode => {
            device.attributes.insert("mode".to_string(), json!("auto"));
        }
        DeviceCall::ManualMode => {
            device.attributes.insert("mode".to_string(), json!("manual"));
        }
        DeviceCall::SleepMode => {
            device.attributes.insert("mode".to_string(), json!("sleep"));
        }
        DeviceCall::SetNightLight(mode) => {
            details.insert("night_light".to_string(), json!(mode));
            device.attributes.insert("night_light".to_string(), json!(mode));
        }
        DeviceCall::SetNightLightBrightness(level) => {
            details.insert("night_light_brightness".to_string(), json!(level));
        }
        DeviceCall::SetBrightness(level) => {
            device.attributes.insert("brightness".to_string(), json!(level));
            device.device_status = "on".to_string();
        }
        DeviceCall::SetColorTemp(pct) => {
            device.attributes.insert("color_temp_pct".to_string(), json!(pct));
        }
        DeviceCall::End => {
            device
                .attributes
                .insert("fryer_status".to_string(), json!("standby"));
        }
    }
}

/// Fill in method sets for records that do not list any.
fn populate_methods(snapshot: &mut DeviceSnapshot, caps: &dyn CapabilityLookup) {
    for family in DeviceFamily::iter() {
        for device in snapshot.family_mut(family) {
            if device.methods.is_empty() {
                device
                    .methods
                    .extend(default_methods(caps, family, &device.device_type));
            }
        }
    }
}

/// Latest call per device method, replayed in execution order.
///
/// A later call to the same method replaces the earlier one, so the journal
/// holds at most one entry per method of each device.
#[derive(Debug, Default)]
struct Journal {
    next_seq: u64,
    calls: BTreeMap<(String, DeviceMethod), (u64, DeviceCall)>,
}

impl Journal {
    fn record(&mut self, device_id: &str, call: &DeviceCall) {
        self.calls.insert(
            (device_id.to_string(), call.method()),
            (self.next_seq, call.clone()),
        );
        self.next_seq += 1;
    }

    /// Forget calls for devices that are no longer in `snapshot`.
    fn retain_present(&mut self, snapshot: &DeviceSnapshot) {
        self.calls
            .retain(|(device_id, _), _| snapshot.find(device_id).is_some());
    }

    /// Oldest first.
    fn entries(&self) -> Vec<(String, DeviceCall)> {
        let mut entries: Vec<_> = self
            .calls
            .iter()
            .map(|((device_id, _), (seq, call))| (*seq, device_id, call))
            .collect();
        entries.sort_by_key(|(seq, _, _)| *seq);
        entries
            .into_iter()
            .map(|(_, device_id, call)| (device_id.clone(), call.clone()))
            .collect()
    }
}

/// Offline manager backed by a JSON device snapshot.
///
/// The file holds a [`DeviceSnapshot`] (one list per family). It is re-read
/// on every `update`, so editing it while the daemon runs simulates devices
/// joining the account. Executed calls are journaled and replayed on top of
/// each reload.
pub struct SnapshotManager {
    path: PathBuf,
    username: String,
    caps: StaticCapabilities,
    snapshot: DeviceSnapshot,
    journal: Journal,
    logged_in: bool,
}

impl SnapshotManager {
    pub fn new(path: impl AsRef<Path>, username: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            username: username.to_string(),
            caps: StaticCapabilities,
            snapshot: DeviceSnapshot::default(),
            journal: Journal::default(),
            logged_in: false,
        }
    }

    /// Parse a snapshot file without a manager around it.
    pub fn load(path: &Path, caps: &dyn CapabilityLookup) -> Result<DeviceSnapshot, ManagerError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManagerError::Io(path.to_path_buf(), e))?;
        let mut snapshot: DeviceSnapshot = serde_json::from_str(&contents)?;
        populate_methods(&mut snapshot, caps);
        Ok(snapshot)
    }

    /// Calls replayed on every reload, oldest first.
    pub fn journal(&self) -> Vec<(String, DeviceCall)> {
        self.journal.entries()
    }
}

#[async_trait]
impl DeviceManager for SnapshotManager {
    async fn login(&mut self) -> Result<(), ManagerError> {
        if !self.path.is_file() {
            return Err(ManagerError::Login(format!(
                "no device snapshot for {} at {}",
                self.username,
                self.path.display()
            )));
        }
        self.logged_in = true;
        info!("Logged in as {}", self.username);
        Ok(())
    }

    async fn update(&mut self) -> Result<(), ManagerError> {
        if !self.logged_in {
            return Err(ManagerError::NotLoggedIn);
        }

        let mut snapshot = Self::load(&self.path, &self.caps)?;
        self.journal.retain_present(&snapshot);
        for (device_id, call) in self.journal.entries() {
            if let Some(device) = snapshot.find_mut(&device_id) {
                echo_call(device, &call);
            }
        }
        self.snapshot = snapshot;
        debug!("Reloaded device snapshot from {}", self.path.display());
        Ok(())
    }

    fn snapshot(&self) -> &DeviceSnapshot {
        &self.snapshot
    }

    fn capabilities(&self) -> &dyn CapabilityLookup {
        &self.caps
    }

    async fn execute(&mut self, device_id: &str, call: &DeviceCall) -> Result<(), ManagerError> {
        if !self.logged_in {
            return Err(ManagerError::NotLoggedIn);
        }

        let device = check_call(&mut self.snapshot, device_id, call)?;
        echo_call(device, call);
        info!("{}: {}", device.device_name, describe(call));
        self.journal.record(device_id, call);
        Ok(())
    }
}

fn describe(call: &DeviceCall) -> String {
    match serde_json::to_value(call) {
        Ok(Value::Object(map)) => match map.get("value") {
            Some(v) => format!("{}({})", call.method(), v),
            None => call.method().to_string(),
        },
        _ => call.method().to_string(),
    }
}

/// In-memory manager for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockManager {
    pub snapshot: DeviceSnapshot,
    /// Snapshot to switch to on the next `update`
    pub pending: Option<DeviceSnapshot>,
    pub executed: Vec<(String, DeviceCall)>,
    pub fail_login: bool,
    pub fail_update: bool,
    pub updates: usize,
}

#[cfg(test)]
impl MockManager {
    pub fn new(snapshot: DeviceSnapshot) -> Self {
        Self {
            snapshot,
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[async_trait]
impl DeviceManager for MockManager {
    async fn login(&mut self) -> Result<(), ManagerError> {
        if self.fail_login {
            return Err(ManagerError::Login("bad credentials".to_string()));
        }
        Ok(())
    }

    async fn update(&mut self) -> Result<(), ManagerError> {
        self.updates += 1;
        if self.fail_update {
            return Err(ManagerError::Login("session expired".to_string()));
        }
        if let Some(next) = self.pending.take() {
            self.snapshot = next;
        }
        Ok(())
    }

    fn snapshot(&self) -> &DeviceSnapshot {
        &self.snapshot
    }

    fn capabilities(&self) -> &dyn CapabilityLookup {
        &StaticCapabilities
    }

    async fn execute(&mut self, device_id: &str, call: &DeviceCall) -> Result<(), ManagerError> {
        let device = check_call(&mut self.snapshot, device_id, call)?;
        echo_call(device, call);
        self.executed.push((device_id.to_string(), call.clone()));
        Ok(())
    }
}
