//! Per-entry runtime state.
//!
//! One [`EntryContext`] exists per configured account. It owns the device
//! manager, remembers which devices already have entities, and maps entity
//! ids to the entities built for them.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::classify::classify;
use super::diagnostics::entry_diagnostics;
use super::discovery::KnownDevices;
use super::manager::DeviceManager;
use super::manager::ManagerError;
use super::platforms;
use super::platforms::CommandError;
use super::platforms::VeSyncEntity;
use crate::engine::EntityCommand;
use crate::engine::EntityState;
use crate::engine::entity_id;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Manager(#[from] ManagerError),
}

/// Entity id paired with the state to report for it.
pub type StateUpdate = (String, EntityState);

/// Entity ids claimed so far, shared by every entry of the integration.
///
/// Two accounts may both have a "Desk plug"; the second one to claim
/// `switch.desk_plug` gets `switch.desk_plug_2`.
#[derive(Debug, Clone, Default)]
pub struct EntityIds(Arc<Mutex<HashSet<String>>>);

impl EntityIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `base`, or the first free `<base>_N` when it is taken.
    pub fn claim(&self, base: &str) -> String {
        let mut taken = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let id = if taken.contains(base) {
            (2..)
                .map(|n| format!("{}_{}", base, n))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_else(|| base.to_string())
        } else {
            base.to_string()
        };
        taken.insert(id.clone());
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0
            .lock()
            .map(|taken| taken.contains(id))
            .unwrap_or(false)
    }
}

pub struct EntryContext<M: DeviceManager> {
    entry_id: String,
    pub(super) manager: M,
    known: KnownDevices,
    ids: EntityIds,
    entities: BTreeMap<String, Box<dyn VeSyncEntity>>,
    /// `(platform, unique id)` of every registered entity
    unique_ids: HashSet<String>,
    reported: HashMap<String, EntityState>,
}

impl<M: DeviceManager> EntryContext<M> {
    pub fn new(entry_id: &str, manager: M) -> Self {
        Self::with_entity_ids(entry_id, manager, EntityIds::new())
    }

    /// Context whose entity ids must not collide with those in `ids`.
    pub fn with_entity_ids(entry_id: &str, manager: M, ids: EntityIds) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            manager,
            known: KnownDevices::new(),
            ids,
            entities: BTreeMap::new(),
            unique_ids: HashSet::new(),
            reported: HashMap::new(),
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn known(&self) -> &KnownDevices {
        &self.known
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub async fn login(&mut self) -> Result<(), ManagerError> {
        self.manager.login().await
    }

    pub async fn update(&mut self) -> Result<(), ManagerError> {
        self.manager.update().await
    }

    /// Classify the current snapshot and build entities for devices that
    /// have none yet, bucket by bucket.
    ///
    /// Returns the id and initial state of every entity created.
    pub fn process_devices(&mut self) -> Vec<StateUpdate> {
        let snapshot = self.manager.snapshot();
        let caps = self.manager.capabilities();

        if snapshot.is_empty() {
            error!("Could not find any device to add");
            return Vec::new();
        }

        let result = classify(snapshot, caps);
        let new = self.known.absorb(&result);

        let mut added = Vec::new();
        for (bucket, devices) in new.iter() {
            let mut count = 0;
            for entity in platforms::setup_entities(bucket, devices, caps) {
                let key = format!("{}:{}", entity.platform(), entity.unique_id());
                if !self.unique_ids.insert(key) {
                    debug!("Entity {} already registered", entity.unique_id());
                    continue;
                }

                let id = self
                    .ids
                    .claim(&entity_id(entity.platform(), &entity.name()));
                let state = entity.entity_state(snapshot.find(&entity.base().device_id));
                self.reported.insert(id.clone(), state.clone());
                self.entities.insert(id.clone(), entity);
                added.push((id, state));
                count += 1;
            }
            if count > 0 {
                info!(
                    "{}: added {} {} entities",
                    self.entry_id,
                    count,
                    bucket.platform()
                );
            }
        }
        added
    }

    /// Re-read every entity from the manager's snapshot.
    ///
    /// Returns only the entities whose state differs from the last report.
    pub fn refresh_states(&mut self) -> Vec<StateUpdate> {
        let snapshot = self.manager.snapshot();
        let mut changed = Vec::new();
        for (id, entity) in &self.entities {
            let state = entity.entity_state(snapshot.find(&entity.base().device_id));
            if self.reported.get(id) != Some(&state) {
                self.reported.insert(id.clone(), state.clone());
                changed.push((id.clone(), state));
            }
        }
        changed
    }

    /// Carry out `command` on the entity's device.
    ///
    /// Returns the state changes the command caused.
    pub async fn execute(
        &mut self,
        entity_id: &str,
        command: &EntityCommand,
    ) -> Result<Vec<StateUpdate>, ContextError> {
        let entity = self
            .entities
            .get(entity_id)
            .ok_or_else(|| ContextError::UnknownEntity(entity_id.to_string()))?;
        let device_id = entity.base().device_id.clone();

        let calls = {
            let device = self
                .manager
                .snapshot()
                .find(&device_id)
                .ok_or_else(|| ManagerError::DeviceNotFound(device_id.clone()))?;
            entity.command(device, command)?
        };

        debug!("{}: {} -> {:?}", entity_id, command.name(), calls);
        for call in &calls {
            self.manager.execute(&device_id, call).await?;
        }
        Ok(self.refresh_states())
    }

    /// Redacted dump of the entry's devices.
    pub fn diagnostics(&self) -> Value {
        entry_diagnostics(self.manager.snapshot(), self.manager.capabilities())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::Platform;
    use crate::integrations::vesync::classify::Bucket;
    use crate::integrations::vesync::device::DeviceMethod;
    use crate::integrations::vesync::device::DeviceSnapshot;
    use crate::integrations::vesync::device::fixtures::*;
    use crate::integrations::vesync::manager::DeviceCall;
    use crate::integrations::vesync::manager::MockManager;

    fn outlet(cid: &str, name: &str) -> crate::integrations::vesync::device::DeviceRecord {
        let mut dev = with_methods(
            device(cid, "ESW15-USA"),
            &[DeviceMethod::TurnOn, DeviceMethod::TurnOff],
        );
        dev.device_name = name.to_string();
        dev
    }

    fn context(snapshot: DeviceSnapshot) -> EntryContext<MockManager> {
        EntryContext::new("home", MockManager::new(snapshot))
    }

    #[test]
    fn test_process_devices_builds_entities() {
        let mut ctx = context(DeviceSnapshot {
            outlets: vec![outlet("o1", "Desk plug")],
            ..Default::default()
        });

        let added = ctx.process_devices();
        let ids: Vec<&str> = added.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "switch.desk_plug",
                "sensor.desk_plug_current_power",
                "sensor.desk_plug_energy_use_today",
            ]
        );
        assert_eq!(added[0].1.platform, Platform::Switch);
        assert!(ctx.known().contains(Bucket::Sensors, "o1"));

        // Nothing new the second time round
        assert!(ctx.process_devices().is_empty());
    }

    #[test]
    fn test_empty_snapshot_adds_nothing() {
        let mut ctx = context(DeviceSnapshot::default());
        assert!(ctx.process_devices().is_empty());
        assert_eq!(ctx.entity_ids().count(), 0);
    }

    #[test]
    fn test_colliding_names_get_suffixes() {
        let mut ctx = context(DeviceSnapshot {
            outlets: vec![outlet("o1", "Plug"), outlet("o2", "Plug")],
            ..Default::default()
        });
        ctx.process_devices();

        let ids: Vec<&str> = ctx
            .entity_ids()
            .filter(|id| id.starts_with("switch."))
            .collect();
        assert_eq!(ids, vec!["switch.plug", "switch.plug_2"]);
    }

    #[test]
    fn test_entries_sharing_ids_never_collide() {
        let ids = EntityIds::new();
        let mut home = EntryContext::with_entity_ids(
            "home",
            MockManager::new(DeviceSnapshot {
                outlets: vec![outlet("o1", "Desk plug")],
                ..Default::default()
            }),
            ids.clone(),
        );
        let mut office = EntryContext::with_entity_ids(
            "office",
            MockManager::new(DeviceSnapshot {
                outlets: vec![outlet("x9", "Desk plug")],
                ..Default::default()
            }),
            ids.clone(),
        );

        home.process_devices();
        office.process_devices();

        assert!(home.entity_ids().any(|id| id == "switch.desk_plug"));
        assert!(office.entity_ids().any(|id| id == "switch.desk_plug_2"));
        assert!(!office.entity_ids().any(|id| id == "switch.desk_plug"));
        assert!(ids.contains("sensor.desk_plug_current_power_2"));
    }

    #[test]
    fn test_claim_suffixes() {
        let ids = EntityIds::new();
        assert_eq!(ids.claim("light.lamp"), "light.lamp");
        assert_eq!(ids.claim("light.lamp"), "light.lamp_2");
        assert_eq!(ids.claim("light.lamp"), "light.lamp_3");
        assert_eq!(ids.claim("light.lamp_2_x"), "light.lamp_2_x");
    }

    #[tokio::test]
    async fn test_update_devices_picks_up_new_devices() {
        let mut ctx = context(DeviceSnapshot {
            outlets: vec![outlet("o1", "Desk plug")],
            ..Default::default()
        });
        ctx.process_devices();

        ctx.manager.pending = Some(DeviceSnapshot {
            outlets: vec![outlet("o1", "Desk plug")],
            switches: vec![device("s1", "ESWL01")],
            ..Default::default()
        });
        ctx.update().await.unwrap();

        let added = ctx.process_devices();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].0, "switch.device_s1");
    }

    #[tokio::test]
    async fn test_execute_reports_changes() {
        let mut ctx = context(DeviceSnapshot {
            outlets: vec![outlet("o1", "Desk plug")],
            ..Default::default()
        });
        ctx.process_devices();

        let changed = ctx
            .execute("switch.desk_plug", &EntityCommand::TurnOff)
            .await
            .unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].1.state, json!("off"));
        assert_eq!(
            ctx.manager.executed,
            vec![("o1".to_string(), DeviceCall::TurnOff)]
        );

        // Same command again changes nothing
        let changed = ctx
            .execute("switch.desk_plug", &EntityCommand::TurnOff)
            .await
            .unwrap();
        assert!(changed.is_empty());
    }

    #[tokio::test]
    async fn test_execute_errors() {
        let mut ctx = context(DeviceSnapshot {
            outlets: vec![outlet("o1", "Desk plug")],
            ..Default::default()
        });
        ctx.process_devices();

        assert!(matches!(
            ctx.execute("switch.nope", &EntityCommand::TurnOff).await,
            Err(ContextError::UnknownEntity(_))
        ));
        assert!(matches!(
            ctx.execute("switch.desk_plug", &EntityCommand::Press).await,
            Err(ContextError::Command(CommandError::Unsupported { .. }))
        ));
        assert!(ctx.manager.executed.is_empty());
    }

    #[tokio::test]
    async fn test_removed_device_becomes_unavailable() {
        let mut ctx = context(DeviceSnapshot {
            outlets: vec![outlet("o1", "Desk plug")],
            ..Default::default()
        });
        ctx.process_devices();

        ctx.manager.pending = Some(DeviceSnapshot {
            switches: vec![device("s1", "ESWL01")],
            ..Default::default()
        });
        ctx.update().await.unwrap();

        let changed = ctx.refresh_states();
        assert_eq!(changed.len(), 3);
        assert!(changed.iter().all(|(_, state)| !state.available));
    }

    #[test]
    fn test_diagnostics_are_redacted() {
        let ctx = context(DeviceSnapshot {
            outlets: vec![outlet("o1", "Desk plug")],
            ..Default::default()
        });
        let diagnostics = ctx.diagnostics();
        assert!(!diagnostics.to_string().contains("uuid-o1"));
    }
}
