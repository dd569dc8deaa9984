use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::VeSyncConfig;
use super::context::EntityIds;
use super::context::EntryContext;
use super::context::StateUpdate;
use super::manager::DeviceManager;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::Service;
use crate::engine::ToIntegrationMessage;

/// Type alias for the shared entry context
type SharedContext<M> = Arc<Mutex<EntryContext<M>>>;

/// VeSync integration for one account entry
///
/// Logs in through its [`DeviceManager`], turns the account's devices into
/// entities, and polls the manager on a fixed interval to keep their state
/// current.
pub struct VeSyncIntegration<M: DeviceManager> {
    name: String,
    update_interval: Duration,
    context: SharedContext<M>,
    to_engine: Option<FromIntegrationSender>,
    /// Handle to the background polling task
    coordinator: Option<JoinHandle<()>>,
}

impl<M: DeviceManager + 'static> VeSyncIntegration<M> {
    pub fn new(entry_id: &str, manager: M, config: &VeSyncConfig) -> Self {
        Self::with_entity_ids(entry_id, manager, config, EntityIds::new())
    }

    /// Integration whose entity ids are allocated from `ids`, shared with
    /// the other configured entries.
    pub fn with_entity_ids(
        entry_id: &str,
        manager: M,
        config: &VeSyncConfig,
        ids: EntityIds,
    ) -> Self {
        Self {
            name: format!("vesync.{}", entry_id),
            update_interval: config.update_interval(),
            context: Arc::new(Mutex::new(EntryContext::with_entity_ids(entry_id, manager, ids))),
            to_engine: None,
            coordinator: None,
        }
    }

    /// Poll the manager and report entities whose state changed
    async fn coordinator_task(
        context: SharedContext<M>,
        interval: Duration,
        to_engine: FromIntegrationSender,
    ) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; setup has just refreshed
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let changed = {
                let mut ctx = context.lock().await;
                if let Err(e) = ctx.update().await {
                    warn!("{}: error updating devices: {}", ctx.entry_id(), e);
                    continue;
                }
                ctx.refresh_states()
            };

            if !Self::report_changes(changed, &to_engine).await {
                debug!("Engine has gone away, stopping coordinator");
                return;
            }
        }
    }

    /// Returns false once the engine has stopped listening.
    async fn report_changes(changes: Vec<StateUpdate>, to_engine: &FromIntegrationSender) -> bool {
        for (entity_id, state) in changes {
            let msg = FromIntegrationMessage::EntityStateChanged { entity_id, state };
            if let Err(e) = to_engine.send(msg).await {
                warn!("Failed to send state change: {}", e);
                return false;
            }
        }
        true
    }

    async fn report_discovered(&self, added: Vec<StateUpdate>, to_engine: &FromIntegrationSender) {
        for (entity_id, state) in added {
            info!("Discovered {} entity: {}", state.platform, entity_id);
            let msg = FromIntegrationMessage::EntityDiscovered {
                entity_id,
                integration_name: self.name.clone(),
                state,
            };
            if let Err(e) = to_engine.send(msg).await {
                warn!("Failed to register entity: {}", e);
                return;
            }
        }
    }

    fn sender(&self) -> Result<FromIntegrationSender, Box<dyn Error + Send>> {
        self.to_engine.clone().ok_or_else(|| -> Box<dyn Error + Send> {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "integration has not been set up",
            ))
        })
    }
}

#[async_trait]
impl<M: DeviceManager + 'static> Integration for VeSyncIntegration<M> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        self.to_engine = Some(tx.clone());

        let added = {
            let mut ctx = self.context.lock().await;
            ctx.login()
                .await
                .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;
            if let Err(e) = ctx.update().await {
                warn!("{}: initial device update failed: {}", ctx.entry_id(), e);
            }
            ctx.process_devices()
        };
        self.report_discovered(added, &tx).await;

        let context = self.context.clone();
        let interval = self.update_interval;
        let task = tokio::spawn(async move {
            Self::coordinator_task(context, interval, tx).await;
        });
        self.coordinator = Some(task);

        info!(
            "{} ready, polling every {}s",
            self.name,
            self.update_interval.as_secs()
        );
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        let tx = self.sender()?;
        match msg {
            ToIntegrationMessage::Command { entity_id, command } => {
                info!("Handling {} for {}", command.name(), entity_id);
                let changed = {
                    let mut ctx = self.context.lock().await;
                    ctx.execute(&entity_id, &command)
                        .await
                        .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?
                };
                Self::report_changes(changed, &tx).await;
            }
            ToIntegrationMessage::Service(Service::UpdateDevices) => {
                info!("{}: looking for new devices", self.name);
                let added = {
                    let mut ctx = self.context.lock().await;
                    if let Err(e) = ctx.update().await {
                        warn!("{}: error updating devices: {}", ctx.entry_id(), e);
                    }
                    ctx.process_devices()
                };
                if added.is_empty() {
                    info!("{}: no new devices", self.name);
                }
                self.report_discovered(added, &tx).await;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("{} shutting down", self.name);
        if let Some(task) = self.coordinator.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::EntityCommand;
    use crate::integrations::vesync::device::DeviceMethod;
    use crate::integrations::vesync::device::DeviceSnapshot;
    use crate::integrations::vesync::device::fixtures::*;
    use crate::integrations::vesync::manager::MockManager;

    fn config(update_interval_secs: u64) -> VeSyncConfig {
        VeSyncConfig {
            username: "me@example.com".to_string(),
            password: "hunter2".to_string(),
            time_zone: "UTC".to_string(),
            snapshot: "devices.json".into(),
            update_interval_secs,
            enabled: true,
        }
    }

    fn manager() -> MockManager {
        let mut plug = with_methods(
            device("o1", "ESW15-USA"),
            &[DeviceMethod::TurnOn, DeviceMethod::TurnOff],
        );
        plug.device_name = "Desk plug".to_string();
        MockManager::new(DeviceSnapshot {
            outlets: vec![plug],
            ..Default::default()
        })
    }

    fn drain(rx: &mut mpsc::Receiver<FromIntegrationMessage>) -> Vec<FromIntegrationMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_setup_discovers_entities() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut integration = VeSyncIntegration::new("home", manager(), &config(3600));
        assert_eq!(integration.name(), "vesync.home");

        integration.setup(tx).await.unwrap();

        let discovered: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|msg| match msg {
                FromIntegrationMessage::EntityDiscovered {
                    entity_id,
                    integration_name,
                    ..
                } => {
                    assert_eq!(integration_name, "vesync.home");
                    Some(entity_id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(discovered.len(), 3);
        assert!(discovered.contains(&"switch.desk_plug".to_string()));

        integration.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_setup_fails_on_login_error() {
        let (tx, _rx) = mpsc::channel(32);
        let mut mgr = manager();
        mgr.fail_login = true;
        let mut integration = VeSyncIntegration::new("home", mgr, &config(3600));

        assert!(integration.setup(tx).await.is_err());
        assert!(integration.coordinator.is_none());
    }

    #[tokio::test]
    async fn test_update_failure_is_not_fatal() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut mgr = manager();
        mgr.fail_update = true;
        let mut integration = VeSyncIntegration::new("home", mgr, &config(3600));

        integration.setup(tx).await.unwrap();
        assert_eq!(drain(&mut rx).len(), 3);
        integration.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_command_reports_state_change() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut integration = VeSyncIntegration::new("home", manager(), &config(3600));
        integration.setup(tx).await.unwrap();
        drain(&mut rx);

        integration
            .handle_message(ToIntegrationMessage::Command {
                entity_id: "switch.desk_plug".to_string(),
                command: EntityCommand::TurnOff,
            })
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            FromIntegrationMessage::EntityStateChanged { entity_id, state } => {
                assert_eq!(entity_id, "switch.desk_plug");
                assert_eq!(state.state, json!("off"));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let result = integration
            .handle_message(ToIntegrationMessage::Command {
                entity_id: "switch.missing".to_string(),
                command: EntityCommand::TurnOff,
            })
            .await;
        assert!(result.is_err());

        integration.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_update_devices_service() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut integration = VeSyncIntegration::new("home", manager(), &config(3600));
        integration.setup(tx).await.unwrap();
        drain(&mut rx);

        {
            let mut ctx = integration.context.lock().await;
            let mut next = ctx.manager.snapshot.clone();
            next.bulbs.push(device("b1", "ESL100"));
            ctx.manager.pending = Some(next);
        }

        integration
            .handle_message(ToIntegrationMessage::Service(Service::UpdateDevices))
            .await
            .unwrap();

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            &messages[0],
            FromIntegrationMessage::EntityDiscovered { entity_id, .. } if entity_id == "light.device_b1"
        ));

        integration.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_coordinator_reports_changes() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut integration = VeSyncIntegration::new("home", manager(), &config(1));
        integration.setup(tx).await.unwrap();
        drain(&mut rx);

        {
            let mut ctx = integration.context.lock().await;
            let mut next = ctx.manager.snapshot.clone();
            next.outlets[0].device_status = "off".to_string();
            ctx.manager.pending = Some(next);
        }

        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            msg,
            FromIntegrationMessage::EntityStateChanged { ref entity_id, .. } if entity_id == "switch.desk_plug"
        ));

        integration.shutdown().await.unwrap();
    }
}
