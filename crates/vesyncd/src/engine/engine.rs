use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::IntegrationContext;
use super::integration::ToIntegrationSender;
use super::message::EntityCommand;
use super::message::FromIntegrationMessage;
use super::message::Service;
use super::message::ToIntegrationMessage;
use super::state::State;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No integration found for entity: {0}")]
    UnknownEntity(String),

    #[error("Integration channel not found: {0}")]
    UnknownIntegration(String),

    #[error("Integration {0} is no longer running")]
    IntegrationStopped(String),
}

/// vesyncd engine
///
/// This structure handles the flow of events, sending commands to the correct
/// integration, and maintaining a view of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> integration name for routing messages
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every registered factory and starts the instances it returns.
    /// A failing factory is logged and skipped. Returns the number of
    /// integrations started.
    pub fn register_integrations_from_config(&self, cfg: &crate::config::Config) -> usize {
        let ctx = IntegrationContext { config: cfg };
        let mut count = 0;
        for constr in super::integration::REGISTRY {
            let integrations = match constr(&ctx) {
                Ok(i) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
            };
            for integration in integrations {
                self.register_integration(integration);
                count += 1;
            }
        }
        count
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&self, mut integration: Box<dyn Integration>) {
        let name = integration.name().to_string();
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.insert(name.clone(), to_integration_tx);
        }

        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                error!("Integration '{}' setup failed: {}", name, e);
                return;
            }
            info!("Integration '{}' ready", name);

            // Process commands from engine until the engine drops our channel
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        if let Ok(mut handles) = self.integration_handles.lock() {
            handles.push(handle);
        }
    }

    fn channel(&self, integration_name: &str) -> Result<ToIntegrationSender, EngineError> {
        self.integration_channels
            .lock()
            .ok()
            .and_then(|channels| channels.get(integration_name).cloned())
            .ok_or_else(|| EngineError::UnknownIntegration(integration_name.to_string()))
    }

    /// Send a command to the integration that owns `entity_id`.
    pub fn send_command(&self, entity_id: &str, command: EntityCommand) -> Result<(), EngineError> {
        let integration_name = self
            .entity_integration_map
            .lock()
            .ok()
            .and_then(|map| map.get(entity_id).cloned())
            .ok_or_else(|| EngineError::UnknownEntity(entity_id.to_string()))?;

        let tx = self.channel(&integration_name)?;
        tx.send(ToIntegrationMessage::Command {
            entity_id: entity_id.to_string(),
            command,
        })
        .map_err(|_| EngineError::IntegrationStopped(integration_name))
    }

    /// Broadcast a service call to every integration.
    ///
    /// Integrations that do not offer the service ignore it. Returns the
    /// number of integrations the call was delivered to.
    pub fn call_service(&self, service: Service) -> usize {
        let Ok(channels) = self.integration_channels.lock() else {
            return 0;
        };
        channels
            .iter()
            .filter(|(name, tx)| {
                let sent = tx.send(ToIntegrationMessage::Service(service)).is_ok();
                if !sent {
                    warn!("Integration '{}' is not accepting service calls", name);
                }
                sent
            })
            .count()
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
    }

    /// Stop every integration and wait for them to finish.
    pub async fn shutdown(&self) {
        // Dropping the senders ends each integration's command loop
        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.clear();
        }

        let handles = match self.integration_handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task ended abnormally: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Handle an event from an integration
    fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                integration_name,
                state,
            } => {
                info!(
                    "Entity discovered: {} (from {})",
                    entity_id, integration_name
                );

                // Routing goes in first so a reader that sees the state can
                // already send commands to it.
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    if let Some(owner) = map.get(&entity_id) {
                        if *owner != integration_name {
                            error!(
                                "Entity {} from {} is already owned by {}, ignoring",
                                entity_id, integration_name, owner
                            );
                            return;
                        }
                    }
                    map.insert(entity_id.clone(), integration_name);
                }

                self.state.rcu(|current| {
                    let mut next = State::clone(current);
                    next.entities.insert(entity_id.clone(), state.clone());
                    next
                });
            }
            FromIntegrationMessage::EntityStateChanged { entity_id, state } => {
                debug!("State changed: {} -> {}", entity_id, state.state);

                let known = self
                    .entity_integration_map
                    .lock()
                    .map(|map| map.contains_key(&entity_id))
                    .unwrap_or(false);
                if !known {
                    warn!("State change for unknown entity {}, ignoring", entity_id);
                    return;
                }

                self.state.rcu(|current| {
                    let mut next = State::clone(current);
                    next.entities.insert(entity_id.clone(), state.clone());
                    next
                });
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::engine::DeviceInfo;
    use crate::engine::EntityState;
    use crate::engine::Platform;

    type Log = Arc<std::sync::Mutex<Vec<String>>>;

    struct FakeIntegration {
        log: Log,
    }

    fn fake_state() -> EntityState {
        EntityState {
            platform: Platform::Switch,
            name: "Test".to_string(),
            unique_id: "t1".to_string(),
            available: true,
            category: None,
            state: json!("on"),
            attributes: serde_json::Map::new(),
            device: DeviceInfo::new(
                "t1".to_string(),
                "Test".to_string(),
                "Acme",
                "T-1".to_string(),
            ),
        }
    }

    #[async_trait]
    impl Integration for FakeIntegration {
        fn name(&self) -> &str {
            "fake"
        }

        async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
            tx.send(FromIntegrationMessage::EntityDiscovered {
                entity_id: "switch.test".to_string(),
                integration_name: "fake".to_string(),
                state: fake_state(),
            })
            .await
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })
        }

        async fn handle_message(
            &mut self,
            msg: ToIntegrationMessage,
        ) -> Result<(), Box<dyn Error + Send>> {
            self.log.lock().unwrap().push(format!("{:?}", msg));
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
            self.log.lock().unwrap().push("shutdown".to_string());
            Ok(())
        }
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_discovery_and_command_routing() {
        let engine = Arc::new(Engine::new());
        let log: Log = Arc::default();
        engine.register_integration(Box::new(FakeIntegration { log: log.clone() }));

        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run().await })
        };

        wait_for(|| engine.state_snapshot().entities.contains_key("switch.test")).await;
        assert_eq!(
            engine.state_snapshot().entities["switch.test"].state,
            json!("on")
        );

        engine
            .send_command("switch.test", EntityCommand::TurnOff)
            .unwrap();
        assert_eq!(engine.call_service(Service::UpdateDevices), 1);
        wait_for(|| log.lock().unwrap().len() == 2).await;

        assert!(matches!(
            engine.send_command("switch.nope", EntityCommand::TurnOff),
            Err(EngineError::UnknownEntity(_))
        ));

        engine.shutdown().await;
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("shutdown"));
        runner.abort();
    }

    #[test]
    fn test_state_change_for_unknown_entity_is_ignored() {
        let engine = Engine::new();
        engine.handle_event(FromIntegrationMessage::EntityStateChanged {
            entity_id: "switch.ghost".to_string(),
            state: fake_state(),
        });
        assert!(engine.state_snapshot().entities.is_empty());
    }

    #[test]
    fn test_discovery_of_taken_id_is_rejected() {
        let engine = Engine::new();
        engine.handle_event(FromIntegrationMessage::EntityDiscovered {
            entity_id: "switch.desk_plug".to_string(),
            integration_name: "vesync.home".to_string(),
            state: fake_state(),
        });

        let mut other = fake_state();
        other.unique_id = "x9".to_string();
        engine.handle_event(FromIntegrationMessage::EntityDiscovered {
            entity_id: "switch.desk_plug".to_string(),
            integration_name: "vesync.office".to_string(),
            state: other,
        });

        assert_eq!(
            engine.state_snapshot().entities["switch.desk_plug"].unique_id,
            "t1"
        );
        assert_eq!(
            engine
                .entity_integration_map
                .lock()
                .unwrap()
                .get("switch.desk_plug")
                .map(String::as_str),
            Some("vesync.home")
        );
    }

    #[test]
    fn test_rediscovery_by_owner_updates_state() {
        let engine = Engine::new();
        let discovered = |state: EntityState| FromIntegrationMessage::EntityDiscovered {
            entity_id: "switch.test".to_string(),
            integration_name: "fake".to_string(),
            state,
        };
        engine.handle_event(discovered(fake_state()));

        let mut off = fake_state();
        off.state = json!("off");
        engine.handle_event(discovered(off));

        assert_eq!(
            engine.state_snapshot().entities["switch.test"].state,
            json!("off")
        );
    }
}
