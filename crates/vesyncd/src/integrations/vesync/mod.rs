//! VeSync integration.
//!
//! The core of the integration is [`classify::classify`], which sorts the
//! account's devices into per-platform buckets. Everything else turns those
//! buckets into entities and keeps them up to date.

pub mod capabilities;
pub mod classify;
mod config;
pub mod context;
pub mod device;
pub mod diagnostics;
pub mod discovery;
pub mod manager;
pub mod platforms;
pub mod probe;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod vesync;

pub use config::Config as VeSyncConfig;
use context::EntityIds;
use linkme::distributed_slice;
use manager::SnapshotManager;
pub use vesync::VeSyncIntegration;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_vesync(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let ids = EntityIds::new();
    let mut integrations: Vec<Box<dyn engine::Integration>> = Vec::new();
    for (entry_id, entry) in &ctx.config.integrations.vesync {
        if !entry.enabled {
            tracing::info!("VeSync entry {} is disabled", entry_id);
            continue;
        }
        let manager = SnapshotManager::new(&entry.snapshot, &entry.username);
        integrations.push(Box::new(VeSyncIntegration::with_entity_ids(
            entry_id,
            manager,
            entry,
            ids.clone(),
        )));
    }
    Ok(integrations)
}
