mod device;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod engine;
mod entity;
mod integration;
mod message;
pub mod state;

pub use device::DeviceInfo;
pub use engine::Engine;
pub use engine::EngineError;
pub use entity::EntityCategory;
pub use entity::Platform;
pub use entity::entity_id;
pub use entity::slugify;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use message::EntityCommand;
pub use message::FromIntegrationMessage;
pub use message::Service;
pub use message::ToIntegrationMessage;
pub use state::EntityState;
pub use state::State;
