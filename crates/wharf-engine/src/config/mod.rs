//! User configuration (persisted in the [`Store`](crate::store::Store)) and
//! host settings (YAML on disk).

pub mod loader;
pub mod schema;
mod store;

pub use loader::{SettingsError, SettingsLoader};
pub use schema::{BridgeSettings, EXTENSION_ORIGIN_SCHEME, default_allowed_origins};
pub use store::{CONFIG_KEYS, ConfigStore};
