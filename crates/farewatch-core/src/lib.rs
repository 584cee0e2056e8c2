pub mod config;
pub mod error;
pub mod events;
pub mod state;
pub mod store;
pub mod types;

pub use config::FarewatchConfig;
pub use error::{FarewatchError, Result};
pub use events::EngineEvent;
pub use state::EngineState;
pub use store::{FileStore, MemoryStore, SettingsStore};
pub use types::*;
