//! Kiln Services Layer
//!
//! Host-side services around the engine: settings today.

pub mod settings;

pub use settings::{ScriptingSettings, Settings, SettingsError};
