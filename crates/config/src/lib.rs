//! Configuration and persisted reader settings.
//!
//! - [`Config`]: how the application reaches its data (backend URL and key,
//!   document and resource roots, database file), layered from defaults, a
//!   TOML file and the environment with `figment`.
//! - [`Settings`] / [`SettingsFile`]: the reader's own state (font size,
//!   theme, available books, open book), loaded once at startup and saved
//!   when it changes.
//! - [`SessionFile`]: the signed-in session, kept next to the settings so a
//!   restart doesn't sign the reader out.

mod config;
pub mod error;
mod file;
mod session;
mod settings;

pub use crate::config::{Config, PathsConfig, RemoteConfig};
pub use crate::session::SessionFile;
pub use crate::settings::{BOOKS_MODE, DisplayFlags, Settings, SettingsFile};
