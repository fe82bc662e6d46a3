//! KDL settings file for rop.
//!
//! The settings file only supplies defaults; command-line flags always win.
//! See [`settings`] for the accepted nodes.

pub mod error;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{Settings, load_settings, parse_settings};
