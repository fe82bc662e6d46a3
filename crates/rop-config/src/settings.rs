//! Settings file parsing.
//!
//! ```kdl
//! defaults {
//!     context "staging"
//!     namespace "apps"
//!     dest-dir "/tmp"
//!     workload-label "app.kubernetes.io/name"
//!     no-confirm #false
//!     grace-period 5
//!     cleanup-timeout 30
//! }
//! ```
//!
//! Every entry is optional. Durations are whole seconds.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Defaults read from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub dest_dir: Option<String>,
    pub workload_label: Option<String>,
    pub no_confirm: Option<bool>,
    pub grace_period: Option<Duration>,
    pub cleanup_timeout: Option<Duration>,
}

/// Location of the settings file when none is given explicitly.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rop").join("config.kdl"))
}

/// Load settings from `path`, or from the default location.
///
/// An explicit path must exist. A missing file at the default location yields
/// empty settings.
pub fn load_settings(path: Option<&Path>) -> ConfigResult<Settings> {
    let path = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            path.to_path_buf()
        }
        None => match default_settings_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Settings::default()),
        },
    };

    let content = std::fs::read_to_string(&path)?;
    parse_settings(&content)
}

/// Parse settings from KDL text.
pub fn parse_settings(kdl: &str) -> ConfigResult<Settings> {
    let doc: KdlDocument = kdl.parse()?;
    let mut settings = Settings::default();
    let mut seen_defaults = false;

    for node in doc.nodes() {
        match node.name().value() {
            "defaults" => {
                if seen_defaults {
                    return Err(ConfigError::Duplicate("defaults".to_string()));
                }
                seen_defaults = true;
                parse_defaults(node, &mut settings)?;
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(settings)
}

fn parse_defaults(node: &KdlNode, settings: &mut Settings) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        let field = child.name().value();
        match field {
            "context" => settings.context = Some(require_string(child)?),
            "namespace" => settings.namespace = Some(require_string(child)?),
            "dest-dir" | "dest_dir" => settings.dest_dir = Some(require_string(child)?),
            "workload-label" | "workload_label" => {
                settings.workload_label = Some(require_string(child)?)
            }
            "no-confirm" | "no_confirm" => {
                let value = get_first_arg(child)
                    .and_then(|v| v.as_bool())
                    .ok_or_else(|| invalid(field, "expected a boolean"))?;
                settings.no_confirm = Some(value);
            }
            "grace-period" | "grace_period" => {
                settings.grace_period = Some(require_seconds(child)?)
            }
            "cleanup-timeout" | "cleanup_timeout" => {
                let timeout = require_seconds(child)?;
                if timeout.is_zero() {
                    return Err(invalid(field, "must be greater than zero"));
                }
                settings.cleanup_timeout = Some(timeout);
            }
            _ => {}
        }
    }

    Ok(())
}

// Helper functions for extracting values from KDL nodes

fn get_first_arg(node: &KdlNode) -> Option<&kdl::KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn require_string(node: &KdlNode) -> ConfigResult<String> {
    let field = node.name().value();
    let value = get_first_arg(node)
        .and_then(|v| v.as_string())
        .ok_or_else(|| invalid(field, "expected a string"))?;
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    Ok(value.to_string())
}

fn require_seconds(node: &KdlNode) -> ConfigResult<Duration> {
    let field = node.name().value();
    let value = get_first_arg(node)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| invalid(field, "expected a whole number of seconds"))?;
    let secs = u64::try_from(value).map_err(|_| invalid(field, "must not be negative"))?;
    Ok(Duration::from_secs(secs))
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
