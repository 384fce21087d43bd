// Runtime configuration, read from a JSON file. Every field has a default so a
// partial (or missing) file still yields a usable config.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where the dock sits on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DockPosition {
    #[default]
    Bottom,
    Top,
    Hidden,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SidebarConfig {
    pub width_percent: f64,
    pub min_width: u16,
    pub max_width: u16,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        Self {
            width_percent: 0.20,
            min_width: 25,
            max_width: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphicsConfig {
    pub kitty: bool,
    pub sixel: bool,
    /// Pixel size of one host terminal cell, used to turn image pixels into cells
    pub cell_width_px: u32,
    pub cell_height_px: u32,
    /// Device the passthrough bytes are written to
    pub device: PathBuf,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            kitty: true,
            sixel: true,
            cell_width_px: 10,
            cell_height_px: 20,
            device: PathBuf::from("/dev/tty"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub dock_position: DockPosition,
    pub dock_height: u16,
    /// Culling margin (cells) around the viewport for resting windows
    pub visibility_margin: i32,
    /// Culling margin while a window is mid-animation
    pub animating_margin: i32,
    pub sidebar: SidebarConfig,
    pub graphics: GraphicsConfig,
    pub shell: Option<String>,
    pub notification_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dock_position: DockPosition::Bottom,
            dock_height: 1,
            visibility_margin: 5,
            animating_margin: 20,
            sidebar: SidebarConfig::default(),
            graphics: GraphicsConfig::default(),
            shell: None,
            notification_ms: 2500,
        }
    }
}

impl Config {
    pub fn from_json_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw, path)
    }

    /// Load from `path` if given, falling back to defaults on any failure
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => {
                info!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                warn!("{e}; using defaults");
                Self::default()
            }
        }
    }

    /// Shell to spawn for new windows
    pub fn shell_command(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "bash".to_string())
    }
}
