//! Configuration management.

use anyhow::{Context, Result};
use lcd_applet_hw::{Capabilities, DeviceClass, Priority, UpdateFlags, UpdateMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Applet registration settings
    #[serde(default)]
    pub applet: AppletConfig,

    /// Render loop settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Emulated display manager settings
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

/// How the applet registers with the display manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppletConfig {
    /// Display name shown in the display manager
    #[serde(default = "default_name")]
    pub name: String,

    /// Start together with the display manager
    #[serde(default)]
    pub autostart: bool,

    /// Display classes the applet renders to
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<DeviceClass>,
}

impl AppletConfig {
    /// Declared classes as a capability set.
    pub fn capability_set(&self) -> Capabilities {
        self.capabilities.iter().copied().collect()
    }
}

impl Default for AppletConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            autostart: false,
            capabilities: default_capabilities(),
        }
    }
}

/// Render loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Tick interval in milliseconds; also the connect retry period
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Frame submission mode: "async", "sync" or "sync-within-frame"
    #[serde(default)]
    pub update: UpdateMode,

    /// Frame priority: "idle-no-show", "background", "normal" or "alert"
    #[serde(default)]
    pub priority: Priority,

    /// Frame producer for the monochrome display
    #[serde(default = "default_mono_producer")]
    pub monochrome: String,

    /// Frame producer for the color display
    #[serde(default = "default_color_producer")]
    pub color: String,
}

impl RenderConfig {
    /// Update flags sent with every frame.
    pub fn update_flags(&self) -> UpdateFlags {
        UpdateFlags::new(self.update, self.priority)
    }

    /// Configured producer name for a device class.
    pub fn producer_for(&self, class: DeviceClass) -> &str {
        match class {
            DeviceClass::Monochrome => &self.monochrome,
            DeviceClass::Color => &self.color,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            update: UpdateMode::default(),
            priority: Priority::default(),
            monochrome: default_mono_producer(),
            color: default_color_producer(),
        }
    }
}

/// Emulated display manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Whether the emulated service accepts connections at startup
    #[serde(default = "default_true")]
    pub service: bool,

    /// Device classes attached at startup
    #[serde(default = "default_capabilities")]
    pub attach: Vec<DeviceClass>,

    /// Read emulator commands from stdin
    #[serde(default)]
    pub console: bool,

    /// Directory for PNG snapshots of the last frames
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            service: true,
            attach: default_capabilities(),
            console: false,
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

// Default value functions
fn default_name() -> String {
    "ColorAndMono Sample".to_string()
}

fn default_capabilities() -> Vec<DeviceClass> {
    vec![DeviceClass::Monochrome, DeviceClass::Color]
}

fn default_interval() -> u64 {
    1000
}

fn default_mono_producer() -> String {
    "noise".to_string()
}

fn default_color_producer() -> String {
    "cycle".to_string()
}

fn default_true() -> bool {
    true
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        if config.render.interval == 0 {
            anyhow::bail!("render.interval must be at least 1 millisecond");
        }
        Ok(config)
    }
}
