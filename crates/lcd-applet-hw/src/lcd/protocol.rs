//! Display-manager protocol codes.
//!
//! Update flags word:
//! - Low byte: priority (0 idle, 64 background, 128 normal, 255 alert)
//! - Bit 31: synchronous update
//! - Bits 31+30: synchronous, completing within the current frame

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Synchronous update bit.
pub const SYNC_UPDATE_BIT: u32 = 0x8000_0000;

/// Synchronous-within-frame update bits.
pub const SYNC_COMPLETE_WITHIN_FRAME_BITS: u32 = 0xC000_0000;

/// Frame priority relative to other applets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Priority {
    /// Submitted but never shown.
    IdleNoShow = 0,
    /// Shown only when nothing else wants the display.
    Background = 64,
    /// Regular applet content.
    #[default]
    Normal = 128,
    /// Takes the display over other applets.
    Alert = 255,
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle-no-show" | "idle_no_show" | "idle" => Ok(Priority::IdleNoShow),
            "background" => Ok(Priority::Background),
            "normal" => Ok(Priority::Normal),
            "alert" => Ok(Priority::Alert),
            _ => Err(Error::UnknownPriority(s.to_string())),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::IdleNoShow => write!(f, "idle-no-show"),
            Priority::Background => write!(f, "background"),
            Priority::Normal => write!(f, "normal"),
            Priority::Alert => write!(f, "alert"),
        }
    }
}

/// How a frame submission waits for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateMode {
    /// Return immediately; the driver may drop frames under load.
    #[default]
    Async,
    /// Block until the driver has consumed the buffer.
    Sync,
    /// Block until the frame has been shown.
    SyncWithinFrame,
}

/// Update flags passed with every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateFlags {
    pub mode: UpdateMode,
    pub priority: Priority,
}

impl UpdateFlags {
    pub fn new(mode: UpdateMode, priority: Priority) -> Self {
        Self { mode, priority }
    }

    /// Returns true if the submission blocks until consumed.
    pub fn is_sync(&self) -> bool {
        self.mode != UpdateMode::Async
    }

    /// Encodes the flags into the driver's flags word.
    pub fn bits(&self) -> u32 {
        let mode = match self.mode {
            UpdateMode::Async => 0,
            UpdateMode::Sync => SYNC_UPDATE_BIT,
            UpdateMode::SyncWithinFrame => SYNC_COMPLETE_WITHIN_FRAME_BITS,
        };
        mode | self.priority as u32
    }
}

/// Lifecycle notification codes delivered to the notification callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCode {
    /// A device class became available. Parameter 1 is the device type code.
    DeviceArrival,
    /// A device class went away. Parameter 1 is the device type code.
    DeviceRemoval,
    /// The display manager closed the connection.
    CloseConnection,
    /// The user disabled the applet.
    AppletDisabled,
    /// The user enabled the applet.
    AppletEnabled,
    /// The display manager asks the applet to exit.
    TerminateApplet,
    /// A code this library does not know.
    Unknown(u32),
}

impl NotificationCode {
    /// Decodes a raw notification code.
    pub fn from_raw(code: u32) -> Self {
        match code {
            0x1000 => NotificationCode::DeviceArrival,
            0x1001 => NotificationCode::DeviceRemoval,
            0x1002 => NotificationCode::CloseConnection,
            0x1003 => NotificationCode::AppletDisabled,
            0x1004 => NotificationCode::AppletEnabled,
            0x1005 => NotificationCode::TerminateApplet,
            other => NotificationCode::Unknown(other),
        }
    }

    /// Returns the raw notification code.
    pub fn raw(&self) -> u32 {
        match self {
            NotificationCode::DeviceArrival => 0x1000,
            NotificationCode::DeviceRemoval => 0x1001,
            NotificationCode::CloseConnection => 0x1002,
            NotificationCode::AppletDisabled => 0x1003,
            NotificationCode::AppletEnabled => 0x1004,
            NotificationCode::TerminateApplet => 0x1005,
            NotificationCode::Unknown(code) => *code,
        }
    }
}
