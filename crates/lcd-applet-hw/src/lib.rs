//! LCD Applet Hardware Library
//!
//! Provides the display-manager driver contract for auxiliary LCD panels
//! (160x43 monochrome and 320x240 color), the frame buffers submitted to them,
//! and an in-process emulator implementing the contract.

pub mod driver;
pub mod emulator;
pub mod error;
pub mod lcd;

pub use driver::{ButtonCallback, ConnectContext, Driver, NotificationCallback, OpenContext};
pub use emulator::{Emulator, EmulatorControl, Submission};
pub use error::{Error, Result};
pub use lcd::{
    Buttons, Capabilities, ColorFrame, ConnectionHandle, DeviceClass, DeviceHandle, Frame,
    MonoFrame, NotificationCode, Priority, UpdateFlags, UpdateMode,
};

/// Monochrome display dimensions
pub const MONO_WIDTH: u16 = 160;
pub const MONO_HEIGHT: u16 = 43;

/// Color (QVGA) display dimensions
pub const COLOR_WIDTH: u16 = 320;
pub const COLOR_HEIGHT: u16 = 240;
