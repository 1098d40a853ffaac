//! LCD display module.
//!
//! Device classes and handles, the frame formats for both display classes,
//! and the update/notification codes of the display-manager protocol.

mod device;
mod protocol;

pub mod framebuffer;

pub use device::{Buttons, Capabilities, ConnectionHandle, DeviceClass, DeviceHandle};
pub use framebuffer::{rgb888_to_xrgb, xrgb_to_rgb888, ColorFrame, Frame, MonoFrame};
pub use protocol::{NotificationCode, Priority, UpdateFlags, UpdateMode};
