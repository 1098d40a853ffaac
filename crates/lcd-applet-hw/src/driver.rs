//! Display-manager driver contract.
//!
//! A driver owns the connection to the display-manager service. Its
//! notification and button callbacks run on threads the driver owns, so
//! callbacks must be `Send + Sync` and must return quickly.

use std::sync::Arc;

use crate::lcd::{
    Buttons, Capabilities, ConnectionHandle, DeviceClass, DeviceHandle, Frame, NotificationCode,
    UpdateFlags,
};
use crate::Result;

/// Lifecycle notification callback: `(code, parameters) -> handled`.
pub type NotificationCallback = Arc<dyn Fn(NotificationCode, [u32; 4]) -> bool + Send + Sync>;

/// Soft-button callback: `(device, new button state)`.
pub type ButtonCallback = Arc<dyn Fn(DeviceHandle, Buttons) + Send + Sync>;

/// Parameters for registering an applet with the display manager.
#[derive(Clone)]
pub struct ConnectContext {
    /// Display name of the applet.
    pub name: String,
    /// Start the applet together with the display manager.
    pub autostartable: bool,
    /// Display classes the applet can render to.
    pub capabilities: Capabilities,
    /// Lifecycle notification callback.
    pub on_notify: Option<NotificationCallback>,
}

impl std::fmt::Debug for ConnectContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectContext")
            .field("name", &self.name)
            .field("autostartable", &self.autostartable)
            .field("capabilities", &self.capabilities)
            .field("on_notify", &self.on_notify.is_some())
            .finish()
    }
}

/// Parameters for opening a device by class.
#[derive(Clone)]
pub struct OpenContext {
    pub connection: ConnectionHandle,
    pub class: DeviceClass,
    /// Soft-button callback for the opened device.
    pub on_buttons: Option<ButtonCallback>,
}

impl std::fmt::Debug for OpenContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenContext")
            .field("connection", &self.connection)
            .field("class", &self.class)
            .field("on_buttons", &self.on_buttons.is_some())
            .finish()
    }
}

/// Entry points of a display-manager driver library.
///
/// `init` must precede every other call and `deinit` must follow them all.
pub trait Driver {
    /// Initializes the library.
    fn init(&mut self) -> Result<()>;

    /// Shuts the library down. Further calls fail with `NotInitialized`.
    fn deinit(&mut self);

    /// Registers the applet and returns a connection handle.
    fn connect(&mut self, ctx: &ConnectContext) -> Result<ConnectionHandle>;

    /// Unregisters the applet.
    fn disconnect(&mut self, connection: ConnectionHandle) -> Result<()>;

    /// Opens the device of the given class. Multiple physical units of the
    /// same class are multiplexed behind one handle.
    fn open_by_type(&mut self, ctx: &OpenContext) -> Result<DeviceHandle>;

    /// Closes a device handle.
    fn close(&mut self, device: DeviceHandle) -> Result<()>;

    /// Submits a frame to a device.
    fn update_bitmap(&mut self, device: DeviceHandle, frame: &Frame, flags: UpdateFlags)
        -> Result<()>;

    /// Reads the current soft-button state of a device.
    fn read_soft_buttons(&mut self, device: DeviceHandle) -> Result<Buttons>;
}
