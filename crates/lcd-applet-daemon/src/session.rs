//! Display-manager session.
//!
//! Owns the driver, the connection handle and at most one open device per
//! class. Everything here runs on the event loop thread.

use std::collections::BTreeMap;

use lcd_applet_hw::{
    ButtonCallback, Buttons, Capabilities, ConnectContext, ConnectionHandle, DeviceClass,
    DeviceHandle, Driver, Error, Frame, NotificationCallback, OpenContext, Result, UpdateFlags,
};
use tracing::{debug, info, warn};

use crate::config::AppletConfig;

/// How the applet registers itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub name: String,
    pub autostart: bool,
    pub capabilities: Capabilities,
}

impl From<&AppletConfig> for SessionConfig {
    fn from(config: &AppletConfig) -> Self {
        Self {
            name: config.name.clone(),
            autostart: config.autostart,
            capabilities: config.capability_set(),
        }
    }
}

/// Connection to the display manager and the devices opened through it.
pub struct Session<D: Driver> {
    driver: D,
    config: SessionConfig,
    on_notify: Option<NotificationCallback>,
    connection: Option<ConnectionHandle>,
    devices: BTreeMap<DeviceClass, DeviceHandle>,
}

impl<D: Driver> Session<D> {
    /// Creates an unconnected session. The driver must already be initialized.
    pub fn new(
        driver: D,
        config: SessionConfig,
        on_notify: Option<NotificationCallback>,
    ) -> Self {
        Self {
            driver,
            config,
            on_notify,
            connection: None,
            devices: BTreeMap::new(),
        }
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Registers the applet. Returns the current handle if already connected.
    pub fn connect(&mut self) -> Result<ConnectionHandle> {
        if let Some(connection) = self.connection {
            return Ok(connection);
        }

        let ctx = ConnectContext {
            name: self.config.name.clone(),
            autostartable: self.config.autostart,
            capabilities: self.config.capabilities,
            on_notify: self.on_notify.clone(),
        };
        let connection = self.driver.connect(&ctx)?;
        info!(
            "Connected to display manager as '{}' (connection {})",
            self.config.name,
            connection.raw()
        );
        self.connection = Some(connection);
        Ok(connection)
    }

    /// Closes every device and unregisters the applet. No-op when not
    /// connected.
    pub fn disconnect(&mut self) {
        self.close_all();
        if let Some(connection) = self.connection.take() {
            match self.driver.disconnect(connection) {
                Ok(()) => info!("Disconnected from display manager"),
                Err(e) => debug!("Disconnect of connection {}: {}", connection.raw(), e),
            }
        }
    }

    /// Drops the session after the display manager closed it.
    pub fn invalidate(&mut self) {
        if self.connection.is_some() || !self.devices.is_empty() {
            info!("Invalidating display manager session");
        }
        self.disconnect();
    }

    /// Opens the device of a class. Returns the existing handle if the class
    /// is already open.
    pub fn open_device(
        &mut self,
        class: DeviceClass,
        on_buttons: Option<ButtonCallback>,
    ) -> Result<DeviceHandle> {
        if !self.config.capabilities.supports(class) {
            return Err(Error::InvalidDeviceClass(class));
        }
        if let Some(device) = self.devices.get(&class) {
            return Ok(*device);
        }
        let connection = self.connection.ok_or(Error::NotConnected)?;

        let device = self.driver.open_by_type(&OpenContext {
            connection,
            class,
            on_buttons,
        })?;
        info!("Opened {} display ({})", class, device);
        self.devices.insert(class, device);
        Ok(device)
    }

    /// Closes a device handle. Unknown or already closed handles are ignored.
    /// Returns the class of the closed device.
    pub fn close_device(&mut self, device: DeviceHandle) -> Option<DeviceClass> {
        let class = self.class_of(device)?;
        self.devices.remove(&class);
        if let Err(e) = self.driver.close(device) {
            warn!("Failed to close {} display ({}): {}", class, device, e);
        } else {
            info!("Closed {} display ({})", class, device);
        }
        Some(class)
    }

    /// Closes the device of a class, if open.
    pub fn close_class(&mut self, class: DeviceClass) -> Option<DeviceHandle> {
        let device = self.device(class)?;
        self.close_device(device);
        Some(device)
    }

    /// Closes every open device exactly once, in render order.
    pub fn close_all(&mut self) -> Vec<DeviceHandle> {
        let open: Vec<_> = self.devices.values().copied().collect();
        for device in &open {
            self.close_device(*device);
        }
        open
    }

    /// Handle of the open device of a class.
    pub fn device(&self, class: DeviceClass) -> Option<DeviceHandle> {
        self.devices.get(&class).copied()
    }

    /// Class of an open device handle.
    pub fn class_of(&self, device: DeviceHandle) -> Option<DeviceClass> {
        self.devices
            .iter()
            .find(|(_, open)| **open == device)
            .map(|(class, _)| *class)
    }

    /// Open devices, monochrome first.
    pub fn open_devices(&self) -> impl Iterator<Item = (DeviceClass, DeviceHandle)> + '_ {
        self.devices.iter().map(|(class, device)| (*class, *device))
    }

    /// Submits a frame to an open device.
    pub fn submit(&mut self, device: DeviceHandle, frame: &Frame, flags: UpdateFlags) -> Result<()> {
        if self.class_of(device).is_none() {
            return Err(Error::InvalidHandle(device.to_string()));
        }
        self.driver.update_bitmap(device, frame, flags)
    }

    /// Reads the soft buttons of an open device from the driver.
    pub fn poll_buttons(&mut self, device: DeviceHandle) -> Result<Buttons> {
        if self.class_of(device).is_none() {
            return Err(Error::InvalidHandle(device.to_string()));
        }
        self.driver.read_soft_buttons(device)
    }

    /// Releases the session and returns the driver for de-initialisation.
    pub fn into_driver(mut self) -> D {
        self.disconnect();
        self.driver
    }
}
