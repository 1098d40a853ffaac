//! Applet context and lifecycle state machine.
//!
//! One [`Applet`] owns the session, the button tracker and the render
//! dispatcher. It is driven from a single thread: queued notifications go
//! through [`Applet::handle`], timer ticks through [`Applet::tick`].

use std::time::Instant;

use lcd_applet_hw::{Buttons, DeviceClass, DeviceHandle, Driver};
use tracing::{debug, error, info, warn};

use crate::buttons::ButtonTracker;
use crate::config::Config;
use crate::producers::ProducerError;
use crate::relay::{Notification, NotificationRelay};
use crate::render::{RenderDispatcher, TickReport};
use crate::session::{Session, SessionConfig};

/// Lifecycle state of the applet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppletState {
    /// Not connected; a connect is attempted on every tick.
    Connecting,
    /// Connected and rendering.
    Connected,
    /// Connected but disabled by the user; nothing is rendered.
    Degraded,
    /// The display manager closed the connection.
    Closed,
}

impl std::fmt::Display for AppletState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppletState::Connecting => write!(f, "connecting"),
            AppletState::Connected => write!(f, "connected"),
            AppletState::Degraded => write!(f, "degraded"),
            AppletState::Closed => write!(f, "closed"),
        }
    }
}

/// What the event loop should do after a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// The applet context.
pub struct Applet<D: Driver> {
    session: Session<D>,
    relay: NotificationRelay,
    tracker: ButtonTracker,
    renderer: RenderDispatcher,
    state: AppletState,
    /// Last enable/disable seen from the display manager. Survives reconnects.
    enabled: bool,
    connect_failures: u32,
}

impl<D: Driver> Applet<D> {
    /// Creates the applet. The driver must already be initialized; the
    /// connection is made on the first tick.
    pub fn new(
        driver: D,
        session: SessionConfig,
        renderer: RenderDispatcher,
        relay: NotificationRelay,
    ) -> Self {
        let session = Session::new(driver, session, Some(relay.notification_callback()));
        let mut tracker = ButtonTracker::new();
        tracker.set_handler(log_buttons);

        Self {
            session,
            relay,
            tracker,
            renderer,
            state: AppletState::Connecting,
            enabled: true,
            connect_failures: 0,
        }
    }

    /// Creates the applet from configuration.
    pub fn from_config(
        driver: D,
        config: &Config,
        relay: NotificationRelay,
    ) -> Result<Self, ProducerError> {
        let session = SessionConfig::from(&config.applet);
        let renderer = RenderDispatcher::from_config(&config.render, session.capabilities)?;
        Ok(Self::new(driver, session, renderer, relay))
    }

    pub fn state(&self) -> AppletState {
        self.state
    }

    pub fn session(&self) -> &Session<D> {
        &self.session
    }

    /// Last-known button state of a device.
    pub fn buttons(&self, device: DeviceHandle) -> Buttons {
        self.tracker.get_state(device)
    }

    /// Replaces the button change handler.
    pub fn set_button_handler(
        &mut self,
        handler: impl FnMut(DeviceHandle, Buttons, Buttons) + 'static,
    ) {
        self.tracker.set_handler(handler);
    }

    /// Applies one queued notification.
    pub fn handle(&mut self, notification: Notification) -> Flow {
        match notification {
            Notification::DeviceArrival(class) => self.on_arrival(class),
            Notification::DeviceRemoval(class) => self.on_removal(class),
            Notification::AppletEnabled => self.set_enabled(true),
            Notification::AppletDisabled => self.set_enabled(false),
            Notification::ConnectionClosed => self.on_connection_closed(),
            Notification::ButtonsChanged { device, buttons } => self.on_buttons(device, buttons),
            Notification::TerminateApplet => {
                info!("Display manager asked the applet to exit");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    /// Runs one timer tick: retries the connection while unconnected, then
    /// renders.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        if matches!(self.state, AppletState::Connecting | AppletState::Closed) {
            self.try_connect();
        }
        self.renderer.tick(self.state, &mut self.session, now)
    }

    /// Closes every device and disconnects.
    pub fn shutdown(&mut self) {
        self.forget_open_devices();
        self.session.invalidate();
        self.state = AppletState::Closed;
    }

    /// Shuts down and hands back the driver for de-initialisation.
    pub fn into_driver(mut self) -> D {
        self.shutdown();
        self.session.into_driver()
    }

    fn try_connect(&mut self) {
        self.state = AppletState::Connecting;
        match self.session.connect() {
            Ok(_) => {
                if self.connect_failures > 0 {
                    info!(
                        "Connected after {} failed attempts",
                        self.connect_failures
                    );
                }
                self.connect_failures = 0;
                self.state = if self.enabled {
                    AppletState::Connected
                } else {
                    info!("Applet still disabled, rendering paused");
                    AppletState::Degraded
                };
            }
            Err(e) => {
                self.connect_failures += 1;
                if !e.is_transient() {
                    error!("Cannot connect to display manager: {}", e);
                } else if self.connect_failures == 1 {
                    warn!("Cannot connect to display manager: {}. Retrying.", e);
                } else {
                    debug!("Connect attempt {} failed: {}", self.connect_failures, e);
                }
            }
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        match (self.state, enabled) {
            (AppletState::Degraded, true) => {
                info!("Applet enabled");
                self.state = AppletState::Connected;
            }
            (AppletState::Connected, false) => {
                info!("Applet disabled, rendering paused");
                self.state = AppletState::Degraded;
            }
            (state, enabled) => debug!("Applet enabled={} while {}", enabled, state),
        }
    }

    fn on_arrival(&mut self, class: DeviceClass) {
        if !matches!(self.state, AppletState::Connected | AppletState::Degraded) {
            debug!("Ignoring {} arrival while {}", class, self.state);
            return;
        }
        if let Some(device) = self.session.device(class) {
            debug!("{} display already open as {}", class, device);
            return;
        }
        match self
            .session
            .open_device(class, Some(self.relay.button_callback()))
        {
            Ok(device) => self.tracker.reset(device),
            Err(e) if e.is_transient() => {
                warn!("Cannot open {} display: {}. Waiting for the next arrival.", class, e)
            }
            Err(e) => error!("Cannot open {} display: {}", class, e),
        }
    }

    fn on_removal(&mut self, class: DeviceClass) {
        match self.session.close_class(class) {
            Some(device) => self.tracker.forget(device),
            None => debug!("Ignoring removal of {} display, not open", class),
        }
    }

    fn on_connection_closed(&mut self) {
        info!("Display manager closed the connection");
        self.forget_open_devices();
        self.session.invalidate();
        self.state = AppletState::Closed;
    }

    fn on_buttons(&mut self, device: DeviceHandle, buttons: Buttons) {
        let Some(class) = self.session.class_of(device) else {
            debug!("Ignoring buttons for unknown {}", device);
            return;
        };
        if let Some(old) = self.tracker.update(device, buttons) {
            self.renderer.on_buttons(class, old, buttons);
        }
    }

    fn forget_open_devices(&mut self) {
        for device in self.session.close_all() {
            self.tracker.forget(device);
        }
    }
}

/// Default button handler.
fn log_buttons(device: DeviceHandle, old: Buttons, new: Buttons) {
    let pressed = new & !old;
    let released = old & !new;
    if !pressed.is_empty() {
        info!("{}: pressed {}", device, pressed);
    }
    if !released.is_empty() {
        debug!("{}: released {}", device, released);
    }
}
