//! Notification relay.
//!
//! Driver callbacks run on threads the driver owns. They never touch applet
//! state: they translate the event into a [`Notification`], push it onto a
//! bounded FIFO and return. The event loop drains the queue on the owning
//! thread.

use std::sync::Arc;

use lcd_applet_hw::{
    ButtonCallback, Buttons, DeviceClass, DeviceHandle, NotificationCallback, NotificationCode,
};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, warn};

/// Default queue capacity.
pub const QUEUE_CAPACITY: usize = 64;

/// One driver event, copied onto the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    DeviceArrival(DeviceClass),
    DeviceRemoval(DeviceClass),
    ConnectionClosed,
    AppletEnabled,
    AppletDisabled,
    TerminateApplet,
    ButtonsChanged {
        device: DeviceHandle,
        buttons: Buttons,
    },
}

impl Notification {
    /// Decodes a lifecycle event. Returns `None` for events the applet has no
    /// use for.
    pub fn from_driver_event(code: NotificationCode, params: [u32; 4]) -> Option<Self> {
        match code {
            NotificationCode::DeviceArrival => DeviceClass::from_type_code(params[0])
                .ok()
                .map(Notification::DeviceArrival),
            NotificationCode::DeviceRemoval => DeviceClass::from_type_code(params[0])
                .ok()
                .map(Notification::DeviceRemoval),
            NotificationCode::CloseConnection => Some(Notification::ConnectionClosed),
            NotificationCode::AppletEnabled => Some(Notification::AppletEnabled),
            NotificationCode::AppletDisabled => Some(Notification::AppletDisabled),
            NotificationCode::TerminateApplet => Some(Notification::TerminateApplet),
            NotificationCode::Unknown(_) => None,
        }
    }
}

/// Creates a relay and the queue it feeds.
pub fn channel(capacity: usize) -> (NotificationRelay, NotificationQueue) {
    let (tx, rx) = mpsc::channel(capacity);
    (NotificationRelay { tx }, NotificationQueue { rx })
}

/// Ingress side, handed to the driver as callbacks.
#[derive(Clone)]
pub struct NotificationRelay {
    tx: mpsc::Sender<Notification>,
}

impl NotificationRelay {
    /// Lifecycle callback entry point. Returns whether the event was queued.
    pub fn on_driver_event(&self, code: NotificationCode, params: [u32; 4]) -> bool {
        match Notification::from_driver_event(code, params) {
            Some(notification) => self.enqueue(notification),
            None => {
                debug!("Ignoring driver event {:?} {:?}", code, params);
                false
            }
        }
    }

    /// Button callback entry point. Returns whether the event was queued.
    pub fn on_buttons(&self, device: DeviceHandle, buttons: Buttons) -> bool {
        self.enqueue(Notification::ButtonsChanged { device, buttons })
    }

    fn enqueue(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!("Notification queue full, dropping {:?}", dropped);
                false
            }
            Err(TrySendError::Closed(dropped)) => {
                debug!("Event loop gone, dropping {:?}", dropped);
                false
            }
        }
    }

    /// Wraps the relay as a driver notification callback.
    pub fn notification_callback(&self) -> NotificationCallback {
        let relay = self.clone();
        Arc::new(move |code: NotificationCode, params: [u32; 4]| {
            relay.on_driver_event(code, params)
        })
    }

    /// Wraps the relay as a driver button callback.
    pub fn button_callback(&self) -> ButtonCallback {
        let relay = self.clone();
        Arc::new(move |device: DeviceHandle, buttons: Buttons| {
            relay.on_buttons(device, buttons);
        })
    }
}

/// Consumer side, owned by the event loop.
pub struct NotificationQueue {
    rx: mpsc::Receiver<Notification>,
}

impl NotificationQueue {
    /// Waits for the next notification.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Returns the next queued notification without waiting.
    pub fn try_recv(&mut self) -> Option<Notification> {
        match self.rx.try_recv() {
            Ok(notification) => Some(notification),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Takes every notification queued so far, oldest first.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
