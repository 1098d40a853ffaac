//! Soft-button state tracking.
//!
//! Keeps the last-known bitmask of every open device and calls the change
//! handler only when a report differs from what was stored.

use std::collections::HashMap;

use lcd_applet_hw::{Buttons, DeviceHandle};

/// Change handler: `(device, old state, new state)`.
pub type ButtonHandler = Box<dyn FnMut(DeviceHandle, Buttons, Buttons)>;

/// Last-known button state per device.
#[derive(Default)]
pub struct ButtonTracker {
    states: HashMap<DeviceHandle, Buttons>,
    handler: Option<ButtonHandler>,
}

impl ButtonTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the change handler, replacing the previous one.
    pub fn set_handler(&mut self, handler: impl FnMut(DeviceHandle, Buttons, Buttons) + 'static) {
        self.handler = Some(Box::new(handler));
    }

    /// Last-known state of a device; empty for unknown devices.
    pub fn get_state(&self, device: DeviceHandle) -> Buttons {
        self.states.get(&device).copied().unwrap_or_default()
    }

    #[cfg(test)]
    fn is_tracked(&self, device: DeviceHandle) -> bool {
        self.states.contains_key(&device)
    }

    /// Starts tracking a freshly opened device with nothing pressed.
    pub fn reset(&mut self, device: DeviceHandle) {
        self.states.insert(device, Buttons::empty());
    }

    /// Stops tracking a closed device.
    pub fn forget(&mut self, device: DeviceHandle) {
        self.states.remove(&device);
    }

    /// Stores a new state. Returns the previous state if it changed, after
    /// calling the handler once.
    pub fn update(&mut self, device: DeviceHandle, buttons: Buttons) -> Option<Buttons> {
        let previous = self.states.insert(device, buttons).unwrap_or_default();
        if previous == buttons {
            return None;
        }
        if let Some(handler) = self.handler.as_mut() {
            handler(device, previous, buttons);
        }
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<(DeviceHandle, Buttons, Buttons)>>>;

    fn recording_tracker() -> (ButtonTracker, Calls) {
        let calls: Calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        let mut tracker = ButtonTracker::new();
        tracker.set_handler(move |device, old, new| sink.borrow_mut().push((device, old, new)));
        (tracker, calls)
    }

    #[test]
    fn test_duplicate_states_fire_once() {
        let (mut tracker, calls) = recording_tracker();
        let device = DeviceHandle::from_raw(1);
        tracker.reset(device);

        for _ in 0..3 {
            tracker.update(device, Buttons::BUTTON0);
        }

        assert_eq!(
            *calls.borrow(),
            vec![(device, Buttons::empty(), Buttons::BUTTON0)]
        );
        assert_eq!(tracker.get_state(device), Buttons::BUTTON0);
    }

    #[test]
    fn test_handler_sees_old_and_new() {
        let (mut tracker, calls) = recording_tracker();
        let device = DeviceHandle::from_raw(2);
        tracker.reset(device);

        assert_eq!(tracker.update(device, Buttons::LEFT), Some(Buttons::empty()));
        assert_eq!(
            tracker.update(device, Buttons::LEFT | Buttons::OK),
            Some(Buttons::LEFT)
        );
        assert_eq!(tracker.update(device, Buttons::empty()), Some(Buttons::LEFT | Buttons::OK));

        assert_eq!(calls.borrow().len(), 3);
        assert_eq!(
            calls.borrow()[1],
            (device, Buttons::LEFT, Buttons::LEFT | Buttons::OK)
        );
    }

    #[test]
    fn test_reset_and_forget() {
        let (mut tracker, calls) = recording_tracker();
        let device = DeviceHandle::from_raw(3);
        tracker.reset(device);
        tracker.update(device, Buttons::BUTTON2);

        tracker.forget(device);
        assert!(!tracker.is_tracked(device));
        assert_eq!(tracker.get_state(device), Buttons::empty());

        tracker.reset(device);
        assert!(tracker.is_tracked(device));
        assert_eq!(tracker.get_state(device), Buttons::empty());
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_devices_are_independent() {
        let (mut tracker, calls) = recording_tracker();
        let mono = DeviceHandle::from_raw(1);
        let color = DeviceHandle::from_raw(2);
        tracker.reset(mono);
        tracker.reset(color);

        tracker.update(mono, Buttons::BUTTON0);
        tracker.update(color, Buttons::BUTTON0);

        assert_eq!(calls.borrow().len(), 2);
    }
}
