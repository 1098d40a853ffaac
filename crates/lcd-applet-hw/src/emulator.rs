//! In-process display-manager emulator.
//!
//! Implements [`Driver`] without hardware. Notifications and button events are
//! delivered on a dedicated worker thread in the order they were emitted, the
//! way the vendor service calls back on its own threads. The same thread plays
//! the panel: asynchronous frames are shown when it gets to them, and a newer
//! frame for the same device replaces one still waiting. Synchronous frames
//! are shown before `update_bitmap` returns. [`EmulatorControl`]
//! is a cloneable handle that plugs devices in and out, toggles the service
//! and applet state, and presses buttons from any thread.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::driver::{ButtonCallback, ConnectContext, Driver, NotificationCallback, OpenContext};
use crate::lcd::{
    Buttons, Capabilities, ConnectionHandle, DeviceClass, DeviceHandle, Frame, NotificationCode,
    UpdateFlags,
};
use crate::{Error, Result};

/// One frame accepted by the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub device: DeviceHandle,
    pub class: DeviceClass,
    pub flags: UpdateFlags,
    /// Flags word as passed to the service.
    pub bits: u32,
}

/// Work item for the callback thread.
enum Delivery {
    /// Raw notification code and its parameters.
    Notify(NotificationCallback, u32, [u32; 4]),
    Buttons(ButtonCallback, DeviceHandle, Buttons),
    Refresh,
    Barrier(mpsc::Sender<()>),
}

struct Registration {
    handle: ConnectionHandle,
    name: String,
    capabilities: Capabilities,
    on_notify: Option<NotificationCallback>,
    /// Closed from the service side. Handles stay valid for `close` and
    /// `disconnect` only.
    revoked: bool,
}

struct OpenDevice {
    class: DeviceClass,
    on_buttons: Option<ButtonCallback>,
}

struct EmulatorState {
    initialized: bool,
    service_available: bool,
    applet_enabled: bool,
    attached: BTreeSet<DeviceClass>,
    pressed: BTreeMap<DeviceClass, Buttons>,
    registration: Option<Registration>,
    devices: BTreeMap<DeviceHandle, OpenDevice>,
    next_connection: u32,
    next_device: u32,
    fail_submissions: bool,
    connect_attempts: u32,
    submissions: Vec<Submission>,
    last_frames: BTreeMap<DeviceClass, Frame>,
    pending: BTreeMap<DeviceHandle, (DeviceClass, Frame)>,
    dropped_frames: u32,
    closed: Vec<DeviceHandle>,
    events_tx: Option<mpsc::Sender<Delivery>>,
}

impl EmulatorState {
    fn new() -> Self {
        Self {
            initialized: false,
            service_available: true,
            applet_enabled: true,
            attached: BTreeSet::new(),
            pressed: BTreeMap::new(),
            registration: None,
            devices: BTreeMap::new(),
            next_connection: 1,
            next_device: 1,
            fail_submissions: false,
            connect_attempts: 0,
            submissions: Vec::new(),
            last_frames: BTreeMap::new(),
            pending: BTreeMap::new(),
            dropped_frames: 0,
            closed: Vec::new(),
            events_tx: None,
        }
    }

    fn emit(&self, delivery: Delivery) {
        if let Some(tx) = &self.events_tx {
            // The worker only goes away in deinit, after the sender is dropped.
            let _ = tx.send(delivery);
        }
    }

    /// Sends a lifecycle notification to the registered applet, if any.
    fn notify(&self, code: NotificationCode, param: u32) {
        if let Some(callback) = self
            .active_registration()
            .and_then(|reg| reg.on_notify.clone())
        {
            self.emit(Delivery::Notify(callback, code.raw(), [param, 0, 0, 0]));
        }
    }

    fn active_registration(&self) -> Option<&Registration> {
        self.registration.as_ref().filter(|reg| !reg.revoked)
    }

    fn connected_and_supports(&self, class: DeviceClass) -> bool {
        self.active_registration()
            .is_some_and(|reg| reg.capabilities.supports(class))
    }

    /// Closes the connection from the service side.
    fn revoke(&mut self) {
        if self.active_registration().is_none() {
            return;
        }
        self.notify(NotificationCode::CloseConnection, 0);
        if let Some(reg) = self.registration.as_mut() {
            reg.revoked = true;
            info!("Connection of applet '{}' closed by service", reg.name);
        }
    }

    /// Drops the registration and every device opened through it.
    fn drop_registration(&mut self) {
        self.registration = None;
        self.devices.clear();
        self.pending.clear();
    }

    /// Shows a frame, discarding any asynchronous frame still waiting for
    /// the device.
    fn show(&mut self, device: DeviceHandle, class: DeviceClass, frame: &Frame) {
        if self.pending.remove(&device).is_some() {
            self.dropped_frames += 1;
        }
        self.last_frames.insert(class, frame.clone());
    }

    /// Queues an asynchronous frame. Returns false if it replaced one that
    /// was never shown.
    fn queue(&mut self, device: DeviceHandle, class: DeviceClass, frame: &Frame) -> bool {
        if self.pending.insert(device, (class, frame.clone())).is_some() {
            self.dropped_frames += 1;
            return false;
        }
        self.emit(Delivery::Refresh);
        true
    }

    /// Shows every waiting asynchronous frame of a still open device.
    fn present_pending(&mut self) {
        for (device, (class, frame)) in std::mem::take(&mut self.pending) {
            if self.devices.contains_key(&device) {
                self.last_frames.insert(class, frame);
            }
        }
    }

    fn check_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }
}

fn lock(state: &Mutex<EmulatorState>) -> MutexGuard<'_, EmulatorState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_worker(
    rx: mpsc::Receiver<Delivery>,
    state: Weak<Mutex<EmulatorState>>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("lcd-emulator-events".to_string())
        .spawn(move || {
            for delivery in rx {
                match delivery {
                    Delivery::Notify(callback, raw, params) => {
                        let code = NotificationCode::from_raw(raw);
                        if !callback(code, params) {
                            debug!("Notification {:#06x} not handled by applet", raw);
                        }
                    }
                    Delivery::Buttons(callback, device, buttons) => callback(device, buttons),
                    Delivery::Refresh => {
                        if let Some(state) = state.upgrade() {
                            lock(&state).present_pending();
                        }
                    }
                    Delivery::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Emulator callback thread exiting");
        })
}

/// Emulated display manager.
pub struct Emulator {
    state: Arc<Mutex<EmulatorState>>,
    worker: Option<JoinHandle<()>>,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    /// Creates an emulator with the service running and no devices attached.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EmulatorState::new())),
            worker: None,
        }
    }

    /// Creates an emulator with the given device classes already attached.
    pub fn with_devices(classes: impl IntoIterator<Item = DeviceClass>) -> Self {
        let emulator = Self::new();
        lock(&emulator.state).attached.extend(classes);
        emulator
    }

    /// Returns a control handle usable from any thread.
    pub fn control(&self) -> EmulatorControl {
        EmulatorControl {
            state: self.state.clone(),
        }
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.deinit();
    }
}

impl Driver for Emulator {
    fn init(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.initialized {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel();
        let worker = spawn_worker(rx, Arc::downgrade(&self.state)).map_err(|e| {
            warn!("Failed to start emulator callback thread: {}", e);
            Error::ServiceUnavailable
        })?;
        state.events_tx = Some(tx);
        state.initialized = true;
        self.worker = Some(worker);

        info!("Display manager emulator initialized");
        Ok(())
    }

    fn deinit(&mut self) {
        {
            let mut state = lock(&self.state);
            if !state.initialized {
                return;
            }
            state.initialized = false;
            state.drop_registration();
            state.events_tx = None;
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Emulator callback thread panicked");
            }
        }
        info!("Display manager emulator shut down");
    }

    fn connect(&mut self, ctx: &ConnectContext) -> Result<ConnectionHandle> {
        let mut state = lock(&self.state);
        state.check_initialized()?;
        state.connect_attempts += 1;

        if !state.service_available {
            return Err(Error::ServiceUnavailable);
        }

        if state.registration.is_some() {
            debug!("Replacing existing applet registration");
            state.drop_registration();
        }

        let handle = ConnectionHandle::from_raw(state.next_connection);
        state.next_connection += 1;
        state.registration = Some(Registration {
            handle,
            name: ctx.name.clone(),
            capabilities: ctx.capabilities,
            on_notify: ctx.on_notify.clone(),
            revoked: false,
        });
        info!(
            "Applet '{}' registered (connection {}, autostart: {})",
            ctx.name,
            handle.raw(),
            ctx.autostartable
        );

        // One arrival per attached class the applet can render to.
        let arrivals: Vec<_> = state
            .attached
            .iter()
            .copied()
            .filter(|class| ctx.capabilities.supports(*class))
            .collect();
        for class in arrivals {
            state.notify(NotificationCode::DeviceArrival, class.type_code());
        }

        Ok(handle)
    }

    fn disconnect(&mut self, connection: ConnectionHandle) -> Result<()> {
        let mut state = lock(&self.state);
        state.check_initialized()?;

        let registered = state
            .registration
            .as_ref()
            .is_some_and(|reg| reg.handle == connection);
        if !registered {
            return Err(Error::InvalidHandle(format!(
                "connection {}",
                connection.raw()
            )));
        }

        if let Some(reg) = state.registration.take() {
            info!("Applet '{}' unregistered", reg.name);
        }
        state.drop_registration();
        Ok(())
    }

    fn open_by_type(&mut self, ctx: &OpenContext) -> Result<DeviceHandle> {
        let mut state = lock(&self.state);
        state.check_initialized()?;

        let capabilities = match &state.registration {
            Some(reg) if reg.handle == ctx.connection && reg.revoked => {
                return Err(Error::UnexpectedDisconnect)
            }
            Some(reg) if reg.handle == ctx.connection => reg.capabilities,
            _ => {
                return Err(Error::InvalidHandle(format!(
                    "connection {}",
                    ctx.connection.raw()
                )))
            }
        };
        if !capabilities.supports(ctx.class) {
            return Err(Error::InvalidDeviceClass(ctx.class));
        }
        if !state.attached.contains(&ctx.class) {
            return Err(Error::DeviceUnavailable(ctx.class));
        }

        let handle = DeviceHandle::from_raw(state.next_device);
        state.next_device += 1;
        state.devices.insert(
            handle,
            OpenDevice {
                class: ctx.class,
                on_buttons: ctx.on_buttons.clone(),
            },
        );
        debug!("Opened {} as {}", ctx.class, handle);
        Ok(handle)
    }

    fn close(&mut self, device: DeviceHandle) -> Result<()> {
        let mut state = lock(&self.state);
        state.check_initialized()?;

        match state.devices.remove(&device) {
            Some(open) => {
                state.pending.remove(&device);
                state.closed.push(device);
                debug!("Closed {} ({})", device, open.class);
                Ok(())
            }
            None => Err(Error::InvalidHandle(device.to_string())),
        }
    }

    fn update_bitmap(
        &mut self,
        device: DeviceHandle,
        frame: &Frame,
        flags: UpdateFlags,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        state.check_initialized()?;

        let class = state
            .devices
            .get(&device)
            .map(|open| open.class)
            .ok_or_else(|| Error::InvalidHandle(device.to_string()))?;

        if state.active_registration().is_none() {
            return Err(Error::UnexpectedDisconnect);
        }
        if !state.attached.contains(&class) {
            return Err(Error::DeviceUnavailable(class));
        }
        if frame.class() != class {
            return Err(Error::FrameSize {
                expected: class.pixel_count(),
                actual: frame.class().pixel_count(),
            });
        }
        if state.fail_submissions {
            return Err(Error::SubmissionFailed("rejected by emulator".to_string()));
        }

        state.submissions.push(Submission {
            device,
            class,
            flags,
            bits: flags.bits(),
        });
        if flags.is_sync() {
            state.show(device, class, frame);
        } else if !state.queue(device, class, frame) {
            debug!("Dropped a frame for {} that was never shown", device);
        }
        Ok(())
    }

    fn read_soft_buttons(&mut self, device: DeviceHandle) -> Result<Buttons> {
        let state = lock(&self.state);
        state.check_initialized()?;

        let class = state
            .devices
            .get(&device)
            .map(|open| open.class)
            .ok_or_else(|| Error::InvalidHandle(device.to_string()))?;
        Ok(state.pressed.get(&class).copied().unwrap_or_default())
    }
}

/// Thread-safe control surface of an [`Emulator`].
#[derive(Clone)]
pub struct EmulatorControl {
    state: Arc<Mutex<EmulatorState>>,
}

impl EmulatorControl {
    /// Starts or stops the emulated service. Stopping it while an applet is
    /// registered closes the connection.
    pub fn set_service_available(&self, available: bool) {
        let mut state = lock(&self.state);
        if state.service_available == available {
            return;
        }
        state.service_available = available;
        info!(
            "Emulated service {}",
            if available { "started" } else { "stopped" }
        );

        if !available {
            state.revoke();
        }
    }

    /// Plugs in a device class.
    pub fn attach(&self, class: DeviceClass) {
        let mut state = lock(&self.state);
        if !state.attached.insert(class) {
            return;
        }
        info!("Emulated {} device attached", class);
        if state.connected_and_supports(class) {
            state.notify(NotificationCode::DeviceArrival, class.type_code());
        }
    }

    /// Unplugs a device class. Open handles of the class stay valid for
    /// `close` but reject frames.
    pub fn detach(&self, class: DeviceClass) {
        let mut state = lock(&self.state);
        if !state.attached.remove(&class) {
            return;
        }
        state.pressed.remove(&class);
        info!("Emulated {} device detached", class);
        if state.connected_and_supports(class) {
            state.notify(NotificationCode::DeviceRemoval, class.type_code());
        }
    }

    /// Enables or disables the applet, as the user would from the manager UI.
    pub fn set_applet_enabled(&self, enabled: bool) {
        let mut state = lock(&self.state);
        if state.applet_enabled == enabled {
            return;
        }
        state.applet_enabled = enabled;
        let code = if enabled {
            NotificationCode::AppletEnabled
        } else {
            NotificationCode::AppletDisabled
        };
        state.notify(code, 0);
    }

    /// Closes the applet's connection from the service side. The applet
    /// still has to close its devices and disconnect.
    pub fn close_connection(&self) {
        lock(&self.state).revoke();
    }

    /// Asks the applet to exit.
    pub fn terminate_applet(&self) {
        lock(&self.state).notify(NotificationCode::TerminateApplet, 0);
    }

    /// Sets the pressed buttons of a device class and reports the new state to
    /// every open handle of that class.
    pub fn press(&self, class: DeviceClass, buttons: Buttons) {
        let mut state = lock(&self.state);
        if !state.attached.contains(&class) {
            warn!("Ignoring button press on detached {} device", class);
            return;
        }
        let buttons = buttons & Buttons::for_class(class);
        state.pressed.insert(class, buttons);

        if state.active_registration().is_none() {
            return;
        }
        let targets: Vec<_> = state
            .devices
            .iter()
            .filter(|(_, open)| open.class == class)
            .filter_map(|(handle, open)| open.on_buttons.clone().map(|cb| (*handle, cb)))
            .collect();
        for (handle, callback) in targets {
            state.emit(Delivery::Buttons(callback, handle, buttons));
        }
    }

    /// Releases every button of a device class.
    pub fn release(&self, class: DeviceClass) {
        self.press(class, Buttons::empty());
    }

    /// Makes every following frame submission fail.
    pub fn set_fail_submissions(&self, fail: bool) {
        lock(&self.state).fail_submissions = fail;
    }

    /// Blocks until every callback emitted so far has been delivered and
    /// every queued asynchronous frame has been shown.
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        {
            let state = lock(&self.state);
            if state.events_tx.is_none() {
                return;
            }
            state.emit(Delivery::Barrier(done_tx));
        }
        let _ = done_rx.recv();
    }

    /// Returns true while an applet is registered and not closed.
    pub fn is_connected(&self) -> bool {
        lock(&self.state).active_registration().is_some()
    }

    /// Number of connect calls seen, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        lock(&self.state).connect_attempts
    }

    /// Attached device classes in render order.
    pub fn attached(&self) -> Vec<DeviceClass> {
        lock(&self.state).attached.iter().copied().collect()
    }

    /// Number of currently open device handles.
    pub fn open_device_count(&self) -> usize {
        lock(&self.state).devices.len()
    }

    /// Every accepted frame, oldest first.
    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.state).submissions.clone()
    }

    /// Every closed device handle, in close order.
    pub fn closed_devices(&self) -> Vec<DeviceHandle> {
        lock(&self.state).closed.clone()
    }

    /// Asynchronous frames replaced before they were shown.
    pub fn dropped_frames(&self) -> u32 {
        lock(&self.state).dropped_frames
    }

    /// The frame currently shown on a device class.
    pub fn last_frame(&self, class: DeviceClass) -> Option<Frame> {
        lock(&self.state).last_frames.get(&class).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::{ColorFrame, Priority, UpdateMode};
    use std::sync::Mutex as StdMutex;

    type Log = Arc<StdMutex<Vec<(NotificationCode, u32)>>>;

    fn recording_context(caps: Capabilities) -> (ConnectContext, Log) {
        let log: Log = Arc::new(StdMutex::new(Vec::new()));
        let sink = log.clone();
        let ctx = ConnectContext {
            name: "test applet".to_string(),
            autostartable: false,
            capabilities: caps,
            on_notify: Some(Arc::new(move |code: NotificationCode, params: [u32; 4]| {
                sink.lock().unwrap().push((code, params[0]));
                true
            })),
        };
        (ctx, log)
    }

    #[test]
    fn test_calls_require_init() {
        let mut emulator = Emulator::new();
        let (ctx, _) = recording_context(Capabilities::COLOR);
        assert_eq!(emulator.connect(&ctx), Err(Error::NotInitialized));
    }

    #[test]
    fn test_service_unavailable() {
        let mut emulator = Emulator::new();
        emulator.init().unwrap();
        let control = emulator.control();
        control.set_service_available(false);

        let (ctx, _) = recording_context(Capabilities::COLOR);
        assert_eq!(emulator.connect(&ctx), Err(Error::ServiceUnavailable));
        assert_eq!(control.connect_attempts(), 1);

        control.set_service_available(true);
        assert!(emulator.connect(&ctx).is_ok());
        assert!(control.is_connected());
    }

    #[test]
    fn test_connect_announces_supported_devices() {
        let mut emulator =
            Emulator::with_devices([DeviceClass::Monochrome, DeviceClass::Color]);
        emulator.init().unwrap();
        let control = emulator.control();

        let (ctx, log) = recording_context(Capabilities::COLOR);
        emulator.connect(&ctx).unwrap();
        control.flush();

        assert_eq!(
            *log.lock().unwrap(),
            vec![(NotificationCode::DeviceArrival, 0x02)]
        );
    }

    #[test]
    fn test_open_checks_capabilities_and_attachment() {
        let mut emulator = Emulator::with_devices([DeviceClass::Monochrome]);
        emulator.init().unwrap();

        let (ctx, _) = recording_context(Capabilities::MONOCHROME);
        let connection = emulator.connect(&ctx).unwrap();

        let open = |class| OpenContext {
            connection,
            class,
            on_buttons: None,
        };
        assert_eq!(
            emulator.open_by_type(&open(DeviceClass::Color)),
            Err(Error::InvalidDeviceClass(DeviceClass::Color))
        );

        let device = emulator.open_by_type(&open(DeviceClass::Monochrome)).unwrap();
        assert!(emulator.close(device).is_ok());
        assert!(matches!(emulator.close(device), Err(Error::InvalidHandle(_))));
    }

    #[test]
    fn test_update_bitmap_records_and_fails() {
        let mut emulator = Emulator::with_devices([DeviceClass::Color]);
        emulator.init().unwrap();
        let control = emulator.control();

        let (ctx, _) = recording_context(Capabilities::COLOR);
        let connection = emulator.connect(&ctx).unwrap();
        let device = emulator
            .open_by_type(&OpenContext {
                connection,
                class: DeviceClass::Color,
                on_buttons: None,
            })
            .unwrap();

        let frame = Frame::blank(DeviceClass::Color);
        let flags = UpdateFlags::default();
        emulator.update_bitmap(device, &frame, flags).unwrap();
        control.flush();
        assert_eq!(control.submissions().len(), 1);
        assert_eq!(control.last_frame(DeviceClass::Color), Some(frame.clone()));

        let wrong = Frame::blank(DeviceClass::Monochrome);
        assert!(matches!(
            emulator.update_bitmap(device, &wrong, flags),
            Err(Error::FrameSize { .. })
        ));

        control.set_fail_submissions(true);
        assert!(matches!(
            emulator.update_bitmap(device, &frame, flags),
            Err(Error::SubmissionFailed(_))
        ));

        control.set_fail_submissions(false);
        control.detach(DeviceClass::Color);
        assert_eq!(
            emulator.update_bitmap(device, &frame, flags),
            Err(Error::DeviceUnavailable(DeviceClass::Color))
        );
        assert_eq!(control.submissions().len(), 1);
    }

    #[test]
    fn test_async_frames_wait_for_panel_and_sync_frames_do_not() {
        let mut emulator = Emulator::with_devices([DeviceClass::Color]);
        emulator.init().unwrap();
        let control = emulator.control();

        // Hold the callback thread inside the arrival notification.
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let gate = Arc::new(StdMutex::new(gate_rx));
        let ctx = ConnectContext {
            name: "panel test".to_string(),
            autostartable: false,
            capabilities: Capabilities::COLOR,
            on_notify: Some(Arc::new(move |_: NotificationCode, _: [u32; 4]| {
                let _ = gate.lock().unwrap().recv();
                true
            })),
        };
        let connection = emulator.connect(&ctx).unwrap();
        let device = emulator
            .open_by_type(&OpenContext {
                connection,
                class: DeviceClass::Color,
                on_buttons: None,
            })
            .unwrap();

        let frame = |color: u32| {
            let mut frame = ColorFrame::new();
            frame.clear(color);
            Frame::from(frame)
        };
        let normal = Priority::Normal;
        let async_flags = UpdateFlags::new(UpdateMode::Async, normal);
        let sync_flags = UpdateFlags::new(UpdateMode::Sync, normal);

        emulator.update_bitmap(device, &frame(0x00FF_0000), async_flags).unwrap();
        emulator.update_bitmap(device, &frame(0x0000_FF00), async_flags).unwrap();
        assert_eq!(control.last_frame(DeviceClass::Color), None);
        assert_eq!(control.dropped_frames(), 1);

        emulator.update_bitmap(device, &frame(0x0000_00FF), sync_flags).unwrap();
        assert_eq!(control.last_frame(DeviceClass::Color), Some(frame(0x0000_00FF)));
        assert_eq!(control.dropped_frames(), 2);

        emulator.update_bitmap(device, &frame(0x00FF_FFFF), async_flags).unwrap();
        drop(gate_tx);
        control.flush();
        assert_eq!(control.last_frame(DeviceClass::Color), Some(frame(0x00FF_FFFF)));
        assert_eq!(control.dropped_frames(), 2);

        assert_eq!(
            control.submissions().iter().map(|s| s.bits).collect::<Vec<_>>(),
            vec![0x80, 0x80, 0x8000_0080, 0x80]
        );
    }

    #[test]
    fn test_button_delivery_and_polling() {
        let mut emulator = Emulator::with_devices([DeviceClass::Monochrome]);
        emulator.init().unwrap();
        let control = emulator.control();

        let (ctx, _) = recording_context(Capabilities::MONOCHROME);
        let connection = emulator.connect(&ctx).unwrap();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let device = emulator
            .open_by_type(&OpenContext {
                connection,
                class: DeviceClass::Monochrome,
                on_buttons: Some(Arc::new(move |device: DeviceHandle, buttons: Buttons| {
                    sink.lock().unwrap().push((device, buttons));
                })),
            })
            .unwrap();

        // Color-only buttons are masked off for a monochrome panel.
        control.press(DeviceClass::Monochrome, Buttons::BUTTON1 | Buttons::OK);
        control.flush();

        assert_eq!(*seen.lock().unwrap(), vec![(device, Buttons::BUTTON1)]);
        assert_eq!(emulator.read_soft_buttons(device), Ok(Buttons::BUTTON1));
    }

    #[test]
    fn test_close_connection_keeps_handles_for_cleanup() {
        let mut emulator = Emulator::with_devices([DeviceClass::Color]);
        emulator.init().unwrap();
        let control = emulator.control();

        let (ctx, log) = recording_context(Capabilities::COLOR);
        let connection = emulator.connect(&ctx).unwrap();
        let device = emulator
            .open_by_type(&OpenContext {
                connection,
                class: DeviceClass::Color,
                on_buttons: None,
            })
            .unwrap();

        control.close_connection();
        control.flush();

        assert!(!control.is_connected());
        assert_eq!(
            log.lock().unwrap().last(),
            Some(&(NotificationCode::CloseConnection, 0))
        );
        assert_eq!(
            emulator.update_bitmap(device, &Frame::blank(DeviceClass::Color), UpdateFlags::default()),
            Err(Error::UnexpectedDisconnect)
        );

        // Handles stay valid for cleanup.
        assert_eq!(control.open_device_count(), 1);
        assert!(emulator.close(device).is_ok());
        assert!(emulator.disconnect(connection).is_ok());
        assert_eq!(control.closed_devices(), vec![device]);
        assert!(emulator.disconnect(connection).is_err());
    }

    #[test]
    fn test_deinit_is_idempotent() {
        let mut emulator = Emulator::new();
        emulator.init().unwrap();
        emulator.deinit();
        emulator.deinit();
        let (ctx, _) = recording_context(Capabilities::COLOR);
        assert_eq!(emulator.connect(&ctx), Err(Error::NotInitialized));
    }
}
