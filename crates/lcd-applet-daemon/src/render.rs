//! Render dispatcher.
//!
//! On every tick, asks each open device's producer for a frame and submits
//! it, monochrome first. Submission failures are logged and otherwise
//! ignored; they never change session or device state.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use lcd_applet_hw::{Buttons, Capabilities, DeviceClass, Driver, Error, UpdateFlags};
use tracing::{debug, warn};

use crate::applet::AppletState;
use crate::config::RenderConfig;
use crate::producers::{create_producer, FrameProducer, ProducerError};
use crate::session::Session;

/// Minimum time between two logs of repeated failures.
const ERROR_LOG_PERIOD: Duration = Duration::from_secs(60);

/// Outcome of one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// The applet was not connected and nothing was rendered.
    pub skipped: bool,
    /// Classes whose frame was accepted.
    pub submitted: Vec<DeviceClass>,
    /// Classes whose frame was rejected.
    pub failed: Vec<DeviceClass>,
}

/// Rate limiter for repeated submission errors.
struct ErrorThrottle {
    consecutive: u32,
    last_log: Option<Instant>,
}

impl ErrorThrottle {
    fn new() -> Self {
        Self {
            consecutive: 0,
            last_log: None,
        }
    }

    /// Logs the first failure, then at most once per period with a count.
    fn record(&mut self, class: DeviceClass, error: &Error, now: Instant) {
        self.consecutive += 1;
        match self.last_log {
            Some(last) if now.saturating_duration_since(last) < ERROR_LOG_PERIOD => return,
            Some(last) => warn!(
                "Render error on {} display (repeated {} times in {:?}): {}",
                class,
                self.consecutive,
                now.saturating_duration_since(last),
                error
            ),
            None => warn!("Render error on {} display: {}", class, error),
        }
        self.last_log = Some(now);
        self.consecutive = 0;
    }

    fn reset(&mut self) {
        self.consecutive = 0;
        self.last_log = None;
    }
}

/// Draws and submits frames for every open device.
pub struct RenderDispatcher {
    producers: BTreeMap<DeviceClass, Box<dyn FrameProducer>>,
    flags: UpdateFlags,
    throttle: ErrorThrottle,
}

impl RenderDispatcher {
    pub fn new(flags: UpdateFlags) -> Self {
        Self {
            producers: BTreeMap::new(),
            flags,
            throttle: ErrorThrottle::new(),
        }
    }

    /// Creates a dispatcher with the configured producer for each declared
    /// class.
    pub fn from_config(
        config: &RenderConfig,
        capabilities: Capabilities,
    ) -> Result<Self, ProducerError> {
        let mut dispatcher = Self::new(config.update_flags());
        for class in capabilities.classes() {
            let producer = create_producer(config.producer_for(class), class)?;
            debug!("Using '{}' producer for {} display", producer.name(), class);
            dispatcher.set_producer(producer);
        }
        Ok(dispatcher)
    }

    /// Installs the producer for its class, replacing the previous one.
    pub fn set_producer(&mut self, producer: Box<dyn FrameProducer>) {
        self.producers.insert(producer.class(), producer);
    }

    /// Forwards a button change to the producer of a class.
    pub fn on_buttons(&mut self, class: DeviceClass, old: Buttons, new: Buttons) {
        if let Some(producer) = self.producers.get_mut(&class) {
            producer.on_buttons(old, new);
        }
    }

    /// Renders one tick.
    pub fn tick<D: Driver>(
        &mut self,
        state: AppletState,
        session: &mut Session<D>,
        now: Instant,
    ) -> TickReport {
        let mut report = TickReport::default();
        if state != AppletState::Connected {
            report.skipped = true;
            return report;
        }

        let open: Vec<_> = session.open_devices().collect();
        for (class, device) in open {
            let Some(producer) = self.producers.get_mut(&class) else {
                debug!("No producer for {} display ({}), skipping", class, device);
                continue;
            };
            let frame = producer.produce(now);
            match session.submit(device, &frame, self.flags) {
                Ok(()) => report.submitted.push(class),
                Err(e) => {
                    self.throttle.record(class, &e, now);
                    report.failed.push(class);
                }
            }
        }

        if report.failed.is_empty() && !report.submitted.is_empty() {
            self.throttle.reset();
        }
        report
    }
}
