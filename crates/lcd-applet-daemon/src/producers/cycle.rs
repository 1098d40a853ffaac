//! Solid color cycling.

use std::time::Instant;

use lcd_applet_hw::{ColorFrame, DeviceClass, Frame, MonoFrame};

use super::FrameProducer;

/// Red, green and blue in turn.
const COLORS: [u32; 3] = [0x00FF_0000, 0x0000_FF00, 0x0000_00FF];

/// Fills the display with one solid color per tick.
///
/// Monochrome displays alternate between fully lit and fully dark.
pub struct CycleProducer {
    class: DeviceClass,
    step: usize,
}

impl CycleProducer {
    pub fn new(class: DeviceClass) -> Self {
        Self { class, step: 0 }
    }
}

impl FrameProducer for CycleProducer {
    fn name(&self) -> &str {
        "cycle"
    }

    fn class(&self) -> DeviceClass {
        self.class
    }

    fn produce(&mut self, _now: Instant) -> Frame {
        let step = self.step;
        self.step = self.step.wrapping_add(1);

        match self.class {
            DeviceClass::Monochrome => {
                let mut frame = MonoFrame::new();
                frame.fill(if step % 2 == 0 { 0xFF } else { 0x00 });
                frame.into()
            }
            DeviceClass::Color => {
                let mut frame = ColorFrame::new();
                frame.clear(COLORS[step % COLORS.len()]);
                frame.into()
            }
        }
    }
}
