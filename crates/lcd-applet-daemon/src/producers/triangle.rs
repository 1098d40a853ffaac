//! Rotating triangle drawn with tiny-skia.

use std::time::{Duration, Instant};

use lcd_applet_hw::{Buttons, ColorFrame, DeviceClass, Frame, MonoFrame};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Transform};
use tracing::warn;

use super::{newly_pressed, FrameProducer, ProducerError};

/// Rotation applied per step.
const STEP_DEGREES: f32 = 3.0;
/// Time per rotation step.
const STEP_PERIOD: Duration = Duration::from_millis(33);
/// Distance moved per direction button press.
const MOVE_PIXELS: i32 = 10;

/// A triangle spinning around the display center. Direction buttons move it.
pub struct TriangleProducer {
    class: DeviceClass,
    pixmap: Pixmap,
    angle: f32,
    offset: (i32, i32),
    last_step: Option<Instant>,
}

impl TriangleProducer {
    pub fn new(class: DeviceClass) -> Result<Self, ProducerError> {
        let (width, height) = class.dimensions();
        let (width, height) = (width as u32, height as u32);
        let pixmap = Pixmap::new(width, height).ok_or(ProducerError::Canvas { width, height })?;
        Ok(Self {
            class,
            pixmap,
            angle: 0.0,
            offset: (0, 0),
            last_step: None,
        })
    }

    /// Current rotation in degrees, in `[0, 360]`.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Current offset of the triangle from the display center.
    pub fn offset(&self) -> (i32, i32) {
        self.offset
    }

    /// Advances the rotation by every whole step elapsed since the last one.
    fn advance(&mut self, now: Instant) {
        let Some(last) = self.last_step else {
            self.last_step = Some(now);
            return;
        };
        let elapsed = now.saturating_duration_since(last);
        let steps = (elapsed.as_millis() / STEP_PERIOD.as_millis()) as u32;
        if steps == 0 {
            return;
        }
        self.last_step = Some(last + STEP_PERIOD * steps);
        self.angle += STEP_DEGREES * steps as f32;
        if self.angle > 360.0 {
            self.angle %= 360.0;
        }
    }

    /// Maps direction buttons to a move. Monochrome panels use buttons 0-3
    /// as left, right, up and down.
    fn direction(&self, pressed: Buttons) -> (i32, i32) {
        let (left, right, up, down) = match self.class {
            DeviceClass::Monochrome => (
                Buttons::BUTTON0,
                Buttons::BUTTON1,
                Buttons::BUTTON2,
                Buttons::BUTTON3,
            ),
            DeviceClass::Color => (Buttons::LEFT, Buttons::RIGHT, Buttons::UP, Buttons::DOWN),
        };
        let mut dx = 0;
        let mut dy = 0;
        if pressed.contains(left) {
            dx -= MOVE_PIXELS;
        }
        if pressed.contains(right) {
            dx += MOVE_PIXELS;
        }
        if pressed.contains(up) {
            dy -= MOVE_PIXELS;
        }
        if pressed.contains(down) {
            dy += MOVE_PIXELS;
        }
        (dx, dy)
    }

    fn draw(&mut self) {
        let (width, height) = (self.pixmap.width() as f32, self.pixmap.height() as f32);
        let radius = width.min(height) * 0.4;
        let cx = width / 2.0 + self.offset.0 as f32;
        let cy = height / 2.0 + self.offset.1 as f32;

        self.pixmap.fill(Color::BLACK);

        let mut pb = PathBuilder::new();
        for i in 0..3 {
            let theta = (self.angle + 120.0 * i as f32).to_radians();
            let (x, y) = (cx + radius * theta.sin(), cy - radius * theta.cos());
            if i == 0 {
                pb.move_to(x, y);
            } else {
                pb.line_to(x, y);
            }
        }
        pb.close();

        if let Some(path) = pb.finish() {
            let mut paint = Paint::default();
            match self.class {
                DeviceClass::Monochrome => paint.set_color_rgba8(255, 255, 255, 255),
                DeviceClass::Color => paint.set_color_rgba8(0x00, 0xDD, 0xDD, 255),
            }
            paint.anti_alias = self.class == DeviceClass::Color;
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }
}

impl FrameProducer for TriangleProducer {
    fn name(&self) -> &str {
        "triangle"
    }

    fn class(&self) -> DeviceClass {
        self.class
    }

    fn produce(&mut self, now: Instant) -> Frame {
        self.advance(now);
        self.draw();

        let rgba = self.pixmap.data();
        match self.class {
            DeviceClass::Monochrome => {
                let mut frame = MonoFrame::new();
                for (pixel, chunk) in frame.data_mut().iter_mut().zip(rgba.chunks_exact(4)) {
                    *pixel = chunk[0].max(chunk[1]).max(chunk[2]);
                }
                frame.into()
            }
            DeviceClass::Color => {
                let mut frame = ColorFrame::new();
                if let Err(e) = frame.copy_from_rgba8(rgba) {
                    warn!("Triangle pixmap does not fit the color frame: {}", e);
                }
                frame.into()
            }
        }
    }

    fn on_buttons(&mut self, old: Buttons, new: Buttons) {
        let (dx, dy) = self.direction(newly_pressed(old, new));
        if (dx, dy) == (0, 0) {
            return;
        }
        let (width, height) = self.class.dimensions();
        let (max_x, max_y) = (width as i32 / 2, height as i32 / 2);
        self.offset = (
            (self.offset.0 + dx).clamp(-max_x, max_x),
            (self.offset.1 + dy).clamp(-max_y, max_y),
        );
    }
}
