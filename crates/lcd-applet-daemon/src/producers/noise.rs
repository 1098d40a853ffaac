//! Random noise.

use std::time::Instant;

use lcd_applet_hw::{ColorFrame, DeviceClass, Frame, MonoFrame};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::FrameProducer;

/// Fills every pixel with a random value on each tick.
pub struct NoiseProducer {
    class: DeviceClass,
    rng: SmallRng,
}

impl NoiseProducer {
    pub fn new(class: DeviceClass) -> Self {
        Self {
            class,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Creates a producer with a fixed seed.
    pub fn with_seed(class: DeviceClass, seed: u64) -> Self {
        Self {
            class,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl FrameProducer for NoiseProducer {
    fn name(&self) -> &str {
        "noise"
    }

    fn class(&self) -> DeviceClass {
        self.class
    }

    fn produce(&mut self, _now: Instant) -> Frame {
        match self.class {
            DeviceClass::Monochrome => {
                let mut frame = MonoFrame::new();
                self.rng.fill(frame.data_mut());
                frame.into()
            }
            DeviceClass::Color => {
                let mut frame = ColorFrame::new();
                for pixel in frame.data_mut() {
                    *pixel = self.rng.gen::<u32>() & 0x00FF_FFFF;
                }
                frame.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_frames() {
        let now = Instant::now();
        let mut a = NoiseProducer::with_seed(DeviceClass::Color, 7);
        let mut b = NoiseProducer::with_seed(DeviceClass::Color, 7);
        assert_eq!(a.produce(now), b.produce(now));
    }

    #[test]
    fn test_frames_change_between_ticks() {
        let now = Instant::now();
        let mut producer = NoiseProducer::with_seed(DeviceClass::Monochrome, 1);
        let first = producer.produce(now);
        let second = producer.produce(now);
        assert_ne!(first, second);
    }

    #[test]
    fn test_mono_noise_lights_some_pixels() {
        let mut producer = NoiseProducer::with_seed(DeviceClass::Monochrome, 42);
        match producer.produce(Instant::now()) {
            Frame::Mono(frame) => {
                let lit = frame.lit_count();
                let total = DeviceClass::Monochrome.pixel_count();
                assert!(lit > total / 4 && lit < total * 3 / 4, "lit = {}", lit);
            }
            Frame::Color(_) => panic!("expected a monochrome frame"),
        }
    }

    #[test]
    fn test_color_noise_keeps_high_byte_clear() {
        let mut producer = NoiseProducer::with_seed(DeviceClass::Color, 3);
        match producer.produce(Instant::now()) {
            Frame::Color(frame) => assert!(frame.data().iter().all(|p| p >> 24 == 0)),
            Frame::Mono(_) => panic!("expected a color frame"),
        }
    }
}
