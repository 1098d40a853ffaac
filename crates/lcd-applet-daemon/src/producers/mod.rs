//! Frame producers.
//!
//! A producer draws the content of one device class. The render dispatcher
//! asks it for a fresh frame on every tick and forwards the button changes of
//! its device.

mod cycle;
mod noise;
mod text;
mod triangle;

pub use cycle::CycleProducer;
pub use noise::NoiseProducer;
pub use text::TextProducer;
pub use triangle::TriangleProducer;

use std::time::Instant;

use lcd_applet_hw::{Buttons, DeviceClass, Frame};
use thiserror::Error;

/// Errors raised while building a producer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    #[error("unknown frame producer: {0}")]
    Unknown(String),

    #[error("cannot allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },
}

/// Draws frames for one device class.
pub trait FrameProducer {
    /// Returns the name of the producer.
    fn name(&self) -> &str;

    /// Device class the frames are drawn for.
    fn class(&self) -> DeviceClass;

    /// Draws the frame for the tick at `now`. The frame always has the
    /// geometry of [`FrameProducer::class`].
    fn produce(&mut self, now: Instant) -> Frame;

    /// Called when the buttons of the producer's device change.
    fn on_buttons(&mut self, _old: Buttons, _new: Buttons) {}
}

/// Creates a producer by name.
pub fn create_producer(
    name: &str,
    class: DeviceClass,
) -> Result<Box<dyn FrameProducer>, ProducerError> {
    match name.to_lowercase().as_str() {
        "cycle" => Ok(Box::new(CycleProducer::new(class))),
        "noise" => Ok(Box::new(NoiseProducer::new(class))),
        "text" => Ok(Box::new(TextProducer::new(class))),
        "triangle" => Ok(Box::new(TriangleProducer::new(class)?)),
        _ => Err(ProducerError::Unknown(name.to_string())),
    }
}

/// Returns a list of available producer names.
pub fn available_producers() -> Vec<&'static str> {
    vec!["cycle", "noise", "text", "triangle"]
}

/// Buttons pressed in `new` that were up in `old`.
pub(crate) fn newly_pressed(old: Buttons, new: Buttons) -> Buttons {
    new & !old
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_producer_matches_geometry() {
        let now = Instant::now();
        for name in available_producers() {
            for class in DeviceClass::ALL {
                let mut producer = create_producer(name, class).unwrap();
                assert_eq!(producer.name(), name);
                assert_eq!(producer.class(), class);

                let frame = producer.produce(now);
                assert_eq!(frame.class(), class, "{} on {}", name, class);
                assert_eq!(frame.dimensions(), class.dimensions());
            }
        }
    }

    #[test]
    fn test_unknown_producer() {
        assert_eq!(
            create_producer("plasma", DeviceClass::Color).err(),
            Some(ProducerError::Unknown("plasma".to_string()))
        );
        assert!(create_producer("NOISE", DeviceClass::Monochrome).is_ok());
    }

    #[test]
    fn test_newly_pressed() {
        assert_eq!(
            newly_pressed(Buttons::LEFT, Buttons::LEFT | Buttons::UP),
            Buttons::UP
        );
        assert!(newly_pressed(Buttons::OK, Buttons::empty()).is_empty());
    }
}
