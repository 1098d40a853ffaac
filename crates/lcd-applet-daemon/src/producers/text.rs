//! Greeting and clock text rendered with a bitmap font.

use std::time::Instant;

use chrono::Local;
use lcd_applet_hw::lcd::rgb888_to_xrgb;
use lcd_applet_hw::{ColorFrame, DeviceClass, Frame, MonoFrame};
use noto_sans_mono_bitmap::{get_raster, get_raster_width, FontWeight, RasterHeight};

use super::FrameProducer;

const WEIGHT: FontWeight = FontWeight::Regular;
const HEIGHT: RasterHeight = RasterHeight::Size16;
const MARGIN: usize = 2;

const TEXT_COLOR: u32 = 0xFFFFFF;
const BACKGROUND: u32 = 0x1A1A2E;

/// Draws a greeting followed by the wall-clock time.
pub struct TextProducer {
    class: DeviceClass,
    greeting: String,
}

impl TextProducer {
    pub fn new(class: DeviceClass) -> Self {
        Self {
            class,
            greeting: format!("Hello {} display.", class),
        }
    }

    /// Lines of text for the given clock string, wrapped to the display width.
    fn lines(&self, clock: &str) -> Vec<String> {
        let (width, _) = self.class.dimensions();
        let columns = (width as usize - 2 * MARGIN) / get_raster_width(WEIGHT, HEIGHT);
        wrap(&format!("{} {}", self.greeting, clock), columns)
    }

    fn render(&self, clock: &str) -> Frame {
        let lines = self.lines(clock);
        match self.class {
            DeviceClass::Monochrome => {
                let mut frame = MonoFrame::new();
                let data = frame.data_mut();
                draw_lines(&lines, self.class, |idx, intensity| {
                    data[idx] = data[idx].max(intensity);
                });
                frame.into()
            }
            DeviceClass::Color => {
                let mut frame = ColorFrame::new();
                frame.clear(BACKGROUND);
                let data = frame.data_mut();
                draw_lines(&lines, self.class, |idx, intensity| {
                    data[idx] = blend(BACKGROUND, TEXT_COLOR, intensity);
                });
                frame.into()
            }
        }
    }
}

impl FrameProducer for TextProducer {
    fn name(&self) -> &str {
        "text"
    }

    fn class(&self) -> DeviceClass {
        self.class
    }

    fn produce(&mut self, _now: Instant) -> Frame {
        let clock = Local::now().format("%H:%M:%S").to_string();
        self.render(&clock)
    }
}

/// Greedy word wrap. Words longer than a line are cut.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let word: String = word.chars().take(columns).collect();
        if current.is_empty() {
            current = word;
        } else if current.chars().count() + 1 + word.chars().count() <= columns {
            current.push(' ');
            current.push_str(&word);
        } else {
            lines.push(std::mem::replace(&mut current, word));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Rasterizes lines top to bottom, calling `plot(pixel index, intensity)`
/// for every non-zero glyph pixel. Lines that do not fit are dropped.
fn draw_lines(lines: &[String], class: DeviceClass, mut plot: impl FnMut(usize, u8)) {
    let (width, height) = class.dimensions();
    let (width, height) = (width as usize, height as usize);
    let glyph_width = get_raster_width(WEIGHT, HEIGHT);
    let line_height = HEIGHT.val();

    for (row, line) in lines.iter().enumerate() {
        let top = MARGIN + row * line_height;
        if top + line_height > height {
            break;
        }
        for (col, c) in line.chars().enumerate() {
            let Some(glyph) = get_raster(c, WEIGHT, HEIGHT).or_else(|| get_raster('?', WEIGHT, HEIGHT))
            else {
                continue;
            };
            let left = MARGIN + col * glyph_width;
            for (gy, raster_row) in glyph.raster().iter().enumerate() {
                for (gx, &intensity) in raster_row.iter().enumerate() {
                    let (x, y) = (left + gx, top + gy);
                    if intensity > 0 && x < width && y < height {
                        plot(y * width + x, intensity);
                    }
                }
            }
        }
    }
}

/// Mixes two `0x00RRGGBB` colors, `amount` 0 giving `from` and 255 giving `to`.
fn blend(from: u32, to: u32, amount: u8) -> u32 {
    let mix = |shift: u32| {
        let a = (from >> shift) & 0xFF;
        let b = (to >> shift) & 0xFF;
        ((a * (255 - amount as u32) + b * amount as u32) / 255) as u8
    };
    rgb888_to_xrgb(mix(16), mix(8), mix(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap() {
        assert_eq!(
            wrap("Hello monochrome display. 12:34:56", 22),
            vec!["Hello monochrome", "display. 12:34:56"]
        );
        assert_eq!(wrap("abcdef", 4), vec!["abcd"]);
        assert!(wrap("   ", 10).is_empty());
    }

    #[test]
    fn test_mono_greeting_fits() {
        let producer = TextProducer::new(DeviceClass::Monochrome);
        let lines = producer.lines("12:34:56");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Hello monochrome"));
        assert!(lines[1].ends_with("12:34:56"));
    }

    #[test]
    fn test_renders_lit_pixels() {
        let producer = TextProducer::new(DeviceClass::Monochrome);
        match producer.render("00:00:00") {
            Frame::Mono(frame) => assert!(frame.lit_count() > 100),
            Frame::Color(_) => panic!("expected a monochrome frame"),
        }
    }

    #[test]
    fn test_color_text_on_background() {
        let producer = TextProducer::new(DeviceClass::Color);
        match producer.render("00:00:00") {
            Frame::Color(frame) => {
                assert_eq!(frame.get_pixel(319, 239), Some(BACKGROUND));
                assert!(frame.data().iter().any(|&p| (p >> 16) & 0xFF > 0xC0));
            }
            Frame::Mono(_) => panic!("expected a color frame"),
        }
    }

    #[test]
    fn test_blend() {
        assert_eq!(blend(0x000000, 0xFFFFFF, 0), 0x000000);
        assert_eq!(blend(0x000000, 0xFFFFFF, 255), 0xFFFFFF);
        assert_eq!(blend(0x000000, 0x0000FF, 128), 0x000080);
    }
}
