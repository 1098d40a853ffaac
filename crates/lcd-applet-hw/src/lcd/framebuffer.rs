//! Frame buffers for both display classes.
//!
//! Monochrome frames hold one byte per pixel; a value of 128 or more lights the
//! pixel. Color frames hold one packed `0x00RRGGBB` word per pixel.

use crate::lcd::DeviceClass;
use crate::{Error, Result, COLOR_HEIGHT, COLOR_WIDTH, MONO_HEIGHT, MONO_WIDTH};

/// Pixel count of a monochrome frame.
pub const MONO_PIXEL_COUNT: usize = MONO_WIDTH as usize * MONO_HEIGHT as usize;

/// Pixel count of a color frame.
pub const COLOR_PIXEL_COUNT: usize = COLOR_WIDTH as usize * COLOR_HEIGHT as usize;

/// Brightness threshold at which a monochrome pixel is lit.
pub const MONO_ON_THRESHOLD: u8 = 128;

/// Bitmap format identifier of a monochrome frame.
pub const MONO_FORMAT: u32 = 0x0000_0001;

/// Bitmap format identifier of a color frame.
pub const COLOR_FORMAT: u32 = 0x0000_0003;

/// 160x43 monochrome frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonoFrame {
    data: Vec<u8>,
}

impl Default for MonoFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoFrame {
    /// Creates a frame with every pixel dark.
    pub fn new() -> Self {
        Self {
            data: vec![0; MONO_PIXEL_COUNT],
        }
    }

    /// Creates a frame from raw bytes, one per pixel.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() != MONO_PIXEL_COUNT {
            return Err(Error::FrameSize {
                expected: MONO_PIXEL_COUNT,
                actual: data.len(),
            });
        }
        Ok(Self { data })
    }

    pub fn width(&self) -> u16 {
        MONO_WIDTH
    }

    pub fn height(&self) -> u16 {
        MONO_HEIGHT
    }

    /// Returns a reference to the raw pixel data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns a mutable reference to the raw pixel data.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Sets every pixel to the same value.
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// Lights or darkens a pixel. Out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: u16, y: u16, on: bool) {
        if x < MONO_WIDTH && y < MONO_HEIGHT {
            let idx = y as usize * MONO_WIDTH as usize + x as usize;
            self.data[idx] = if on { 0xFF } else { 0x00 };
        }
    }

    /// Returns whether a pixel is lit.
    pub fn is_lit(&self, x: u16, y: u16) -> Option<bool> {
        if x < MONO_WIDTH && y < MONO_HEIGHT {
            let idx = y as usize * MONO_WIDTH as usize + x as usize;
            Some(self.data[idx] >= MONO_ON_THRESHOLD)
        } else {
            None
        }
    }

    /// Number of lit pixels.
    pub fn lit_count(&self) -> usize {
        self.data.iter().filter(|&&p| p >= MONO_ON_THRESHOLD).count()
    }

    /// Converts the frame to RGBA8 bytes for PNG encoding.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.data.len() * 4);
        for &pixel in &self.data {
            let v = if pixel >= MONO_ON_THRESHOLD { 255 } else { 0 };
            rgba.extend_from_slice(&[v, v, v, 255]);
        }
        rgba
    }
}

/// 320x240 color frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorFrame {
    data: Vec<u32>,
}

impl Default for ColorFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorFrame {
    /// Creates a frame initialized to black.
    pub fn new() -> Self {
        Self {
            data: vec![0; COLOR_PIXEL_COUNT],
        }
    }

    pub fn width(&self) -> u16 {
        COLOR_WIDTH
    }

    pub fn height(&self) -> u16 {
        COLOR_HEIGHT
    }

    /// Returns a reference to the raw pixel data.
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Returns a mutable reference to the raw pixel data.
    pub fn data_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }

    /// Clears the frame to a solid color.
    pub fn clear(&mut self, color: u32) {
        self.data.fill(color & 0x00FF_FFFF);
    }

    /// Sets a pixel at the given coordinates.
    pub fn set_pixel(&mut self, x: u16, y: u16, color: u32) {
        if x < COLOR_WIDTH && y < COLOR_HEIGHT {
            let idx = y as usize * COLOR_WIDTH as usize + x as usize;
            self.data[idx] = color & 0x00FF_FFFF;
        }
    }

    /// Gets a pixel at the given coordinates.
    pub fn get_pixel(&self, x: u16, y: u16) -> Option<u32> {
        if x < COLOR_WIDTH && y < COLOR_HEIGHT {
            let idx = y as usize * COLOR_WIDTH as usize + x as usize;
            Some(self.data[idx])
        } else {
            None
        }
    }

    /// Copies pixel data from an RGBA8 slice.
    pub fn copy_from_rgba8(&mut self, data: &[u8]) -> Result<()> {
        let expected_len = self.data.len() * 4;
        if data.len() != expected_len {
            return Err(Error::FrameSize {
                expected: expected_len,
                actual: data.len(),
            });
        }

        for (i, chunk) in data.chunks_exact(4).enumerate() {
            self.data[i] = rgb888_to_xrgb(chunk[0], chunk[1], chunk[2]);
        }
        Ok(())
    }

    /// Converts the frame to RGBA8 bytes for PNG encoding.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.data.len() * 4);
        for &pixel in &self.data {
            let (r, g, b) = xrgb_to_rgb888(pixel);
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
        rgba
    }
}

/// A frame for either display class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Mono(MonoFrame),
    Color(ColorFrame),
}

impl Frame {
    /// Creates a blank frame for a device class.
    pub fn blank(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Monochrome => Frame::Mono(MonoFrame::new()),
            DeviceClass::Color => Frame::Color(ColorFrame::new()),
        }
    }

    /// The device class this frame is laid out for.
    pub fn class(&self) -> DeviceClass {
        match self {
            Frame::Mono(_) => DeviceClass::Monochrome,
            Frame::Color(_) => DeviceClass::Color,
        }
    }

    /// The bitmap format identifier sent with the frame.
    pub fn format(&self) -> u32 {
        match self {
            Frame::Mono(_) => MONO_FORMAT,
            Frame::Color(_) => COLOR_FORMAT,
        }
    }

    pub fn dimensions(&self) -> (u16, u16) {
        self.class().dimensions()
    }

    /// Converts the frame to RGBA8 bytes for PNG encoding.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self {
            Frame::Mono(frame) => frame.to_rgba8(),
            Frame::Color(frame) => frame.to_rgba8(),
        }
    }
}

impl From<MonoFrame> for Frame {
    fn from(frame: MonoFrame) -> Self {
        Frame::Mono(frame)
    }
}

impl From<ColorFrame> for Frame {
    fn from(frame: ColorFrame) -> Self {
        Frame::Color(frame)
    }
}

/// Packs RGB888 into a `0x00RRGGBB` word.
#[inline]
pub fn rgb888_to_xrgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Unpacks a `0x00RRGGBB` word.
#[inline]
pub fn xrgb_to_rgb888(pixel: u32) -> (u8, u8, u8) {
    (
        ((pixel >> 16) & 0xFF) as u8,
        ((pixel >> 8) & 0xFF) as u8,
        (pixel & 0xFF) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xrgb_packing() {
        assert_eq!(rgb888_to_xrgb(255, 0, 0), 0x00FF0000);
        assert_eq!(rgb888_to_xrgb(0, 255, 0), 0x0000FF00);
        assert_eq!(rgb888_to_xrgb(0, 0, 255), 0x000000FF);
        assert_eq!(xrgb_to_rgb888(0x00123456), (0x12, 0x34, 0x56));
    }

    #[test]
    fn test_mono_threshold() {
        let mut frame = MonoFrame::new();
        frame.data_mut()[0] = 127;
        frame.data_mut()[1] = 128;
        assert_eq!(frame.is_lit(0, 0), Some(false));
        assert_eq!(frame.is_lit(1, 0), Some(true));
        assert_eq!(frame.lit_count(), 1);
        assert_eq!(frame.is_lit(160, 0), None);
    }

    #[test]
    fn test_mono_from_bytes_checks_size() {
        assert!(MonoFrame::from_bytes(vec![0; MONO_PIXEL_COUNT]).is_ok());
        assert_eq!(
            MonoFrame::from_bytes(vec![0; 10]),
            Err(Error::FrameSize {
                expected: MONO_PIXEL_COUNT,
                actual: 10
            })
        );
    }

    #[test]
    fn test_color_frame_ops() {
        let mut frame = ColorFrame::new();
        assert_eq!((frame.width(), frame.height()), (320, 240));

        frame.set_pixel(10, 20, 0xFF00FF00);
        assert_eq!(frame.get_pixel(10, 20), Some(0x0000FF00));

        frame.clear(0x000000FF);
        assert_eq!(frame.get_pixel(0, 0), Some(0x000000FF));
        assert_eq!(frame.get_pixel(320, 0), None);
    }

    #[test]
    fn test_frame_class_and_format() {
        let mono = Frame::blank(DeviceClass::Monochrome);
        assert_eq!(mono.class(), DeviceClass::Monochrome);
        assert_eq!(mono.format(), MONO_FORMAT);
        assert_eq!(mono.to_rgba8().len(), MONO_PIXEL_COUNT * 4);

        let color = Frame::blank(DeviceClass::Color);
        assert_eq!(color.format(), COLOR_FORMAT);
        assert_eq!(color.dimensions(), (320, 240));
    }
}
