//! PNG snapshots of submitted frames.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lcd_applet_hw::{DeviceClass, EmulatorControl, Frame};
use tracing::info;

/// Encodes a frame as an RGBA PNG.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    let (width, height) = frame.dimensions();
    let rgba = frame.to_rgba8();

    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, width as u32, height as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&rgba)?;
    }

    Ok(png_data)
}

/// Writes the frame shown on every class to `<dir>/<class>.png`, after the
/// panels caught up with queued frames. Returns the written paths.
pub fn write_snapshots(control: &EmulatorControl, dir: &Path) -> Result<Vec<PathBuf>> {
    control.flush();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create snapshot directory {}", dir.display()))?;

    let mut written = Vec::new();
    for class in DeviceClass::ALL {
        let Some(frame) = control.last_frame(class) else {
            continue;
        };
        let path = dir.join(format!("{}.png", class));
        std::fs::write(&path, encode_png(&frame)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} snapshot to {}", class, path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcd_applet_hw::{
        Capabilities, ConnectContext, Driver, Emulator, MonoFrame, OpenContext, UpdateFlags,
    };

    #[test]
    fn test_encode_png_header() {
        let mut frame = MonoFrame::new();
        frame.set_pixel(0, 0, true);
        let png_data = encode_png(&frame.into()).unwrap();

        assert_eq!(&png_data[..8], b"\x89PNG\r\n\x1a\n");
        // IHDR width and height
        assert_eq!(&png_data[16..20], &160u32.to_be_bytes());
        assert_eq!(&png_data[20..24], &43u32.to_be_bytes());
    }

    #[test]
    fn test_write_snapshots() {
        let mut emulator = Emulator::with_devices([DeviceClass::Color]);
        emulator.init().unwrap();
        let control = emulator.control();
        let connection = emulator
            .connect(&ConnectContext {
                name: "snapshot test".to_string(),
                autostartable: false,
                capabilities: Capabilities::COLOR,
                on_notify: None,
            })
            .unwrap();
        let device = emulator
            .open_by_type(&OpenContext {
                connection,
                class: DeviceClass::Color,
                on_buttons: None,
            })
            .unwrap();
        emulator
            .update_bitmap(device, &Frame::blank(DeviceClass::Color), UpdateFlags::default())
            .unwrap();

        let dir = std::env::temp_dir().join(format!("lcdappletd-snapshots-{}", std::process::id()));
        let written = write_snapshots(&control, &dir).unwrap();
        assert_eq!(written, vec![dir.join("color.png")]);
        assert!(std::fs::metadata(&written[0]).unwrap().len() > 8);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
