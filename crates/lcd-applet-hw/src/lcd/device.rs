//! Device classes, handles and the bit sets exchanged with the display manager.

use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, COLOR_HEIGHT, COLOR_WIDTH, MONO_HEIGHT, MONO_WIDTH};

/// Display class. Each class has one fixed geometry and pixel format.
///
/// The derived ordering (monochrome before color) is the order in which
/// devices are rendered on every tick.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// 160x43 monochrome panel.
    #[serde(alias = "mono", alias = "bw")]
    Monochrome,
    /// 320x240 color panel.
    #[serde(alias = "qvga")]
    Color,
}

impl DeviceClass {
    /// All classes in render order.
    pub const ALL: [DeviceClass; 2] = [DeviceClass::Monochrome, DeviceClass::Color];

    /// Returns the device type code used in arrival/removal notifications.
    pub fn type_code(&self) -> u32 {
        match self {
            DeviceClass::Monochrome => 0x01,
            DeviceClass::Color => 0x02,
        }
    }

    /// Converts a device type code to a class.
    pub fn from_type_code(code: u32) -> Result<Self> {
        match code {
            0x01 => Ok(DeviceClass::Monochrome),
            0x02 => Ok(DeviceClass::Color),
            _ => Err(Error::UnknownDeviceClass(format!("type code {:#x}", code))),
        }
    }

    /// Returns the capability bit an applet declares to support this class.
    pub fn capability(&self) -> Capabilities {
        match self {
            DeviceClass::Monochrome => Capabilities::MONOCHROME,
            DeviceClass::Color => Capabilities::COLOR,
        }
    }

    /// Returns the display dimensions for this class.
    pub fn dimensions(&self) -> (u16, u16) {
        match self {
            DeviceClass::Monochrome => (MONO_WIDTH, MONO_HEIGHT),
            DeviceClass::Color => (COLOR_WIDTH, COLOR_HEIGHT),
        }
    }

    /// Number of pixels in a frame of this class.
    pub fn pixel_count(&self) -> usize {
        let (w, h) = self.dimensions();
        w as usize * h as usize
    }
}

impl FromStr for DeviceClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "monochrome" | "mono" | "bw" => Ok(DeviceClass::Monochrome),
            "color" | "colour" | "qvga" => Ok(DeviceClass::Color),
            _ => Err(Error::UnknownDeviceClass(s.to_string())),
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceClass::Monochrome => write!(f, "monochrome"),
            DeviceClass::Color => write!(f, "color"),
        }
    }
}

/// Opaque connection handle returned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(u32);

impl ConnectionHandle {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Opaque device handle returned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceHandle(u32);

impl DeviceHandle {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

bitflags! {
    /// Display classes an applet declares support for when connecting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const MONOCHROME = 0x0000_0001;
        const COLOR = 0x0000_0002;
    }
}

impl Capabilities {
    /// Returns true if the class was declared.
    pub fn supports(&self, class: DeviceClass) -> bool {
        self.contains(class.capability())
    }

    /// Declared classes in render order.
    pub fn classes(&self) -> impl Iterator<Item = DeviceClass> + '_ {
        DeviceClass::ALL
            .into_iter()
            .filter(move |class| self.supports(*class))
    }
}

impl FromIterator<DeviceClass> for Capabilities {
    fn from_iter<I: IntoIterator<Item = DeviceClass>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Capabilities::empty(), |caps, class| caps | class.capability())
    }
}

bitflags! {
    /// Soft-button state bitmask.
    ///
    /// Monochrome panels have four unlabeled buttons; color panels have a
    /// navigation pad.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u32 {
        const BUTTON0 = 0x0000_0001;
        const BUTTON1 = 0x0000_0002;
        const BUTTON2 = 0x0000_0004;
        const BUTTON3 = 0x0000_0008;
        const LEFT = 0x0000_0100;
        const RIGHT = 0x0000_0200;
        const OK = 0x0000_0400;
        const CANCEL = 0x0000_0800;
        const UP = 0x0000_1000;
        const DOWN = 0x0000_2000;
        const MENU = 0x0000_4000;
    }
}

impl Buttons {
    /// Buttons physically present on a device class.
    pub fn for_class(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Monochrome => {
                Buttons::BUTTON0 | Buttons::BUTTON1 | Buttons::BUTTON2 | Buttons::BUTTON3
            }
            DeviceClass::Color => {
                Buttons::LEFT
                    | Buttons::RIGHT
                    | Buttons::OK
                    | Buttons::CANCEL
                    | Buttons::UP
                    | Buttons::DOWN
                    | Buttons::MENU
            }
        }
    }

    /// Parses a button list such as `"left+ok"`, `"button0"` or `"0x101"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16)
                .ok()
                .map(Buttons::from_bits_truncate);
        }
        if s.eq_ignore_ascii_case("none") {
            return Some(Buttons::empty());
        }
        s.split(['+', ','])
            .map(|name| Buttons::from_name(&name.trim().to_uppercase()))
            .try_fold(Buttons::empty(), |acc, b| b.map(|b| acc | b))
    }
}

impl std::fmt::Display for Buttons {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<_> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes() {
        assert_eq!(DeviceClass::Monochrome.type_code(), 0x01);
        assert_eq!(DeviceClass::Color.type_code(), 0x02);
        assert_eq!(
            DeviceClass::from_type_code(0x02).unwrap(),
            DeviceClass::Color
        );
        assert!(DeviceClass::from_type_code(0x07).is_err());
    }

    #[test]
    fn test_render_order() {
        assert!(DeviceClass::Monochrome < DeviceClass::Color);
        assert_eq!(
            DeviceClass::ALL,
            [DeviceClass::Monochrome, DeviceClass::Color]
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "mono".parse::<DeviceClass>().unwrap(),
            DeviceClass::Monochrome
        );
        assert_eq!("QVGA".parse::<DeviceClass>().unwrap(), DeviceClass::Color);
        assert!("plasma".parse::<DeviceClass>().is_err());
    }

    #[test]
    fn test_capabilities() {
        let caps: Capabilities = [DeviceClass::Color].into_iter().collect();
        assert!(caps.supports(DeviceClass::Color));
        assert!(!caps.supports(DeviceClass::Monochrome));

        let both = Capabilities::MONOCHROME | Capabilities::COLOR;
        assert_eq!(
            both.classes().collect::<Vec<_>>(),
            vec![DeviceClass::Monochrome, DeviceClass::Color]
        );
    }

    #[test]
    fn test_buttons_parse_and_display() {
        assert_eq!(Buttons::parse("left+ok"), Some(Buttons::LEFT | Buttons::OK));
        assert_eq!(Buttons::parse("0x1"), Some(Buttons::BUTTON0));
        assert_eq!(Buttons::parse("none"), Some(Buttons::empty()));
        assert_eq!(Buttons::parse("jump"), None);

        assert_eq!((Buttons::UP | Buttons::MENU).to_string(), "UP MENU");
        assert_eq!(Buttons::empty().to_string(), "none");
    }

    #[test]
    fn test_buttons_for_class() {
        assert!(Buttons::for_class(DeviceClass::Monochrome).contains(Buttons::BUTTON3));
        assert!(!Buttons::for_class(DeviceClass::Monochrome).contains(Buttons::OK));
        assert!(Buttons::for_class(DeviceClass::Color).contains(Buttons::MENU));
    }
}
