//! Color space definitions.

/// A PDF color space, reduced to its name and component count. Full
/// color management is out of scope; content objects only report which
/// space a color value belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorSpace {
    pub name: String,
    pub ncomponents: usize,
}

impl ColorSpace {
    pub fn new(name: &str, ncomponents: usize) -> Self {
        Self {
            name: name.to_string(),
            ncomponents,
        }
    }

    /// Look up one of the device or special color space families.
    pub fn predefined(name: &str) -> Option<ColorSpace> {
        let n = match name {
            "DeviceGray" | "CalGray" | "G" => 1,
            "DeviceRGB" | "CalRGB" | "Lab" | "RGB" => 3,
            "DeviceCMYK" | "CMYK" => 4,
            "Separation" | "Indexed" | "Pattern" | "I" => 1,
            "DeviceN" => 1,
            _ => return None,
        };
        // Inline image abbreviations expand to the canonical name.
        let canonical = match name {
            "G" => "DeviceGray",
            "RGB" => "DeviceRGB",
            "CMYK" => "DeviceCMYK",
            "I" => "Indexed",
            other => other,
        };
        Some(ColorSpace::new(canonical, n))
    }

    pub fn device_gray() -> ColorSpace {
        ColorSpace::new("DeviceGray", 1)
    }
}
