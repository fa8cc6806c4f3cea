//! Scan request parameters

use std::fmt;

use crate::error::{Error, Result};

/// Image acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanMode {
    /// 24-bit color
    #[default]
    Color,

    /// 8-bit grayscale
    Gray,

    /// Grayscale with error-diffusion dithering
    GrayDithered,

    /// 1-bit line art
    Text,
}

impl ScanMode {
    /// Output channels per pixel
    pub fn channels(self) -> usize {
        match self {
            Self::Color => 3,
            _ => 1,
        }
    }

    pub fn is_color(self) -> bool {
        matches!(self, Self::Color)
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Color => "Color",
            Self::Gray => "Gray",
            Self::GrayDithered => "Gray (dithered)",
            Self::Text => "Text",
        };
        f.write_str(name)
    }
}

/// Paper source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanSource {
    /// ADF if documents are loaded, flatbed otherwise
    #[default]
    Auto,
    Flatbed,
    AdfSimplex,
    AdfDuplex,
}

/// Resolution in dots per inch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub x: u32,
    pub y: u32,
}

impl Resolution {
    pub fn new(x: u32, y: u32) -> Result<Self> {
        if x == 0 || y == 0 {
            return Err(Error::Validation(format!(
                "resolution must be positive, got {}x{}",
                x, y
            )));
        }
        Ok(Self { x, y })
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self { x: 300, y: 300 }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}dpi", self.x, self.y)
    }
}

/// Crop rectangle in device pixels
///
/// Stored as offset + size. The wire format wants two corner points,
/// see [`CropArea::corners`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropArea {
    pub offset_x: u32,
    pub width: u32,
    pub offset_y: u32,
    pub height: u32,
}

impl CropArea {
    pub fn new(offset_x: u32, width: u32, offset_y: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Validation(format!(
                "crop area must not be empty, got {}x{}",
                width, height
            )));
        }
        if offset_x.checked_add(width).is_none() || offset_y.checked_add(height).is_none() {
            return Err(Error::Validation("crop area overflows device coordinates".into()));
        }
        Ok(Self {
            offset_x,
            width,
            offset_y,
            height,
        })
    }

    /// Top-left and bottom-right corners as `(x0, y0, x1, y1)`
    pub fn corners(&self) -> (u32, u32, u32, u32) {
        (
            self.offset_x,
            self.offset_y,
            self.offset_x + self.width,
            self.offset_y + self.height,
        )
    }
}

impl Default for CropArea {
    /// A4 at 300 dpi
    fn default() -> Self {
        Self {
            offset_x: 0,
            width: 2480,
            offset_y: 0,
            height: 3507,
        }
    }
}

/// Everything a scan job is negotiated from
///
/// Values are validated on the way in, so a `ScanParameters` is always
/// renderable into a command block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanParameters {
    pub resolution: Resolution,
    pub mode: ScanMode,
    pub source: ScanSource,
    brightness: i32,
    contrast: i32,
    pub crop: CropArea,
    pub compression: bool,
}

impl ScanParameters {
    /// Lower bound for brightness and contrast
    pub const ADJUST_MIN: i32 = -50;

    /// Upper bound for brightness and contrast
    pub const ADJUST_MAX: i32 = 50;

    pub fn brightness(&self) -> i32 {
        self.brightness
    }

    pub fn contrast(&self) -> i32 {
        self.contrast
    }

    pub fn set_brightness(&mut self, value: i32) -> Result<()> {
        self.brightness = Self::check_adjust("brightness", value)?;
        Ok(())
    }

    pub fn set_contrast(&mut self, value: i32) -> Result<()> {
        self.contrast = Self::check_adjust("contrast", value)?;
        Ok(())
    }

    pub fn set_resolution(&mut self, x: u32, y: u32) -> Result<()> {
        self.resolution = Resolution::new(x, y)?;
        Ok(())
    }

    pub fn set_crop(&mut self, offset_x: u32, width: u32, offset_y: u32, height: u32) -> Result<()> {
        self.crop = CropArea::new(offset_x, width, offset_y, height)?;
        Ok(())
    }

    /// Bytes in one decoded scanline for the current mode and crop
    pub fn bytes_per_line(&self) -> usize {
        match self.mode {
            ScanMode::Text => (self.crop.width as usize).div_ceil(8),
            mode => self.crop.width as usize * mode.channels(),
        }
    }

    fn check_adjust(field: &'static str, value: i32) -> Result<i32> {
        if !(Self::ADJUST_MIN..=Self::ADJUST_MAX).contains(&value) {
            return Err(Error::OutOfRange {
                field,
                value: value as i64,
                min: Self::ADJUST_MIN as i64,
                max: Self::ADJUST_MAX as i64,
            });
        }
        Ok(value)
    }
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            mode: ScanMode::default(),
            source: ScanSource::default(),
            brightness: 0,
            contrast: 0,
            crop: CropArea::default(),
            compression: true,
        }
    }
}

impl fmt::Display for ScanParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scan[{} {} {:?} crop={}x{}+{}+{}]",
            self.resolution,
            self.mode,
            self.source,
            self.crop.width,
            self.crop.height,
            self.crop.offset_x,
            self.crop.offset_y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ScanParameters::default();
        assert_eq!(params.resolution, Resolution { x: 300, y: 300 });
        assert_eq!(params.mode, ScanMode::Color);
        assert_eq!(params.brightness(), 0);
        assert!(params.compression);
    }

    #[test]
    fn test_adjust_range() {
        let mut params = ScanParameters::default();
        params.set_brightness(-50).unwrap();
        params.set_contrast(50).unwrap();
        assert_eq!(params.brightness(), -50);
        assert_eq!(params.contrast(), 50);

        assert!(matches!(
            params.set_brightness(51),
            Err(Error::OutOfRange { field: "brightness", .. })
        ));
        // Rejected value leaves the old one in place
        assert_eq!(params.brightness(), -50);
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let mut params = ScanParameters::default();
        assert!(params.set_resolution(0, 300).is_err());
        assert!(params.set_resolution(600, 600).is_ok());
        assert_eq!(params.resolution.x, 600);
    }

    #[test]
    fn test_crop_corners() {
        let crop = CropArea::new(10, 100, 20, 200).unwrap();
        assert_eq!(crop.corners(), (10, 20, 110, 220));
    }

    #[test]
    fn test_empty_crop_rejected() {
        assert!(CropArea::new(0, 0, 0, 10).is_err());
        assert!(CropArea::new(0, 10, 0, 0).is_err());
        assert!(CropArea::new(u32::MAX, 2, 0, 1).is_err());
    }

    #[test]
    fn test_bytes_per_line() {
        let mut params = ScanParameters::default();
        params.set_crop(0, 9, 0, 1).unwrap();

        params.mode = ScanMode::Color;
        assert_eq!(params.bytes_per_line(), 27);
        params.mode = ScanMode::Gray;
        assert_eq!(params.bytes_per_line(), 9);
        params.mode = ScanMode::Text;
        assert_eq!(params.bytes_per_line(), 2);
    }
}
