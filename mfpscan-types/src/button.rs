//! Front-panel button state

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Button bits as reported on the wire
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ButtonMask: u8 {
        const FILE = 1;
        const EMAIL = 1 << 1;
        const IMAGE = 1 << 2;
        const OCR = 1 << 3;
    }
}

/// Scan-to buttons reported by the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    /// Scan to file
    pub file: bool,

    /// Scan to e-mail
    pub email: bool,

    /// Scan to image application
    pub image: bool,

    /// Scan to OCR
    pub ocr: bool,
}

impl ButtonState {
    /// Build from the device bitmask
    ///
    /// Returns `None` if a bit outside [`ButtonMask::all`] is set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        ButtonMask::from_bits(bits).map(Self::from)
    }

    pub fn any_pressed(&self) -> bool {
        self.file || self.email || self.image || self.ocr
    }
}

impl From<ButtonMask> for ButtonState {
    fn from(mask: ButtonMask) -> Self {
        Self {
            file: mask.contains(ButtonMask::FILE),
            email: mask.contains(ButtonMask::EMAIL),
            image: mask.contains(ButtonMask::IMAGE),
            ocr: mask.contains(ButtonMask::OCR),
        }
    }
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buttons[file={}, email={}, image={}, ocr={}]",
            self.file, self.email, self.image, self.ocr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mask() {
        let state = ButtonState::from(ButtonMask::EMAIL | ButtonMask::OCR);
        assert!(!state.file);
        assert!(state.email);
        assert!(!state.image);
        assert!(state.ocr);
        assert!(state.any_pressed());
        assert!(!ButtonState::from(ButtonMask::empty()).any_pressed());
    }

    #[test]
    fn test_unknown_bits() {
        assert_eq!(ButtonState::from_bits(0x05).map(|s| s.file && s.image), Some(true));
        assert_eq!(ButtonState::from_bits(0x10), None);
    }
}
