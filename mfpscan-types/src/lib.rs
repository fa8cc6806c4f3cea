//! Type definitions for mfpscan

pub mod button;
pub mod error;
pub mod scan;

pub use button::{ButtonMask, ButtonState};
pub use error::{Error, Result};
pub use scan::{CropArea, Resolution, ScanMode, ScanParameters, ScanSource};
