//! Fixed-shape device responses
//!
//! Parsers here are strict: exact length, exact byte patterns. Firmware that
//! answers anything else is treated as broken, not guessed at.

use std::fmt;

use mfpscan_types::ButtonState;

use crate::{
    constants::response,
    error::{Error, Result},
};

/// Answer to a session open/close request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Ready,
    Busy,
}

/// Answer to a source-select request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    DocumentsLoaded,
    NoDocuments,
}

/// Geometry the device reports for the negotiated resolution and mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicParameters {
    pub x_res: u32,
    pub y_res: u32,
    pub planes: u32,
    pub width_mm: u32,
    pub width_px: u32,
    pub height_mm: u32,
    pub height_px: u32,
}

impl fmt::Display for BasicParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}dpi planes={} {}x{}px ({}x{}mm)",
            self.x_res,
            self.y_res,
            self.planes,
            self.width_px,
            self.height_px,
            self.width_mm,
            self.height_mm
        )
    }
}

fn expect_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(Error::ResponseLength {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

pub fn decode_session(data: &[u8]) -> Result<SessionStatus> {
    expect_len(data, response::SESSION_LEN)?;

    if data == response::SESSION_READY {
        Ok(SessionStatus::Ready)
    } else if data == response::SESSION_BUSY {
        Ok(SessionStatus::Busy)
    } else {
        Err(Error::InvalidResponse(format!(
            "session response {}",
            hex::encode(data)
        )))
    }
}

pub fn decode_source_status(data: &[u8]) -> Result<SourceStatus> {
    expect_len(data, response::SOURCE_STATUS_LEN)?;

    match data[0] {
        response::SOURCE_READY => Ok(SourceStatus::DocumentsLoaded),
        response::SOURCE_EMPTY => Ok(SourceStatus::NoDocuments),
        other => Err(Error::InvalidResponse(format!(
            "source status 0x{:02X}",
            other
        ))),
    }
}

pub fn decode_button_query(data: &[u8]) -> Result<()> {
    expect_len(data, response::BUTTON_QUERY.len())?;

    if data != response::BUTTON_QUERY {
        return Err(Error::InvalidResponse(format!(
            "button query response {}",
            hex::encode(data)
        )));
    }
    Ok(())
}

pub fn decode_button_state(data: &[u8]) -> Result<ButtonState> {
    expect_len(data, response::BUTTON_STATE_LEN)?;

    let (prefix, rest) = data.split_at(response::BUTTON_STATE_PREFIX.len());
    let (mask, padding) = (rest[0], &rest[1..]);
    let state = ButtonState::from_bits(mask)
        .filter(|_| prefix == response::BUTTON_STATE_PREFIX && padding.iter().all(|b| *b == 0));
    state.ok_or_else(|| {
        Error::InvalidResponse(format!("button state response {}", hex::encode(data)))
    })
}

/// Parse `xres,yres,planes,width_mm,width_px,height_mm,height_px[,]\0`
pub fn decode_basic_parameters(data: &[u8]) -> Result<BasicParameters> {
    let Some((&end, body)) = data.split_last() else {
        return Err(Error::InvalidResponse("empty basic parameter response".into()));
    };
    if end != response::BASIC_PARAMETERS_END {
        return Err(Error::InvalidResponse(
            "basic parameter response is not terminated".into(),
        ));
    }
    let body = body.strip_suffix(b",").unwrap_or(body);

    let invalid = || {
        Error::InvalidResponse(format!(
            "basic parameter response {:?}",
            String::from_utf8_lossy(data)
        ))
    };

    let text = std::str::from_utf8(body).map_err(|_| invalid())?;
    let values = text
        .split(',')
        .map(|field| {
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            field.parse::<u32>().map_err(|_| invalid())
        })
        .collect::<Result<Vec<_>>>()?;

    let [x_res, y_res, planes, width_mm, width_px, height_mm, height_px] = values[..] else {
        return Err(invalid());
    };

    Ok(BasicParameters {
        x_res,
        y_res,
        planes,
        width_mm,
        width_px,
        height_mm,
        height_px,
    })
}
