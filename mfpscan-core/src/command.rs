//! Command blocks
//!
//! Every outgoing command is an escape byte, a one-letter opcode, a newline,
//! zero or more newline-terminated fields, and the `0x80` sentinel.

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::{
    constants::{BLOCK_END, ESC, FIELD_SEPARATOR},
    error::{Error, Result},
};

/// Command opcodes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // Session
    SessionOpen = b'K',
    SessionClose = b'E',

    // Negotiation
    BasicParameters = b'I',
    SourceSelect = b'D',
    Parameters = b'X',

    // Device interaction
    ButtonQuery = b'Q',
    Cancel = b'R',
}

impl Opcode {
    /// Get opcode name
    pub fn name(self) -> &'static str {
        match self {
            Self::SessionOpen => "SESSION_OPEN",
            Self::SessionClose => "SESSION_CLOSE",
            Self::BasicParameters => "BASIC_PARAMETERS",
            Self::SourceSelect => "SOURCE_SELECT",
            Self::Parameters => "PARAMETERS",
            Self::ButtonQuery => "BUTTON_QUERY",
            Self::Cancel => "CANCEL",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            b'K' => Ok(Self::SessionOpen),
            b'E' => Ok(Self::SessionClose),
            b'I' => Ok(Self::BasicParameters),
            b'D' => Ok(Self::SourceSelect),
            b'X' => Ok(Self::Parameters),
            b'Q' => Ok(Self::ButtonQuery),
            b'R' => Ok(Self::Cancel),
            _ => Err(Error::UnknownOpcode(value)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8 as char)
    }
}

/// One command block
///
/// # Wire format
///
/// ```text
/// ESC <opcode> '\n' [<field> '\n']* 0x80
/// ```
///
/// Fields are either `KEY=value` pairs or bare words such as `ADF`.
///
/// # Examples
///
/// ```
/// use mfpscan_core::command::{CommandBlock, Opcode};
///
/// let block = CommandBlock::new(Opcode::BasicParameters)
///     .field("R", "300,300")
///     .field("M", "CGRAY");
/// assert_eq!(&block.encode()[..], b"\x1bI\nR=300,300\nM=CGRAY\n\x80");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBlock {
    pub opcode: Opcode,
    pub fields: Vec<String>,
}

impl CommandBlock {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            fields: Vec::new(),
        }
    }

    /// Append a `KEY=value` field
    pub fn field(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.fields.push(format!("{}={}", key, value));
        self
    }

    /// Append a bare word
    pub fn word(mut self, word: &str) -> Self {
        self.fields.push(word.to_string());
        self
    }

    /// Value of a `KEY=value` field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find_map(|field| {
            let (k, v) = field.split_once('=')?;
            (k == key).then_some(v)
        })
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        3 + self.fields.iter().map(|f| f.len() + 1).sum::<usize>()
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u8(ESC);
        buf.put_u8(self.opcode.into());
        buf.put_u8(FIELD_SEPARATOR);
        for field in &self.fields {
            buf.put_slice(field.as_bytes());
            buf.put_u8(FIELD_SEPARATOR);
        }
        buf.put_u8(BLOCK_END);

        buf
    }

    /// Parse a complete block
    ///
    /// The device never sends these; this exists so captured traffic can be
    /// inspected and checked.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let [esc, op, sep, body @ ..] = buf else {
            return Err(Error::MalformedCommand(format!("{} bytes is too short", buf.len())));
        };
        if *esc != ESC {
            return Err(Error::MalformedCommand(format!("expected ESC, got 0x{:02X}", esc)));
        }
        let opcode = Opcode::try_from(*op)?;
        if *sep != FIELD_SEPARATOR {
            return Err(Error::MalformedCommand("missing separator after opcode".into()));
        }
        let Some((&end, fields)) = body.split_last() else {
            return Err(Error::MalformedCommand("missing terminator".into()));
        };
        if end != BLOCK_END {
            return Err(Error::MalformedCommand(format!(
                "expected terminator 0x{:02X}, got 0x{:02X}",
                BLOCK_END, end
            )));
        }

        let fields = match fields {
            [] => Vec::new(),
            [rest @ .., last] if *last == FIELD_SEPARATOR => rest
                .split(|b| *b == FIELD_SEPARATOR)
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect(),
            _ => return Err(Error::MalformedCommand("unterminated field".into())),
        };

        Ok(Self { opcode, fields })
    }
}

impl fmt::Display for CommandBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command[{}]({})", self.opcode, self.fields.join(","))
    }
}
