//! Errors raised by the RW4 codec
//!
//! Every structural problem is a [`FormatError`]: a short code, the stream
//! offset at which it was detected, and an optional diagnostic value. Codes
//! prefixed by the structure they belong to (`H` header, `TA` triangle array,
//! `AN` animation and so on) match the checks in [`crate::formats`]; the
//! codec-wide ones are:
//!
//! | Code | Meaning |
//! |------|---------|
//! | `H000` | not an RW4 file (magic mismatch) |
//! | `H005` | unknown file type code |
//! | `PAD001` | negative padding |
//! | `PAD002` | nonzero padding byte |
//! | `S000` | section number out of range |
//! | `S001` | section incompletely read |
//! | `S002` | section size doesn't match computed size |
//! | `S003` | section incompletely written |
//! | `S004` | attempt to decode section twice |
//! | `S005` | section references itself |
//! | `S006` | reference to a section that is not decoded yet |
//! | `BL001` | unable to move an unreferenced section |

use std::fmt;

use rw4_shared::TransformError;

/// Result alias used throughout the codec
pub type Result<T> = std::result::Result<T, Error>;

/// A violation of the RW4 layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    pub code: &'static str,
    pub offset: u64,
    pub value: Option<String>,
}

impl FormatError {
    pub fn new(code: &'static str, offset: u64) -> Self {
        Self {
            code,
            offset,
            value: None,
        }
    }

    pub fn with_value(code: &'static str, offset: u64, value: impl fmt::Display) -> Self {
        Self {
            code,
            offset,
            value: Some(value.to_string()),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {} @0x{:x}", self.code, value, self.offset),
            None => write!(f, "{} @0x{:x}", self.code, self.offset),
        }
    }
}

impl std::error::Error for FormatError {}

/// Errors from reading, editing or writing a model
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("section handle {0} refers to a removed section")]
    SectionRemoved(u32),
    #[error("section {number} holds {found}, expected {expected}")]
    ObjectType {
        number: u32,
        expected: &'static str,
        found: &'static str,
    },
}

impl Error {
    /// Short machine-readable code, used to tally failures across a batch
    pub fn code(&self) -> &'static str {
        match self {
            Self::Format(e) => e.code,
            Self::Transform(e) => e.code(),
            Self::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => "EOF",
            Self::Io(_) => "IO",
            Self::SectionRemoved(_) => "RM001",
            Self::ObjectType { .. } => "OT001",
        }
    }

    pub(crate) fn format(code: &'static str, offset: u64) -> Self {
        Self::Format(FormatError::new(code, offset))
    }

    pub(crate) fn format_value(code: &'static str, offset: u64, value: impl fmt::Display) -> Self {
        Self::Format(FormatError::with_value(code, offset, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display() {
        let e = FormatError::with_value("TA002", 0x1c4, 9);
        assert_eq!(e.to_string(), "TA002 9 @0x1c4");
        assert_eq!(FormatError::new("H099", 0x9c).to_string(), "H099 @0x9c");
    }

    #[test]
    fn test_codes() {
        assert_eq!(Error::format("SM310", 0).code(), "SM310");
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert_eq!(Error::from(eof).code(), "EOF");
        assert_eq!(Error::SectionRemoved(3).code(), "RM001");
        let xf = TransformError::NotSpecialOrthogonal { det: -1.0 };
        assert_eq!(Error::from(xf).code(), "XF003");
    }
}
