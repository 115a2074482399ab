pub mod expression;
pub mod primitive;
pub mod version;

use nom::error::{ErrorKind, ParseError};
use thiserror::Error;

/// Byte order of the multi-byte values in a file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Default for Endianness {
    fn default() -> Self {
        Endianness::Little
    }
}

/// Errors produced by the textual parsers (expressions and version strings).
/// Most errors are simply `NomError`, the others carry custom logic.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TextParseError {
    #[error("unexpected input ({kind:?})")]
    NomError {
        kind: ErrorKind,
        other: Option<Box<TextParseError>>,
    },
    /// An integer literal did not fit in 64 bits.
    #[error("integer literal out of range")]
    IntegerOverflow,
    /// A version component was larger than 255.
    #[error("version component out of range")]
    VersionComponent,
    #[error("incomplete input")]
    Incomplete,
}

impl ParseError<&str> for TextParseError {
    fn from_error_kind(_input: &str, kind: ErrorKind) -> Self {
        TextParseError::NomError { kind, other: None }
    }

    fn append(_input: &str, kind: ErrorKind, other: Self) -> Self {
        TextParseError::NomError {
            kind,
            other: Some(Box::new(other)),
        }
    }
}

type Result<'a, T> = nom::IResult<&'a str, T, TextParseError>;

/// Turns the outcome of a complete parser into a plain `Result`.
fn finish<T>(res: Result<'_, T>) -> std::result::Result<T, TextParseError> {
    match res {
        Ok((_, v)) => Ok(v),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(..)) => Err(TextParseError::Incomplete),
    }
}
