//! Error types shared by every layer of the engine.

use crate::graph::BlockId;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top level error. Schema errors are fatal for the schema, data errors are fatal for the
/// operation in progress, and stream errors are passed through untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The stream does not start with the format's magic bytes.
    #[error("stream is not a {format} file")]
    NotThisFormat { format: String },
    /// The magic matched but the version is not one the format handles.
    #[error("unsupported version 0x{version:08X}")]
    UnsupportedVersion { version: u32 },
}

impl Error {
    /// `true` for the errors a batch tool should treat as "skip this file" rather than "broken file".
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::NotThisFormat { .. } | Error::UnsupportedVersion { .. }
        )
    }
}

/// Problems with the schema itself. These never depend on the data being processed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("type '{0}' is declared more than once")]
    DuplicateType(String),
    #[error("attribute '{attribute}' is declared more than once in '{type_name}'")]
    DuplicateAttribute { type_name: String, attribute: String },
    #[error("base '{base}' of '{type_name}' is not declared")]
    UnresolvedBase { type_name: String, base: String },
    #[error("inheritance cycle through '{0}'")]
    InheritanceCycle(String),
    #[error("compound '{0}' contains itself by value")]
    RecursiveCompound(String),
    #[error("malformed expression '{expression}': {reason}")]
    MalformedExpression { expression: String, reason: String },
    #[error("malformed version string '{0}'")]
    MalformedVersion(String),
    #[error("unknown identifier '{0}' in expression")]
    UnknownIdentifier(String),
    #[error("type mismatch in expression: {0}")]
    TypeMismatch(String),
    #[error("enumeration '{name}' has non-integer storage '{storage}'")]
    InvalidEnumStorage { name: String, storage: String },
    #[error("attribute '{attribute}' of '{type_name}' uses TEMPLATE but no template type was given")]
    UnresolvedTemplate { type_name: String, attribute: String },
    #[error("invalid default '{default}' for attribute '{attribute}'")]
    InvalidDefault { attribute: String, default: String },
    #[error("type '{0}' is abstract and cannot be instantiated")]
    AbstractType(String),
    #[error("type '{0}' is not a compound")]
    NotACompound(String),
    #[error("type '{0}' is not a block")]
    NotABlock(String),
}

/// Problems with the data of one file. The registry and other files are unaffected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("value {value} out of range for {kind}")]
    OutOfRange { kind: String, value: String },
    #[error("value {value} is not an option of enumeration '{name}'")]
    UnknownEnumValue { name: String, value: String },
    #[error("{kind} cannot hold a {value}")]
    WrongValueType { kind: String, value: String },
    #[error("string of {len} bytes too long for {kind}")]
    StringTooLong { kind: String, len: usize },
    #[error("array '{name}' too long ({len} > {max})")]
    ArrayTooLong { name: String, len: usize, max: usize },
    #[error("array '{name}' has {actual} elements but its length expression says {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("negative length {len} for array '{name}'")]
    NegativeLength { name: String, len: i64 },
    #[error("row {row} of array '{name}' has no length entry")]
    MissingRowLength { name: String, row: usize },
    #[error("division by zero in '{0}'")]
    DivisionByZero(String),
    #[error("link index {index} out of range ({count} blocks)")]
    LinkOutOfRange { index: i32, count: usize },
    #[error("link to {target} but '{expected}' is required")]
    IncompatibleLink { expected: String, target: String },
    #[error("link has not been resolved yet")]
    UnresolvedLink,
    #[error("link to removed block {0}")]
    DanglingLink(BlockId),
    #[error("link to {0} which is not part of the written graph")]
    LinkTargetNotWritten(BlockId),
    #[error("strong reference cycle through {0}")]
    CyclicReference(BlockId),
    #[error("string index {index} out of range ({count} strings)")]
    StringIndexOutOfRange { index: i32, count: usize },
    #[error("string not present in the string table")]
    MissingString,
    #[error("'{type_name}' has no attribute '{attribute}'")]
    NoSuchAttribute { type_name: String, attribute: String },
    #[error("attribute '{0}' is active but was never materialised")]
    MissingAttribute(String),
    #[error("attribute '{attribute}' is not a {expected}")]
    WrongAttributeKind { attribute: String, expected: String },
    #[error("index {index} out of bounds for array '{name}' of length {len}")]
    IndexOutOfBounds {
        name: String,
        index: usize,
        len: usize,
    },
    #[error("unknown block type '{0}'")]
    UnknownBlockType(String),
    #[error("too many blocks ({count} > {max})")]
    TooManyBlocks { count: usize, max: usize },
    #[error("no custom function '{function}' for '{type_name}'")]
    NoSuchFunction { type_name: String, function: String },
    #[error("end of file not reached after the last block")]
    TrailingData,
}
