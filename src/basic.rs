//! Leaf values: integers, floats, booleans, strings, enumerations and block links.
//!
//! A [`BasicValue`] holds exactly one scalar. Setting a value validates it against the range of
//! the type and fails instead of truncating, so a value that was accepted can always be written.

use crate::context::Context;
use crate::error::{DataError, Result, SchemaError};
use crate::expression::ExprValue;
use crate::graph::{BlockId, Link};
use crate::parsers::primitive::{read_primitive, write_primitive};
use crate::registry::{EnumType, TypeId};
use std::convert::TryFrom;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

pub const MAX_ZSTRING_LEN: usize = 1000;
pub const MAX_SIZED_STRING_LEN: usize = 10_000;
pub const MAX_UNDECODED_LEN: usize = 16_000_000;

/// Storage kind of a basic type. Enumerations reuse the integer kinds as storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Bool8,
    Bool32,
    /// Exactly `n` bytes on disk, padded with NUL.
    FixedString(usize),
    /// NUL terminated.
    ZString,
    /// `u32` length prefix followed by the bytes.
    SizedString,
    /// Index into the file's string table, `-1` for no string.
    StringIndex,
    /// Everything up to the end of the stream.
    Undecoded,
    /// Strong link to another block.
    Ref,
    /// Weak link to another block.
    Ptr,
}

impl BasicKind {
    pub fn is_integer(self) -> bool {
        self.bounds().is_some()
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            BasicKind::Int8 | BasicKind::Int16 | BasicKind::Int32 | BasicKind::Int64
        )
    }

    pub fn is_link(self) -> bool {
        matches!(self, BasicKind::Ref | BasicKind::Ptr)
    }

    /// Inclusive range of an integer kind.
    pub fn bounds(self) -> Option<(i128, i128)> {
        Some(match self {
            BasicKind::Int8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            BasicKind::UInt8 => (0, i128::from(u8::MAX)),
            BasicKind::Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            BasicKind::UInt16 => (0, i128::from(u16::MAX)),
            BasicKind::Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            BasicKind::UInt32 => (0, i128::from(u32::MAX)),
            BasicKind::Int64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            BasicKind::UInt64 => (0, i128::from(u64::MAX)),
            _ => return None,
        })
    }

    /// Size on disk when it does not depend on the value.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            BasicKind::Int8 | BasicKind::UInt8 | BasicKind::Bool8 => Some(1),
            BasicKind::Int16 | BasicKind::UInt16 => Some(2),
            BasicKind::Int32
            | BasicKind::UInt32
            | BasicKind::Float32
            | BasicKind::Bool32
            | BasicKind::StringIndex
            | BasicKind::Ref
            | BasicKind::Ptr => Some(4),
            BasicKind::Int64 | BasicKind::UInt64 => Some(8),
            BasicKind::FixedString(n) => Some(n),
            BasicKind::ZString | BasicKind::SizedString | BasicKind::Undecoded => None,
        }
    }
}

impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BasicKind::Int8 => "int8",
            BasicKind::UInt8 => "uint8",
            BasicKind::Int16 => "int16",
            BasicKind::UInt16 => "uint16",
            BasicKind::Int32 => "int32",
            BasicKind::UInt32 => "uint32",
            BasicKind::Int64 => "int64",
            BasicKind::UInt64 => "uint64",
            BasicKind::Float32 => "float",
            BasicKind::Bool8 => "bool8",
            BasicKind::Bool32 => "bool32",
            BasicKind::FixedString(n) => return write!(f, "char[{}]", n),
            BasicKind::ZString => "zstring",
            BasicKind::SizedString => "sizedstring",
            BasicKind::StringIndex => "string",
            BasicKind::Undecoded => "undecoded",
            BasicKind::Ref => "Ref",
            BasicKind::Ptr => "Ptr",
        };
        f.write_str(name)
    }
}

/// A value going into or coming out of a basic attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f32),
    Bool(bool),
    Bytes(Vec<u8>),
    /// Absent string or null link.
    None,
    Block(BlockId),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::UInt(v) => Some(*v),
            Value::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<BlockId> {
        match self {
            Value::Block(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            Value::None => f.write_str("None"),
            Value::Block(id) => write!(f, "{}", id),
        }
    }
}

macro_rules! value_from {
    ($variant:ident <- $($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

value_from!(Int <- i8, i16, i32, i64);
value_from!(UInt <- u8, u16, u32, u64);
value_from!(Float <- f32);
value_from!(Bool <- bool);
value_from!(Bytes <- Vec<u8>, &[u8], &str, String);
value_from!(Block <- BlockId);

impl From<Option<BlockId>> for Value {
    fn from(v: Option<BlockId>) -> Self {
        v.map_or(Value::None, Value::Block)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f32),
    Bool(bool),
    Bytes(Vec<u8>),
    Indexed(Option<Vec<u8>>),
    Link(Link),
}

/// One scalar attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicValue {
    kind: BasicKind,
    enumeration: Option<Arc<EnumType>>,
    template: Option<TypeId>,
    scalar: Scalar,
}

fn truncate_at_nul(bytes: &mut Vec<u8>) {
    if let Some(end) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(end);
    }
}

impl BasicValue {
    pub fn new(kind: BasicKind) -> Self {
        let scalar = match kind {
            BasicKind::Int8 | BasicKind::Int16 | BasicKind::Int32 | BasicKind::Int64 => {
                Scalar::Int(0)
            }
            BasicKind::UInt8 | BasicKind::UInt16 | BasicKind::UInt32 | BasicKind::UInt64 => {
                Scalar::UInt(0)
            }
            BasicKind::Float32 => Scalar::Float(0.0),
            BasicKind::Bool8 | BasicKind::Bool32 => Scalar::Bool(false),
            BasicKind::FixedString(_)
            | BasicKind::ZString
            | BasicKind::SizedString
            | BasicKind::Undecoded => Scalar::Bytes(Vec::new()),
            BasicKind::StringIndex => Scalar::Indexed(None),
            BasicKind::Ref | BasicKind::Ptr => Scalar::Link(Link::Resolved(None)),
        };
        BasicValue {
            kind,
            enumeration: None,
            template: None,
            scalar,
        }
    }

    /// A null link whose targets must be `template` or one of its subtypes.
    pub fn link(kind: BasicKind, template: Option<TypeId>) -> Self {
        BasicValue {
            template,
            ..BasicValue::new(kind)
        }
    }

    /// An enumeration value, initialised to its first option.
    pub fn enumeration(def: Arc<EnumType>) -> Self {
        let mut value = BasicValue::new(def.storage);
        if let Some((_, first)) = def.options.first() {
            value.scalar = value.integer(i128::from(*first));
        }
        value.enumeration = Some(def);
        value
    }

    pub fn kind(&self) -> BasicKind {
        self.kind
    }

    pub fn template(&self) -> Option<TypeId> {
        self.template
    }

    pub fn enum_type(&self) -> Option<&EnumType> {
        self.enumeration.as_deref()
    }

    fn type_name(&self) -> String {
        match &self.enumeration {
            Some(def) => def.name.clone(),
            None => self.kind.to_string(),
        }
    }

    pub fn get_value(&self) -> Result<Value> {
        Ok(match &self.scalar {
            Scalar::Int(v) => Value::Int(*v),
            Scalar::UInt(v) => Value::UInt(*v),
            Scalar::Float(v) => Value::Float(*v),
            Scalar::Bool(v) => Value::Bool(*v),
            Scalar::Bytes(b) | Scalar::Indexed(Some(b)) => Value::Bytes(b.clone()),
            Scalar::Indexed(None) | Scalar::Link(Link::Resolved(None)) => Value::None,
            Scalar::Link(Link::Resolved(Some(id))) => Value::Block(*id),
            Scalar::Link(Link::Raw(_)) => return Err(DataError::UnresolvedLink.into()),
        })
    }

    pub fn set_value<V: Into<Value>>(&mut self, value: V) -> Result<()> {
        let value = value.into();
        self.scalar = match self.kind {
            BasicKind::Int8
            | BasicKind::UInt8
            | BasicKind::Int16
            | BasicKind::UInt16
            | BasicKind::Int32
            | BasicKind::UInt32
            | BasicKind::Int64
            | BasicKind::UInt64 => self.checked_integer(&value)?,
            BasicKind::Float32 => match value {
                Value::Float(v) => Scalar::Float(v),
                Value::Int(v) => Scalar::Float(v as f32),
                Value::UInt(v) => Scalar::Float(v as f32),
                other => return Err(self.wrong_type(&other)),
            },
            BasicKind::Bool8 | BasicKind::Bool32 => match value {
                Value::Bool(b) => Scalar::Bool(b),
                ref other => match other.as_i64() {
                    Some(0) => Scalar::Bool(false),
                    Some(1) => Scalar::Bool(true),
                    _ => return Err(self.wrong_type(other)),
                },
            },
            BasicKind::FixedString(n) => Scalar::Bytes(self.checked_string(value, n, true)?),
            BasicKind::ZString => {
                Scalar::Bytes(self.checked_string(value, MAX_ZSTRING_LEN, true)?)
            }
            BasicKind::SizedString => {
                Scalar::Bytes(self.checked_string(value, MAX_SIZED_STRING_LEN, false)?)
            }
            BasicKind::Undecoded => {
                Scalar::Bytes(self.checked_string(value, MAX_UNDECODED_LEN, false)?)
            }
            BasicKind::StringIndex => match value {
                Value::None => Scalar::Indexed(None),
                Value::Bytes(b) => Scalar::Indexed(Some(b)),
                other => return Err(self.wrong_type(&other)),
            },
            BasicKind::Ref | BasicKind::Ptr => match value {
                Value::None => Scalar::Link(Link::Resolved(None)),
                Value::Block(id) => Scalar::Link(Link::Resolved(Some(id))),
                other => return Err(self.wrong_type(&other)),
            },
        };
        Ok(())
    }

    fn wrong_type(&self, value: &Value) -> crate::Error {
        DataError::WrongValueType {
            kind: self.type_name(),
            value: format!("{:?}", value),
        }
        .into()
    }

    fn integer(&self, n: i128) -> Scalar {
        if self.kind.is_signed() {
            Scalar::Int(n as i64)
        } else {
            Scalar::UInt(n as u64)
        }
    }

    fn checked_integer(&self, value: &Value) -> Result<Scalar> {
        let n = match (value, &self.enumeration) {
            (Value::Int(v), _) => i128::from(*v),
            (Value::UInt(v), _) => i128::from(*v),
            (Value::Bool(b), None) => i128::from(u8::from(*b)),
            (Value::Bytes(name), Some(def)) => match def.option_value(name) {
                Some(v) => i128::from(v),
                None => {
                    return Err(DataError::UnknownEnumValue {
                        name: def.name.clone(),
                        value: String::from_utf8_lossy(name).into_owned(),
                    }
                    .into())
                }
            },
            (other, _) => return Err(self.wrong_type(other)),
        };

        let (min, max) = match self.kind.bounds() {
            Some(bounds) => bounds,
            None => return Err(self.wrong_type(value)),
        };
        if n < min || n > max {
            return Err(DataError::OutOfRange {
                kind: self.type_name(),
                value: n.to_string(),
            }
            .into());
        }
        if let Some(def) = &self.enumeration {
            if !def.allow_raw && def.option_name(n).is_none() {
                return Err(DataError::UnknownEnumValue {
                    name: def.name.clone(),
                    value: n.to_string(),
                }
                .into());
            }
        }
        Ok(self.integer(n))
    }

    fn checked_string(&self, value: Value, max: usize, nul_terminated: bool) -> Result<Vec<u8>> {
        let mut bytes = match value {
            Value::Bytes(b) => b,
            other => return Err(self.wrong_type(&other)),
        };
        if nul_terminated {
            truncate_at_nul(&mut bytes);
        }
        if bytes.len() > max {
            return Err(DataError::StringTooLong {
                kind: self.type_name(),
                len: bytes.len(),
            }
            .into());
        }
        Ok(bytes)
    }

    /// Applies a schema default given as text.
    pub(crate) fn apply_default(
        &mut self,
        attribute: &str,
        text: &str,
    ) -> std::result::Result<(), SchemaError> {
        let invalid = || SchemaError::InvalidDefault {
            attribute: attribute.to_string(),
            default: text.to_string(),
        };
        let trimmed = text.trim();
        let literal = match self.kind {
            _ if self.enumeration.is_some() => parse_int(trimmed)
                .map(Value::Int)
                .unwrap_or_else(|| Value::Bytes(trimmed.as_bytes().to_vec())),
            kind if kind.is_integer() => parse_int(trimmed)
                .map(Value::Int)
                .or_else(|| trimmed.parse::<u64>().ok().map(Value::UInt))
                .ok_or_else(invalid)?,
            BasicKind::Float32 => Value::Float(trimmed.parse().map_err(|_| invalid())?),
            BasicKind::Bool8 | BasicKind::Bool32 => match trimmed {
                "0" | "false" => Value::Bool(false),
                "1" | "true" => Value::Bool(true),
                _ => return Err(invalid()),
            },
            BasicKind::Ref | BasicKind::Ptr | BasicKind::StringIndex => return Err(invalid()),
            _ => Value::Bytes(text.as_bytes().to_vec()),
        };
        self.set_value(literal).map_err(|_| invalid())
    }

    /// Name of the current option, for enumerations.
    pub fn enum_option(&self) -> Option<&str> {
        let def = self.enumeration.as_ref()?;
        let n = match self.scalar {
            Scalar::Int(v) => i128::from(v),
            Scalar::UInt(v) => i128::from(v),
            _ => return None,
        };
        def.option_name(n)
    }

    pub(crate) fn expr_value(&self) -> Option<ExprValue> {
        match self.scalar {
            Scalar::Int(v) => Some(ExprValue::Int(v)),
            Scalar::UInt(v) => i64::try_from(v).ok().map(ExprValue::Int),
            Scalar::Bool(b) => Some(ExprValue::Bool(b)),
            _ => None,
        }
    }

    pub fn link_state(&self) -> Option<Link> {
        match self.scalar {
            Scalar::Link(link) => Some(link),
            _ => None,
        }
    }

    pub(crate) fn link_mut(&mut self) -> Option<&mut Link> {
        match &mut self.scalar {
            Scalar::Link(link) => Some(link),
            _ => None,
        }
    }

    /// The string a string-table index refers to.
    pub(crate) fn table_string(&self) -> Option<&[u8]> {
        match &self.scalar {
            Scalar::Indexed(Some(b)) => Some(b),
            _ => None,
        }
    }

    fn int(&self) -> i64 {
        match self.scalar {
            Scalar::Int(v) => v,
            Scalar::UInt(v) => v as i64,
            _ => 0,
        }
    }

    fn uint(&self) -> u64 {
        match self.scalar {
            Scalar::Int(v) => v as u64,
            Scalar::UInt(v) => v,
            _ => 0,
        }
    }

    fn bytes(&self) -> &[u8] {
        match &self.scalar {
            Scalar::Bytes(b) | Scalar::Indexed(Some(b)) => b,
            _ => &[],
        }
    }

    fn flag(&self) -> bool {
        matches!(self.scalar, Scalar::Bool(true))
    }

    fn float(&self) -> f32 {
        match self.scalar {
            Scalar::Float(v) => v,
            _ => 0.0,
        }
    }

    pub fn read<R: Read>(&mut self, stream: &mut R, ctx: &Context<'_>) -> Result<()> {
        let e = ctx.endianness;
        self.scalar = match self.kind {
            BasicKind::Int8 => Scalar::Int(read_primitive::<i8, _>(stream, e)?.into()),
            BasicKind::UInt8 => Scalar::UInt(read_primitive::<u8, _>(stream, e)?.into()),
            BasicKind::Int16 => Scalar::Int(read_primitive::<i16, _>(stream, e)?.into()),
            BasicKind::UInt16 => Scalar::UInt(read_primitive::<u16, _>(stream, e)?.into()),
            BasicKind::Int32 => Scalar::Int(read_primitive::<i32, _>(stream, e)?.into()),
            BasicKind::UInt32 => Scalar::UInt(read_primitive::<u32, _>(stream, e)?.into()),
            BasicKind::Int64 => Scalar::Int(read_primitive::<i64, _>(stream, e)?),
            BasicKind::UInt64 => Scalar::UInt(read_primitive::<u64, _>(stream, e)?),
            BasicKind::Float32 => Scalar::Float(read_primitive::<f32, _>(stream, e)?),
            BasicKind::Bool8 => Scalar::Bool(read_primitive::<u8, _>(stream, e)? != 0),
            BasicKind::Bool32 => Scalar::Bool(read_primitive::<u32, _>(stream, e)? != 0),
            BasicKind::FixedString(n) => {
                let mut buffer = vec![0; n];
                stream.read_exact(&mut buffer)?;
                truncate_at_nul(&mut buffer);
                Scalar::Bytes(buffer)
            }
            BasicKind::ZString => Scalar::Bytes(read_zstring(stream, ctx)?),
            BasicKind::SizedString => {
                let len = read_primitive::<u32, _>(stream, e)? as usize;
                if len > MAX_SIZED_STRING_LEN {
                    return Err(DataError::StringTooLong {
                        kind: self.type_name(),
                        len,
                    }
                    .into());
                }
                let mut buffer = vec![0; len];
                stream.read_exact(&mut buffer)?;
                Scalar::Bytes(buffer)
            }
            BasicKind::StringIndex => match read_primitive::<i32, _>(stream, e)? {
                -1 => Scalar::Indexed(None),
                index => Scalar::Indexed(Some(ctx.string_at(index)?.to_vec())),
            },
            BasicKind::Undecoded => {
                let mut buffer = Vec::new();
                stream
                    .take(MAX_UNDECODED_LEN as u64 + 1)
                    .read_to_end(&mut buffer)?;
                if buffer.len() > MAX_UNDECODED_LEN {
                    return Err(DataError::StringTooLong {
                        kind: self.type_name(),
                        len: buffer.len(),
                    }
                    .into());
                }
                Scalar::Bytes(buffer)
            }
            BasicKind::Ref | BasicKind::Ptr => {
                Scalar::Link(Link::Raw(read_primitive::<i32, _>(stream, e)?))
            }
        };
        Ok(())
    }

    pub fn write<W: Write>(&self, stream: &mut W, ctx: &Context<'_>) -> Result<()> {
        let e = ctx.endianness;
        match self.kind {
            BasicKind::Int8 => write_primitive(stream, self.int() as i8, e)?,
            BasicKind::UInt8 => write_primitive(stream, self.uint() as u8, e)?,
            BasicKind::Int16 => write_primitive(stream, self.int() as i16, e)?,
            BasicKind::UInt16 => write_primitive(stream, self.uint() as u16, e)?,
            BasicKind::Int32 => write_primitive(stream, self.int() as i32, e)?,
            BasicKind::UInt32 => write_primitive(stream, self.uint() as u32, e)?,
            BasicKind::Int64 => write_primitive(stream, self.int(), e)?,
            BasicKind::UInt64 => write_primitive(stream, self.uint(), e)?,
            BasicKind::Float32 => write_primitive(stream, self.float(), e)?,
            BasicKind::Bool8 => write_primitive(stream, u8::from(self.flag()), e)?,
            BasicKind::Bool32 => write_primitive(stream, u32::from(self.flag()), e)?,
            BasicKind::FixedString(n) => {
                let mut buffer = self.bytes().to_vec();
                buffer.resize(n, 0);
                stream.write_all(&buffer)?;
            }
            BasicKind::ZString => {
                stream.write_all(self.bytes())?;
                write_primitive(stream, 0_u8, e)?;
            }
            BasicKind::SizedString => {
                write_primitive(stream, self.bytes().len() as u32, e)?;
                stream.write_all(self.bytes())?;
            }
            BasicKind::StringIndex => {
                let index = match self.table_string() {
                    Some(s) => ctx.string_index(s)?,
                    None => -1,
                };
                write_primitive(stream, index, e)?;
            }
            BasicKind::Undecoded => stream.write_all(self.bytes())?,
            BasicKind::Ref | BasicKind::Ptr => {
                let index = match self.link_state() {
                    Some(Link::Resolved(Some(id))) => ctx.link_index(id)?,
                    Some(Link::Resolved(None)) | None => -1,
                    Some(Link::Raw(_)) => return Err(DataError::UnresolvedLink.into()),
                };
                write_primitive(stream, index, e)?;
            }
        }
        Ok(())
    }

    /// Bytes this value occupies when written.
    pub fn get_size(&self) -> usize {
        match self.kind {
            BasicKind::ZString => self.bytes().len() + 1,
            BasicKind::SizedString => self.bytes().len() + 4,
            BasicKind::Undecoded => self.bytes().len(),
            kind => kind.fixed_size().unwrap_or(0),
        }
    }
}

fn parse_int(text: &str) -> Option<i64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn read_zstring<R: Read>(stream: &mut R, ctx: &Context<'_>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let byte: u8 = read_primitive(stream, ctx.endianness)?;
        if byte == 0 {
            return Ok(out);
        }
        if out.len() == MAX_ZSTRING_LEN {
            return Err(DataError::StringTooLong {
                kind: BasicKind::ZString.to_string(),
                len: out.len() + 1,
            }
            .into());
        }
        out.push(byte);
    }
}

impl fmt::Display for BasicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(option) = self.enum_option() {
            return f.write_str(option);
        }
        match &self.scalar {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::UInt(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{:.4}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Bytes(b) if self.kind == BasicKind::Undecoded => {
                write!(f, "<{} bytes>", b.len())
            }
            Scalar::Bytes(b) | Scalar::Indexed(Some(b)) => {
                f.write_str(&String::from_utf8_lossy(b))
            }
            Scalar::Indexed(None) => f.write_str("<none>"),
            Scalar::Link(Link::Raw(index)) => write!(f, "<unresolved {}>", index),
            Scalar::Link(Link::Resolved(None)) => f.write_str("None"),
            Scalar::Link(Link::Resolved(Some(id))) => write!(f, "{}", id),
        }
    }
}
