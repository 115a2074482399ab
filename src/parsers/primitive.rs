use super::Endianness;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use nom::number::complete::{
    be_f32, be_i16, be_i32, be_i64, be_i8, be_u16, be_u32, be_u64, le_f32, le_i16, le_i32,
    le_i64, le_i8, le_u16, le_u32, le_u64,
};
use std::io::{self, Read, Write};

/// Fixed width values that can be decoded from a byte slice and encoded to a stream.
pub(crate) trait Primitive: Sized + Copy {
    const SIZE: usize;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self>;
    fn emit<W: Write + ?Sized>(self, out: &mut W, endianness: Endianness) -> io::Result<()>;
}

fn short_read() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes for value")
}

impl Primitive for i8 {
    const SIZE: usize = 1;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self> {
        parse_i8(data, endianness)
    }
    fn emit<W: Write + ?Sized>(self, out: &mut W, _endianness: Endianness) -> io::Result<()> {
        out.write_i8(self)
    }
}

impl Primitive for u8 {
    const SIZE: usize = 1;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self> {
        parse_u8(data, endianness)
    }
    fn emit<W: Write + ?Sized>(self, out: &mut W, _endianness: Endianness) -> io::Result<()> {
        out.write_u8(self)
    }
}

impl Primitive for i16 {
    const SIZE: usize = 2;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self> {
        parse_i16(data, endianness)
    }
    fn emit<W: Write + ?Sized>(self, out: &mut W, endianness: Endianness) -> io::Result<()> {
        match endianness {
            Endianness::Little => out.write_i16::<LittleEndian>(self),
            Endianness::Big => out.write_i16::<BigEndian>(self),
        }
    }
}

impl Primitive for u16 {
    const SIZE: usize = 2;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self> {
        parse_u16(data, endianness)
    }
    fn emit<W: Write + ?Sized>(self, out: &mut W, endianness: Endianness) -> io::Result<()> {
        match endianness {
            Endianness::Little => out.write_u16::<LittleEndian>(self),
            Endianness::Big => out.write_u16::<BigEndian>(self),
        }
    }
}

impl Primitive for i32 {
    const SIZE: usize = 4;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self> {
        parse_i32(data, endianness)
    }
    fn emit<W: Write + ?Sized>(self, out: &mut W, endianness: Endianness) -> io::Result<()> {
        match endianness {
            Endianness::Little => out.write_i32::<LittleEndian>(self),
            Endianness::Big => out.write_i32::<BigEndian>(self),
        }
    }
}

impl Primitive for u32 {
    const SIZE: usize = 4;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self> {
        parse_u32(data, endianness)
    }
    fn emit<W: Write + ?Sized>(self, out: &mut W, endianness: Endianness) -> io::Result<()> {
        match endianness {
            Endianness::Little => out.write_u32::<LittleEndian>(self),
            Endianness::Big => out.write_u32::<BigEndian>(self),
        }
    }
}

impl Primitive for i64 {
    const SIZE: usize = 8;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self> {
        parse_i64(data, endianness)
    }
    fn emit<W: Write + ?Sized>(self, out: &mut W, endianness: Endianness) -> io::Result<()> {
        match endianness {
            Endianness::Little => out.write_i64::<LittleEndian>(self),
            Endianness::Big => out.write_i64::<BigEndian>(self),
        }
    }
}

impl Primitive for u64 {
    const SIZE: usize = 8;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self> {
        parse_u64(data, endianness)
    }
    fn emit<W: Write + ?Sized>(self, out: &mut W, endianness: Endianness) -> io::Result<()> {
        match endianness {
            Endianness::Little => out.write_u64::<LittleEndian>(self),
            Endianness::Big => out.write_u64::<BigEndian>(self),
        }
    }
}

impl Primitive for f32 {
    const SIZE: usize = 4;
    fn parse(data: &[u8], endianness: Endianness) -> io::Result<Self> {
        parse_f32(data, endianness)
    }
    fn emit<W: Write + ?Sized>(self, out: &mut W, endianness: Endianness) -> io::Result<()> {
        match endianness {
            Endianness::Little => out.write_f32::<LittleEndian>(self),
            Endianness::Big => out.write_f32::<BigEndian>(self),
        }
    }
}

/// Reads exactly `T::SIZE` bytes and decodes them.
pub(crate) fn read_primitive<T: Primitive, R: Read + ?Sized>(
    stream: &mut R,
    endianness: Endianness,
) -> io::Result<T> {
    let mut buffer = [0_u8; 8];
    let data = &mut buffer[..T::SIZE];
    stream.read_exact(data)?;
    T::parse(data, endianness)
}

pub(crate) fn write_primitive<T: Primitive, W: Write + ?Sized>(
    stream: &mut W,
    value: T,
    endianness: Endianness,
) -> io::Result<()> {
    value.emit(stream, endianness)
}

pub fn parse_i8(slice: &[u8], endianness: Endianness) -> io::Result<i8> {
    let (_, val) = match endianness {
        Endianness::Little => le_i8::<()>(slice).map_err(|_| short_read())?,
        Endianness::Big => be_i8::<()>(slice).map_err(|_| short_read())?,
    };
    Ok(val)
}

pub fn parse_u8(slice: &[u8], _endianness: Endianness) -> io::Result<u8> {
    slice.get(0).copied().ok_or_else(short_read)
}

pub fn parse_u16(slice: &[u8], endianness: Endianness) -> io::Result<u16> {
    let (_, val) = match endianness {
        Endianness::Little => le_u16::<()>(slice).map_err(|_| short_read())?,
        Endianness::Big => be_u16::<()>(slice).map_err(|_| short_read())?,
    };
    Ok(val)
}

pub fn parse_i16(slice: &[u8], endianness: Endianness) -> io::Result<i16> {
    let (_, val) = match endianness {
        Endianness::Little => le_i16::<()>(slice).map_err(|_| short_read())?,
        Endianness::Big => be_i16::<()>(slice).map_err(|_| short_read())?,
    };
    Ok(val)
}

pub fn parse_i32(slice: &[u8], endianness: Endianness) -> io::Result<i32> {
    let (_, val) = match endianness {
        Endianness::Little => le_i32::<()>(slice).map_err(|_| short_read())?,
        Endianness::Big => be_i32::<()>(slice).map_err(|_| short_read())?,
    };
    Ok(val)
}

pub fn parse_u32(slice: &[u8], endianness: Endianness) -> io::Result<u32> {
    let (_, val) = match endianness {
        Endianness::Little => le_u32::<()>(slice).map_err(|_| short_read())?,
        Endianness::Big => be_u32::<()>(slice).map_err(|_| short_read())?,
    };
    Ok(val)
}

pub fn parse_i64(slice: &[u8], endianness: Endianness) -> io::Result<i64> {
    let (_, val) = match endianness {
        Endianness::Little => le_i64::<()>(slice).map_err(|_| short_read())?,
        Endianness::Big => be_i64::<()>(slice).map_err(|_| short_read())?,
    };
    Ok(val)
}

pub fn parse_u64(slice: &[u8], endianness: Endianness) -> io::Result<u64> {
    let (_, val) = match endianness {
        Endianness::Little => le_u64::<()>(slice).map_err(|_| short_read())?,
        Endianness::Big => be_u64::<()>(slice).map_err(|_| short_read())?,
    };
    Ok(val)
}

pub fn parse_f32(slice: &[u8], endianness: Endianness) -> io::Result<f32> {
    let (_, val) = match endianness {
        Endianness::Little => le_f32::<()>(slice).map_err(|_| short_read())?,
        Endianness::Big => be_f32::<()>(slice).map_err(|_| short_read())?,
    };
    Ok(val)
}
