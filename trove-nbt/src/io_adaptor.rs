use std::io::{self, Read, Write};

use crate::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct ReadAdaptor<R: Read> {
    reader: R,
}

impl<R: Read> ReadAdaptor<R> {
    pub fn new(r: R) -> Self {
        Self { reader: r }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

macro_rules! read_be {
    ($($name:ident => $ty:ty),* $(,)?) => {
        impl<R: Read> ReadAdaptor<R> {
            $(
                pub fn $name(&mut self) -> Result<$ty> {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    self.reader
                        .read_exact(&mut buf)
                        .map_err(Error::Incomplete)?;

                    Ok(<$ty>::from_be_bytes(buf))
                }
            )*
        }
    };
}

read_be! {
    get_u8_be => u8,
    get_i8_be => i8,
    get_u16_be => u16,
    get_i16_be => i16,
    get_i32_be => i32,
    get_i64_be => i64,
    get_f32_be => f32,
    get_f64_be => f64,
}

impl<R: Read> ReadAdaptor<R> {
    pub fn skip_bytes(&mut self, count: u64) -> Result<()> {
        let copied = io::copy(&mut self.reader.by_ref().take(count), &mut io::sink())
            .map_err(Error::Incomplete)?;
        if copied < count {
            return Err(Error::Incomplete(io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(())
    }

    pub fn read_boxed_slice(&mut self, count: usize) -> Result<Box<[u8]>> {
        let mut buf = vec![0u8; count];
        self.reader
            .read_exact(&mut buf)
            .map_err(Error::Incomplete)?;

        Ok(buf.into())
    }
}

pub struct WriteAdaptor<W: Write> {
    writer: W,
}

impl<W: Write> WriteAdaptor<W> {
    pub fn new(w: W) -> Self {
        Self { writer: w }
    }
}

macro_rules! write_be {
    ($($name:ident => $ty:ty),* $(,)?) => {
        impl<W: Write> WriteAdaptor<W> {
            $(
                pub fn $name(&mut self, value: $ty) -> Result<()> {
                    self.writer
                        .write_all(&value.to_be_bytes())
                        .map_err(Error::Incomplete)
                }
            )*
        }
    };
}

write_be! {
    write_u8_be => u8,
    write_i8_be => i8,
    write_u16_be => u16,
    write_i16_be => i16,
    write_i32_be => i32,
    write_i64_be => i64,
    write_f32_be => f32,
    write_f64_be => f64,
}

impl<W: Write> WriteAdaptor<W> {
    pub fn write_slice(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value).map_err(Error::Incomplete)
    }
}
