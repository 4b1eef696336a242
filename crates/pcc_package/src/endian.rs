//! Byte order aware reading of package primitives.
//!
//! Console builds store every multi-byte value big endian while PC builds use little
//! endian, so the order is only known once the package tag has been read. All
//! structured reads go through [`EndianReader`], which carries the detected order and
//! the stream length so that out of bounds reads surface as [`Error::Truncated`].

use std::{
    cmp::Ordering,
    io::{self, Read, Seek, SeekFrom},
};

use binrw::{BinRead, BinResult, Endian};
use derive_more::derive::{AsRef, Deref, Display};
use tracing::instrument;
use widestring::U16String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    types::PACKAGE_TAG,
};

/// A seekable stream paired with the byte order its values are stored in
#[derive(Debug)]
pub struct EndianReader<R> {
    inner: R,
    endian: Endian,
    length: u64,
}

impl<R: Read + Seek> EndianReader<R> {
    /// Wrap a stream, keeping its current position.
    pub fn new(mut inner: R, endian: Endian) -> Result<Self> {
        let position = inner.stream_position()?;
        let length = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(position))?;

        Ok(Self {
            inner,
            endian,
            length,
        })
    }

    /// Read the package tag at the current position and switch to the byte order it was
    /// written in.
    #[instrument(skip(inner), err)]
    pub fn for_package(inner: R) -> Result<Self> {
        let mut reader = Self::new(inner, Endian::Little)?;
        let magic: u32 = reader.read()?;

        reader.endian = match magic {
            PACKAGE_TAG => Endian::Little,
            m if m == PACKAGE_TAG.swap_bytes() => Endian::Big,
            other => return Err(Error::InvalidPackage(other)),
        };

        Ok(reader)
    }

    /// The byte order used for all reads
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Change the byte order used for subsequent reads
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Total length of the underlying stream
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the underlying stream is empty
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current position in the underlying stream
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Move to an absolute offset. Offsets past the end of the stream are rejected.
    pub fn seek_to(&mut self, offset: i64) -> Result<()> {
        if offset < 0 || offset as u64 > self.length {
            return Err(self.truncated(offset));
        }
        self.inner.seek(SeekFrom::Start(offset as u64))?;
        Ok(())
    }

    /// Move forward by `count` bytes
    pub fn skip(&mut self, count: i64) -> Result<()> {
        let position = self.position()? as i64;
        self.seek_to(position.saturating_add(count))
    }

    /// Read any [`BinRead`] value that takes no arguments
    pub fn read<T>(&mut self) -> Result<T>
    where
        T: for<'a> BinRead<Args<'a> = ()>,
    {
        self.read_args(())
    }

    /// Read any [`BinRead`] value with the given arguments
    pub fn read_args<'a, T: BinRead>(&mut self, args: T::Args<'a>) -> Result<T> {
        let offset = self.position()?;
        T::read_options(&mut self.inner, self.endian, args).map_err(|e| {
            if e.is_eof() {
                self.truncated(offset as i64)
            } else {
                Error::from(e)
            }
        })
    }

    /// Read exactly `count` raw bytes
    pub fn read_bytes(&mut self, count: i64) -> Result<Vec<u8>> {
        let offset = self.position()? as i64;
        if count < 0 || (offset as u64).saturating_add(count as u64) > self.length {
            return Err(self.truncated(offset));
        }

        let mut buffer = vec![0u8; count as usize];
        self.inner.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Read a length prefixed string, see [`UnrealString`]
    pub fn read_unreal_string(&mut self) -> Result<String> {
        Ok(self.read::<UnrealString>()?.0)
    }

    /// Unwrap and return the inner stream
    ///
    /// The position of the stream is undefined.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn truncated(&self, offset: i64) -> Error {
        Error::Truncated {
            offset,
            stream_length: self.length,
        }
    }
}

/// A length prefixed string as stored in name tables and headers.
///
/// A positive length is a count of Latin-1 bytes, a negative length is a count of
/// UTF-16 code units in the stream's byte order. Both include the null terminator,
/// which is dropped along with anything after it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, AsRef, Deref, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnrealString(pub String);

impl From<UnrealString> for String {
    fn from(value: UnrealString) -> Self {
        value.0
    }
}

impl BinRead for UnrealString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let length = i32::read_options(reader, endian, ())?;

        let value = match length.cmp(&0) {
            Ordering::Equal => String::new(),
            Ordering::Greater => {
                let bytes = read_exact_vec(reader, length as u64)?;
                bytes
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| char::from(b))
                    .collect()
            }
            Ordering::Less => {
                let bytes = read_exact_vec(reader, u64::from(length.unsigned_abs()) * 2)?;
                let units = bytes
                    .chunks_exact(2)
                    .map(|c| match endian {
                        Endian::Big => u16::from_be_bytes([c[0], c[1]]),
                        Endian::Little => u16::from_le_bytes([c[0], c[1]]),
                    })
                    .take_while(|&u| u != 0)
                    .collect::<Vec<_>>();
                U16String::from_vec(units).to_string_lossy()
            }
        };

        Ok(UnrealString(value))
    }
}

fn read_exact_vec<R: Read>(reader: &mut R, count: u64) -> BinResult<Vec<u8>> {
    let mut buffer = Vec::new();
    reader.by_ref().take(count).read_to_end(&mut buffer)?;
    if buffer.len() as u64 != count {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(buffer)
}

/// A 128-bit identifier stored as four 32-bit words in the package's byte order
#[derive(BinRead, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
#[display("{a:08X}{b:08X}{c:08X}{d:08X}")]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Guid {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}
