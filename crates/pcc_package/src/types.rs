//! Base types for the structure of a package file.

use std::io::{Read, Seek, SeekFrom};

use binrw::{binread, BinRead, BinResult, Endian};
use bitflags::bitflags;

use crate::{
    compression::CompressionMethod,
    endian::{Guid, UnrealString},
    error::Result,
    registry::PackageLayout,
};

/// Tag every package, compressed chunk and fully compressed container starts with
pub const PACKAGE_TAG: u32 = 0x9E2A_83C1;

bitflags! {
    /// Package level flags stored in the summary
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct PackageFlags: u32 {
        const ALLOW_DOWNLOAD = 0x0000_0001;
        const CLIENT_OPTIONAL = 0x0000_0002;
        const SERVER_SIDE_ONLY = 0x0000_0004;
        const COOKED = 0x0000_0008;
        const UNSECURE = 0x0000_0010;
        const SAVED_WITH_NEWER_VERSION = 0x0000_0020;
        const NEED = 0x0000_8000;
        const COMPILING = 0x0001_0000;
        const CONTAINS_MAP = 0x0002_0000;
        const TRASH = 0x0004_0000;
        const DISALLOW_LAZY_LOADING = 0x0008_0000;
        const PLAY_IN_EDITOR = 0x0010_0000;
        const CONTAINS_SCRIPT = 0x0020_0000;
        const CONTAINS_DEBUG_INFO = 0x0040_0000;
        const REQUIRE_IMPORTS_ALREADY_LOADED = 0x0080_0000;
        const SELF_CONTAINED_LIGHTING = 0x0100_0000;
        const STORE_COMPRESSED = 0x0200_0000;
        const STORE_FULLY_COMPRESSED = 0x0400_0000;
        const CONTAINS_INLINED_SHADERS = 0x0800_0000;
        const CONTAINS_FACEFX_DATA = 0x1000_0000;
        const NO_EXPORT_ALLOWED = 0x2000_0000;
        const STRIPPED_SOURCE = 0x4000_0000;
    }
}

/// Location of one compressed chunk of the package body
///
/// The chunk's bytes live at `compressed_offset` in the file and expand to
/// `uncompressed_size` bytes at `uncompressed_offset` of the decompressed stream.
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub uncompressed_offset: i32,
    pub uncompressed_size: i32,
    pub compressed_offset: i32,
    pub compressed_size: i32,
}

/// Object counts recorded for one save generation of the package
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GenerationInfo {
    pub export_count: i32,
    pub name_count: i32,
    pub net_object_count: i32,
}

/// The generation history of a package.
///
/// Only the first record is kept, the rest are skipped over.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GenerationTable {
    /// Number of records stored in the file
    pub count: u32,
    /// The first record, if any
    pub first: Option<GenerationInfo>,
}

impl BinRead for GenerationTable {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let count = u32::read_options(reader, endian, ())?;
        if count == 0 {
            return Ok(Self { count, first: None });
        }

        let first = GenerationInfo::read_options(reader, endian, ())?;
        reader.seek(SeekFrom::Current(i64::from(count - 1) * 12))?;

        Ok(Self {
            count,
            first: Some(first),
        })
    }
}

/// Read `count` values one at a time so a corrupt count can't force a huge allocation
pub(crate) fn read_counted<R, T>(
    reader: &mut R,
    endian: Endian,
    (count,): (u32,),
) -> BinResult<Vec<T>>
where
    R: Read + Seek,
    T: for<'a> BinRead<Args<'a> = ()>,
{
    let mut items = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        items.push(T::read_options(reader, endian, ())?);
    }
    Ok(items)
}

/// Read `count` length prefixed strings
pub(crate) fn read_strings<R: Read + Seek>(
    reader: &mut R,
    endian: Endian,
    (count,): (u32,),
) -> BinResult<Vec<String>> {
    let strings = read_counted::<_, UnrealString>(reader, endian, (count,))?;
    Ok(strings.into_iter().map(String::from).collect())
}

/// The package summary: everything between the packed version word and the tables
///
/// The byte order is not fixed, it is passed in when reading. Fields that only exist
/// on some builds are controlled by the [`PackageLayout`] of the identified game.
#[binread]
#[derive(Debug, Clone, Default, PartialEq)]
#[br(import(layout: PackageLayout))]
pub struct PackageSummary {
    /// Size of everything up to the end of the tables
    pub full_header_size: i32,

    /// Legacy folder name, conventionally "None"
    #[br(map = |s: UnrealString| s.0)]
    pub folder_name: String,

    #[br(map = PackageFlags::from_bits_retain)]
    pub flags: PackageFlags,

    pub name_count: i32,
    pub name_offset: i32,
    pub export_count: i32,
    pub export_offset: i32,
    pub import_count: i32,
    pub import_offset: i32,

    /// Absent on the original Xbox 360 build of the first game
    #[br(if(layout.has_dependency_table))]
    pub dependency_table_offset: Option<i32>,

    /// Followed by the legacy import guid count, export guid count and thumbnail
    /// table offset, which are always zero
    #[br(pad_after = 12)]
    pub import_export_guids_offset: i32,

    pub package_guid: Guid,

    pub generations: GenerationTable,

    pub engine_version: i32,
    pub cooked_content_version: i32,

    /// Raw compression id, see [`PackageSummary::compression`]
    pub compression_flags: u32,

    #[br(temp)]
    chunk_count: u32,

    #[br(parse_with = read_counted, args(chunk_count))]
    pub chunks: Vec<ChunkDescriptor>,

    /// Kept so the value can be written back unchanged
    #[br(pad_after = if layout.has_package_source_padding { 4 } else { 0 })]
    pub package_source: u32,

    #[br(temp, if(layout.has_additional_packages))]
    additional_package_count: u32,

    #[br(parse_with = read_strings, args(additional_package_count))]
    pub additional_packages_to_cook: Vec<String>,
}

impl PackageSummary {
    /// The codec the body chunks are compressed with
    pub fn compression(&self) -> Result<CompressionMethod> {
        CompressionMethod::try_from(self.compression_flags)
    }

    /// Whether the body has to be decompressed before the tables can be read
    pub fn is_compressed(&self) -> bool {
        self.compression_flags != 0 && !self.chunks.is_empty()
    }
}
