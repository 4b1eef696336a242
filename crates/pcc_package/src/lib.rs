//! This library handles reading the Unreal Engine 3 **package** files (`.pcc`, `.sfm`, `.upk`, `.u`)
//! used by the *Mass Effect* trilogy, its console ports and remasters, and *Life is Strange*.
//!
//! # Package Format Documentation
//!
//! A package stores a name table, an import table, an export table and the serialized payload of
//! every export. The games were built on several engine revisions and shipped on four platforms,
//! so the summary and tables differ slightly between builds. Each build is identified by its
//! version pair and byte order, see [`registry::GAME_IDENTIFIERS`].
//!
//! ## File Structure
//!
//! | Offset (bytes) | Field                  | Description                                                  |
//! |----------------|------------------------|--------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: 0x9E2A83C1, its byte order is the package's         |
//! | 0x0004         | Version                | 4 bytes: engine version (low 16 bits), licensee version (high) |
//! | 0x0008         | Header Size            | 4 bytes: Size of the summary and tables                      |
//! | 0x000C         | Folder Name            | Length prefixed string, conventionally "None"                |
//! | ...            | Package Flags          | 4 bytes: See [`types::PackageFlags`]                         |
//! | ...            | Names                  | 8 bytes: Name count and offset                               |
//! | ...            | Exports                | 8 bytes: Export count and offset                             |
//! | ...            | Imports                | 8 bytes: Import count and offset                             |
//! | ...            | Dependency Offset      | 4 bytes: Missing from Mass Effect on Xbox 360                |
//! | ...            | Guid Tables            | 16 bytes: Legacy offsets and counts, always zero             |
//! | ...            | Package Guid           | 16 bytes                                                     |
//! | ...            | Generations            | 4 byte count, then 12 bytes per generation                   |
//! | ...            | Engine Version         | 4 bytes                                                      |
//! | ...            | Cooked Content Version | 4 bytes                                                      |
//! | ...            | Compression            | 4 bytes: Codec of the body chunks, see [`CompressionMethod`] |
//! | ...            | Chunks                 | 4 byte count, then 16 bytes per chunk                        |
//! | ...            | Package Source         | 4 bytes, followed by 4 unused bytes on ME1 and ME2 PC/Xbox   |
//! | ...            | Additional Packages    | 4 byte count, then strings. Not on ME1 PC/Xbox or LiS        |
//!
//! ### Strings
//!
//! Strings start with a signed 32 bit length that includes the null terminator. A positive length
//! counts Latin-1 bytes, a negative one counts UTF-16 code units.
//!
//! ### Byte Order
//!
//! PC builds are little endian, console builds big endian. The magic number is read little endian:
//! if it matches, the package is little endian, if its byte swapped value matches, big endian.
//!
//! ### Compressed Bodies
//!
//! When the compression field is set and there are chunks, everything after the summary is stored in
//! compressed chunks. Each chunk descriptor holds:
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Uncompressed Offset    | 4 bytes: Where the chunk goes in the decompressed file  |
//! | 0x0004         | Uncompressed Size      | 4 bytes                                                 |
//! | 0x0008         | Compressed Offset      | 4 bytes: Where the chunk is stored in the file          |
//! | 0x000C         | Compressed Size        | 4 bytes                                                 |
//!
//! Every chunk starts with the magic number, a block size, the compressed and uncompressed totals and
//! a `(compressed, uncompressed)` pair per block. The blocks follow, each compressed independently.
//!
//! ### Fully Compressed Packages
//!
//! Some console packages are compressed as a whole. Their version field is `0x00010000` (PS3, LZMA)
//! or `0x00020000` (Xbox 360 LZX or Wii U LZMA), which is also the block size of the container that
//! follows. The container has the same layout as a chunk, is always little endian, and expands to a
//! complete package.
//!
//! ### Tables
//!
//! | Table   | Entry                                                                                      |
//! |---------|--------------------------------------------------------------------------------------------|
//! | Names   | String, followed by 8 unused bytes on ME1 PC/Xbox and LiS, 4 on ME2 PC/Xbox                |
//! | Imports | Class package (name), class (name), owner (uindex), object name (name): 28 bytes           |
//! | Exports | Class, super class, owner (uindex), object name (name), archetype, object flags (8 bytes), |
//! |         | serial size, serial offset, component map (ME1 and ME2 PC/Xbox), export flags,             |
//! |         | generation net objects (count and indices), package guid, package flags                    |
//!
//! A name reference is a name table index and an instance number. Entries refer to each other by
//! uindex: exports are numbered from `1`, imports from `-1`, and `0` means none.
//!
//! ## Additional Information
//!
//! - **File Extensions**: `.pcc`, `.sfm`, `.upk`, `.u`
//! - **Compression Methods**:
//!   - `0`: None
//!   - `1`: Zlib
//!   - `2`: LZO
//!   - `4`: LZX
//!   - `8`: LZMA
//!

pub mod compression;
pub mod endian;
pub mod entry;
pub mod error;
pub mod localization;
pub mod package;
pub mod platform;
pub mod read;
pub mod register;
pub mod registry;
pub mod types;

pub use compression::CompressionMethod;
pub use entry::{Entry, EntryRef, ExportEntry, ImportEntry, NameReference};
pub use package::Package;
pub use read::LoadOptions;
pub use registry::{Game, Platform};
