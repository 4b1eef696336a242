//! Error types that can be emitted from this library

use binrw::Endian;
use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(binrw::Error),

    /// file does not start with the package tag in either byte order
    #[error("file is not an unreal package (magic {0:#010x})")]
    InvalidPackage(u32),

    /// the version pair is not in the identity registry
    #[error("package format not supported: unreal version {unreal_version}, licensee version {licensee_version} ({endian:?} endian)")]
    #[diagnostic(help("only the builds listed in pcc_package::registry::GAME_IDENTIFIERS can be opened"))]
    UnsupportedFormat {
        /// engine version read from the packed version word
        unreal_version: u16,
        /// licensee version read from the packed version word
        licensee_version: u16,
        /// byte order detected from the magic
        endian: Endian,
    },

    /// the compression id has no codec
    #[error("unsupported compression method {0:#x}")]
    UnsupportedCompression(u32),

    /// compressed data could not be decoded
    #[error("malformed compressed data: {0}")]
    MalformedCompression(String),

    /// a table offset or payload reaches past the end of the stream
    #[error("truncated file: read at offset {offset:#x} runs past the end of the stream ({stream_length:#x} bytes)")]
    Truncated {
        /// offset the failing read started at
        offset: i64,
        /// length of the stream being read
        stream_length: u64,
    },

    /// a summary declares a table with a negative number of entries
    #[error("{table} table at offset {offset:#x} declares a negative entry count ({count})")]
    NegativeCount {
        /// which of the name, import or export tables
        table: &'static str,
        /// count read from the summary
        count: i32,
        /// table offset read from the summary
        offset: i32,
    },

    /// a constructor hook was registered twice
    #[error("{0} can only be registered once")]
    AlreadyRegistered(&'static str),

    /// unable to find requested entry
    #[error("unable to find requested entry")]
    EntryNotFound(#[from] EntryNotFoundError),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when an entry or name has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested entry")]
pub enum EntryNotFoundError {
    /// at uindex {0}
    #[error("at uindex {0}")]
    UIndex(i32),

    /// at name index {0}
    #[error("at name index {0}")]
    NameIndex(usize),

    /// by path {0}
    #[error("by path {0}")]
    Path(String),
}

impl From<binrw::Error> for Error {
    fn from(value: binrw::Error) -> Self {
        match value {
            binrw::Error::Io(io) => Error::IOError(io),
            other => Error::BinRWError(other),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
