//! Loading packages from files and streams
//!

use std::{
    fmt::{self, Debug},
    fs::File,
    io::{BufReader, Cursor, Read, Seek},
    path::{Path, PathBuf},
    sync::Arc,
};

use binrw::Endian;
use bon::Builder;
use tracing::{debug, instrument, warn};

use crate::{
    compression::{decompress_chunks, decompress_fully_compressed, CompressionMethod, PackageStream},
    endian::EndianReader,
    entry::{ExportEntry, ImportEntry},
    error::{Error, Result},
    localization::Localization,
    package::{ChangeTracking, Package},
    platform::{probe_shader_cache, PlatformState, SHADER_CACHE_CLASS},
    registry::{identify, Platform},
    types::PackageSummary,
};

/// Version word of a fully compressed PS3 package, which is LZMA compressed
pub const FULLY_COMPRESSED_PS3: u32 = 0x0001_0000;

/// Version word of a fully compressed Xbox 360 (LZX) or Wii U (LZMA) package
pub const FULLY_COMPRESSED_CONSOLE: u32 = 0x0002_0000;

/// Decides which export payloads are read
pub type LoadPredicate = Arc<dyn Fn(&ExportEntry) -> bool + Send + Sync>;

/// Options for how a package should be loaded
#[derive(Clone, Default, Builder)]
pub struct LoadOptions {
    /// Where the package came from. Used to detect its localization.
    #[builder(into)]
    pub file_path: Option<PathBuf>,

    /// Stop after the summary, leaving the tables empty
    #[builder(default)]
    pub header_only: bool,

    /// Only read the payloads of exports it accepts. All payloads are read without one.
    pub load_predicate: Option<LoadPredicate>,

    /// Load the package as shared so hooks can observe changes to it
    #[builder(default)]
    pub track_changes: bool,
}

impl Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("file_path", &self.file_path)
            .field("header_only", &self.header_only)
            .field("load_predicate", &self.load_predicate.is_some())
            .field("track_changes", &self.track_changes)
            .finish()
    }
}

impl Package {
    /// Open the package at `path`.
    ///
    /// The path is used as the package's file path unless `options` sets one.
    #[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>, mut options: LoadOptions) -> Result<Package> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);

        if options.file_path.is_none() {
            options.file_path = Some(path.to_path_buf());
        }

        Self::from_reader(reader, options)
    }

    /// Read a package from a stream positioned at its first byte.
    ///
    /// The stream is consumed and dropped before returning.
    #[instrument(skip(reader), err)]
    pub fn from_reader<R: Read + Seek>(reader: R, options: LoadOptions) -> Result<Package> {
        let mut reader = EndianReader::for_package(PackageStream::Source(reader))?;

        let mut fully_compressed = None;
        let mut platform_override = None;
        let packed_version = loop {
            let packed_version: u32 = reader.read()?;
            let sentinel = matches!(
                packed_version,
                FULLY_COMPRESSED_PS3 | FULLY_COMPRESSED_CONSOLE
            );
            if !sentinel || reader.endian() != Endian::Little {
                break packed_version;
            }

            if fully_compressed.is_some() {
                return Err(Error::MalformedCompression(
                    "fully compressed package contains another compressed container".to_string(),
                ));
            }

            let hint = (packed_version == FULLY_COMPRESSED_PS3).then_some(CompressionMethod::Lzma);
            let (data, method) = decompress_fully_compressed(&mut reader, packed_version, hint)?;
            debug!(?method, size = data.len(), "decompressed fully compressed package");

            platform_override = Some(match (packed_version, method) {
                (FULLY_COMPRESSED_PS3, _) => Platform::PS3,
                (_, CompressionMethod::Lzx) => Platform::Xenon,
                _ => Platform::WiiU,
            });
            fully_compressed = Some(method);

            drop(reader);
            reader = EndianReader::for_package(PackageStream::Decompressed(Cursor::new(data)))?;
        };

        let endian = reader.endian();
        let unreal_version = (packed_version & 0xFFFF) as u16;
        let licensee_version = (packed_version >> 16) as u16;

        let Some(identification) = identify(unreal_version, licensee_version, endian) else {
            return Err(Error::UnsupportedFormat {
                unreal_version,
                licensee_version,
                endian,
            });
        };
        let identifier = identification.identifier;
        debug!(source = identifier.source, "identified package");

        let mut platform = match (identification.ambiguous, platform_override) {
            (false, _) => PlatformState::Resolved(identifier.platform),
            (true, Some(platform)) => PlatformState::Resolved(platform),
            (true, None) => PlatformState::Pending {
                provisional: identifier.platform,
            },
        };

        let layout = identifier.layout();
        let summary: PackageSummary = reader.read_args((layout,))?;

        if platform.is_pending() && summary.compression_flags != 0 {
            let resolved = if summary.compression_flags == u32::from(CompressionMethod::Lzx) {
                Platform::Xenon
            } else {
                Platform::PS3
            };
            debug!(%resolved, "platform resolved from compression method");
            platform = PlatformState::Resolved(resolved);
        }

        let localization = options
            .file_path
            .as_deref()
            .map(Localization::from_path)
            .unwrap_or_default();

        let mut package = Package {
            file_path: options.file_path.clone(),
            game: identifier.game,
            platform,
            endian,
            unreal_version,
            licensee_version,
            summary,
            fully_compressed,
            localization,
            names: Vec::new(),
            name_lookup: Default::default(),
            imports: Vec::new(),
            exports: Vec::new(),
            lookup: Default::default(),
            modified: false,
            tracking: if options.track_changes {
                ChangeTracking::Shared(Vec::new())
            } else {
                ChangeTracking::Private
            },
        };

        if options.header_only {
            return Ok(package);
        }

        if package.summary.is_compressed() {
            let method = package.summary.compression()?;
            let data = decompress_chunks(&mut reader, &package.summary.chunks, method)?;
            reader = EndianReader::new(PackageStream::Decompressed(Cursor::new(data)), endian)?;
        }

        let names = read_names(&mut reader, &package.summary, layout.name_trailer)?;
        package.set_names(names);

        package.imports = read_imports(&mut reader, &package.summary)?;

        read_exports(&mut reader, &mut package, layout.has_component_map)?;

        read_payloads(&mut reader, &mut package, options.load_predicate.as_deref())?;

        if let PlatformState::Pending { provisional } = package.platform {
            warn!(
                %provisional,
                path = ?package.file_path,
                "package platform could not be resolved, assuming provisional platform"
            );
        }

        package.rebuild_lookup();
        Ok(package)
    }
}

/// Number of entries in a table, rejecting negative counts and offsets
fn table_len<R: Read + Seek>(
    reader: &EndianReader<R>,
    table: &'static str,
    count: i32,
    offset: i32,
) -> Result<usize> {
    if count < 0 {
        return Err(Error::NegativeCount { table, count, offset });
    }
    if offset < 0 {
        return Err(Error::Truncated {
            offset: i64::from(offset),
            stream_length: reader.len(),
        });
    }
    Ok(count as usize)
}

#[instrument(skip(reader, summary), err)]
fn read_names<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    summary: &PackageSummary,
    trailer: u8,
) -> Result<Vec<String>> {
    let count = table_len(reader, "name", summary.name_count, summary.name_offset)?;
    reader.seek_to(i64::from(summary.name_offset))?;

    let mut names = Vec::with_capacity(count.min(0x10000));
    for _ in 0..count {
        names.push(reader.read_unreal_string()?);
        reader.skip(i64::from(trailer))?;
    }

    debug!(count, "read names");
    Ok(names)
}

#[instrument(skip_all, err)]
fn read_imports<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    summary: &PackageSummary,
) -> Result<Vec<ImportEntry>> {
    let count = table_len(reader, "import", summary.import_count, summary.import_offset)?;
    reader.seek_to(i64::from(summary.import_offset))?;

    let mut imports = Vec::with_capacity(count.min(0x10000));
    for index in 0..count {
        let mut import: ImportEntry = reader.read()?;
        import.index = index;
        imports.push(import);
    }

    debug!(count, "read imports");
    Ok(imports)
}

/// Read the export table, probing the first shader cache while the platform is pending
#[instrument(skip_all, err)]
fn read_exports<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    package: &mut Package,
    has_component_map: bool,
) -> Result<()> {
    let count = table_len(reader, "export", package.summary.export_count, package.summary.export_offset)?;
    reader.seek_to(i64::from(package.summary.export_offset))?;

    package.exports = Vec::with_capacity(count.min(0x10000));
    for index in 0..count {
        let mut export: ExportEntry = reader.read_args((has_component_map,))?;
        export.index = index;

        if package.platform.is_pending() && package.class_name(&export) == SHADER_CACHE_CLASS {
            if let Some(platform) = probe_shader_cache(reader, export.serial_offset)? {
                debug!(%platform, export = index, "platform resolved from shader cache");
                package.platform = PlatformState::Resolved(platform);
            }
        }

        package.exports.push(export);
    }

    debug!(count, "read exports");
    Ok(())
}

#[instrument(skip_all, err)]
fn read_payloads<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    package: &mut Package,
    predicate: Option<&(dyn Fn(&ExportEntry) -> bool + Send + Sync)>,
) -> Result<()> {
    let mut loaded = 0usize;
    for export in package.exports.iter_mut() {
        if predicate.is_some_and(|accept| !accept(&*export)) {
            continue;
        }

        reader.seek_to(i64::from(export.serial_offset))?;
        let data = reader.read_bytes(i64::from(export.serial_size))?;
        export.load_data(data);
        loaded += 1;
    }

    debug!(loaded, "read export payloads");
    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::Endian;

    use super::table_len;
    use crate::endian::EndianReader;
    use crate::error::Error;
    use crate::read::LoadOptions;
    use crate::Package;

    #[test]
    fn read_invalid_magic() {
        #[rustfmt::skip]
        let input = [
            0x45, 0x45, 0x52, 0x54, 0x35, 0x30, 0x30, 0x30,
            0x00, 0x00, 0x00, 0x00,
        ];

        let package = Package::from_reader(Cursor::new(input), LoadOptions::default());
        assert!(matches!(package, Err(Error::InvalidPackage(0x5452_4545))));
    }

    #[test]
    fn read_unknown_version() {
        #[rustfmt::skip]
        let input = [
            0xC1, 0x83, 0x2A, 0x9E,
            0x01, 0x00, 0x02, 0x00,
        ];

        let package = Package::from_reader(Cursor::new(input), LoadOptions::default());
        assert!(matches!(
            package,
            Err(Error::UnsupportedFormat {
                unreal_version: 1,
                licensee_version: 2,
                ..
            })
        ));
    }

    #[test]
    fn big_endian_sentinel_is_a_version() {
        #[rustfmt::skip]
        let input = [
            0x9E, 0x2A, 0x83, 0xC1,
            0x00, 0x01, 0x00, 0x00,
        ];

        let package = Package::from_reader(Cursor::new(input), LoadOptions::default());
        assert!(matches!(
            package,
            Err(Error::UnsupportedFormat {
                unreal_version: 0,
                licensee_version: 1,
                ..
            })
        ));
    }

    #[test]
    fn truncated_summary() {
        #[rustfmt::skip]
        let input = [
            0xC1, 0x83, 0x2A, 0x9E,
            0xAC, 0x02, 0xC2, 0x00,
            0x00, 0x01,
        ];

        let package = Package::from_reader(Cursor::new(input), LoadOptions::default());
        assert!(matches!(package, Err(Error::Truncated { offset: 8, .. })));
    }

    #[test]
    fn negative_table_count() {
        let reader = EndianReader::new(Cursor::new(vec![0u8; 0x40]), Endian::Little).unwrap();

        assert_eq!(table_len(&reader, "name", 3, 0x20).unwrap(), 3);

        let error = table_len(&reader, "import", -1, 0x20).unwrap_err();
        assert!(matches!(
            error,
            Error::NegativeCount {
                table: "import",
                count: -1,
                offset: 0x20
            }
        ));
        assert_eq!(
            error.to_string(),
            "import table at offset 0x20 declares a negative entry count (-1)"
        );

        let error = table_len(&reader, "export", 2, -8).unwrap_err();
        assert!(matches!(error, Error::Truncated { offset: -8, stream_length: 0x40 }));
    }

    #[test]
    fn options_builder() {
        let options = LoadOptions::builder()
            .file_path("Startup_INT.pcc")
            .header_only(true)
            .build();

        assert!(options.header_only);
        assert!(!options.track_changes);
        assert!(options.load_predicate.is_none());
        assert_eq!(
            options.file_path.as_deref(),
            Some(std::path::Path::new("Startup_INT.pcc"))
        );
    }
}
