//! Builds small synthetic packages for the integration tests.

#![allow(dead_code)]

use std::io::Write;

use binrw::Endian;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use flate2::{write::ZlibEncoder, Compression};
use pcc_package::{
    entry::RF_CLASS_DEFAULT_OBJECT,
    registry::{GameIdentifier, PackageLayout},
    types::PACKAGE_TAG,
};

/// Appends values in a chosen byte order
pub struct Writer {
    pub buf: Vec<u8>,
    endian: Endian,
}

impl Writer {
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    pub fn len(&self) -> i32 {
        self.buf.len() as i32
    }

    pub fn u32(&mut self, value: u32) {
        match self.endian {
            Endian::Big => self.buf.write_u32::<BigEndian>(value),
            Endian::Little => self.buf.write_u32::<LittleEndian>(value),
        }
        .unwrap();
    }

    pub fn i32(&mut self, value: i32) {
        self.u32(value as u32);
    }

    pub fn u64(&mut self, value: u64) {
        match self.endian {
            Endian::Big => self.buf.write_u64::<BigEndian>(value),
            Endian::Little => self.buf.write_u64::<LittleEndian>(value),
        }
        .unwrap();
    }

    pub fn string(&mut self, value: &str) {
        self.i32(value.len() as i32 + 1);
        self.buf.extend(value.bytes());
        self.buf.push(0);
    }

    pub fn name(&mut self, index: i32, number: i32) {
        self.i32(index);
        self.i32(number);
    }

    pub fn zeros(&mut self, count: usize) {
        self.buf.extend(std::iter::repeat(0u8).take(count));
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestImport {
    pub class_package: i32,
    pub class_name: i32,
    pub link: i32,
    pub name: i32,
    pub number: i32,
}

#[derive(Debug, Clone, Default)]
pub struct TestExport {
    pub class: i32,
    pub link: i32,
    pub name: i32,
    pub number: i32,
    pub object_flags: u64,
    pub data: Vec<u8>,
    /// Added to the payload length when writing `serial_size`
    pub extra_declared_size: i32,
}

/// Offsets written into the summary
#[derive(Debug, Clone, Copy, Default)]
pub struct Offsets {
    pub header_size: i32,
    pub name_offset: i32,
    pub import_offset: i32,
    pub export_offset: i32,
}

/// A package to be written in the layout of one registered build
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    pub identifier: GameIdentifier,
    pub names: Vec<String>,
    pub imports: Vec<TestImport>,
    pub exports: Vec<TestExport>,
    pub flags: u32,
    pub additional_packages: Vec<String>,
}

impl PackageBuilder {
    pub fn new(identifier: &GameIdentifier) -> Self {
        Self {
            identifier: *identifier,
            names: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            flags: 0x8,
            additional_packages: Vec::new(),
        }
    }

    pub fn layout(&self) -> PackageLayout {
        self.identifier.layout()
    }

    pub fn endian(&self) -> Endian {
        self.identifier.endian
    }

    /// Everything from the magic to the end of the summary
    pub fn summary(&self, offsets: Offsets, compression: u32, chunks: &[[i32; 4]]) -> Vec<u8> {
        let layout = self.layout();
        let mut w = Writer::new(self.endian());

        w.u32(PACKAGE_TAG);
        w.u32(
            (u32::from(self.identifier.licensee_version) << 16)
                | u32::from(self.identifier.unreal_version),
        );
        w.i32(offsets.header_size);
        w.string("None");
        w.u32(self.flags);
        w.i32(self.names.len() as i32);
        w.i32(offsets.name_offset);
        w.i32(self.exports.len() as i32);
        w.i32(offsets.export_offset);
        w.i32(self.imports.len() as i32);
        w.i32(offsets.import_offset);
        if layout.has_dependency_table {
            w.i32(offsets.header_size);
        }
        w.zeros(16);
        for part in [0xDEAD_BEEF, 2, 3, 4] {
            w.u32(part);
        }
        w.u32(1);
        w.i32(self.exports.len() as i32);
        w.i32(self.names.len() as i32);
        w.i32(0);
        w.i32(6383);
        w.i32(0x0003_006B);
        w.u32(compression);
        w.u32(chunks.len() as u32);
        for chunk in chunks {
            for value in chunk {
                w.i32(*value);
            }
        }
        w.u32(0x002B_B05E);
        if layout.has_package_source_padding {
            w.zeros(4);
        }
        if layout.has_additional_packages {
            w.u32(self.additional_packages.len() as u32);
            for package in &self.additional_packages {
                w.string(package);
            }
        }

        w.buf
    }

    /// Tables and payloads laid out from `start`
    pub fn body(&self, start: i32) -> (Vec<u8>, Offsets) {
        let layout = self.layout();
        let mut w = Writer::new(self.endian());

        let name_offset = start;
        for name in &self.names {
            w.string(name);
            w.zeros(usize::from(layout.name_trailer));
        }

        let import_offset = start + w.len();
        for import in &self.imports {
            w.name(import.class_package, 0);
            w.name(import.class_name, 0);
            w.i32(import.link);
            w.name(import.name, import.number);
        }

        let export_offset = start + w.len();
        let export_size = if layout.has_component_map { 72 } else { 68 };
        let header_size = export_offset + export_size * self.exports.len() as i32;

        let mut payload_offset = header_size;
        for export in &self.exports {
            w.i32(export.class);
            w.i32(0);
            w.i32(export.link);
            w.name(export.name, export.number);
            w.i32(0);
            w.u64(export.object_flags);
            w.i32(export.data.len() as i32 + export.extra_declared_size);
            w.i32(payload_offset);
            if layout.has_component_map {
                w.u32(0);
            }
            w.u32(0);
            w.u32(0);
            w.zeros(16);
            w.u32(0);
            payload_offset += export.data.len() as i32;
        }
        assert_eq!(start + w.len(), header_size);

        for export in &self.exports {
            w.buf.extend(&export.data);
        }

        (
            w.buf,
            Offsets {
                header_size,
                name_offset,
                import_offset,
                export_offset,
            },
        )
    }

    /// An uncompressed package
    pub fn build(&self) -> Vec<u8> {
        let summary_len = self.summary(Offsets::default(), 0, &[]).len() as i32;
        let (body, offsets) = self.body(summary_len);

        let mut file = self.summary(offsets, 0, &[]);
        file.extend(body);
        file
    }

    /// A package whose body is one zlib compressed chunk
    pub fn build_zlib_chunked(&self) -> Vec<u8> {
        let summary_len = self.summary(Offsets::default(), 1, &[[0; 4]]).len() as i32;
        let (body, offsets) = self.body(summary_len);

        let compressed = zlib(&body);
        let mut chunk = Writer::new(self.endian());
        chunk.u32(PACKAGE_TAG);
        chunk.u32(0x20000);
        chunk.i32(compressed.len() as i32);
        chunk.i32(body.len() as i32);
        chunk.i32(compressed.len() as i32);
        chunk.i32(body.len() as i32);
        chunk.buf.extend(compressed);

        let descriptor = [summary_len, body.len() as i32, summary_len, chunk.len()];
        let mut file = self.summary(offsets, 1, &[descriptor]);
        file.extend(chunk.buf);
        file
    }
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// An LZMA block: the properties header followed by the raw stream
pub fn lzma(data: &[u8]) -> Vec<u8> {
    let options = lzma_rs::compress::Options {
        unpacked_size: lzma_rs::compress::UnpackedSize::SkipWritingToHeader,
    };
    let mut output = Vec::new();
    lzma_rs::lzma_compress_with_options(&mut &data[..], &mut output, &options).unwrap();
    output
}

/// An LZX stream holding `data` as one uncompressed block, framed with its size
pub fn lzx_stored(data: &[u8]) -> Vec<u8> {
    assert!(data.len() <= 0x8000);

    let header: u32 = (3 << 28) | ((data.len() as u32) << 4);
    let mut stream = Vec::new();
    stream.extend(((header >> 16) as u16).to_le_bytes());
    stream.extend((header as u16).to_le_bytes());
    for _ in 0..3 {
        stream.extend(1u32.to_le_bytes());
    }
    stream.extend(data);
    if data.len() % 2 == 1 {
        stream.push(0);
    }

    let mut frame = (stream.len() as u16).to_be_bytes().to_vec();
    frame.extend(stream);
    frame
}

/// Wrap a whole file in a little endian LZX container, as Xbox 360 builds ship
pub fn fully_compress_lzx(inner: &[u8]) -> Vec<u8> {
    let block = lzx_stored(inner);

    let mut w = Writer::new(Endian::Little);
    w.u32(PACKAGE_TAG);
    w.u32(0x20000);
    w.i32(block.len() as i32);
    w.i32(inner.len() as i32);
    w.i32(block.len() as i32);
    w.i32(inner.len() as i32);
    w.buf.extend(block);
    w.buf
}

/// Wrap a whole file in a little endian LZMA container, `sentinel` being the block size
pub fn fully_compress(inner: &[u8], sentinel: u32) -> Vec<u8> {
    let blocks: Vec<Vec<u8>> = inner.chunks(sentinel as usize).map(lzma).collect();
    let total: usize = blocks.iter().map(Vec::len).sum();

    let mut w = Writer::new(Endian::Little);
    w.u32(PACKAGE_TAG);
    w.u32(sentinel);
    w.i32(total as i32);
    w.i32(inner.len() as i32);
    for (block, raw) in blocks.iter().zip(inner.chunks(sentinel as usize)) {
        w.i32(block.len() as i32);
        w.i32(raw.len() as i32);
    }
    for block in blocks {
        w.buf.extend(block);
    }
    w.buf
}

/// Names: Core, Object, Package, BioP_Global, Default__Object, Class, None
///
/// Entries: `Core`, `Core.Object`, `BioP_Global`, `BioP_Global.Default__Object` and
/// `BioP_Global.Default__Object_0`
pub fn sample(identifier: &GameIdentifier) -> PackageBuilder {
    let mut builder = PackageBuilder::new(identifier);
    builder.names = ["Core", "Object", "Package", "BioP_Global", "Default__Object", "Class", "None"]
        .map(String::from)
        .to_vec();
    builder.additional_packages = vec!["SFXGame".to_string()];
    builder.imports = vec![
        TestImport {
            class_package: 0,
            class_name: 2,
            link: 0,
            name: 0,
            number: 0,
        },
        TestImport {
            class_package: 0,
            class_name: 5,
            link: -1,
            name: 1,
            number: 0,
        },
    ];
    builder.exports = vec![
        TestExport {
            class: 0,
            link: 0,
            name: 3,
            data: b"package".to_vec(),
            ..Default::default()
        },
        TestExport {
            class: -2,
            link: 1,
            name: 4,
            object_flags: RF_CLASS_DEFAULT_OBJECT,
            data: vec![1, 2, 3, 4],
            ..Default::default()
        },
        TestExport {
            class: -2,
            link: 1,
            name: 4,
            number: 1,
            data: vec![0xAB; 32],
            ..Default::default()
        },
    ];
    builder
}

/// The start of a shader cache payload: net index, empty property list, platform
pub fn shader_cache_payload(marker: u8) -> Vec<u8> {
    let mut payload = vec![0xFF, 0xFF, 0xFF, 0xFF];
    payload.extend([0u8; 8]);
    payload.push(marker);
    payload.extend([0u8; 7]);
    payload
}

/// A console package with a `SeekFreeShaderCache` export when `marker` is given
pub fn console_package(identifier: &GameIdentifier, marker: Option<u8>) -> PackageBuilder {
    let mut builder = PackageBuilder::new(identifier);
    builder.names = ["Core", "Class", "Package", "ShaderCache", "SeekFreeShaderCache", "BioA_Cat002"]
        .map(String::from)
        .to_vec();
    builder.imports = vec![
        TestImport {
            class_package: 0,
            class_name: 2,
            link: 0,
            name: 0,
            number: 0,
        },
        TestImport {
            class_package: 0,
            class_name: 1,
            link: -1,
            name: 3,
            number: 0,
        },
    ];
    builder.exports = vec![TestExport {
        class: 0,
        link: 0,
        name: 5,
        data: vec![0; 4],
        ..Default::default()
    }];
    if let Some(marker) = marker {
        builder.exports.push(TestExport {
            class: -2,
            link: 0,
            name: 4,
            data: shader_cache_payload(marker),
            ..Default::default()
        });
    }
    builder
}
