//! Settling which console a package was cooked for when its header can't tell.
//!
//! The PS3 and Xbox 360 builds of Mass Effect 3 write identical headers. Console
//! packages carry a `ShaderCache` export whose payload records the shader platform,
//! which is used to tell them apart.

use std::io::{Read, Seek};

use tracing::{debug, instrument};

use crate::{endian::EndianReader, error::Result, registry::Platform};

/// Class of the export whose payload identifies the platform
pub const SHADER_CACHE_CLASS: &str = "ShaderCache";

/// Offset of the shader platform byte in a shader cache payload. It follows the net
/// index and the empty property list.
pub const SHADER_PLATFORM_OFFSET: i64 = 0xC;

/// The platform of a package, which may still be waiting on the shader cache
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlatformState {
    /// The header is shared between platforms. `provisional` is used until resolved.
    Pending { provisional: Platform },
    Resolved(Platform),
}

impl Default for PlatformState {
    fn default() -> Self {
        PlatformState::Resolved(Platform::PC)
    }
}

impl PlatformState {
    /// The resolved platform, or the provisional one
    pub fn platform(&self) -> Platform {
        match *self {
            PlatformState::Pending { provisional } => provisional,
            PlatformState::Resolved(platform) => platform,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, PlatformState::Resolved(_))
    }

    pub fn is_pending(&self) -> bool {
        !self.is_resolved()
    }
}

/// Map a shader platform byte to the platform it was compiled for
pub fn platform_from_shader_marker(marker: u8) -> Option<Platform> {
    match marker {
        1 => Some(Platform::PS3),
        2 => Some(Platform::Xenon),
        5 => Some(Platform::WiiU),
        _ => None,
    }
}

/// Read the shader platform byte of a `ShaderCache` payload starting at `serial_offset`.
///
/// The reader is returned to where it was. A payload too short to hold the marker, or
/// a marker that names no console, yields `None`.
#[instrument(skip(reader), err)]
pub fn probe_shader_cache<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    serial_offset: i32,
) -> Result<Option<Platform>> {
    let position = reader.position()? as i64;

    let marker = reader
        .seek_to(i64::from(serial_offset) + SHADER_PLATFORM_OFFSET)
        .and_then(|_| reader.read::<u8>());
    reader.seek_to(position)?;

    let platform = match marker {
        Ok(marker) => {
            debug!(marker, "read shader platform marker");
            platform_from_shader_marker(marker)
        }
        Err(e) => {
            debug!(error = %e, "shader platform marker could not be read");
            None
        }
    };

    Ok(platform)
}
