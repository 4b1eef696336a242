//! Constructors handed to a package front end.
//!
//! A front end that opens packages of several formats asks each format for its
//! constructors once at startup. Each constructor can only be handed out once per
//! process. A second request is a programming error and fails with
//! [`Error::AlreadyRegistered`].

use std::{
    io::{Read, Seek},
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    package::Package,
    read::LoadOptions,
    registry::Game,
};

/// A seekable byte stream
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Creates an empty package for a game
pub type BlankPackageCreator = fn(Option<PathBuf>, Game) -> Package;

/// Loads a package from a stream
pub type StreamLoader = fn(Box<dyn ReadSeek>, LoadOptions) -> Result<Package>;

static BLANK_PACKAGE_CREATOR: AtomicBool = AtomicBool::new(false);
static STREAM_LOADER: AtomicBool = AtomicBool::new(false);

fn claim(flag: &AtomicBool, name: &'static str) -> Result<()> {
    if flag.swap(true, Ordering::SeqCst) {
        return Err(Error::AlreadyRegistered(name));
    }
    debug!(hook = name, "registered");
    Ok(())
}

/// Hand out the constructor for blank packages
pub fn register_blank_package_creator() -> Result<BlankPackageCreator> {
    claim(&BLANK_PACKAGE_CREATOR, "blank package creator")?;
    Ok(create_blank as BlankPackageCreator)
}

/// Hand out the constructor that loads packages from streams
pub fn register_stream_loader() -> Result<StreamLoader> {
    claim(&STREAM_LOADER, "stream loader")?;
    Ok(load_stream as StreamLoader)
}

fn create_blank(file_path: Option<PathBuf>, game: Game) -> Package {
    Package::new(game, file_path)
}

fn load_stream(reader: Box<dyn ReadSeek>, options: LoadOptions) -> Result<Package> {
    Package::from_reader(reader, options)
}
