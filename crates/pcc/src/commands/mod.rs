use std::path::Path;

use miette::{Context, Result};
use pcc_package::{read::LoadOptions, Package};

pub mod diff;
pub mod extract;
pub mod info;
pub mod list;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Summarize the header of a package
    Info(info::InfoArgs),
    /// List the names, imports or exports of a package
    List(list::ListArgs),
    /// Extract export payloads into a directory
    Extract(extract::ExtractArgs),
    /// Compare two packages
    Diff(diff::DiffArgs),
}

impl Commands {
    pub fn handle(&self) -> Result<()> {
        match self {
            Commands::Info(info) => info.handle(),
            Commands::List(list) => list.handle(),
            Commands::Extract(extract) => extract.handle(),
            Commands::Diff(diff) => diff.handle(),
        }
    }
}

fn open(path: &Path, options: LoadOptions) -> Result<Package> {
    Package::open(path, options).wrap_err(format!("path: {}", path.display()))
}
