use std::{
    fs::File,
    io::Write,
    path::{Component, Path, PathBuf},
};

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use pcc_package::{read::LoadOptions, Entry};
use tracing::{info, warn};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input package
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Only extract exports of this class
    #[arg(short, long)]
    class: Option<String>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let package = super::open(&self.file, LoadOptions::default())?;

        for export in package.exports() {
            if let Some(class) = &self.class {
                if !package.class_name(export).eq_ignore_ascii_case(class) {
                    continue;
                }
            }

            let Some(data) = export.data() else {
                warn!(uindex = export.uindex(), "export has no payload");
                continue;
            };

            let full_path = package.full_path(export);
            let Some(p) = target_path(&self.directory, &full_path, &package.class_name(export))
            else {
                warn!(path = %full_path, "export path leaves the target directory, skipping");
                continue;
            };
            info!("writing {}", p.display());

            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }
            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            out.write_all(data).into_diagnostic()?;
        }

        Ok(())
    }
}

/// Strip separators and drive prefixes from one path segment
fn clean_segment(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':'))
        .collect()
}

/// Where an export is written: one directory per owner, named `<object>.<class>`.
///
/// Returns `None` when the result would not stay inside `directory`.
fn target_path(directory: &Path, full_path: &str, class: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in full_path.split('.') {
        let segment = clean_segment(segment);
        if segment.is_empty() {
            return None;
        }
        relative.push(segment);
    }

    let class = clean_segment(class);
    if class.is_empty() {
        return None;
    }
    relative.set_extension(class);

    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let path = directory.join(relative);
    path.starts_with(directory).then_some(path)
}
