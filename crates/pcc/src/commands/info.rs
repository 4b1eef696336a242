use std::path::PathBuf;

use binrw::Endian;
use clap::Args;
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use pcc_package::{
    endian::Guid, localization::Localization, read::LoadOptions, CompressionMethod, Game, Package,
    Platform,
};
use serde::Serialize;

#[derive(Args)]
pub struct InfoArgs {
    /// An input package
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
struct Summary {
    game: Game,
    platform: Platform,
    platform_resolved: bool,
    big_endian: bool,
    unreal_version: u16,
    licensee_version: u16,
    flags: u32,
    package_guid: Guid,
    compression: Option<CompressionMethod>,
    fully_compressed: Option<CompressionMethod>,
    localization: Localization,
    names: usize,
    imports: usize,
    exports: usize,
    additional_packages_to_cook: Vec<String>,
}

impl Summary {
    fn new(package: &Package) -> Self {
        let summary = package.summary();
        Self {
            game: package.game(),
            platform: package.platform(),
            platform_resolved: package.is_platform_resolved(),
            big_endian: package.endian() == Endian::Big,
            unreal_version: package.unreal_version(),
            licensee_version: package.licensee_version(),
            flags: package.flags().bits(),
            package_guid: package.package_guid(),
            compression: package
                .is_compressed()
                .then(|| package.compression().ok())
                .flatten(),
            fully_compressed: package.fully_compressed(),
            localization: package.localization(),
            names: summary.name_count as usize,
            imports: summary.import_count as usize,
            exports: summary.export_count as usize,
            additional_packages_to_cook: package.additional_packages_to_cook().to_vec(),
        }
    }
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let options = LoadOptions::builder().header_only(true).build();
        let package = super::open(&self.file, options)?;
        let summary = Summary::new(&package);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
            return Ok(());
        }

        let platform = if summary.platform_resolved {
            summary.platform.to_string()
        } else {
            format!("{} (provisional)", summary.platform)
        };

        println!("{} {}", "package:".bold(), self.file.display());
        println!("  game:         {}", summary.game.green());
        println!("  platform:     {}", platform);
        println!(
            "  version:      {}/{} ({})",
            summary.unreal_version,
            summary.licensee_version,
            if summary.big_endian { "big endian" } else { "little endian" }
        );
        println!("  flags:        {:#010X}", summary.flags);
        println!("  guid:         {}", summary.package_guid);
        if let Some(method) = summary.fully_compressed {
            println!("  container:    {:?}", method);
        }
        if let Some(method) = summary.compression {
            println!("  compression:  {:?}", method);
        }
        if summary.localization != Localization::None {
            println!("  localization: {:?} ({})", summary.localization, summary.localization);
        }
        println!(
            "  tables:       {} names, {} imports, {} exports",
            summary.names, summary.imports, summary.exports
        );
        if !summary.additional_packages_to_cook.is_empty() {
            println!(
                "  also cooks:   {}",
                summary.additional_packages_to_cook.join(", ")
            );
        }

        Ok(())
    }
}
