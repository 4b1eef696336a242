use std::path::PathBuf;

use clap::{Args, ValueEnum};
use miette::Result;
use owo_colors::OwoColorize;
use pcc_package::{read::LoadOptions, Entry};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Table {
    Names,
    Imports,
    #[default]
    Exports,
}

#[derive(Args)]
pub struct ListArgs {
    /// An input package
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Which table to list
    #[arg(short, long, value_enum, default_value_t = Table::Exports)]
    table: Table,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let options = LoadOptions::builder()
            .load_predicate(std::sync::Arc::new(|_: &pcc_package::ExportEntry| false))
            .build();
        let package = super::open(&self.file, options)?;

        match self.table {
            Table::Names => {
                for (index, name) in package.names().iter().enumerate() {
                    println!("{:>6} {}", index.dimmed(), name);
                }
            }
            Table::Imports => {
                for import in package.imports() {
                    println!(
                        "{:>6} {} {}",
                        import.uindex().dimmed(),
                        package.full_path(import),
                        package.import_class_name(import).blue()
                    );
                }
            }
            Table::Exports => {
                for export in package.exports() {
                    println!(
                        "{:>6} {} {} {}",
                        export.uindex().dimmed(),
                        package.full_path(export),
                        package.class_name(export).blue(),
                        format!("{} bytes", export.serial_size).dimmed()
                    );
                }
            }
        }

        Ok(())
    }
}
