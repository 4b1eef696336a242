//! Language detection from package file names.

use std::path::Path;

use derive_more::derive::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The language a package holds localized content for
///
/// Localized packages are named after their base package with a language suffix,
/// for example `BioD_Nor_100Cabin_LOC_INT.pcc` or `Startup_DEU.pcc`.
#[derive(Debug, Display, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Localization {
    /// Not a localized package
    #[default]
    None,
    #[display("INT")]
    English,
    #[display("DEU")]
    German,
    #[display("ESN")]
    Spanish,
    #[display("FRA")]
    French,
    #[display("ITA")]
    Italian,
    #[display("JPN")]
    Japanese,
    #[display("POL")]
    Polish,
    #[display("RUS")]
    Russian,
}

impl Localization {
    /// Map a language suffix such as `INT` or `deu`
    pub fn from_suffix(suffix: &str) -> Self {
        match suffix.to_ascii_uppercase().as_str() {
            "INT" => Localization::English,
            "DEU" | "DE" => Localization::German,
            "ESN" | "ES" => Localization::Spanish,
            "FRA" | "FR" => Localization::French,
            "ITA" | "IT" => Localization::Italian,
            "JPN" | "JA" => Localization::Japanese,
            "POL" | "PL" | "PLPC" => Localization::Polish,
            "RUS" | "RA" | "RU" => Localization::Russian,
            _ => Localization::None,
        }
    }

    /// Detect the language from the part of the file name after its last underscore
    pub fn from_path(path: &Path) -> Self {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.rsplit_once('_'))
            .map(|(_, suffix)| Localization::from_suffix(suffix))
            .unwrap_or_default()
    }
}
