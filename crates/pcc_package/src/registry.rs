//! Known package builds.
//!
//! Every supported build is identified by its engine version, licensee version and the
//! byte order of its header. The table is append only: builds are added when a new
//! version pair is found and are never removed.

use binrw::Endian;
use derive_more::derive::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The game a package was cooked for
#[derive(Debug, Display, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Game {
    #[default]
    #[display("Mass Effect")]
    ME1,
    #[display("Mass Effect 2")]
    ME2,
    #[display("Mass Effect 3")]
    ME3,
    #[display("Mass Effect (Legendary Edition)")]
    LE1,
    #[display("Mass Effect 2 (Legendary Edition)")]
    LE2,
    #[display("Mass Effect 3 (Legendary Edition)")]
    LE3,
    #[display("Life is Strange")]
    LiS,
}

impl Game {
    /// Whether this is one of the Legendary Edition remasters
    pub fn is_legendary_edition(self) -> bool {
        matches!(self, Game::LE1 | Game::LE2 | Game::LE3)
    }
}

/// The hardware a package was cooked for
#[derive(Debug, Display, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Platform {
    #[default]
    PC,
    #[display("Xbox 360")]
    Xenon,
    PS3,
    #[display("Wii U")]
    WiiU,
}

/// One known build
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GameIdentifier {
    pub unreal_version: u16,
    pub licensee_version: u16,
    pub endian: Endian,
    pub game: Game,
    pub platform: Platform,
    /// Human readable description of the build
    pub source: &'static str,
}

impl GameIdentifier {
    const fn new(
        unreal_version: u16,
        licensee_version: u16,
        endian: Endian,
        game: Game,
        platform: Platform,
        source: &'static str,
    ) -> Self {
        Self {
            unreal_version,
            licensee_version,
            endian,
            game,
            platform,
            source,
        }
    }

    /// Whether this build has the given version pair and byte order
    pub fn matches(&self, unreal_version: u16, licensee_version: u16, endian: Endian) -> bool {
        self.unreal_version == unreal_version
            && self.licensee_version == licensee_version
            && self.endian == endian
    }

    /// The summary and table layout packages of this build use
    pub fn layout(&self) -> PackageLayout {
        PackageLayout::new(self.game, self.platform)
    }
}

/// Every supported build, in lookup order.
///
/// The Mass Effect 3 PS3 and Xbox 360 retail builds share the same header. The PS3
/// entry comes first so it is the provisional answer until the platform is resolved.
#[rustfmt::skip]
pub static GAME_IDENTIFIERS: &[GameIdentifier] = &[
    GameIdentifier::new(491, 1008, Endian::Little, Game::ME1, Platform::PC, "Mass Effect PC"),
    GameIdentifier::new(391, 146, Endian::Big, Game::ME1, Platform::Xenon, "Mass Effect Xbox 360"),
    GameIdentifier::new(684, 153, Endian::Big, Game::ME1, Platform::PS3, "Mass Effect PS3"),
    GameIdentifier::new(512, 130, Endian::Little, Game::ME2, Platform::PC, "Mass Effect 2 PC"),
    GameIdentifier::new(513, 130, Endian::Little, Game::ME2, Platform::PC, "Mass Effect 2 PC demo"),
    GameIdentifier::new(512, 130, Endian::Big, Game::ME2, Platform::Xenon, "Mass Effect 2 Xbox 360"),
    GameIdentifier::new(684, 150, Endian::Big, Game::ME2, Platform::PS3, "Mass Effect 2 PS3"),
    GameIdentifier::new(684, 194, Endian::Little, Game::ME3, Platform::PC, "Mass Effect 3 PC"),
    GameIdentifier::new(684, 194, Endian::Big, Game::ME3, Platform::PS3, "Mass Effect 3 PS3"),
    GameIdentifier::new(684, 194, Endian::Big, Game::ME3, Platform::Xenon, "Mass Effect 3 Xbox 360"),
    GameIdentifier::new(845, 194, Endian::Big, Game::ME3, Platform::WiiU, "Mass Effect 3 Wii U"),
    GameIdentifier::new(684, 185, Endian::Big, Game::ME3, Platform::Xenon, "Mass Effect 3 Xbox 360 demo"),
    GameIdentifier::new(684, 171, Endian::Little, Game::LE1, Platform::PC, "Mass Effect Legendary Edition"),
    GameIdentifier::new(684, 185, Endian::Little, Game::LE2, Platform::PC, "Mass Effect 2 Legendary Edition"),
    GameIdentifier::new(685, 205, Endian::Little, Game::LE3, Platform::PC, "Mass Effect 3 Legendary Edition"),
    GameIdentifier::new(893, 21, Endian::Little, Game::LiS, Platform::PC, "Life is Strange"),
];

/// Result of looking a header up in [`GAME_IDENTIFIERS`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Identification {
    /// The first matching build
    pub identifier: &'static GameIdentifier,
    /// Another build with a different platform shares the same header
    pub ambiguous: bool,
}

/// Find the build a header belongs to
pub fn identify(unreal_version: u16, licensee_version: u16, endian: Endian) -> Option<Identification> {
    let mut matches = GAME_IDENTIFIERS
        .iter()
        .filter(|id| id.matches(unreal_version, licensee_version, endian));

    let identifier = matches.next()?;
    let ambiguous = matches.any(|other| other.platform != identifier.platform);

    Some(Identification {
        identifier,
        ambiguous,
    })
}

/// The first PC build of a game, used for the versions of new packages
pub fn pc_identifier(game: Game) -> Option<&'static GameIdentifier> {
    GAME_IDENTIFIERS
        .iter()
        .find(|id| id.game == game && id.platform == Platform::PC)
}

/// Optional parts of the summary and tables that differ between builds
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PackageLayout {
    /// The summary stores a dependency table offset
    pub has_dependency_table: bool,
    /// Four unused bytes follow the package source
    pub has_package_source_padding: bool,
    /// The summary ends with the list of additional packages to cook
    pub has_additional_packages: bool,
    /// Unused bytes stored after every name
    pub name_trailer: u8,
    /// Export entries carry a component map
    pub has_component_map: bool,
}

impl PackageLayout {
    pub fn new(game: Game, platform: Platform) -> Self {
        let legacy = matches!(game, Game::ME1 | Game::ME2) && platform != Platform::PS3;

        Self {
            has_dependency_table: !(game == Game::ME1 && platform == Platform::Xenon),
            has_package_source_padding: legacy,
            has_additional_packages: !matches!(game, Game::ME1 | Game::LiS)
                || platform == Platform::PS3,
            name_trailer: match game {
                Game::ME1 if legacy => 8,
                Game::ME2 if legacy => 4,
                Game::LiS => 8,
                _ => 0,
            },
            has_component_map: legacy,
        }
    }
}
