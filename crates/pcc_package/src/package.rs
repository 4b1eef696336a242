//! The loaded package and the operations tools perform on it.

use std::{
    collections::HashMap,
    fmt::{self, Debug},
    path::{Path, PathBuf},
};

use binrw::Endian;
use tracing::debug;

use crate::{
    compression::CompressionMethod,
    endian::Guid,
    entry::{instanced_full_path, Entry, EntryLookup, EntryRef, ExportEntry, ImportEntry, NameReference},
    error::{EntryNotFoundError, Error, Result},
    localization::Localization,
    platform::PlatformState,
    registry::{pc_identifier, Game, Platform},
    types::{PackageFlags, PackageSummary},
};

/// Flags given to packages created from scratch
pub const BLANK_PACKAGE_FLAGS: PackageFlags = PackageFlags::COOKED
    .union(PackageFlags::ALLOW_DOWNLOAD)
    .union(PackageFlags::DISALLOW_LAZY_LOADING)
    .union(PackageFlags::REQUIRE_IMPORTS_ALREADY_LOADED);

/// A change made to a package after it was loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageChange {
    NameReplaced {
        index: usize,
        old: String,
        new: String,
    },
    NameAdded {
        index: usize,
    },
    ImportAdded {
        uindex: i32,
    },
    ExportAdded {
        uindex: i32,
    },
    ExportChanged {
        uindex: i32,
    },
    Modified,
}

/// Callback invoked for every change to a shared package
pub type ChangeHook = Box<dyn Fn(&PackageChange) + Send + Sync>;

/// Whether changes to a package are observed.
///
/// A package handed out to several consumers is `Shared` so edits made by one can be
/// seen by the others.
#[derive(Default)]
pub enum ChangeTracking {
    #[default]
    Private,
    Shared(Vec<ChangeHook>),
}

impl Debug for ChangeTracking {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChangeTracking::Private => write!(f, "Private"),
            ChangeTracking::Shared(hooks) => write!(f, "Shared({} hooks)", hooks.len()),
        }
    }
}

impl ChangeTracking {
    fn notify(&self, change: PackageChange) {
        if let ChangeTracking::Shared(hooks) = self {
            for hook in hooks {
                hook(&change);
            }
        }
    }
}

/// A package: the summary, the name, import and export tables, and export payloads
///
/// ```no_run
/// use pcc_package::{Package, read::LoadOptions};
///
/// fn list_exports(path: &str) -> pcc_package::error::Result<()> {
///     let package = Package::open(path, LoadOptions::default())?;
///
///     for export in package.exports() {
///         println!("{}", package.full_path(export));
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Package {
    pub(crate) file_path: Option<PathBuf>,
    pub(crate) game: Game,
    pub(crate) platform: PlatformState,
    pub(crate) endian: Endian,
    pub(crate) unreal_version: u16,
    pub(crate) licensee_version: u16,
    pub(crate) summary: PackageSummary,
    pub(crate) fully_compressed: Option<CompressionMethod>,
    pub(crate) localization: Localization,
    pub(crate) names: Vec<String>,
    pub(crate) name_lookup: HashMap<String, usize>,
    pub(crate) imports: Vec<ImportEntry>,
    pub(crate) exports: Vec<ExportEntry>,
    pub(crate) lookup: EntryLookup,
    pub(crate) modified: bool,
    pub(crate) tracking: ChangeTracking,
}

impl Package {
    /// Create an empty package for a game, using the versions of its PC build
    pub fn new(game: Game, file_path: Option<PathBuf>) -> Self {
        let (unreal_version, licensee_version) = pc_identifier(game)
            .map(|id| (id.unreal_version, id.licensee_version))
            .unwrap_or_default();

        let localization = file_path
            .as_deref()
            .map(Localization::from_path)
            .unwrap_or_default();

        Self {
            file_path,
            game,
            platform: PlatformState::Resolved(Platform::PC),
            endian: Endian::Little,
            unreal_version,
            licensee_version,
            summary: PackageSummary {
                folder_name: "None".to_string(),
                flags: BLANK_PACKAGE_FLAGS,
                ..Default::default()
            },
            fully_compressed: None,
            localization,
            names: Vec::new(),
            name_lookup: HashMap::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            lookup: EntryLookup::default(),
            modified: false,
            tracking: ChangeTracking::Private,
        }
    }

    /// Path the package was loaded from or will be saved to
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn game(&self) -> Game {
        self.game
    }

    /// The platform, which may be provisional, see [`Package::is_platform_resolved`]
    pub fn platform(&self) -> Platform {
        self.platform.platform()
    }

    pub fn platform_state(&self) -> PlatformState {
        self.platform
    }

    /// Whether the platform is known for certain. Packages whose header is shared by
    /// two consoles and that carry no shader cache stay unresolved.
    pub fn is_platform_resolved(&self) -> bool {
        self.platform.is_resolved()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn unreal_version(&self) -> u16 {
        self.unreal_version
    }

    pub fn licensee_version(&self) -> u16 {
        self.licensee_version
    }

    /// The raw summary as read from the file
    pub fn summary(&self) -> &PackageSummary {
        &self.summary
    }

    pub fn flags(&self) -> PackageFlags {
        self.summary.flags
    }

    pub fn package_guid(&self) -> Guid {
        self.summary.package_guid
    }

    /// Codec of the body chunks
    pub fn compression(&self) -> Result<CompressionMethod> {
        self.summary.compression()
    }

    /// Whether the body was stored in compressed chunks
    pub fn is_compressed(&self) -> bool {
        self.summary.is_compressed()
    }

    /// Codec of the container around the whole file, if there was one
    pub fn fully_compressed(&self) -> Option<CompressionMethod> {
        self.fully_compressed
    }

    pub fn additional_packages_to_cook(&self) -> &[String] {
        &self.summary.additional_packages_to_cook
    }

    pub fn localization(&self) -> Localization {
        self.localization
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Position of a name in the name table
    pub fn name_index(&self, name: &str) -> Option<usize> {
        self.name_lookup.get(name).copied()
    }

    /// The instanced form of a name reference. References outside the name table are
    /// rendered as `INVALID_NAME_{index}`.
    pub fn instanced_name(&self, name: NameReference) -> String {
        usize::try_from(name.index)
            .ok()
            .and_then(|index| self.name(index))
            .map(|value| name.instanced(value))
            .unwrap_or_else(|| format!("INVALID_NAME_{}", name.index))
    }

    pub fn imports(&self) -> &[ImportEntry] {
        &self.imports
    }

    pub fn exports(&self) -> &[ExportEntry] {
        &self.exports
    }

    pub fn import(&self, index: usize) -> Option<&ImportEntry> {
        self.imports.get(index)
    }

    pub fn export(&self, index: usize) -> Option<&ExportEntry> {
        self.exports.get(index)
    }

    /// Resolve a uindex. Zero and out of range values yield `None`.
    pub fn entry(&self, uindex: i32) -> Option<EntryRef<'_>> {
        match uindex {
            0 => None,
            i if i > 0 => self.exports.get(i as usize - 1).map(EntryRef::Export),
            i => self
                .imports
                .get(i.unsigned_abs() as usize - 1)
                .map(EntryRef::Import),
        }
    }

    /// Resolve a uindex, failing with [`EntryNotFoundError::UIndex`]
    pub fn try_entry(&self, uindex: i32) -> Result<EntryRef<'_>> {
        self.entry(uindex)
            .ok_or(Error::EntryNotFound(EntryNotFoundError::UIndex(uindex)))
    }

    /// Find an entry by its instanced full path, ignoring case
    pub fn find_entry(&self, path: &str) -> Option<EntryRef<'_>> {
        self.lookup.get(path).and_then(|uindex| self.entry(uindex))
    }

    /// Find an entry by its instanced full path, failing with [`EntryNotFoundError::Path`]
    pub fn try_find_entry(&self, path: &str) -> Result<EntryRef<'_>> {
        self.find_entry(path)
            .ok_or_else(|| Error::EntryNotFound(EntryNotFoundError::Path(path.to_string())))
    }

    pub fn lookup(&self) -> &EntryLookup {
        &self.lookup
    }

    /// The instanced full path of an entry, see [`instanced_full_path`]
    pub fn full_path<E: Entry + ?Sized>(&self, entry: &E) -> String {
        instanced_full_path(self, entry)
    }

    /// Class name of an export. Exports without a class are classes themselves.
    pub fn class_name(&self, export: &ExportEntry) -> String {
        match self.entry(export.class) {
            Some(class) => self.instanced_name(class.object_name()),
            None => "Class".to_string(),
        }
    }

    /// Class name of an import
    pub fn import_class_name(&self, import: &ImportEntry) -> String {
        self.instanced_name(import.class_name)
    }

    pub fn super_class(&self, export: &ExportEntry) -> Option<EntryRef<'_>> {
        self.entry(export.super_class)
    }

    pub fn archetype(&self, export: &ExportEntry) -> Option<EntryRef<'_>> {
        self.entry(export.archetype)
    }

    /// Replace the name at `index`. Paths that use the name change with it.
    pub fn replace_name(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let Some(slot) = self.names.get_mut(index) else {
            return Err(EntryNotFoundError::NameIndex(index).into());
        };

        let old = std::mem::replace(slot, name.clone());
        if self.name_lookup.get(&old) == Some(&index) {
            match self.names.iter().position(|n| *n == old) {
                Some(other) => self.name_lookup.insert(old.clone(), other),
                None => self.name_lookup.remove(&old),
            };
        }
        match self.name_lookup.get(&name) {
            Some(&existing) if existing < index => {}
            _ => {
                self.name_lookup.insert(name.clone(), index);
            }
        }

        self.rebuild_lookup();
        self.mark_modified();
        self.tracking.notify(PackageChange::NameReplaced {
            index,
            old,
            new: name,
        });

        Ok(())
    }

    /// Index of `name`, adding it to the end of the name table when missing
    pub fn find_or_add_name(&mut self, name: &str) -> usize {
        if let Some(index) = self.name_index(name) {
            return index;
        }

        let index = self.names.len();
        self.names.push(name.to_string());
        self.name_lookup.insert(name.to_string(), index);
        self.summary.name_count = self.names.len() as i32;

        self.mark_modified();
        self.tracking.notify(PackageChange::NameAdded { index });
        index
    }

    /// Mutable access to an export. The package is marked modified.
    pub fn export_mut(&mut self, index: usize) -> Option<&mut ExportEntry> {
        if index >= self.exports.len() {
            return None;
        }

        self.mark_modified();
        self.tracking.notify(PackageChange::ExportChanged {
            uindex: index as i32 + 1,
        });
        self.exports.get_mut(index)
    }

    /// Replace the payload of an export
    pub fn set_export_data(&mut self, index: usize, data: Vec<u8>) -> Result<()> {
        self.export_mut(index)
            .ok_or(Error::EntryNotFound(EntryNotFoundError::UIndex(
                index as i32 + 1,
            )))?
            .set_data(data);
        Ok(())
    }

    /// Append an import and return its uindex
    pub fn add_import(&mut self, import: ImportEntry) -> i32 {
        self.add_imports([import]).unwrap_or_default()
    }

    /// Append an export and return its uindex
    pub fn add_export(&mut self, export: ExportEntry) -> i32 {
        self.add_exports([export]).unwrap_or_default()
    }

    /// Append several imports, returning the uindex of the last one
    pub fn add_imports(&mut self, imports: impl IntoIterator<Item = ImportEntry>) -> Option<i32> {
        let mut last = None;
        for mut import in imports {
            import.index = self.imports.len();
            last = Some(import.uindex());
            self.imports.push(import);
        }
        self.summary.import_count = self.imports.len() as i32;

        self.rebuild_lookup();
        self.mark_modified();
        if let Some(uindex) = last {
            self.tracking.notify(PackageChange::ImportAdded { uindex });
        }
        last
    }

    /// Append several exports, returning the uindex of the last one
    pub fn add_exports(&mut self, exports: impl IntoIterator<Item = ExportEntry>) -> Option<i32> {
        let mut last = None;
        for mut export in exports {
            export.index = self.exports.len();
            last = Some(export.uindex());
            self.exports.push(export);
        }
        self.summary.export_count = self.exports.len() as i32;

        self.rebuild_lookup();
        self.mark_modified();
        if let Some(uindex) = last {
            self.tracking.notify(PackageChange::ExportAdded { uindex });
        }
        last
    }

    pub fn mark_modified(&mut self) {
        if !self.modified {
            self.modified = true;
            self.tracking.notify(PackageChange::Modified);
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Whether changes are being observed
    pub fn is_shared(&self) -> bool {
        matches!(self.tracking, ChangeTracking::Shared(_))
    }

    /// Register a hook invoked on every change. Only packages loaded with change
    /// tracking accept hooks.
    pub fn on_change(&mut self, hook: ChangeHook) -> Result<()> {
        match &mut self.tracking {
            ChangeTracking::Shared(hooks) => {
                hooks.push(hook);
                Ok(())
            }
            ChangeTracking::Private => Err(Error::CustomError(
                "package was loaded without change tracking".to_string(),
            )),
        }
    }

    pub(crate) fn set_names(&mut self, names: Vec<String>) {
        self.name_lookup = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            self.name_lookup.entry(name.clone()).or_insert(index);
        }
        self.names = names;
    }

    pub(crate) fn rebuild_lookup(&mut self) {
        self.lookup = EntryLookup::build(self);
        debug!(entries = self.lookup.len(), "rebuilt entry lookup");
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use crate::entry::{Entry, ExportEntry, ImportEntry, NameReference};
    use crate::error::{EntryNotFoundError, Error};
    use crate::localization::Localization;
    use crate::package::{ChangeTracking, Package, PackageChange, BLANK_PACKAGE_FLAGS};
    use crate::registry::{Game, Platform};
    use crate::types::PackageFlags;

    /// `Core.Object`, `BioP_Global.Default__Object` and `BioP_Global.Default__Object_0`
    fn sample() -> Package {
        let mut package = Package::new(Game::ME3, None);
        package.set_names(
            ["Core", "Object", "Package", "BioP_Global", "Default__Object", "Class"]
                .map(String::from)
                .to_vec(),
        );
        package.imports = vec![
            ImportEntry {
                index: 0,
                class_package: NameReference::new(0, 0),
                class_name: NameReference::new(2, 0),
                link: 0,
                object_name: NameReference::new(0, 0),
            },
            ImportEntry {
                index: 1,
                class_package: NameReference::new(0, 0),
                class_name: NameReference::new(5, 0),
                link: -1,
                object_name: NameReference::new(1, 0),
            },
        ];
        package.exports = vec![
            ExportEntry {
                index: 0,
                object_name: NameReference::new(3, 0),
                ..Default::default()
            },
            ExportEntry {
                index: 1,
                class: -2,
                link: 1,
                object_name: NameReference::new(4, 0),
                ..Default::default()
            },
            ExportEntry {
                index: 2,
                class: -2,
                link: 1,
                object_name: NameReference::new(4, 1),
                ..Default::default()
            },
        ];
        package.rebuild_lookup();
        package
    }

    #[test]
    fn blank_package() {
        let package = Package::new(Game::LE3, Some(PathBuf::from("Startup_FRA.pcc")));
        assert_eq!(package.game(), Game::LE3);
        assert_eq!(package.platform(), Platform::PC);
        assert!(package.is_platform_resolved());
        assert_eq!((package.unreal_version(), package.licensee_version()), (685, 205));
        assert_eq!(package.flags(), BLANK_PACKAGE_FLAGS);
        assert!(package.flags().contains(PackageFlags::COOKED));
        assert_eq!(package.localization(), Localization::French);
        assert!(package.names().is_empty());
        assert!(!package.is_modified());
    }

    #[test]
    fn resolve_entries() {
        let package = sample();

        assert_eq!(package.entry(0), None);
        assert_eq!(package.entry(-2).unwrap().index(), 1);
        assert!(package.entry(-2).unwrap().is_import());
        assert_eq!(package.entry(3).unwrap().uindex(), 3);
        assert_eq!(package.entry(4), None);
        assert_eq!(package.entry(-3), None);
        assert!(matches!(
            package.try_entry(9),
            Err(Error::EntryNotFound(EntryNotFoundError::UIndex(9)))
        ));
    }

    #[test]
    fn paths_and_lookup() {
        let package = sample();

        assert_eq!(package.full_path(&package.imports()[1]), "Core.Object");
        assert_eq!(
            package.full_path(&package.exports()[2]),
            "BioP_Global.Default__Object_0"
        );
        assert_eq!(
            package.find_entry("biop_global.default__object").unwrap().uindex(),
            2
        );
        assert_eq!(package.find_entry("CORE.OBJECT").unwrap().uindex(), -2);
        assert_eq!(package.find_entry("Core.Missing"), None);
        assert_eq!(package.lookup().len(), 5);
        assert_eq!(package.class_name(&package.exports()[1]), "Object");
        assert_eq!(package.class_name(&package.exports()[0]), "Class");
    }

    #[test]
    fn owner_cycle_terminates() {
        let mut package = sample();
        package.exports[0].link = 2;
        package.exports[1].link = 1;

        let path = package.full_path(&package.exports()[1]);
        assert_eq!(path.split('.').count(), 6);
    }

    #[test]
    fn replace_name_updates_paths() -> crate::error::Result<()> {
        let mut package = sample();
        package.replace_name(3, "BioP_Citadel")?;

        assert_eq!(package.name(3), Some("BioP_Citadel"));
        assert_eq!(package.name_index("BioP_Citadel"), Some(3));
        assert_eq!(package.name_index("BioP_Global"), None);
        assert!(package.find_entry("BioP_Global.Default__Object").is_none());
        assert_eq!(
            package.find_entry("BioP_Citadel.Default__Object").unwrap().uindex(),
            2
        );
        assert!(package.is_modified());

        assert!(matches!(
            package.replace_name(99, "Nothing"),
            Err(Error::EntryNotFound(EntryNotFoundError::NameIndex(99)))
        ));

        Ok(())
    }

    #[test]
    fn replace_duplicated_name() -> crate::error::Result<()> {
        let mut package = Package::new(Game::ME3, None);
        package.set_names(["A", "B", "A"].map(String::from).to_vec());

        package.replace_name(0, "C")?;
        assert_eq!(package.name_index("A"), Some(2));
        assert_eq!(package.name_index("C"), Some(0));
        assert_eq!(package.find_or_add_name("A"), 2);
        assert_eq!(package.names(), ["C", "B", "A"].map(String::from));

        package.replace_name(2, "B")?;
        assert_eq!(package.name_index("A"), None);
        assert_eq!(package.name_index("B"), Some(1));

        Ok(())
    }

    #[test]
    fn add_names_and_entries() {
        let mut package = sample();

        assert_eq!(package.find_or_add_name("Object"), 1);
        assert_eq!(package.find_or_add_name("Texture2D"), 6);
        assert_eq!(package.summary().name_count, 7);

        let uindex = package.add_export(ExportEntry {
            class: -2,
            link: 1,
            object_name: NameReference::new(6, 0),
            ..Default::default()
        });
        assert_eq!(uindex, 4);
        assert_eq!(package.exports()[3].index, 3);
        assert_eq!(package.find_entry("BioP_Global.Texture2D").unwrap().uindex(), 4);

        let uindex = package.add_import(ImportEntry {
            object_name: NameReference::new(6, 0),
            ..Default::default()
        });
        assert_eq!(uindex, -3);
        assert_eq!(package.summary().import_count, 3);
    }

    #[test]
    fn export_data() -> crate::error::Result<()> {
        let mut package = sample();
        package.set_export_data(0, vec![0xAB; 4])?;
        assert_eq!(package.exports()[0].serial_size, 4);
        assert_eq!(package.exports()[0].data(), Some(&[0xAB; 4][..]));
        assert!(package.set_export_data(10, Vec::new()).is_err());
        Ok(())
    }

    #[test]
    fn shared_packages_notify() -> crate::error::Result<()> {
        let mut private = sample();
        assert!(private.on_change(Box::new(|_| {})).is_err());

        let mut package = sample();
        package.tracking = ChangeTracking::Shared(Vec::new());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        package.on_change(Box::new(move |change| sink.lock().unwrap().push(change.clone())))?;

        package.replace_name(1, "Actor")?;
        package.mark_modified();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                PackageChange::Modified,
                PackageChange::NameReplaced {
                    index: 1,
                    old: "Object".to_string(),
                    new: "Actor".to_string()
                },
            ]
        );

        Ok(())
    }
}
