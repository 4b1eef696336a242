//! Import and export table entries, and the path lookup built over them.
//!
//! Entries never hold references to each other. Owners and classes are stored as
//! uindices into the combined table: positive values are exports (`index + 1`),
//! negative values are imports (`-(index + 1)`) and zero means none. They are resolved
//! through the [`Package`] that owns the entries.

use binrw::{binread, BinRead};
use indexmap::IndexMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{endian::Guid, package::Package, types::read_counted};

/// Object flag set on the default object of a class
pub const RF_CLASS_DEFAULT_OBJECT: u64 = 0x0000_0200_0000_0000;

/// A reference into the name table plus an instance number
#[derive(BinRead, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NameReference {
    pub index: i32,
    /// Zero for a plain name, otherwise one more than the suffix
    pub number: i32,
}

impl NameReference {
    pub fn new(index: i32, number: i32) -> Self {
        Self { index, number }
    }

    /// Format the name the way it appears in paths: `name` or `name_{number - 1}`
    pub fn instanced(&self, name: &str) -> String {
        if self.number > 0 {
            format!("{name}_{}", self.number - 1)
        } else {
            name.to_string()
        }
    }
}

/// The capabilities shared by imports and exports
pub trait Entry {
    /// Position in its own table
    fn index(&self) -> usize;

    /// Position in the combined table
    fn uindex(&self) -> i32;

    fn object_name(&self) -> NameReference;

    /// uindex of the owning entry, zero for top level entries
    fn link(&self) -> i32;
}

/// A reference to an object that lives in another package
#[derive(BinRead, Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportEntry {
    #[br(ignore)]
    pub index: usize,
    pub class_package: NameReference,
    pub class_name: NameReference,
    pub link: i32,
    pub object_name: NameReference,
}

impl Entry for ImportEntry {
    fn index(&self) -> usize {
        self.index
    }

    fn uindex(&self) -> i32 {
        -(self.index as i32) - 1
    }

    fn object_name(&self) -> NameReference {
        self.object_name
    }

    fn link(&self) -> i32 {
        self.link
    }
}

/// A component name and the export it maps to
#[derive(BinRead, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentMapping {
    pub name: NameReference,
    pub export: i32,
}

/// An object defined in this package
///
/// The serialized payload is only present when it was loaded, see
/// [`crate::read::LoadOptions`].
#[binread]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[br(import(has_component_map: bool))]
pub struct ExportEntry {
    #[br(ignore)]
    pub index: usize,

    /// uindex of the class, zero for classes themselves
    pub class: i32,
    pub super_class: i32,
    pub link: i32,
    pub object_name: NameReference,
    pub archetype: i32,
    pub object_flags: u64,
    pub serial_size: i32,
    pub serial_offset: i32,

    #[br(temp, if(has_component_map))]
    component_count: u32,

    #[br(parse_with = read_counted, args(component_count))]
    pub component_map: Vec<ComponentMapping>,

    pub export_flags: u32,

    #[br(temp)]
    net_object_count: u32,

    #[br(parse_with = read_counted, args(net_object_count))]
    pub generation_net_objects: Vec<i32>,

    pub package_guid: Guid,
    pub package_flags: u32,

    #[br(ignore)]
    pub(crate) data: Option<Vec<u8>>,
}

impl ExportEntry {
    /// The payload, if it has been loaded or set
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn is_data_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// Replace the payload, keeping `serial_size` in sync
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.serial_size = data.len() as i32;
        self.data = Some(data);
    }

    /// Take the payload out of the entry
    pub fn take_data(&mut self) -> Option<Vec<u8>> {
        self.data.take()
    }

    pub fn is_default_object(&self) -> bool {
        self.object_flags & RF_CLASS_DEFAULT_OBJECT != 0
    }

    pub(crate) fn load_data(&mut self, data: Vec<u8>) {
        self.data = Some(data);
    }
}

impl Entry for ExportEntry {
    fn index(&self) -> usize {
        self.index
    }

    fn uindex(&self) -> i32 {
        self.index as i32 + 1
    }

    fn object_name(&self) -> NameReference {
        self.object_name
    }

    fn link(&self) -> i32 {
        self.link
    }
}

/// Either kind of entry, as found by uindex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRef<'a> {
    Import(&'a ImportEntry),
    Export(&'a ExportEntry),
}

impl EntryRef<'_> {
    pub fn is_import(&self) -> bool {
        matches!(self, EntryRef::Import(_))
    }

    pub fn is_export(&self) -> bool {
        matches!(self, EntryRef::Export(_))
    }
}

impl Entry for EntryRef<'_> {
    fn index(&self) -> usize {
        match self {
            EntryRef::Import(e) => e.index(),
            EntryRef::Export(e) => e.index(),
        }
    }

    fn uindex(&self) -> i32 {
        match self {
            EntryRef::Import(e) => e.uindex(),
            EntryRef::Export(e) => e.uindex(),
        }
    }

    fn object_name(&self) -> NameReference {
        match self {
            EntryRef::Import(e) => e.object_name(),
            EntryRef::Export(e) => e.object_name(),
        }
    }

    fn link(&self) -> i32 {
        match self {
            EntryRef::Import(e) => e.link(),
            EntryRef::Export(e) => e.link(),
        }
    }
}

/// The dotted path of an entry: the instanced names of its owners, outermost first,
/// then its own.
///
/// Owners that don't exist end the path. A chain longer than the number of entries
/// can only be a cycle and is cut off there.
pub fn instanced_full_path<E: Entry + ?Sized>(package: &Package, entry: &E) -> String {
    let limit = package.imports().len() + package.exports().len();
    let mut segments = vec![package.instanced_name(entry.object_name())];

    let mut link = entry.link();
    let mut hops = 0;
    while link != 0 && hops < limit {
        let Some(owner) = package.entry(link) else {
            break;
        };
        segments.push(package.instanced_name(owner.object_name()));
        link = owner.link();
        hops += 1;
    }

    segments.reverse();
    segments.join(".")
}

/// Case insensitive map from instanced full path to uindex
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryLookup {
    paths: IndexMap<String, i32>,
}

impl EntryLookup {
    /// Index every import, then every export. When two entries share a path the later
    /// one wins.
    pub fn build(package: &Package) -> Self {
        let mut paths =
            IndexMap::with_capacity(package.imports().len() + package.exports().len());

        for import in package.imports() {
            paths.insert(
                instanced_full_path(package, import).to_lowercase(),
                import.uindex(),
            );
        }
        for export in package.exports() {
            paths.insert(
                instanced_full_path(package, export).to_lowercase(),
                export.uindex(),
            );
        }

        Self { paths }
    }

    /// The uindex of the entry at `path`, ignoring case
    pub fn get(&self, path: &str) -> Option<i32> {
        self.paths.get(&path.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Lowercased paths and their uindices in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.paths.iter().map(|(path, &uindex)| (path.as_str(), uindex))
    }
}
