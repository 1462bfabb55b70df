//! Typed entities of a project document
//!
//! This module provides:
//! - `ObjectId`, an `Arc<str>` identifier shared between the index and its lookups
//! - One struct per supported entity kind, with unknown keys kept in `extra`
//! - `Verbatim` regions for anything the parser could not type
//! - `EntityIndex`, the in-memory document (operations live in `index.rs`)

use ahash::{AHashMap, AHashSet};
use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::plist::Value;

/// Keys an entity carries that the synthesizer never interprets
pub type Fields = BTreeMap<String, Value>;

pub const GROUP_TREE: &str = "<group>";
pub const SOURCE_ROOT: &str = "SOURCE_ROOT";
pub const BUILT_PRODUCTS_DIR: &str = "BUILT_PRODUCTS_DIR";

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Document-wide entity identifier, 24 uppercase hex characters when allocated
/// here but accepted in any bare-string form when read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Arc<str>);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::from("")
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId(Arc::from(s))
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        ObjectId(Arc::from(s))
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// =============================================================================
// KINDS
// =============================================================================

/// Entity kinds the index understands. Declaration order is section order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Isa {
    BuildFile,
    FileReference,
    FrameworksBuildPhase,
    Group,
    NativeTarget,
    Project,
    ResourcesBuildPhase,
    SourcesBuildPhase,
    BuildConfiguration,
    ConfigurationList,
}

impl Isa {
    pub const ALL: [Isa; 10] = [
        Isa::BuildFile,
        Isa::FileReference,
        Isa::FrameworksBuildPhase,
        Isa::Group,
        Isa::NativeTarget,
        Isa::Project,
        Isa::ResourcesBuildPhase,
        Isa::SourcesBuildPhase,
        Isa::BuildConfiguration,
        Isa::ConfigurationList,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Isa::BuildFile => "PBXBuildFile",
            Isa::FileReference => "PBXFileReference",
            Isa::FrameworksBuildPhase => "PBXFrameworksBuildPhase",
            Isa::Group => "PBXGroup",
            Isa::NativeTarget => "PBXNativeTarget",
            Isa::Project => "PBXProject",
            Isa::ResourcesBuildPhase => "PBXResourcesBuildPhase",
            Isa::SourcesBuildPhase => "PBXSourcesBuildPhase",
            Isa::BuildConfiguration => "XCBuildConfiguration",
            Isa::ConfigurationList => "XCConfigurationList",
        }
    }

    pub fn parse(s: &str) -> Option<Isa> {
        Isa::ALL.into_iter().find(|isa| isa.as_str() == s)
    }

    /// Entries of this kind are written on a single line
    pub fn is_inline(self) -> bool {
        matches!(self, Isa::BuildFile | Isa::FileReference)
    }
}

impl fmt::Display for Isa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build phase role. Only these three phases are synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PhaseRole {
    Sources,
    Frameworks,
    Resources,
}

impl PhaseRole {
    pub fn isa(self) -> Isa {
        match self {
            PhaseRole::Sources => Isa::SourcesBuildPhase,
            PhaseRole::Frameworks => Isa::FrameworksBuildPhase,
            PhaseRole::Resources => Isa::ResourcesBuildPhase,
        }
    }

    pub fn from_isa(isa: Isa) -> Option<PhaseRole> {
        match isa {
            Isa::SourcesBuildPhase => Some(PhaseRole::Sources),
            Isa::FrameworksBuildPhase => Some(PhaseRole::Frameworks),
            Isa::ResourcesBuildPhase => Some(PhaseRole::Resources),
            _ => None,
        }
    }

    /// Display name used in `<file> in <Phase>` comments
    pub fn name(self) -> &'static str {
        match self {
            PhaseRole::Sources => "Sources",
            PhaseRole::Frameworks => "Frameworks",
            PhaseRole::Resources => "Resources",
        }
    }
}

impl fmt::Display for PhaseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub id: ObjectId,
    pub path: String,
    pub name: Option<String>,
    pub source_tree: String,
    pub declared_type: Option<String>,
    /// `explicitFileType` rather than `lastKnownFileType`
    pub explicit_type: bool,
    pub extra: Fields,

    /// Runtime only - project-relative path, resolved through the group chain
    pub relative_path: String,
}

impl FileReference {
    /// Name shown in the navigator and in comments
    pub fn display_name(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }

    /// Whether synthesis owns this reference. References anchored to the
    /// SDK, the build products directory or any other tree are left alone.
    pub fn is_managed(&self) -> bool {
        self.source_tree == GROUP_TREE || self.source_tree == SOURCE_ROOT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFile {
    pub id: ObjectId,
    pub file_ref: ObjectId,
    pub extra: Fields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: ObjectId,
    pub name: Option<String>,
    pub path: Option<String>,
    pub source_tree: String,
    pub children: Vec<ObjectId>,
    pub extra: Fields,
}

impl Group {
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.path.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPhase {
    pub id: ObjectId,
    pub role: PhaseRole,
    pub files: Vec<ObjectId>,
    pub extra: Fields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTarget {
    pub id: ObjectId,
    pub name: String,
    pub build_configuration_list: ObjectId,
    pub build_phases: Vec<ObjectId>,
    pub product_reference: Option<ObjectId>,
    pub extra: Fields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ObjectId,
    pub build_configuration_list: ObjectId,
    pub main_group: ObjectId,
    pub product_ref_group: Option<ObjectId>,
    pub targets: Vec<ObjectId>,
    pub extra: Fields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration {
    pub id: ObjectId,
    pub name: String,
    pub extra: Fields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationList {
    pub id: ObjectId,
    pub build_configurations: Vec<ObjectId>,
    pub extra: Fields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    BuildFile(BuildFile),
    FileReference(FileReference),
    Group(Group),
    BuildPhase(BuildPhase),
    NativeTarget(NativeTarget),
    Project(Project),
    BuildConfiguration(BuildConfiguration),
    ConfigurationList(ConfigurationList),
}

impl Entity {
    pub fn id(&self) -> &ObjectId {
        match self {
            Entity::BuildFile(e) => &e.id,
            Entity::FileReference(e) => &e.id,
            Entity::Group(e) => &e.id,
            Entity::BuildPhase(e) => &e.id,
            Entity::NativeTarget(e) => &e.id,
            Entity::Project(e) => &e.id,
            Entity::BuildConfiguration(e) => &e.id,
            Entity::ConfigurationList(e) => &e.id,
        }
    }

    pub fn isa(&self) -> Isa {
        match self {
            Entity::BuildFile(_) => Isa::BuildFile,
            Entity::FileReference(_) => Isa::FileReference,
            Entity::Group(_) => Isa::Group,
            Entity::BuildPhase(p) => p.role.isa(),
            Entity::NativeTarget(_) => Isa::NativeTarget,
            Entity::Project(_) => Isa::Project,
            Entity::BuildConfiguration(_) => Isa::BuildConfiguration,
            Entity::ConfigurationList(_) => Isa::ConfigurationList,
        }
    }

    /// Identifiers this entity points at through typed fields
    pub fn references(&self) -> Vec<&ObjectId> {
        match self {
            Entity::BuildFile(e) => vec![&e.file_ref],
            Entity::FileReference(_) | Entity::BuildConfiguration(_) => Vec::new(),
            Entity::Group(e) => e.children.iter().collect(),
            Entity::BuildPhase(e) => e.files.iter().collect(),
            Entity::NativeTarget(e) => std::iter::once(&e.build_configuration_list)
                .chain(e.build_phases.iter())
                .chain(e.product_reference.iter())
                .collect(),
            Entity::Project(e) => [&e.build_configuration_list, &e.main_group]
                .into_iter()
                .chain(e.product_ref_group.iter())
                .chain(e.targets.iter())
                .collect(),
            Entity::ConfigurationList(e) => e.build_configurations.iter().collect(),
        }
    }
}

// =============================================================================
// VERBATIM REGIONS
// =============================================================================

/// An identifier declared inside a verbatim region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueObject {
    pub id: ObjectId,
    pub isa: Option<String>,
    pub comment: Option<String>,
}

/// Text the parser kept without interpreting it. Written back byte for byte
/// inside the section it was found in, or after the last section when it
/// had none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verbatim {
    /// Enclosing section; `None` when the entry sat outside every section
    pub section: Option<String>,
    pub text: String,
    pub declared: SmallVec<[OpaqueObject; 1]>,
}

// =============================================================================
// ENTITY INDEX
// =============================================================================

/// In-memory project document.
///
/// `objects` holds typed entities in insertion order, which is also the
/// order entries are written within their section.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    pub archive_version: String,
    pub object_version: String,
    /// Name used in the project configuration list comment
    pub project_name: String,
    pub root_object: ObjectId,
    pub objects: Vec<Entity>,
    pub verbatim: Vec<Verbatim>,

    /// Later declarations of an identifier that was already taken
    pub shadowed: Vec<Entity>,
    /// Identifiers declared more than once inside verbatim regions
    pub id_conflicts: Vec<ObjectId>,

    /// Runtime only - position of each typed entity in `objects`
    pub(crate) object_index: AHashMap<ObjectId, usize>,
    /// Runtime only - (verbatim region, declaration) of each opaque identifier
    pub(crate) opaque_index: AHashMap<ObjectId, (usize, usize)>,
    /// Runtime only - group that lists each child
    pub(crate) parent_index: AHashMap<ObjectId, ObjectId>,
    /// Runtime only - typed phase that lists each build file
    pub(crate) phase_index: AHashMap<ObjectId, ObjectId>,
    /// Runtime only - file reference by resolved path (first declaration wins)
    pub(crate) path_index: AHashMap<String, ObjectId>,
    /// Runtime only - build files wrapping each file reference
    pub(crate) wrapper_index: AHashMap<ObjectId, SmallVec<[ObjectId; 2]>>,
    /// Runtime only - identifiers mentioned anywhere in verbatim text
    pub(crate) verbatim_refs: AHashSet<ObjectId>,
}

/// Two indexes are equal when they serialize alike: entity order matters
/// within a kind but not across kinds, and runtime indexes are ignored.
impl PartialEq for EntityIndex {
    fn eq(&self, other: &Self) -> bool {
        let same_sections = Isa::ALL.iter().all(|isa| {
            let ours = self.objects.iter().filter(|e| e.isa() == *isa);
            let theirs = other.objects.iter().filter(|e| e.isa() == *isa);
            ours.eq(theirs)
        });
        self.archive_version == other.archive_version
            && self.object_version == other.object_version
            && self.project_name == other.project_name
            && self.root_object == other.root_object
            && self.objects.len() == other.objects.len()
            && same_sections
            && self.verbatim == other.verbatim
            && self.shadowed == other.shadowed
            && self.id_conflicts == other.id_conflicts
    }
}

impl Eq for EntityIndex {}

#[cfg(test)]
mod tests {
    use crate::types::*;

    #[test]
    fn test_isa_order_is_section_order() {
        let mut sorted: Vec<&str> = Isa::ALL.iter().map(|isa| isa.as_str()).collect();
        sorted.sort_unstable();
        let declared: Vec<&str> = Isa::ALL.iter().map(|isa| isa.as_str()).collect();
        assert_eq!(sorted, declared);
    }

    #[test]
    fn test_isa_parse() {
        assert_eq!(Isa::parse("PBXGroup"), Some(Isa::Group));
        assert_eq!(Isa::parse("PBXVariantGroup"), None);
    }

    #[test]
    fn test_default_index_has_no_root() {
        let index = EntityIndex::default();
        assert_eq!(index.root_object, ObjectId::default());
        assert!(index.root_object.as_str().is_empty());
        assert!(index.objects.is_empty());
    }

    #[test]
    fn test_object_id_lookup_by_str() {
        let mut map: AHashMap<ObjectId, usize> = AHashMap::new();
        map.insert(ObjectId::from("ABC"), 3);
        assert_eq!(map.get("ABC"), Some(&3));
    }

    #[test]
    fn test_display_name_falls_back_to_basename() {
        let file = FileReference {
            id: ObjectId::from("A"),
            path: "Services/Audio.swift".to_string(),
            name: None,
            source_tree: SOURCE_ROOT.to_string(),
            declared_type: Some("sourcecode.swift".to_string()),
            explicit_type: false,
            extra: Fields::new(),
            relative_path: "Services/Audio.swift".to_string(),
        };
        assert_eq!(file.display_name(), "Audio.swift");
        assert!(file.is_managed());
    }
}
