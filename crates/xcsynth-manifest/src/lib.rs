//! Xcode project document model
//!
//! This crate reads a `project.pbxproj` into an entity index, synthesizes or
//! repairs it against a set of project-relative paths, checks it against the
//! document invariants and writes it back in the IDE's own layout.
//!
//! Invariants enforced by `verify`:
//! - I1 every build file points at an existing file reference
//! - I2 every phase member is a build file whose type the phase can build
//! - I3 the group tree is connected and acyclic, one parent per child
//! - I4 no two file references resolve to the same path
//! - I5 identifiers are unique across the whole document

pub mod classify;
pub mod errors;
pub mod ident;
pub mod index;
pub mod layout;
pub mod manifest_writer;
pub mod parser;
pub mod plist;
pub mod record;
pub mod sync;
pub mod template;
pub mod types;
pub mod verify;

#[cfg(test)]
mod fixtures;

pub use classify::{classify, Classification, FileKind};
pub use errors::{InvariantViolation, ManifestError, ParseError, ParseErrorKind};
pub use ident::IdAllocator;
pub use layout::{DefaultGroup, GroupLayout, GroupRule};
pub use parser::{parse_document, ParsedDocument};
pub use sync::{
    plan, Plan, PlannedFile, SyncEngine, SyncMode, SyncOptions, SyncResult, SyncWarning, Synthesis,
};
pub use template::{ProjectTemplate, SettingsOverlay};
pub use types::{Entity, EntityIndex, Isa, ObjectId, PhaseRole};

// Re-export document file helpers for custom paths
pub use manifest_writer::{read_from_path, write_document, write_to_path};
