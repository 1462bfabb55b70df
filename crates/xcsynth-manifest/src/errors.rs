use std::fmt;
use std::io;
use thiserror::Error;

use crate::types::ObjectId;

/// Errors that can occur while reading, synthesizing or writing a project document
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to parse project document: {0}")]
    Parse(ParseError),

    #[error("Synthesis invariant violated: {}", summarize(.0))]
    Invariant(Vec<InvariantViolation>),

    #[error("Could not allocate a unique identifier after {0} attempts")]
    Allocation(usize),
}

fn summarize(violations: &[InvariantViolation]) -> String {
    match violations {
        [] => "no violations recorded".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

impl ManifestError {
    /// Violations carried by an invariant failure, empty for every other error
    pub fn violations(&self) -> &[InvariantViolation] {
        match self {
            ManifestError::Invariant(violations) => violations,
            _ => &[],
        }
    }
}

/// A located problem found while reading a project document.
///
/// Most parse errors are recoverable: the offending region is kept verbatim
/// and the error is reported alongside the parsed index. Only a missing or
/// unresolvable root object is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingHeader,
    MissingObjects,
    UnterminatedSection(String),
    MismatchedSectionEnd { open: String, found: String },
    UnparseableEntry(String),
    UnrecognizedEntry { id: String, isa: String },
    DuplicateIdentifier(String),
    MissingRootObject,
    UnresolvedRootObject(String),
}

impl ParseError {
    pub fn new(line: usize, kind: ParseErrorKind) -> Self {
        ParseError { line, kind }
    }

    /// Whether the document cannot be used at all
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ParseErrorKind::MissingObjects
                | ParseErrorKind::MissingRootObject
                | ParseErrorKind::UnresolvedRootObject(_)
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            ParseErrorKind::MissingHeader => write!(f, "missing `// !$*UTF8*$!` header"),
            ParseErrorKind::MissingObjects => write!(f, "no `objects = {{` block found"),
            ParseErrorKind::UnterminatedSection(kind) => {
                write!(f, "section {} has no closing delimiter", kind)
            }
            ParseErrorKind::MismatchedSectionEnd { open, found } => {
                write!(f, "section {} closed by End {} delimiter", open, found)
            }
            ParseErrorKind::UnparseableEntry(reason) => {
                write!(f, "unparseable entry kept verbatim ({})", reason)
            }
            ParseErrorKind::UnrecognizedEntry { id, isa } => {
                write!(f, "entry {} ({}) does not match its template, kept verbatim", id, isa)
            }
            ParseErrorKind::DuplicateIdentifier(id) => {
                write!(f, "identifier {} is declared more than once", id)
            }
            ParseErrorKind::MissingRootObject => write!(f, "no rootObject entry"),
            ParseErrorKind::UnresolvedRootObject(id) => {
                write!(f, "rootObject {} is not a PBXProject entry", id)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// One broken invariant found by [`crate::EntityIndex::verify`].
///
/// The display form always starts with the invariant tag so callers can
/// report which rule failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("I1 build file {build_file} references missing file {file_ref}")]
    DanglingFileRef {
        build_file: ObjectId,
        file_ref: ObjectId,
    },

    #[error("I2 phase {phase} lists {member}, which is not a build file")]
    DanglingPhaseMember { phase: ObjectId, member: ObjectId },

    #[error("I2 phase {phase} ({role}) cannot build {path} of type {declared_type}")]
    IllegalPhaseMember {
        phase: ObjectId,
        role: String,
        path: String,
        declared_type: String,
    },

    #[error("I2 build file {build_file} is listed by more than one phase")]
    SharedBuildFile { build_file: ObjectId },

    #[error("I2 {path} has more than one build file in the {role} phase")]
    DuplicateMembership { path: String, role: String },

    #[error("I3 group {group} lists missing child {child}")]
    DanglingChild { group: ObjectId, child: ObjectId },

    #[error("I3 {child} has more than one parent group ({first}, {second})")]
    MultipleParents {
        child: ObjectId,
        first: ObjectId,
        second: ObjectId,
    },

    #[error("I3 group tree has a cycle through {group}")]
    GroupCycle { group: ObjectId },

    #[error("I3 {id} ({path}) is not reachable from the main group")]
    Unreachable { id: ObjectId, path: String },

    #[error("I3 main group {0} does not exist")]
    MissingMainGroup(ObjectId),

    #[error("I4 path {path} is claimed by {first} and {second}")]
    DuplicatePath {
        path: String,
        first: ObjectId,
        second: ObjectId,
    },

    #[error("I5 identifier {0} is declared more than once")]
    DuplicateIdentifier(ObjectId),

    #[error("I5 project must be the root object, found {0}")]
    MissingProject(ObjectId),

    #[error("I5 second project entry {0} alongside the root object")]
    ExtraProject(ObjectId),

    #[error("I5 reference {from} -> {to} does not resolve")]
    DanglingReference { from: ObjectId, to: ObjectId },
}

impl InvariantViolation {
    /// Short tag of the broken invariant (`I1`..`I5`)
    pub fn tag(&self) -> &'static str {
        match self {
            InvariantViolation::DanglingFileRef { .. } => "I1",
            InvariantViolation::DanglingPhaseMember { .. }
            | InvariantViolation::IllegalPhaseMember { .. }
            | InvariantViolation::SharedBuildFile { .. }
            | InvariantViolation::DuplicateMembership { .. } => "I2",
            InvariantViolation::DanglingChild { .. }
            | InvariantViolation::MultipleParents { .. }
            | InvariantViolation::GroupCycle { .. }
            | InvariantViolation::Unreachable { .. }
            | InvariantViolation::MissingMainGroup(_) => "I3",
            InvariantViolation::DuplicatePath { .. } => "I4",
            InvariantViolation::DuplicateIdentifier(_)
            | InvariantViolation::MissingProject(_)
            | InvariantViolation::ExtraProject(_)
            | InvariantViolation::DanglingReference { .. } => "I5",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_invariant_display_names_the_rule() {
        let err = InvariantViolation::DuplicatePath {
            path: "Services/Audio.swift".to_string(),
            first: ObjectId::from("AAAAAAAAAAAAAAAAAAAAAAAA"),
            second: ObjectId::from("BBBBBBBBBBBBBBBBBBBBBBBB"),
        };
        assert!(err.to_string().starts_with("I4 "));
        assert_eq!(err.tag(), "I4");
    }

    #[test]
    fn test_manifest_error_summarizes_violations() {
        let err = ManifestError::Invariant(vec![
            InvariantViolation::DuplicateIdentifier(ObjectId::from("A1")),
            InvariantViolation::DuplicateIdentifier(ObjectId::from("A2")),
        ]);
        assert_eq!(
            err.to_string(),
            "Synthesis invariant violated: I5 identifier A1 is declared more than once (and 1 more)"
        );
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_parse_error_fatality() {
        assert!(ParseError::new(1, ParseErrorKind::MissingRootObject).is_fatal());
        assert!(
            !ParseError::new(3, ParseErrorKind::UnterminatedSection("PBXGroup".into())).is_fatal()
        );
    }
}
