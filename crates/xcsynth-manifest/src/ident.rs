//! Identifier allocation
//!
//! Identifiers are 24 uppercase hex characters taken from a UUID. The
//! allocator remembers every identifier already present in the document,
//! including ones only seen inside verbatim regions, and never hands out a
//! collision.

use ahash::AHashSet;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ManifestError;
use crate::types::{EntityIndex, ObjectId};

pub const ID_LEN: usize = 24;

/// Draws before giving up on a fresh identifier
pub const MAX_ATTEMPTS: usize = 16;

#[derive(Debug, Clone)]
enum IdSource {
    Random,
    /// Name-based UUIDs over `(seed, counter)`, reproducible across runs
    Seeded { seed: u64, counter: u64 },
}

#[derive(Debug, Clone)]
pub struct IdAllocator {
    in_use: AHashSet<ObjectId>,
    source: IdSource,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// Allocator backed by random (v4) UUIDs
    pub fn new() -> Self {
        IdAllocator {
            in_use: AHashSet::new(),
            source: IdSource::Random,
        }
    }

    /// Allocator whose sequence depends only on `seed`
    pub fn deterministic(seed: u64) -> Self {
        IdAllocator {
            in_use: AHashSet::new(),
            source: IdSource::Seeded { seed, counter: 0 },
        }
    }

    /// Mark every identifier the document already declares as taken
    pub fn seed_from(&mut self, index: &EntityIndex) {
        let before = self.in_use.len();
        for id in index.declared_ids().chain(&index.verbatim_refs) {
            self.reserve(id.clone());
        }
        debug!("Reserved {} identifiers", self.in_use.len() - before);
    }

    pub fn reserve(&mut self, id: ObjectId) {
        self.in_use.insert(id);
    }

    /// Allocate an identifier unique within this allocator's view
    pub fn allocate(&mut self) -> Result<ObjectId, ManifestError> {
        // a seeded sequence replays earlier runs, so it may walk past every taken id
        let attempts = match self.source {
            IdSource::Random => MAX_ATTEMPTS,
            IdSource::Seeded { .. } => self.in_use.len() + MAX_ATTEMPTS,
        };
        for _ in 0..attempts {
            let candidate = self.draw();
            if !self.in_use.contains(&candidate) {
                self.in_use.insert(candidate.clone());
                return Ok(candidate);
            }
            debug!("Identifier collision on {}, drawing again", candidate);
        }
        Err(ManifestError::Allocation(attempts))
    }

    fn draw(&mut self) -> ObjectId {
        let uuid = match &mut self.source {
            IdSource::Random => Uuid::new_v4(),
            IdSource::Seeded { seed, counter } => {
                *counter += 1;
                let name = format!("xcsynth:{}:{}", seed, counter);
                Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
            }
        };
        let hex = uuid.simple().to_string().to_ascii_uppercase();
        ObjectId::from(&hex[..ID_LEN])
    }
}

/// Whether a token has the shape of an allocated identifier
pub fn looks_like_id(token: &str) -> bool {
    token.len() == ID_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use crate::ident::*;

    #[test]
    fn test_allocated_ids_are_24_upper_hex() {
        let mut allocator = IdAllocator::new();
        for _ in 0..100 {
            let Ok(id) = allocator.allocate() else {
                panic!("allocation failed");
            };
            assert!(looks_like_id(id.as_str()));
            assert_eq!(id.as_str(), id.as_str().to_ascii_uppercase());
        }
    }

    #[test]
    fn test_no_duplicates_in_a_run() {
        let mut allocator = IdAllocator::new();
        let mut seen = AHashSet::new();
        for _ in 0..10_000 {
            let Ok(id) = allocator.allocate() else {
                panic!("allocation failed");
            };
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn test_deterministic_sequence_repeats() {
        let mut a = IdAllocator::deterministic(7);
        let mut b = IdAllocator::deterministic(7);
        let mut c = IdAllocator::deterministic(8);
        for _ in 0..5 {
            let (Ok(x), Ok(y), Ok(z)) = (a.allocate(), b.allocate(), c.allocate()) else {
                panic!("allocation failed");
            };
            assert_eq!(x, y);
            assert_ne!(x, z);
        }
    }

    #[test]
    fn test_reserved_ids_are_skipped() {
        let mut reference = IdAllocator::deterministic(1);
        let Ok(first) = reference.allocate() else {
            panic!("allocation failed");
        };

        let mut allocator = IdAllocator::deterministic(1);
        allocator.reserve(first.clone());
        let Ok(next) = allocator.allocate() else {
            panic!("allocation failed");
        };
        assert_ne!(next, first);
    }

    #[test]
    fn test_looks_like_id() {
        assert!(looks_like_id("8A1B2C3D4E5F60718293A4B5"));
        assert!(!looks_like_id("8A1B2C3D"));
        assert!(!looks_like_id("ZZZZZZZZZZZZZZZZZZZZZZZZ"));
    }
}
