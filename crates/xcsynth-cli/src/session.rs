//! Document session: lock, read, back up and write one project document
//!
//! A writing session holds an exclusive advisory lock on
//! `project.pbxproj.lock` from before the read until it is dropped. The
//! previous document is copied to `project.pbxproj.backup` before it is
//! replaced, and the new text is staged in `project.pbxproj.tmp` then renamed
//! over the original.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use xcsynth_config::ProjectPaths;
use xcsynth_manifest::{parse_document, write_document, write_to_path, EntityIndex, ParsedDocument};

use crate::errors::CliError;

/// Exclusive lock released when dropped
#[derive(Debug)]
pub struct DocumentLock {
    file: File,
    path: PathBuf,
}

impl DocumentLock {
    /// Take the lock without waiting; a held lock is an error
    pub fn acquire(path: &Path) -> Result<Self, CliError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive().map_err(|err| {
            if err.kind() == fs2::lock_contended_error().kind() {
                CliError::Locked(path.to_path_buf())
            } else {
                CliError::Io(err)
            }
        })?;
        debug!("Acquired lock {}", path.display());
        Ok(DocumentLock {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), err);
        }
    }
}

/// What `commit` did with the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Written,
    Unchanged,
}

pub struct Session {
    paths: ProjectPaths,
    /// Runtime only - text of the document as read, for change detection
    original: Option<String>,
    lock: Option<DocumentLock>,
}

impl Session {
    /// Open a read-only session: no lock, nothing is ever written
    pub fn read_only(paths: ProjectPaths) -> Self {
        Session {
            paths,
            original: None,
            lock: None,
        }
    }

    /// Open a writing session, taking the document lock
    pub fn writable(paths: ProjectPaths) -> Result<Self, CliError> {
        let lock = DocumentLock::acquire(&paths.lock)?;
        if paths.staging.exists() {
            warn!(
                "Removing staging file left by an interrupted run: {}",
                paths.staging.display()
            );
            fs::remove_file(&paths.staging)?;
        }
        Ok(Session {
            paths,
            original: None,
            lock: Some(lock),
        })
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    fn is_writable(&self) -> bool {
        self.lock.is_some()
    }

    /// Read and parse the document; `None` when there is none yet
    pub fn read(&mut self) -> Result<Option<ParsedDocument>, CliError> {
        let text = match fs::read_to_string(&self.paths.document) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No document at {}", self.paths.document.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let parsed = parse_document(&text)?;
        self.original = Some(text);
        Ok(Some(parsed))
    }

    /// Write `index` as the new document. Nothing is written when the text
    /// is unchanged.
    pub fn commit(&self, index: &EntityIndex) -> Result<CommitOutcome, CliError> {
        if !self.is_writable() {
            return Err(CliError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "session was opened read-only",
            )));
        }
        index.verify()?;
        let text = write_document(index);
        if self.original.as_deref() == Some(text.as_str()) {
            debug!("Document unchanged, not writing");
            return Ok(CommitOutcome::Unchanged);
        }

        if self.paths.document.exists() {
            fs::copy(&self.paths.document, &self.paths.backup)?;
            debug!("Backed up document to {}", self.paths.backup.display());
        }
        write_to_path(index, &self.paths.document)?;
        Ok(CommitOutcome::Written)
    }
}
