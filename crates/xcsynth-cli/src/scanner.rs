//! Path scanner
//!
//! Walks the project root once and returns the project-relative paths that
//! match the include globs and none of the exclude globs. Directories whose
//! extension is a bundle extension (asset catalogs, frameworks) are reported
//! as one path and never descended into.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};
use walkdir::WalkDir;
use xcsynth_config::ScanConfig;

use crate::errors::CliError;

pub struct Scanner {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    bundle_extensions: Vec<String>,
}

fn build_set<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet, CliError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

/// `path` below `root`, `/`-separated
fn relative(root: &Path, path: &Path) -> Option<String> {
    let rest = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rest
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

impl Scanner {
    pub fn new(root: &Path, scan: &ScanConfig) -> Result<Self, CliError> {
        Ok(Scanner {
            root: root.to_path_buf(),
            include: build_set(scan.includes())?,
            exclude: build_set(scan.exclude.iter().map(String::as_str))?,
            bundle_extensions: scan
                .bundle_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        })
    }

    fn is_bundle(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.bundle_extensions.contains(&ext))
    }

    /// A directory is skipped when it, or anything inside it, is excluded
    fn excluded_dir(&self, rel: &str) -> bool {
        self.exclude.is_match(rel) || self.exclude.is_match(format!("{}/_", rel))
    }

    /// Scan the root. Output is sorted and free of duplicates. An unreadable
    /// root is an error; unreadable entries below it are skipped with a warning.
    pub fn scan(&self) -> Result<Vec<String>, CliError> {
        let start = Instant::now();
        let mut found = BTreeSet::new();
        let mut walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(next) = walker.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(CliError::Scan {
                        path: self.root.clone(),
                        source: err,
                    })
                }
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };
            if entry.depth() > 0 && entry.path_is_symlink() {
                debug!("Skipping symlink {}", entry.path().display());
                continue;
            }
            let Some(rel) = relative(&self.root, entry.path()) else {
                continue;
            };

            if entry.file_type().is_dir() {
                if self.excluded_dir(&rel) {
                    walker.skip_current_dir();
                    continue;
                }
                if !self.is_bundle(entry.path()) {
                    continue;
                }
                walker.skip_current_dir();
            } else if self.exclude.is_match(&rel) {
                continue;
            }

            if self.include.is_match(&rel) {
                found.insert(rel);
            }
        }

        debug!(
            "Scanned {} in {:.2}ms: {} paths",
            self.root.display(),
            start.elapsed().as_secs_f64() * 1000.0,
            found.len()
        );
        Ok(found.into_iter().collect())
    }
}
