use std::path::Path;
use xcsynth_config::{Config, ProjectPaths};
use xcsynth_manifest::{
    write_document, IdAllocator, ParsedDocument, SyncEngine, SyncOptions, SyncResult, Synthesis,
};

use crate::errors::CliError;
use crate::logger;
use crate::scanner::Scanner;
use crate::session::{CommitOutcome, Session};

/// Everything a command needs to know about one project root
pub struct ProjectContext {
    pub config: Config,
    pub paths: ProjectPaths,
}

impl ProjectContext {
    pub fn load(root: &Path) -> Result<Self, CliError> {
        let config = Config::load(root)?;
        let paths = ProjectPaths::resolve(root, &config)?;
        logger::debug(&format!(
            "Project {} at {}",
            paths.project_name,
            paths.document.display()
        ));
        Ok(ProjectContext { config, paths })
    }

    /// Scan the root with the configured globs
    pub fn scan(&self) -> Result<Vec<String>, CliError> {
        logger::spinner_start(&format!("Scanning {}", self.paths.root.display()));
        let scanned = Scanner::new(&self.paths.root, &self.config.scan).and_then(|s| s.scan());
        logger::spinner_stop();
        let paths = scanned?;
        logger::step(&format!("Scanned {} paths", paths.len()));
        Ok(paths)
    }

    /// Session over the document; dry runs never take the lock
    pub fn session(&self, dry_run: bool) -> Result<Session, CliError> {
        if dry_run {
            Ok(Session::read_only(self.paths.clone()))
        } else {
            Session::writable(self.paths.clone())
        }
    }

    pub fn engine(&self, seed: Option<u64>) -> SyncEngine {
        let engine = SyncEngine::new(SyncOptions {
            layout: self.config.layout.clone(),
            template: self.config.to_template(&self.paths.project_name),
        });
        match seed {
            Some(seed) => engine.with_allocator(IdAllocator::deterministic(seed)),
            None => engine,
        }
    }
}

/// Echo the recoverable problems found while parsing
pub fn report_diagnostics(document: &ParsedDocument, source: &Path) {
    for diagnostic in &document.diagnostics {
        logger::warn(&format!("{}: {}", source.display(), diagnostic));
    }
}

fn report(result: &SyncResult) {
    for warning in &result.warnings {
        logger::warn(&warning.to_string());
    }
}

fn summary(result: &SyncResult) -> String {
    format!(
        "{} added, {} removed, {} kept, {} groups pruned, {} repairs",
        result.files_inserted,
        result.files_removed,
        result.files_retained,
        result.groups_pruned,
        result.repairs
    )
}

/// Print or write the synthesized document
pub fn finish(session: &Session, synthesis: &Synthesis, dry_run: bool) -> Result<(), CliError> {
    report(&synthesis.result);
    if dry_run {
        print!("{}", write_document(&synthesis.index));
        logger::info(&format!("Dry run: {}", summary(&synthesis.result)));
        return Ok(());
    }

    match session.commit(&synthesis.index)? {
        CommitOutcome::Written => logger::success(&format!(
            "Wrote {} ({})",
            session.paths().document.display(),
            summary(&synthesis.result)
        )),
        CommitOutcome::Unchanged => logger::success(&format!(
            "{} is up to date",
            session.paths().document.display()
        )),
    }
    Ok(())
}
