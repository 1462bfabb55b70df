use clap::Args;
use std::path::PathBuf;
use xcsynth_manifest::SyncMode;

use crate::commands::context::{finish, report_diagnostics, ProjectContext};
use crate::errors::CliError;

#[derive(Args, Debug, Clone)]
pub struct PatchArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Print the document to stdout instead of writing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Bring the existing document in line with the files on disk, repairing it
/// on the way. Without a document this is a full synthesis.
pub fn handle_patch(args: &PatchArgs) -> Result<(), CliError> {
    let ctx = ProjectContext::load(&args.root)?;
    let mut session = ctx.session(args.dry_run)?;

    let existing = session.read()?;
    if let Some(document) = &existing {
        report_diagnostics(document, &ctx.paths.document);
    }

    let paths = ctx.scan()?;
    let synthesis = ctx.engine(None).run(
        SyncMode::Incremental,
        &paths,
        existing.map(|d| d.index),
    )?;
    finish(&session, &synthesis, args.dry_run)
}
