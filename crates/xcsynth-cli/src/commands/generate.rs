use clap::Args;
use std::path::PathBuf;

use crate::commands::context::{finish, ProjectContext};
use crate::errors::CliError;
use crate::logger;

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Print the document to stdout instead of writing it
    #[arg(long)]
    pub dry_run: bool,

    /// Seed identifiers for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Rebuild the document from the template and the files on disk. Build
/// settings of a readable prior document are kept.
pub fn handle_generate(args: &GenerateArgs) -> Result<(), CliError> {
    let ctx = ProjectContext::load(&args.root)?;
    let mut session = ctx.session(args.dry_run)?;

    let prior = match session.read() {
        Ok(document) => document.map(|d| d.index),
        Err(CliError::Manifest(err)) => {
            logger::warn(&format!(
                "Ignoring unreadable document {}: {}",
                ctx.paths.document.display(),
                err
            ));
            None
        }
        Err(err) => return Err(err),
    };

    let paths = ctx.scan()?;
    let synthesis = ctx.engine(args.seed).full(&paths, prior.as_ref())?;
    finish(&session, &synthesis, args.dry_run)
}
