use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use xcsynth_manifest::InvariantViolation;

use crate::commands::context::{report_diagnostics, ProjectContext};
use crate::errors::CliError;
use crate::logger;
use crate::session::Session;

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ViolationEntry {
    invariant: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    document: String,
    diagnostics: Vec<String>,
    violations: Vec<ViolationEntry>,
}

impl VerifyReport {
    fn new(document: String, diagnostics: Vec<String>, violations: &[InvariantViolation]) -> Self {
        VerifyReport {
            document,
            diagnostics,
            violations: violations
                .iter()
                .map(|v| ViolationEntry {
                    invariant: v.tag(),
                    message: v.to_string(),
                })
                .collect(),
        }
    }
}

/// Parse and check the document without writing anything. Fails naming the
/// broken invariants.
pub fn handle_verify(args: &VerifyArgs) -> Result<(), CliError> {
    let ctx = ProjectContext::load(&args.root)?;
    let mut session = Session::read_only(ctx.paths.clone());
    let Some(document) = session.read()? else {
        return Err(CliError::NoDocument(ctx.paths.document.clone()));
    };

    let violations = document.index.violations();
    let report = VerifyReport::new(
        ctx.paths.document.display().to_string(),
        document.diagnostics.iter().map(ToString::to_string).collect(),
        &violations,
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report_diagnostics(&document, &ctx.paths.document);
        for violation in &report.violations {
            println!("  {} {}", "✗".red().bold(), violation.message);
        }
        if violations.is_empty() {
            logger::success(&format!(
                "{} is consistent ({} entities)",
                report.document,
                document.index.objects.len()
            ));
        }
    }

    if violations.is_empty() {
        return Ok(());
    }
    let tags: BTreeSet<&str> = violations.iter().map(InvariantViolation::tag).collect();
    Err(CliError::Verification {
        count: violations.len(),
        tags: tags.into_iter().collect::<Vec<_>>().join(", "),
    })
}
