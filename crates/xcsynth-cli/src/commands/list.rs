use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use xcsynth_manifest::plan;

use crate::commands::context::ProjectContext;
use crate::errors::CliError;
use crate::logger;

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Show where every scanned path would go, without touching the document
pub fn handle_list(args: &ListArgs) -> Result<(), CliError> {
    let ctx = ProjectContext::load(&args.root)?;
    let paths = ctx.scan()?;
    let plan = plan(&ctx.config.layout, &paths);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan.files)?);
    } else if plan.files.is_empty() {
        println!("No project files found under {}", ctx.paths.root.display());
    } else {
        let width = plan.files.iter().map(|f| f.path.len()).max().unwrap_or(0);
        println!(
            "{:<width$}  {:<24}  {:<10}  {}",
            "PATH".bold(),
            "TYPE".bold(),
            "PHASE".bold(),
            "GROUP".bold(),
            width = width
        );
        for file in &plan.files {
            let phase = file
                .role()
                .map_or_else(|| "-".to_string(), |role| role.to_string());
            let group = if file.group.is_empty() {
                "(main)".to_string()
            } else {
                file.group.join("/")
            };
            println!(
                "{:<width$}  {:<24}  {:<10}  {}",
                file.path,
                file.classification.declared_type.cyan(),
                phase,
                group,
                width = width
            );
        }
    }

    for warning in &plan.warnings {
        logger::warn(&warning.to_string());
    }
    Ok(())
}
