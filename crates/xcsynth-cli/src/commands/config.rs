use crate::errors::CliError;
use crate::logger;
use crate::GlobalOpts;
use clap::Subcommand;
use colored::*;
use std::path::{Path, PathBuf};
use xcsynth_config::{Config, ProjectPaths};

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the resolved configuration
    Show {
        /// Project root
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Print the path of the configuration file
    Path {
        /// Project root
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}

pub fn handle_config(action: Option<ConfigAction>, opts: &GlobalOpts) -> Result<(), CliError> {
    match action.unwrap_or(ConfigAction::Show {
        root: PathBuf::from("."),
    }) {
        ConfigAction::Show { root } => show(&root),
        ConfigAction::Path { root } => {
            let config_path = Config::path(&root);
            logger::debug(&format!("Reading config from: {}", config_path.display()));
            println!("{}", config_path.display());
            if !config_path.exists() && opts.verbosity_level() > 0 {
                println!("  {}", "(not present, defaults in use)".yellow());
            }
            Ok(())
        }
    }
}

fn show(root: &Path) -> Result<(), CliError> {
    let config = Config::load(root)?;
    println!("{}", "Configuration:".bold().green());
    match &config.source {
        Some(source) => println!("# {} {}", "source".cyan(), source.display()),
        None => println!("# {} built-in defaults", "source".cyan()),
    }
    match ProjectPaths::resolve(root, &config) {
        Ok(paths) => println!("# {} {}", "document".cyan(), paths.document.display()),
        Err(e) => logger::warn(&format!("Project not resolved: {}", e)),
    }
    println!("{}", config.to_toml_string()?);
    Ok(())
}
