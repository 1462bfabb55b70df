use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xcsynth::{
    commands::{
        config::{self, ConfigAction},
        generate::{self, GenerateArgs},
        list::{self, ListArgs},
        patch::{self, PatchArgs},
        verify::{self, VerifyArgs},
    },
    logger, GlobalOpts,
};

#[derive(Parser)]
#[command(name = "xcsynth")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Xcode project synthesizer",
    long_about = "xcsynth keeps an Xcode project.pbxproj in step with the files on disk: it builds the document from scratch, patches and repairs an existing one, and checks its structural invariants."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a new document from the files on disk
    Generate(GenerateArgs),
    /// Update and repair the existing document
    Patch(PatchArgs),
    /// Check the document against its invariants without writing
    Verify(VerifyArgs),
    /// Show scanned files with their type, phase and group
    List(ListArgs),
    /// Show configuration
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

fn init_logging(opts: &GlobalOpts) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| opts.default_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => generate::handle_generate(&args)
            .with_context(|| format!("generate failed for {}", args.root.display())),
        Commands::Patch(args) => patch::handle_patch(&args)
            .with_context(|| format!("patch failed for {}", args.root.display())),
        Commands::Verify(args) => verify::handle_verify(&args)
            .with_context(|| format!("verify failed for {}", args.root.display())),
        Commands::List(args) => list::handle_list(&args)
            .with_context(|| format!("list failed for {}", args.root.display())),
        Commands::Config { action } => {
            config::handle_config(action, &cli.global).context("config failed")
        }
    }
}

fn main() {
    let cli = Cli::parse();

    init_logging(&cli.global);
    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level(), cli.global.quiet) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }

    if let Err(e) = run(cli) {
        logger::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
