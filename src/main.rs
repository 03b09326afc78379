mod agent;
mod commands;
mod config;
mod error;
mod render;
mod telemetry;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::chat::ChatArgs;
use commands::classify::ClassifyArgs;
use commands::doctor::DoctorArgs;
use commands::lexicon::LexiconArgs;

#[derive(Debug, Parser)]
#[command(
    name = "companion",
    version,
    about = "Rule-based support companion with crisis-first classification"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start an interactive support conversation
    Chat(ChatArgs),
    /// Classify a single message and show the matched trigger
    Classify(ClassifyArgs),
    /// Print the effective lexicon as TOML
    Lexicon(LexiconArgs),
    /// Validate a lexicon and summarize its categories
    Doctor(DoctorArgs),
    /// Print the JSON Schema for companion.toml
    Schema,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Chat(_) => "chat",
            Self::Classify(_) => "classify",
            Self::Lexicon(_) => "lexicon",
            Self::Doctor(_) => "doctor",
            Self::Schema => "schema",
        }
    }
}

fn main() -> ExitCode {
    telemetry::init();

    let cli = Cli::parse();

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Chat(args) => args.execute(),
        Commands::Classify(args) => args.execute(),
        Commands::Lexicon(args) => args.execute(),
        Commands::Doctor(args) => args.execute(),
        Commands::Schema => commands::schema::run_schema(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(exit_err) = e.downcast_ref::<error::ExitError>() {
                eprintln!("error: {exit_err}");
                exit_err.exit_code()
            } else {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        }
    }
}
