// Folio CLI - structural reconciliation of versioned document trees
// Thin orchestration over folio-recon: read config + documents, run, report.

mod exit_codes;
mod logging;
mod recon;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Reconcile a re-parsed document against its canonical tree")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve references, detect duplicates and place floating elements
    #[command(subcommand)]
    Recon(recon::ReconCommands),
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("FOLIO_GIT_HASH"), ")",
        "\nengine:  folio-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("FOLIO_TARGET"),
        "\ncontract_version(recon): 1",
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let result = match cli.command {
        Commands::Recon(cmd) => recon::cmd_recon(cmd),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
