mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blockcheck-cli")]
#[command(about = "Blockcheck CLI - Verify generated block programs against level test cases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a submission file and print the suite report
    Verify {
        /// JSON submission (sourceText, testCases, functionName, ...)
        #[arg(short, long)]
        submission: PathBuf,

        /// Verifier config (defaults to $BLOCKCHECK_CONFIG or config/verifier.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the full report as JSON instead of a summary
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print the first top-level function name in a source file
    FunctionName {
        /// Generated JavaScript source
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Show which algorithm family a source file is treated as
    Classify {
        /// Generated JavaScript source
        #[arg(short, long)]
        source: PathBuf,

        /// Level metadata JSON (knapsackData, nqueenData, ...)
        #[arg(short, long)]
        level: Option<PathBuf>,
    },

    /// Print the extracted text of one function
    Locate {
        /// Generated JavaScript source
        #[arg(short, long)]
        source: PathBuf,

        /// Function name
        #[arg(short, long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { submission, config, json } => {
            commands::verify(&submission, config.as_deref(), json).await?;
        }
        Commands::FunctionName { source } => {
            commands::function_name(&source)?;
        }
        Commands::Classify { source, level } => {
            commands::classify(&source, level.as_deref())?;
        }
        Commands::Locate { source, name } => {
            commands::locate(&source, &name)?;
        }
    }

    Ok(())
}
