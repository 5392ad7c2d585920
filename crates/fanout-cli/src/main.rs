//! fanout CLI entrypoint.

use clap::Parser;
use std::process::ExitCode;

mod commands;
mod config;
mod handlers;
mod logging;
mod summary;

use commands::{Commands, LogFormat};

#[derive(Parser)]
#[command(name = "fanout")]
#[command(author, version, about = "Matrix build-and-publish orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    let code = match cli.command {
        Commands::Run(args) => handlers::run(args).await,
        Commands::Expand(args) => handlers::expand(&args),
        Commands::Validate(args) => handlers::validate(&args),
    };

    ExitCode::from(code)
}
