mod commands;
mod error;
mod wiring;

use clap::{Parser, Subcommand};

use commands::replay::ReplayArgs;
use commands::run::RunArgs;
use commands::validate_strategy::ValidateStrategyArgs;
use error::CliError;

#[derive(Parser, Debug)]
#[command(name = "ironflow", about = "Strategy evaluation and execution engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a live/paper session against a market data feed and run until Ctrl-C.
    Run(RunArgs),
    /// Validate a strategy definition against the indicator catalog and wiring rules.
    ValidateStrategy(ValidateStrategyArgs),
    /// Replay a recorded tick file through the pipeline as a backtest session.
    Replay(ReplayArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::ValidateStrategy(args) => commands::validate_strategy::run(args),
        Commands::Replay(args) => commands::replay::run(args).await,
    };

    if let Err(error) = result {
        eprintln!("error: {error}");
        std::process::exit(exit_code(&error));
    }

    std::process::exit(0);
}

fn exit_code(error: &CliError) -> i32 {
    error.exit_code()
}
