use std::path::PathBuf;

use clap::Args;
use ironflow_strategy::Strategy;

use crate::error::CliError;
use crate::wiring;

#[derive(Args, Debug)]
pub struct ValidateStrategyArgs {
    /// Path to a JSON file holding a single strategy definition.
    pub strategy_file: PathBuf,

    /// Optional JSON file of indicator variants; referenced `variant_id`s not registered
    /// here fail validation rule 1.
    #[arg(long)]
    pub variants_file: Option<PathBuf>,
}

pub fn run(args: ValidateStrategyArgs) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(&args.strategy_file)
        .map_err(|e| CliError::Config(format!("reading {}: {e}", args.strategy_file.display())))?;
    let strategy: Strategy =
        serde_json::from_str(&raw).map_err(|e| CliError::Config(format!("parsing {}: {e}", args.strategy_file.display())))?;

    let catalog = wiring::load_catalog(args.variants_file.as_deref())?;

    match ironflow_strategy::validation::validate(&strategy, &catalog) {
        Ok(()) => {
            println!("strategy {} is valid", strategy.strategy_id);
            Ok(())
        }
        Err(errors) => {
            for error in &errors.0 {
                eprintln!("{error}");
            }
            Err(CliError::Validation(format!("{} rule violation(s)", errors.0.len())))
        }
    }
}
