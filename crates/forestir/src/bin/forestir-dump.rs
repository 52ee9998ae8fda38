//! Load a model through the loader registry and log a breadth-first dump.
//!
//! ```text
//! forestir-dump dump.conf model_in=model.json
//! ```

use std::process::ExitCode;

use env_logger::Env;
use log::{error, info};

use forestir::cli::{CliConfig, ConfigError, USAGE};
use forestir::dump::{self, Dump};
use forestir::LoaderRegistry;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match CliConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(ConfigError::HelpRequested) => {
            eprintln!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let registry = LoaderRegistry::with_defaults();
    let model = match registry.load_path(&config.format, &config.model_in) {
        Ok(model) => model,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    info!("{}", dump::summary(&model));
    info!("\n{}", Dump(&model));
    ExitCode::SUCCESS
}
