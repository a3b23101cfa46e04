use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::process::ExitCode;

use raster_pipeline::cli::Args;
use raster_pipeline::Pipeline;

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    info!("Processing {} -> {}", config.input_file, config.output_file);

    let mut pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    if pipeline.run() {
        ExitCode::SUCCESS
    } else {
        error!(
            "Pipeline failed: {}",
            pipeline.last_error().unwrap_or("unknown error")
        );
        ExitCode::FAILURE
    }
}
