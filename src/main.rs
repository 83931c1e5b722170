use clap::Parser;
use log::{error, info};
use rucher::configuration::config::Config;
use rucher::controller::controller_handler::Controller;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rucher")]
#[command(version = "0.0.1")]
#[command(about = "A credential collecting IMAP honeypot")]
struct Args {
    /// Path to the TOML configuration file
    config_file: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration");
    let config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration imported successfully");

    let mut controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
