#![allow(non_snake_case)]

mod cli;
mod clients;
mod config;
mod models;
mod runtime;
mod service;
mod tasks;

use std::env;

use clap::Parser;
use tracing::{error, info};

use crate::config::{AppConfig, WarmerSettings};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    info!("Starting up TeslaEventWarmer");

    let config = match env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    };

    let settings = match WarmerSettings::load(|key| config.get(key).or_else(|| env::var(key).ok()))
    {
        Ok(settings) => settings,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let cli = cli::Cli::parse();
    let result = if cli.gauth {
        cli::run_gauth_check(&settings).await
    } else if cli.tauth {
        cli::run_tauth_check(&settings).await
    } else {
        runtime::run_daemon(settings).await
    };

    if let Err(err) = result {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
