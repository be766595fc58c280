pub mod aggregate;
pub mod cli;
pub mod error;
pub mod filter;
pub mod frame;
pub mod io_utils;
pub mod join;
pub mod keys;
pub mod latest;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod roles;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_reconcile", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Roles(args) => roles::execute(&args),
        Commands::Normalize(args) => normalize::execute(&args),
        Commands::Latest(args) => latest::execute(&args),
        Commands::Join(args) => join::execute(&args),
        Commands::Aggregate(args) => aggregate::execute(&args),
        Commands::Pipeline(args) => pipeline::execute(&args),
    }
}
