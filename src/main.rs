//! `shellwise` - your shell, with command suggestions you approve one by one
//!
//! Runs the user's shell in a PTY. The trigger chord opens an inline prompt;
//! the model's reply is parsed into commands that are only ever written to
//! the shell after an explicit decision.

use anyhow::{Context, Result};
use clap::Parser;
use shellwise_core::config::Config;
use shellwise_core::llm::LlmClient;
use shellwise_core::logger;
use std::sync::Arc;

use crate::cli::Cli;

mod cli;
mod terminal;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("Failed to load configuration")?;

    if cli.print_config {
        print!("{}", config.redacted().to_toml()?);
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;

    let log_dir = if config.log.file { Config::data_dir() } else { None };
    logger::init(log_dir, config.log.level());
    shellwise_core::info_log!(
        "shellwise {} ({}) starting: provider={}, model={}, base_url={}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        config.endpoint.provider,
        config.endpoint.model,
        config.endpoint.base_url
    );

    let client = LlmClient::new(config.llm_config()?)?;
    let shell = cli.shell.clone().unwrap_or_else(terminal::pty::default_shell);

    let code = terminal::run(&config, Arc::new(client), &shell).await?;
    shellwise_core::info_log!("exiting with {}", code);
    std::process::exit(code);
}
