//! autoredirect CLI: the `autoredirect` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let config = support::load_config_or_exit(cli.config.as_deref());
    tracing::debug!(
        default_target = config.default_target(),
        default_key = config.uses_default_key(),
        exclusions = config.exclusions().is_some(),
        "configuration loaded"
    );

    match cli.command {
        Commands::EncodeUrl { url } => commands::encode::run_url(&config, url),
        Commands::EncodeOperation {
            operation,
            action,
            method,
            params,
        } => commands::encode::run_operation(&config, operation, action, &method, &params),
        Commands::Decode { token, raw, json } => commands::decode::run(&config, &token, raw, json),
        Commands::CheckExclusion { path, json } => {
            commands::check_exclusion::run(&config, &path, json)
        }
        Commands::Serve { bind } => commands::serve::run(config, &bind),
    }
}
