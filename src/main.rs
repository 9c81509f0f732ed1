//! Handoff CLI binary entry point.

use clap::Parser;
use handoff::cli::{commands, Cli, Commands};
use handoff::config::HandoffConfig;
use handoff::error::HandoffError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("handoff=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match HandoffConfig::load() {
        Ok(config) => match cli.command {
            Commands::Ask(args) => commands::handle_ask(&config, args).await,
            Commands::Tools => commands::handle_tools(&config).await,
            Commands::Call(args) => commands::handle_call(&config, args).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => exit_with(HandoffError::from(e)),
        },
        Err(e) => exit_with(e),
    }
}

fn exit_with(error: HandoffError) -> ! {
    eprintln!("error [{}]: {error}", error.category());
    std::process::exit(if error.is_client_error() { 2 } else { 1 });
}
