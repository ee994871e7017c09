use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use jbchat_agent::Capabilities;
use jbchat_cli::{Cli, Command, Settings, bootstrap, repl};
use jbchat_server::{AppState, ServerConfig, run_server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_cli(&cli);
    let capabilities = Capabilities::from_env(settings.provider)
        .context("failed to set up the model provider")?;

    println!("Initializing ChatBot...");
    let app = bootstrap(settings, capabilities).await?;
    let model = app.model_name();

    match cli.command {
        Some(Command::Serve { addr, session_ttl_mins }) => {
            let config = ServerConfig {
                addr,
                session_ttl: Duration::from_secs(session_ttl_mins * 60),
                ..ServerConfig::default()
            };
            run_server(config, AppState::new(app.engine, model)).await
        }
        None => {
            let thread_id = uuid::Uuid::new_v4().to_string();
            match cli.prompt {
                Some(prompt) => repl::run_once(&app.engine, &thread_id, &prompt).await,
                None => repl::run_interactive(&app.engine, &thread_id).await,
            }
        }
    }
}

/// Logs go to stderr so answers on stdout stay clean. `RUST_LOG` overrides
/// the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
