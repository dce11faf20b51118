//! ResumeChat - Conversational resume search
//!
//! Serves the turn API over HTTP, or answers a single question from the
//! command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resume_chat::{api::build_app, config::ResumeChatConfig, Orchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "resume-chat")]
#[command(author = "ResumeChat Team")]
#[command(version)]
#[command(about = "Conversational resume search with intent routing and entity memory")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "RESUME_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Ask a single question
    Ask {
        /// Session to run the turn in
        #[arg(short, long, default_value = "cli")]
        session: String,

        /// Question text
        text: Vec<String>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("resume_chat={},tower_http=info", log_level).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(cli.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(path) => ResumeChatConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ResumeChatConfig::default(),
    };

    match cli.command {
        Commands::Serve { host, port } => {
            run_server(config, host, port).await?;
        }
        Commands::Ask { session, text } => {
            ask(config, &session, &text.join(" ")).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn run_server(
    mut config: ResumeChatConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting ResumeChat");
    let orchestrator = Arc::new(Orchestrator::from_config(&config).await?);

    // Periodically drop idle sessions
    let sweeper = orchestrator.clone();
    let idle = Duration::from_secs(config.sessions.idle_timeout_secs);
    let every = Duration::from_secs(config.sessions.cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            sweeper.cleanup_inactive(idle).await;
        }
    });

    let app = build_app(orchestrator, &config.server.cors_origins);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("ResumeChat listening on http://{}. Press Ctrl+C to stop.", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}

async fn ask(config: ResumeChatConfig, session: &str, text: &str) -> Result<()> {
    let orchestrator = Orchestrator::from_config(&config).await?;
    let result = orchestrator.handle_turn(text, session).await?;

    println!("{}", result.answer);
    println!();
    println!("source: {:?}", result.source);
    if !result.references.is_empty() {
        let refs: Vec<&str> = result.references.iter().map(|r| r.as_str()).collect();
        println!("references: {}", refs.join(", "));
    }
    if !result.usage.is_empty() {
        println!(
            "tokens: {} in / {} out",
            result.usage.input_tokens, result.usage.output_tokens
        );
    }
    Ok(())
}

fn show_config(config: Option<&ResumeChatConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
