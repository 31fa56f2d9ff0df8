//! Duologue CLI and REST API entry point.
//!
//! Binary name: `duo`
//!
//! Parses CLI arguments, initializes tracing, the document store and the chat
//! services, then dispatches to the appropriate command handler or starts the
//! REST/WebSocket server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use duologue_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands, UserCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "duo", &mut std::io::stdout());
        return Ok(());
    }

    let options = TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        json: cli.json,
        enable_otel: cli.otel,
    };
    if let Err(e) = init_tracing(&options) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Initialize application state (config, store, services)
    let state = AppState::init().await?;

    match cli.command {
        Commands::User { action } => match action {
            UserCommand::Add {
                email,
                username,
                id,
            } => {
                cli::user::add_user(&state, email, username, id, cli.json).await?;
            }
            UserCommand::Show { identifier } => {
                cli::user::show_user(&state, &identifier, cli.json).await?;
            }
        },

        Commands::Conversations { as_user } => {
            cli::conversation::list_conversations(&state, &as_user, cli.json).await?;
        }

        Commands::Open { partner, as_user } => {
            cli::conversation::open_conversation(&state, &partner, &as_user, cli.json).await?;
        }

        Commands::Send {
            partner,
            text,
            as_user,
        } => {
            cli::conversation::send_message(&state, &partner, &text, &as_user, cli.json, cli.quiet)
                .await?;
        }

        Commands::Chat { partner, as_user } => {
            cli::chat::loop_runner::run_chat_loop(&state, &as_user, &partner).await?;
        }

        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} Duologue listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!(
                    "  {}",
                    console::style(format!("WebSocket chat at ws://{addr}/ws/chat?user=<id>")).dim()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }
            tracing::info!(%addr, backend = %state.config.store.backend, "server starting");

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
