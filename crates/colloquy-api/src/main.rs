//! Colloquy CLI and REST API entry point.
//!
//! Binary name: `colloquy`
//!
//! Parses CLI arguments, wires the session manager to its infra
//! implementations, then either serves the REST API or runs one session in
//! the terminal.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use colloquy_core::session::SessionRequest;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = colloquy_observe::tracing_setup::filter_for(cli.verbose, cli.quiet);
    colloquy_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    colloquy_observe::tracing_setup::shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    // Neither needs a database or a generation backend.
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "colloquy", &mut std::io::stdout());
            return Ok(());
        }
        Commands::List { resource } => return cli::list::list(resource, cli.json),
        _ => {}
    }

    let state = AppState::init(&cli.llm_overrides()).await?;
    tracing::debug!(data_dir = %state.data_dir.display(), "state initialized");

    match cli.command {
        Commands::Serve { port, host } => {
            let server = &state.config().server;
            let host = host.unwrap_or_else(|| server.host.clone());
            let port = port.unwrap_or(server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} Colloquy API listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let sessions = state.sessions.clone();
            let router = http::router::build_router(state.clone());
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            sessions.shutdown_all().await;
            state.db_pool.close().await;
            println!("\n  Server stopped.");
        }

        Commands::Run {
            user,
            scenario,
            preset,
            restore,
        } => {
            let request = SessionRequest {
                scenario,
                preset,
                personas: None,
                restore,
            };
            cli::run::run_session(&state, &user, request).await?;
            state.db_pool.close().await;
        }

        Commands::Completions { .. } | Commands::List { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
