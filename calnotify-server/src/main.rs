mod routes;
mod state;

use anyhow::{Context, Result};
use calnotify_core::config::ChannelKind;
use calnotify_core::notifier::TracingSink;
use calnotify_core::{Dispatcher, Notifier, Settings, logging, runtime, singleton};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "calnotify-server")]
#[command(about = "Serve the calnotify event API and run the reminder workers", version)]
struct Args {
    /// Config file (defaults to ~/.config/calnotify/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides server.bind
    #[arg(long)]
    bind: Option<String>,

    /// Do not run the dispatcher in this process
    #[arg(long)]
    no_dispatcher: bool,

    /// Do not run the notifier in this process
    #[arg(long)]
    no_notifier: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    logging::init_logging(&settings.log);

    let run_dispatcher = settings.server.run_dispatcher && !args.no_dispatcher;
    let run_notifier = settings.server.run_notifier && !args.no_notifier;

    // Only one dispatcher may scan a given database
    let _lock = if run_dispatcher {
        Some(singleton::acquire_lock(&settings.database)?)
    } else {
        None
    };

    let store = runtime::open_store(&settings.database).context("Failed to open event store")?;
    let channel = runtime::open_channel(&settings).context("Failed to open notification channel")?;

    if run_dispatcher && !run_notifier && settings.channel.kind == ChannelKind::Memory {
        tracing::warn!("dispatcher runs without a notifier on an in-memory channel; reminders will only queue up");
    }

    let cancel = CancellationToken::new();
    let mut workers = Vec::new();

    if run_dispatcher {
        let dispatcher = Dispatcher::new(
            store.clone(),
            channel.clone(),
            settings.dispatcher.tick_interval,
            settings.dispatcher.resume,
            Utc::now(),
        )?;
        workers.push(tokio::spawn(dispatcher.run(cancel.clone())));
    }

    if run_notifier {
        let notifier =
            Notifier::new(channel.clone(), Arc::new(TracingSink)).with_retry_delay(settings.channel.poll_interval);
        workers.push(tokio::spawn(notifier.run(cancel.clone())));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(AppState::new(store.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let bind = args.bind.unwrap_or(settings.server.bind);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("calnotify-server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
            cancel.cancel();
        })
        .await?;

    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "worker task failed");
        }
    }

    store.close().context("Failed to close event store")?;
    Ok(())
}
