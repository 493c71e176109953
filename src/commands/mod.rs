pub mod config;
pub mod dispatch;
pub mod events;
pub mod notify;
pub mod window;

use anyhow::Result;
use calnotify_core::Settings;
use calnotify_core::config::ChannelKind;
use tokio_util::sync::CancellationToken;

/// Standalone workers only meet through the sqlite outbox.
fn require_shared_channel(settings: &Settings, command: &str) -> Result<()> {
    if settings.channel.kind != ChannelKind::Sqlite {
        anyhow::bail!(
            "`calnotify {command}` needs a channel shared between processes.\n\
            Set this in your config file:\n\n  \
            [channel]\n  \
            kind = \"sqlite\""
        );
    }
    Ok(())
}

async fn wait_for_ctrl_c(cancel: &CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutting down");
    cancel.cancel();
}
