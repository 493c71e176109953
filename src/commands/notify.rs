use anyhow::{Context, Result};
use calnotify_core::notifier::{NotificationSink, StdoutSink};
use calnotify_core::{Notifier, Settings, runtime};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{require_shared_channel, wait_for_ctrl_c};
use crate::desktop::DesktopSink;

/// Deliver notifications from the durable channel until interrupted.
pub async fn run(settings: &Settings, desktop: bool) -> Result<()> {
    require_shared_channel(settings, "notify")?;

    let channel = runtime::open_channel(settings).context("Failed to open notification channel")?;
    let sink: Arc<dyn NotificationSink> = if desktop {
        Arc::new(DesktopSink)
    } else {
        Arc::new(StdoutSink)
    };
    let notifier = Notifier::new(channel, sink).with_retry_delay(settings.channel.poll_interval);

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(notifier.run(cancel.clone()));
    wait_for_ctrl_c(&cancel).await;
    worker.await?;

    Ok(())
}
