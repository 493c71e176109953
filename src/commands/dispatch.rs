use anyhow::{Context, Result};
use calnotify_core::{Dispatcher, Settings, runtime, singleton};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::{require_shared_channel, wait_for_ctrl_c};
use crate::render::Render;

/// Run the dispatcher as its own process, publishing to the durable channel.
pub async fn run(settings: &Settings, once: bool) -> Result<()> {
    require_shared_channel(settings, "dispatch")?;
    let _lock = singleton::acquire_lock(&settings.database)?;

    let store = runtime::open_store(&settings.database).context("Failed to open event store")?;
    let channel = runtime::open_channel(settings).context("Failed to open notification channel")?;

    let mut dispatcher = Dispatcher::new(
        store.clone(),
        channel,
        settings.dispatcher.tick_interval,
        settings.dispatcher.resume,
        Utc::now(),
    )?;

    if once {
        // The starting cursor is zero-width. The first tick stretches it to
        // now (or one interval ahead when there is nothing to catch up on).
        dispatcher.tick().await;
        let report = dispatcher.tick().await;
        println!("{}", report.render());
    } else {
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(dispatcher.run(cancel.clone()));
        wait_for_ctrl_c(&cancel).await;
        worker.await?;
    }

    store.close().context("Failed to close event store")?;
    Ok(())
}
