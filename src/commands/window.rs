use anyhow::Result;
use calnotify_core::window::Period;
use chrono::Local;

use crate::client::Client;
use crate::parse::parse_instant;
use crate::render::Render;

/// Print the events of the day, week or month starting at `at` (default now).
pub async fn run(client: &Client, period: Period, at: Option<String>) -> Result<()> {
    let at = match at {
        Some(raw) => parse_instant(&raw)?,
        None => Local::now().fixed_offset(),
    };

    let list = client.list_window(period, at).await?;
    println!("{}", list.render());
    Ok(())
}
