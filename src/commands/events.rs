use anyhow::Result;
use calnotify_core::{Event, EventDuration};
use owo_colors::OwoColorize;

use crate::client::Client;
use crate::parse::{parse_duration, parse_instant};
use crate::render::Render;

/// Fields shared by `add` and `update`. `None` means "keep" on update and
/// "default" on add.
pub struct EventArgs {
    pub header: Option<String>,
    pub at: Option<String>,
    pub duration: Option<String>,
    pub lead: Option<i32>,
    pub owner: Option<String>,
    pub description: Option<String>,
}

pub async fn add(client: &Client, id: Option<String>, header: String, at: String, args: EventArgs) -> Result<()> {
    let scheduled_at = parse_instant(&at)?.to_utc();
    let length = parse_duration(args.duration.as_deref().unwrap_or("1h"))?;
    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut event = Event::new(id, header, scheduled_at, length);
    event.lead_minutes = args.lead.unwrap_or(0);
    event.owner = args.owner.unwrap_or_default();
    event.description = args.description.unwrap_or_default();

    let created = client.create_event(&event).await?;
    println!("{} {}", "Created".green(), created.render());
    Ok(())
}

pub async fn update(client: &Client, id: String, rename: Option<String>, args: EventArgs) -> Result<()> {
    let mut event = client.get_event(&id).await?;
    apply_changes(&mut event, rename, args)?;

    let updated = client.update_event(&id, &event).await?;
    println!("{} {}", "Updated".yellow(), updated.render());
    Ok(())
}

/// Overwrite the fields given on the command line. The stored duration is
/// only rebuilt when `--at` or `--duration` changes it: a new start moves
/// it along, a new length keeps its start.
fn apply_changes(event: &mut Event, rename: Option<String>, args: EventArgs) -> Result<()> {
    let mut start = event.duration.start;
    let mut length = event.duration.end - event.duration.start;
    let reschedule = args.at.is_some() || args.duration.is_some();

    if let Some(header) = args.header {
        event.header = header;
    }
    if let Some(at) = args.at {
        event.scheduled_at = parse_instant(&at)?.to_utc();
        start = event.scheduled_at;
    }
    if let Some(duration) = args.duration {
        length = parse_duration(&duration)?;
    }
    if reschedule {
        event.duration = EventDuration::new(start, start + length);
    }
    if let Some(lead) = args.lead {
        event.lead_minutes = lead;
    }
    if let Some(owner) = args.owner {
        event.owner = owner;
    }
    if let Some(description) = args.description {
        event.description = description;
    }
    if let Some(new_id) = rename {
        event.id = new_id;
    }
    Ok(())
}

pub async fn remove(client: &Client, id: String) -> Result<()> {
    client.remove_event(&id).await?;
    println!("{} {}", "Removed".red(), id);
    Ok(())
}

pub async fn show(client: &Client, id: String) -> Result<()> {
    let event = client.get_event(&id).await?;

    println!("{}", event.header.bold());
    println!("  Id:          {}", event.id);
    println!("  When:        {}", event.scheduled_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"));
    println!(
        "  Duration:    {} → {}",
        event.duration.start.with_timezone(&chrono::Local).format("%H:%M"),
        event.duration.end.with_timezone(&chrono::Local).format("%H:%M")
    );
    println!("  Reminder:    {} min before", event.lead_minutes);
    if !event.owner.is_empty() {
        println!("  Owner:       {}", event.owner);
    }
    if !event.description.is_empty() {
        println!("  Description: {}", event.description);
    }
    Ok(())
}
