//! Terminal rendering for calnotify types.
//!
//! Extension traits that add colored output to calnotify-core types using
//! owo_colors.

use calnotify_core::Event;
use calnotify_core::dispatcher::TickReport;
use calnotify_core::window::EventList;
use chrono::{DateTime, Local, NaiveDate, Utc};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for Event {
    fn render(&self) -> String {
        let time = format!("{:>7}", self.scheduled_at.with_timezone(&Local).format("%H:%M"));
        let minutes = (self.duration.end - self.duration.start).num_minutes();
        let mut line = format!("{} {} {}", time, self.header, format!("({minutes}m)").dimmed());

        if !self.owner.is_empty() {
            line.push_str(&format!(" {}", self.owner.cyan()));
        }
        if self.lead_minutes > 0 {
            line.push_str(&format!(" {}", format!("⏰ -{}m", self.lead_minutes).yellow()));
        }
        line.push_str(&format!(" {}", format!("[{}]", self.id).dimmed()));
        line
    }
}

impl Render for EventList {
    fn render(&self) -> String {
        let mut lines = vec![
            format!("{} → {}", local(self.start), local(self.end))
                .dimmed()
                .to_string(),
        ];

        if self.events.is_empty() {
            lines.push("No events found".dimmed().to_string());
            return lines.join("\n");
        }

        let mut current_date: Option<NaiveDate> = None;
        for event in &self.events {
            let date = event.scheduled_at.with_timezone(&Local).date_naive();
            if current_date != Some(date) {
                lines.push(String::new());
                lines.push(format_date_label(date).bold().to_string());
                current_date = Some(date);
            }
            lines.push(format!("  {}", event.render()));
        }

        lines.join("\n")
    }
}

impl Render for TickReport {
    fn render(&self) -> String {
        let window = format!("{} → {}", local(self.window.start), local(self.window.end));
        let failed = if self.failed > 0 {
            format!("{} failed", self.failed).red().to_string()
        } else {
            "0 failed".dimmed().to_string()
        };

        format!(
            "{} {} published, {} skipped, {}",
            window.dimmed(),
            self.published.green(),
            self.skipped,
            failed
        )
    }
}

fn local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// "Today", "Tomorrow" or e.g. "Wed Feb 25"
fn format_date_label(date: NaiveDate) -> String {
    let today = Local::now().date_naive();

    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn event_line_mentions_id_and_header() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut event = Event::new("standup", "Standup", at, Duration::minutes(15));
        event.lead_minutes = 5;

        let line = event.render();
        assert!(line.contains("Standup"));
        assert!(line.contains("standup"));
        assert!(line.contains("15m"));
    }

    #[test]
    fn empty_list_says_so() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let list = EventList {
            start: at,
            end: at + Duration::days(1),
            events: Vec::new(),
        };
        assert!(list.render().contains("No events found"));
    }
}
