//! Terminal rendering of the queue

use chrono::{DateTime, Utc};
use colored::Colorize;
use tabled::{Table, Tabled};
use tutorq_core::application::QueueState;
use tutorq_core::domain::QueueEntry;

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Student")]
    student: String,
    #[tabled(rename = "Topic")]
    topic: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Waiting")]
    waiting: String,
}

impl EntryRow {
    fn from_entry(entry: &QueueEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: entry.id.clone(),
            student: entry.student_name.clone(),
            topic: entry.topic_area.clone().unwrap_or_else(|| "-".to_string()),
            status: entry.status.to_string(),
            waiting: format!("{} min", entry.minutes_waiting(now)),
        }
    }
}

pub fn entries_table(entries: &[QueueEntry], now: DateTime<Utc>) -> String {
    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|entry| EntryRow::from_entry(entry, now))
        .collect();
    Table::new(rows).to_string()
}

pub fn summary(waiting: usize, seen: usize) -> String {
    format!(
        "{} waiting • {} seen",
        waiting.to_string().yellow().bold(),
        seen.to_string().green()
    )
}

pub fn entries(entries: &[QueueEntry], now: DateTime<Utc>) -> String {
    if entries.is_empty() {
        return format!("{}", "No students in the queue".dimmed());
    }
    let waiting = entries.iter().filter(|e| e.is_waiting()).count();
    format!(
        "{}\n{}",
        entries_table(entries, now),
        summary(waiting, entries.len() - waiting)
    )
}

/// Full dashboard frame for `watch`
pub fn state(state: &QueueState, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    if state.loading && state.is_empty() {
        out.push_str(&format!("{}\n", "Loading queue...".dimmed()));
    } else {
        out.push_str(&entries(&state.entries, now));
        out.push('\n');
    }
    if let Some(error) = &state.last_error {
        out.push_str(&format!("{} {}\n", "✗".red().bold(), error.red()));
    }
    out
}
