//! Run report and summary display
//!
//! Collects what a scrub run did and prints it as a table or as JSON.

use crate::tasks::TaskOutcome;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;

/// What a scrub run did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source_instance: String,
    pub snapshot: String,
    pub workspace: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tasks: Vec<TaskOutcome>,
    /// Final snapshot taken when the workspace was deleted
    pub final_snapshot: Option<String>,
    /// Old scrubbed snapshots deleted by retention
    pub pruned_snapshots: Vec<String>,
}

impl RunReport {
    pub fn failed_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| !t.succeeded).count()
    }

    pub fn success(&self) -> bool {
        self.failed_tasks() == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("success".to_string(), self.success().into());
        }
        serde_json::to_string_pretty(&value)
    }

    /// Summary table of task outcomes
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Task"),
                Cell::new("Database"),
                Cell::new("Status"),
                Cell::new("Duration (s)"),
            ]);

        for outcome in &self.tasks {
            table.add_row(vec![
                Cell::new(&outcome.task),
                Cell::new(outcome.database.as_deref().unwrap_or("-")),
                Cell::new(if outcome.succeeded { "Committed" } else { "Failed" }),
                Cell::new(format!("{:.1}", outcome.duration_secs)),
            ]);
        }
        table
    }

    /// Print the summary to stdout
    pub fn print_summary(&self) {
        println!("\n=== Scrub Results ===\n");
        println!("Source instance: {}", self.source_instance);
        println!("Snapshot:        {}", self.snapshot);
        println!("Workspace:       {}", self.workspace);
        println!();

        if self.tasks.is_empty() {
            println!("No viable scrub tasks.");
        } else {
            println!("{}", self.table());
        }

        match &self.final_snapshot {
            Some(id) => println!("\nFinal snapshot: {id}"),
            None => println!("\nNo final snapshot taken."),
        }
        if !self.pruned_snapshots.is_empty() {
            println!("Pruned snapshots: {}", self.pruned_snapshots.join(", "));
        }
        println!(
            "\n{} of {} tasks succeeded",
            self.tasks.len() - self.failed_tasks(),
            self.tasks.len()
        );
    }
}
