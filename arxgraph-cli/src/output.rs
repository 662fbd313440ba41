//! Output formatting for the arxgraph CLI.
//!
//! Every command result renders either as a human-readable table or as JSON
//! for machine consumption.

use clap::ValueEnum;
use serde::Serialize;
use std::str::FromStr;
use tabled::{builder::Builder, settings::Style};

/// Output format for CLI results
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format (default)
    #[default]
    Table,
    /// JSON format for machine consumption
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: '{}'", s)),
        }
    }
}

/// Types that render as a human-readable table.
pub trait TableDisplay: Serialize {
    fn to_table(&self) -> String;
}

/// Result wrapper rendering in the selected format.
pub struct Output<'a, T> {
    data: &'a T,
    format: OutputFormat,
}

impl<'a, T: TableDisplay> Output<'a, T> {
    pub fn new(data: &'a T, format: OutputFormat) -> Self {
        Self { data, format }
    }

    /// Get the rendered string without printing
    pub fn render_to_string(&self) -> String {
        match self.format {
            OutputFormat::Table => self.data.to_table(),
            OutputFormat::Json => serde_json::to_string_pretty(self.data)
                .unwrap_or_else(|e| format!("{{\n  \"error\": \"{}\"\n}}", e)),
        }
    }

    /// Render the output to stdout
    pub fn render(&self) -> anyhow::Result<()> {
        println!("{}", self.render_to_string());
        Ok(())
    }
}

/// Two-column table of names and counts, largest first.
pub fn count_table<'a, I>(header: &str, counts: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a usize)>,
{
    let mut rows: Vec<_> = counts.into_iter().collect();
    if rows.is_empty() {
        return "(none)".to_string();
    }
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let mut builder = Builder::default();
    builder.push_record([header, "Count"]);
    for (name, count) in rows {
        builder.push_record([name.clone(), count.to_string()]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Table with a header row and string cells.
pub fn rows_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "(none)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(headers.iter().copied());
    for row in rows {
        builder.push_record(row);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}
