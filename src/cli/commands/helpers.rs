//! Shared helper functions for CLI commands.

use std::fmt::Display;

use console::style;

use gini_census::config::Settings;
use gini_census::source::HttpArchiveSource;
use gini_census::store::{GiniRow, GiniStore, QueryRows, TableCounts};

/// Print a fatal diagnostic and stop the process.
pub fn exit_with(err: impl Display) -> ! {
    eprintln!("{} {}", style("✗").red(), err);
    std::process::exit(1);
}

/// HTTP source configured from settings.
pub fn http_source(settings: &Settings) -> anyhow::Result<HttpArchiveSource> {
    Ok(HttpArchiveSource::new(
        &settings.base_url,
        Some(&settings.user_agent),
        settings.timeout(),
    )?)
}

/// Open the configured database, creating the schema if needed.
pub fn open_store(settings: &Settings) -> anyhow::Result<GiniStore> {
    let store = GiniStore::open(&settings.database_path)?;
    store.create_schema()?;
    Ok(store)
}

/// Render an index value, missing values as a dash.
pub fn format_gini(gini: Option<f64>) -> String {
    match gini {
        Some(value) => format!("{}", value),
        None => "-".to_string(),
    }
}

pub fn print_counts(counts: &TableCounts) {
    println!("  Countries: {}", style(counts.countries).cyan());
    println!("  Districts: {}", style(counts.districts).cyan());
    println!("  Regions:   {}", style(counts.regions).cyan());
}

pub fn print_gini_rows(rows: &[GiniRow]) {
    if rows.is_empty() {
        println!("{} No matching rows", style("!").yellow());
        return;
    }
    let width = rows.iter().map(|r| r.name.chars().count()).max().unwrap_or(0);
    for row in rows {
        println!("  {:<width$}  {}", row.name, format_gini(row.gini), width = width);
    }
}

pub fn print_query_rows(result: &QueryRows) {
    if result.columns.is_empty() {
        println!("{} Statement executed", style("✓").green());
        return;
    }

    println!("{}", style(result.columns.join(" | ")).bold());
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
        println!("{}", cells.join(" | "));
    }
    println!("{}", style(format!("({} rows)", result.rows.len())).dim());
}
