//! Listing and full pipeline commands.

use console::style;

use gini_census::config::Settings;
use gini_census::pipeline::Pipeline;

use super::helpers::{exit_with, http_source, print_counts};

/// Print the archive names published at the source.
pub async fn cmd_list(settings: &Settings) -> anyhow::Result<()> {
    let source = http_source(settings)?;
    let pipeline = Pipeline::new(&source, settings);

    let names = match pipeline.list().await {
        Ok(names) => names,
        Err(e) => exit_with(e),
    };

    println!(
        "{} {} archive files at {}",
        style("→").cyan(),
        names.len(),
        settings.base_url
    );
    for name in &names {
        println!("  {}", name);
    }

    Ok(())
}

/// Download, extract, build and store.
pub async fn cmd_run(settings: &Settings, json: bool) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let source = http_source(settings)?;
    let pipeline = Pipeline::new(&source, settings);

    let summary = match pipeline.run().await {
        Ok(summary) => summary,
        Err(e) => exit_with(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{} Downloaded {} of {} archives, extracted {} files",
        style("✓").green(),
        summary.archives_downloaded,
        summary.archives_listed,
        summary.entries_extracted
    );
    for failure in &summary.extraction_failures {
        println!("  {} {}", style("!").yellow(), failure);
    }
    for skipped in &summary.skipped_sheets {
        println!("  {} Skipped {}", style("!").yellow(), skipped);
    }
    println!(
        "{} Stored hierarchy in {}",
        style("✓").green(),
        settings.database_path.display()
    );
    print_counts(&summary.stored);

    Ok(())
}
