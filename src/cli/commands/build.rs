//! Offline build from local spreadsheet files.

use std::path::PathBuf;

use console::style;

use gini_census::config::Settings;
use gini_census::hierarchy::HierarchyBuilder;
use gini_census::sheet::SheetLoader;

use super::helpers::{open_store, print_counts};

/// Load local sheets into the store, replacing its contents.
pub async fn cmd_build(settings: &Settings, files: &[PathBuf]) -> anyhow::Result<()> {
    let loader = SheetLoader::new(&settings.missing_value_token, settings.header_rows);

    let mut builder = HierarchyBuilder::new();
    let report = builder.add_files(&loader, files);
    let hierarchy = builder.finish();

    for skipped in &report.skipped {
        println!(
            "  {} Skipped {}: {}",
            style("!").yellow(),
            skipped.path.display(),
            skipped.reason
        );
    }

    let mut store = open_store(settings)?;
    store.replace_all(&hierarchy)?;

    println!(
        "{} Loaded {} of {} sheets into {}",
        style("✓").green(),
        report.sheets_processed,
        files.len(),
        settings.database_path.display()
    );
    print_counts(&store.counts()?);

    Ok(())
}
