//! Initialize command.

use console::style;

use gini_census::config::Settings;
use gini_census::store::GiniStore;

/// Initialize the data directories and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let store = GiniStore::open(&settings.database_path)?;
    store.create_schema()?;

    println!(
        "  {} Archives:  {}",
        style("✓").green(),
        settings.download_dir.display()
    );
    println!(
        "  {} Extracted: {}",
        style("✓").green(),
        settings.extract_dir.display()
    );
    println!(
        "{} Initialized database at {}",
        style("✓").green(),
        settings.database_path.display()
    );

    Ok(())
}
