//! End-to-end run: list → download → extract → build → store.
//!
//! Listing and download failures abort the run before the next stage starts.
//! Extraction and sheet failures are per-file: they are logged, counted in
//! the summary and the run carries on with what it has.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::archive::{ArchiveExtractor, ExtractionReport};
use crate::config::Settings;
use crate::hierarchy::{BuildReport, HierarchyBuilder, SkippedSheet};
use crate::models::Hierarchy;
use crate::sheet::SheetLoader;
use crate::source::{ArchiveSource, SourceError};
use crate::store::{GiniStore, StoreError, TableCounts};

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Unable to access archive listing - status {0}")]
    ListingStatus(u16),

    #[error("No archive files found")]
    NoArchives,

    #[error("Error when attempting to download {name} - status {status}")]
    DownloadStatus { name: String, status: u16 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub archives_listed: usize,
    pub archives_downloaded: usize,
    pub entries_extracted: usize,
    /// One message per archive that could not be unpacked.
    pub extraction_failures: Vec<String>,
    /// One message per extracted file that did not yield a sheet.
    pub skipped_sheets: Vec<String>,
    pub stored: TableCounts,
}

impl RunSummary {
    fn record_extraction(&mut self, report: &ExtractionReport) {
        self.entries_extracted = report.entries.len();
        self.extraction_failures = report.failures.iter().map(|e| e.to_string()).collect();
    }

    fn record_build(&mut self, report: &BuildReport) {
        self.skipped_sheets = report
            .skipped
            .iter()
            .map(|SkippedSheet { path, reason }| format!("{}: {}", path.display(), reason))
            .collect();
    }
}

/// Sequential pipeline over one archive source.
pub struct Pipeline<'a> {
    source: &'a dyn ArchiveSource,
    settings: &'a Settings,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn ArchiveSource, settings: &'a Settings) -> Self {
        Self { source, settings }
    }

    fn loader(&self) -> SheetLoader {
        SheetLoader::new(&self.settings.missing_value_token, self.settings.header_rows)
    }

    /// List archive names. Anything but 200 OK, or an empty list, is fatal.
    pub async fn list(&self) -> Result<Vec<String>, PipelineError> {
        let listing = self.source.list_archives().await?;
        if !listing.is_ok() {
            return Err(PipelineError::ListingStatus(listing.status));
        }
        if listing.names.is_empty() {
            return Err(PipelineError::NoArchives);
        }
        tracing::info!(
            "{} archive files found: {:?}",
            listing.names.len(),
            listing.names
        );
        Ok(listing.names)
    }

    /// Download every archive in order, stopping at the first non-200.
    pub async fn download(&self, names: &[String]) -> Result<Vec<PathBuf>, PipelineError> {
        let dest = &self.settings.download_dir;
        let mut paths = Vec::with_capacity(names.len());

        for name in names {
            let status = self.source.fetch_archive(name, dest).await?;
            if status != 200 {
                return Err(PipelineError::DownloadStatus {
                    name: name.clone(),
                    status,
                });
            }
            tracing::info!("Downloaded {}", name);
            paths.push(dest.join(name));
        }

        Ok(paths)
    }

    /// Unpack the downloaded archives into the extraction directory.
    pub fn extract(&self, archives: &[PathBuf]) -> Result<ExtractionReport, PipelineError> {
        let mut extractor = ArchiveExtractor::new(&self.settings.extract_dir)?;
        Ok(extractor.extract_all(archives))
    }

    /// Build the hierarchy from extracted entries, in extraction order.
    pub fn build(&self, entries: &[String]) -> (Hierarchy, BuildReport) {
        let paths: Vec<PathBuf> = entries
            .iter()
            .map(|entry| self.settings.extract_dir.join(entry))
            .collect();

        let mut builder = HierarchyBuilder::new();
        let report = builder.add_files(&self.loader(), &paths);
        (builder.finish(), report)
    }

    /// Run every stage up to, but not including, persistence.
    pub async fn prepare(&self) -> Result<(Hierarchy, RunSummary), PipelineError> {
        let mut summary = RunSummary::default();

        let names = self.list().await?;
        summary.archives_listed = names.len();

        let archives = self.download(&names).await?;
        summary.archives_downloaded = archives.len();

        let extraction = self.extract(&archives)?;
        summary.record_extraction(&extraction);

        let (hierarchy, report) = self.build(&extraction.entries);
        summary.record_build(&report);
        tracing::info!(
            "Built {} countries, {} districts, {} regions from {} sheets",
            hierarchy.countries.len(),
            hierarchy.districts.len(),
            hierarchy.regions.len(),
            report.sheets_processed
        );

        Ok((hierarchy, summary))
    }

    /// Create the schema and replace the stored tables with `hierarchy`.
    pub fn persist(
        &self,
        store: &mut GiniStore,
        hierarchy: &Hierarchy,
    ) -> Result<TableCounts, PipelineError> {
        store.create_schema()?;
        store.replace_all(hierarchy)?;
        Ok(store.counts()?)
    }

    /// Run the whole pipeline into an already open store.
    pub async fn run_into(&self, store: &mut GiniStore) -> Result<RunSummary, PipelineError> {
        let (hierarchy, mut summary) = self.prepare().await?;
        summary.stored = self.persist(store, &hierarchy)?;
        Ok(summary)
    }

    /// Run the whole pipeline into the configured database.
    ///
    /// The database is only opened once the hierarchy is built.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let (hierarchy, mut summary) = self.prepare().await?;
        let mut store = GiniStore::open(&self.settings.database_path)?;
        summary.stored = self.persist(&mut store, &hierarchy)?;
        Ok(summary)
    }
}
