//! gini-census - census Gini index acquisition.
//!
//! Downloads the zipped Gini index spreadsheets published by the statistics
//! agency, unpacks them, reshapes every sheet into a country → district →
//! region hierarchy and loads the result into SQLite.

pub mod archive;
pub mod config;
pub mod hierarchy;
pub mod models;
pub mod pipeline;
pub mod sheet;
pub mod source;
pub mod store;

pub use archive::{ArchiveExtractor, ExtractionError, ExtractionReport};
pub use config::{load_settings_with_options, Config, LoadOptions, Settings};
pub use hierarchy::{
    build_hierarchy, strip_region_suffix, BuildReport, HierarchyBuilder, SkippedSheet,
};
pub use models::{CountryRecord, DistrictRecord, Hierarchy, RegionRecord};
pub use pipeline::{Pipeline, PipelineError, RunSummary};
pub use sheet::{SheetError, SheetLoader, SheetRow, SourceSheet};
pub use source::{ArchiveSource, HttpArchiveSource, Listing, SourceError};
pub use store::{
    GiniLookup, GiniRow, GiniStore, LookupMode, QueryExpr, QueryRows, Scope, SqlValue, StoreError,
    TableCounts,
};
