//! Reshaping of source sheets into the country → district → region tables.
//!
//! Sheets are folded into three insertion-ordered identity maps. A row is
//! identified by its exact content (name and index value) together with its
//! parent's identity, so repeated ancestors collapse while two units that
//! merely share a name stay distinct. Surrogate ids are the positions in
//! those maps and foreign keys are resolved by key once every sheet is in.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;

use crate::models::{CountryRecord, DistrictRecord, Hierarchy, RegionRecord};
use crate::sheet::{SheetLoader, SheetRow, SourceSheet};

/// Trailing state qualifier on region names, e.g. "Rio Branco - AC".
static REGION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" - .{2}$").unwrap());

/// Errors for sheets that cannot contribute to the hierarchy.
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("Sheet has {0} named rows, need at least a country and a district row")]
    Incomplete(usize),
}

/// Exact-content identity of one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RowKey {
    name: String,
    gini_bits: Option<u64>,
}

impl RowKey {
    fn new(row: &SheetRow) -> Self {
        // -0.0 and 0.0 must collapse like they compare
        let gini_bits = row
            .gini
            .map(|v| (if v == 0.0 { 0.0f64 } else { v }).to_bits());
        Self {
            name: row.name.clone(),
            gini_bits,
        }
    }
}

type DistrictKey = (RowKey, RowKey);
type RegionKey = (DistrictKey, RowKey);

/// A sheet that was not folded into the hierarchy.
#[derive(Debug, Clone)]
pub struct SkippedSheet {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of a build over files on disk.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub sheets_processed: usize,
    pub skipped: Vec<SkippedSheet>,
}

/// Accumulates sheets and emits the finished hierarchy.
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    countries: IndexMap<RowKey, SheetRow>,
    districts: IndexMap<DistrictKey, SheetRow>,
    regions: IndexMap<RegionKey, SheetRow>,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sheet into the accumulated tables.
    ///
    /// Row 0 is the country, row 1 the district, the rest are regions of
    /// that district. Rows already seen with identical content are ignored.
    pub fn add_sheet(&mut self, sheet: &SourceSheet) -> Result<(), HierarchyError> {
        let (Some(country), Some(district)) = (sheet.country(), sheet.district()) else {
            return Err(HierarchyError::Incomplete(sheet.rows.len()));
        };

        let country_key = RowKey::new(country);
        self.countries
            .entry(country_key.clone())
            .or_insert_with(|| country.clone());

        let district_key = (country_key, RowKey::new(district));
        self.districts
            .entry(district_key.clone())
            .or_insert_with(|| district.clone());

        for region in sheet.regions() {
            let region_key = (district_key.clone(), RowKey::new(region));
            self.regions.entry(region_key).or_insert_with(|| SheetRow {
                name: strip_region_suffix(&region.name).to_string(),
                gini: region.gini,
            });
        }

        Ok(())
    }

    /// Load every file with `loader` and fold it in, in the order given.
    ///
    /// Files that fail to load or lack the country and district rows are
    /// logged and recorded in the report; the build carries on.
    pub fn add_files<P: AsRef<Path>>(&mut self, loader: &SheetLoader, paths: &[P]) -> BuildReport {
        let mut report = BuildReport::default();

        for path in paths {
            let path = path.as_ref();
            let result = loader
                .load(path)
                .map_err(|e| e.to_string())
                .and_then(|sheet| self.add_sheet(&sheet).map_err(|e| e.to_string()));

            match result {
                Ok(()) => report.sheets_processed += 1,
                Err(reason) => {
                    tracing::warn!("Skipping sheet {}: {}", path.display(), reason);
                    report.skipped.push(SkippedSheet {
                        path: path.to_path_buf(),
                        reason,
                    });
                }
            }
        }

        report
    }

    /// Assign surrogate ids and resolve parent keys into foreign keys.
    pub fn finish(self) -> Hierarchy {
        let countries = self
            .countries
            .values()
            .enumerate()
            .map(|(id, row)| CountryRecord {
                country_id: id as i64,
                country_name: row.name.clone(),
                gini_index: row.gini,
            })
            .collect();

        let districts = self
            .districts
            .iter()
            .enumerate()
            .map(|(id, ((country_key, _), row))| DistrictRecord {
                district_id: id as i64,
                country_id: position(&self.countries, country_key),
                district_name: row.name.clone(),
                gini_index: row.gini,
            })
            .collect();

        let regions = self
            .regions
            .iter()
            .enumerate()
            .map(|(id, ((district_key, _), row))| RegionRecord {
                region_id: id as i64,
                district_id: position(&self.districts, district_key),
                region_name: row.name.clone(),
                gini_index: row.gini,
            })
            .collect();

        Hierarchy {
            countries,
            districts,
            regions,
        }
    }
}

/// Position of a parent key. Every child was inserted after its parent, so
/// the key is always present.
fn position<K: std::hash::Hash + Eq, V>(map: &IndexMap<K, V>, key: &K) -> i64 {
    map.get_index_of(key).map_or(-1, |i| i as i64)
}

/// Remove a trailing " - XX" qualifier from a region name.
pub fn strip_region_suffix(name: &str) -> &str {
    match REGION_SUFFIX.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// Build a hierarchy from sheets already in memory.
pub fn build_hierarchy<'a>(
    sheets: impl IntoIterator<Item = &'a SourceSheet>,
) -> (Hierarchy, Vec<HierarchyError>) {
    let mut builder = HierarchyBuilder::new();
    let errors = sheets
        .into_iter()
        .filter_map(|sheet| builder.add_sheet(sheet).err())
        .collect();
    (builder.finish(), errors)
}
