//! Domain models for the country → district → region hierarchy.

use serde::{Deserialize, Serialize};

/// A country aggregate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub country_id: i64,
    pub country_name: String,
    pub gini_index: Option<f64>,
}

/// A district aggregate row, linked to its country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRecord {
    pub district_id: i64,
    pub country_id: i64,
    pub district_name: String,
    pub gini_index: Option<f64>,
}

/// A region row, linked to its district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub region_id: i64,
    pub district_id: i64,
    pub region_name: String,
    pub gini_index: Option<f64>,
}

/// The three finished tables of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub countries: Vec<CountryRecord>,
    pub districts: Vec<DistrictRecord>,
    pub regions: Vec<RegionRecord>,
}

impl Hierarchy {
    /// Check if no records were produced.
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty() && self.districts.is_empty() && self.regions.is_empty()
    }

    /// Find a country by name.
    pub fn country(&self, name: &str) -> Option<&CountryRecord> {
        self.countries.iter().find(|c| c.country_name == name)
    }

    /// Find a district by name.
    pub fn district(&self, name: &str) -> Option<&DistrictRecord> {
        self.districts.iter().find(|d| d.district_name == name)
    }

    /// Find a region by name.
    pub fn region(&self, name: &str) -> Option<&RegionRecord> {
        self.regions.iter().find(|r| r.region_name == name)
    }
}
