//! Gini lookup requests and the query expression syntax.
//!
//! A lookup names one unit and asks either for its own index value or for
//! the values of its direct children. Expressions use the form
//! `scope=name[,type=single|all]`; anything else is taken as raw SQL.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::StoreError;

/// Level of the hierarchy a lookup addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Country,
    District,
    Region,
}

impl FromStr for Scope {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "country" => Ok(Scope::Country),
            "district" => Ok(Scope::District),
            "region" => Ok(Scope::Region),
            other => Err(StoreError::InvalidLookup(format!("unknown scope '{}'", other))),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Country => "country",
            Scope::District => "district",
            Scope::Region => "region",
        };
        f.write_str(s)
    }
}

/// Whether a lookup returns the unit itself or its children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LookupMode {
    #[default]
    Single,
    All,
}

impl FromStr for LookupMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(LookupMode::Single),
            "all" => Ok(LookupMode::All),
            other => Err(StoreError::InvalidLookup(format!(
                "unknown type '{}', expected single or all",
                other
            ))),
        }
    }
}

/// A resolved Gini lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiniLookup {
    /// A country's own value.
    Country(String),
    /// A district's own value.
    District(String),
    /// A region's own value.
    Region(String),
    /// Every district of a country.
    DistrictsOf(String),
    /// Every region of a district.
    RegionsOf(String),
}

impl GiniLookup {
    /// Resolve a (scope, name, mode) triple.
    ///
    /// Regions have no children, so `region` with `all` is rejected.
    pub fn new(
        scope: Scope,
        name: impl Into<String>,
        mode: LookupMode,
    ) -> Result<Self, StoreError> {
        let name = name.into();
        match (scope, mode) {
            (Scope::Country, LookupMode::Single) => Ok(GiniLookup::Country(name)),
            (Scope::Country, LookupMode::All) => Ok(GiniLookup::DistrictsOf(name)),
            (Scope::District, LookupMode::Single) => Ok(GiniLookup::District(name)),
            (Scope::District, LookupMode::All) => Ok(GiniLookup::RegionsOf(name)),
            (Scope::Region, LookupMode::Single) => Ok(GiniLookup::Region(name)),
            (Scope::Region, LookupMode::All) => Err(StoreError::InvalidLookup(
                "regions have no child units, use type=single".to_string(),
            )),
        }
    }

    /// Name the lookup is keyed on.
    pub fn name(&self) -> &str {
        match self {
            GiniLookup::Country(name)
            | GiniLookup::District(name)
            | GiniLookup::Region(name)
            | GiniLookup::DistrictsOf(name)
            | GiniLookup::RegionsOf(name) => name,
        }
    }

    /// Parameterized SQL returning `(name, gini_index)` rows.
    pub fn sql(&self) -> &'static str {
        match self {
            GiniLookup::Country(_) => {
                "SELECT country_name, gini_index FROM Countries WHERE country_name = ?1 \
                 ORDER BY country_id"
            }
            GiniLookup::District(_) => {
                "SELECT district_name, gini_index FROM Districts WHERE district_name = ?1 \
                 ORDER BY district_id"
            }
            GiniLookup::Region(_) => {
                "SELECT region_name, gini_index FROM Regions WHERE region_name = ?1 \
                 ORDER BY region_id"
            }
            GiniLookup::DistrictsOf(_) => {
                "SELECT district_name, gini_index FROM Districts WHERE country_id IN \
                 (SELECT country_id FROM Countries WHERE country_name = ?1) \
                 ORDER BY district_id"
            }
            GiniLookup::RegionsOf(_) => {
                "SELECT region_name, gini_index FROM Regions WHERE district_id IN \
                 (SELECT district_id FROM Districts WHERE district_name = ?1) \
                 ORDER BY region_id"
            }
        }
    }
}

/// A parsed query-surface expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpr {
    Lookup(GiniLookup),
    Raw(String),
}

impl QueryExpr {
    /// Parse `scope=name[,type=single|all]`, falling back to raw SQL when
    /// the text does not start with a scope assignment.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let input = input.trim();
        let mut parts = input.split(',');

        let Some((key, name)) = parts.next().and_then(|p| p.split_once('=')) else {
            return Ok(QueryExpr::Raw(input.to_string()));
        };
        let Ok(scope) = key.parse::<Scope>() else {
            return Ok(QueryExpr::Raw(input.to_string()));
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidLookup(format!("missing {} name", scope)));
        }

        let mut mode = LookupMode::default();
        for part in parts {
            match part.split_once('=') {
                Some((key, value)) if key.trim().eq_ignore_ascii_case("type") => {
                    mode = value.parse()?;
                }
                _ => {
                    return Err(StoreError::InvalidLookup(format!(
                        "unexpected '{}', expected type=single|all",
                        part.trim()
                    )))
                }
            }
        }

        GiniLookup::new(scope, name, mode).map(QueryExpr::Lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scope_mode_combination() {
        let cases = [
            (Scope::Country, LookupMode::Single, Some(GiniLookup::Country("x".into()))),
            (Scope::Country, LookupMode::All, Some(GiniLookup::DistrictsOf("x".into()))),
            (Scope::District, LookupMode::Single, Some(GiniLookup::District("x".into()))),
            (Scope::District, LookupMode::All, Some(GiniLookup::RegionsOf("x".into()))),
            (Scope::Region, LookupMode::Single, Some(GiniLookup::Region("x".into()))),
            (Scope::Region, LookupMode::All, None),
        ];
        for (scope, mode, expected) in cases {
            assert_eq!(GiniLookup::new(scope, "x", mode).ok(), expected, "{scope} {mode:?}");
        }
    }

    #[test]
    fn test_parse_structured_expressions() {
        assert_eq!(
            QueryExpr::parse("country=Brasil").unwrap(),
            QueryExpr::Lookup(GiniLookup::Country("Brasil".into()))
        );
        assert_eq!(
            QueryExpr::parse("country=Brasil,type=all").unwrap(),
            QueryExpr::Lookup(GiniLookup::DistrictsOf("Brasil".into()))
        );
        assert_eq!(
            QueryExpr::parse(" District = Rio de Janeiro , type = ALL ").unwrap(),
            QueryExpr::Lookup(GiniLookup::RegionsOf("Rio de Janeiro".into()))
        );
        assert_eq!(
            QueryExpr::parse("region=Porto Velho,type=single").unwrap(),
            QueryExpr::Lookup(GiniLookup::Region("Porto Velho".into()))
        );
    }

    #[test]
    fn test_parse_raw_sql() {
        let sql = "SELECT * FROM Countries";
        assert_eq!(QueryExpr::parse(sql).unwrap(), QueryExpr::Raw(sql.to_string()));
        let sql = "SELECT region_name FROM Regions WHERE gini_index=0.5";
        assert_eq!(QueryExpr::parse(sql).unwrap(), QueryExpr::Raw(sql.to_string()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(QueryExpr::parse("country=").is_err());
        assert!(QueryExpr::parse("country=Brasil,type=some").is_err());
        assert!(QueryExpr::parse("country=Brasil,limit=3").is_err());
        assert!(QueryExpr::parse("region=Xapuri,type=all").is_err());
    }

    #[test]
    fn test_lookup_name() {
        assert_eq!(GiniLookup::RegionsOf("Acre".into()).name(), "Acre");
    }
}
