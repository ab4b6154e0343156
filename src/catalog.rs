//! Per-database dimension discovery and the client's memoized lookups.
//!
//! Every database names its dimensions differently: WDI has `country`,
//! `series` and `time`, sub-national databases have `states` or
//! `admin region`, some call time `year`. [`Client::concepts`] maps each
//! database's concept list onto the canonical names `economy`, `series` and
//! `time`; anything unrecognized keeps its own key so extra dimensions
//! (e.g. `version`) stay addressable.
//!
//! All lookups are compute-once/read-many. Concurrent first builds may both
//! hit the network, but only the first result is stored, so readers always
//! see a single immutable snapshot per key.

use crate::api::{Client, FetchOptions};
use crate::error::{Error, Result};
use crate::models::{CodeName, CountryRow};
use ahash::{AHashMap, AHashSet};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Characters left unescaped in concept keys, as URL path quoting does.
const CONCEPT_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Canonical names of the three dimensions every database has.
pub const ECONOMY: &str = "economy";
pub const SERIES: &str = "series";
pub const TIME: &str = "time";

/// URL-ready, lower-cased form of an API concept id.
pub fn concept_key(id: &str) -> String {
    percent_encoding::utf8_percent_encode(id, CONCEPT_SAFE)
        .to_string()
        .to_lowercase()
}

/// Canonical dimension name for a concept key.
pub fn canonical_name(key: &str) -> &str {
    match key {
        // "receiving countries" currently comes with a trailing space
        "country" | "admin%20region" | "states" | "provinces" | "receiving%20countries%20"
        | "receiving%20countries" => ECONOMY,
        "year" => TIME,
        "indicator" => SERIES,
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Canonical name (`economy`, `time`, `series`, or the key itself).
    pub canonical: String,
    /// Key used in request URLs.
    pub key: String,
    /// Display name reported by the API.
    pub name: String,
}

/// A database's dimensions, in the order the API lists them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionInfo {
    pub db: u32,
    pub dimensions: Vec<Dimension>,
}

impl DimensionInfo {
    /// Build from the rows of `sources/{db}/concepts`.
    pub fn from_concepts<'a>(db: u32, rows: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut dimensions: Vec<Dimension> = Vec::new();
        for (id, name) in rows {
            let key = concept_key(id);
            let canonical = canonical_name(&key).to_string();
            // later duplicates overwrite, as a keyed map would
            dimensions.retain(|d| d.canonical != canonical);
            dimensions.push(Dimension {
                canonical,
                key,
                name: name.to_string(),
            });
        }
        Self { db, dimensions }
    }

    pub fn get(&self, canonical: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.canonical == canonical)
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.get(canonical).is_some()
    }

    /// The dimension or a configuration error naming the database.
    pub fn require(&self, canonical: &str) -> Result<&Dimension> {
        self.get(canonical).ok_or_else(|| {
            Error::Configuration(format!(
                "{canonical} is not a concept in database {}",
                self.db
            ))
        })
    }

    /// Canonical name for a concept as it appears inside data rows
    /// (`"Country"`, `"Series"`, `"Time"`, ...).
    pub fn canonical_for_concept(&self, concept: &str) -> String {
        let key = concept_key(concept);
        match self.dimensions.iter().find(|d| d.key == key) {
            Some(d) => d.canonical.clone(),
            None => canonical_name(&key).to_string(),
        }
    }
}

/// Display value → API key for a database's time dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodTable {
    by_value: AHashMap<String, String>,
}

impl PeriodTable {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            by_value: pairs.into_iter().collect(),
        }
    }

    /// API key for a display value, or the input when unknown (pre-keyed input).
    pub fn resolve<'a>(&'a self, value: &'a str) -> &'a str {
        self.by_value.get(value).map(String::as_str).unwrap_or(value)
    }

    pub fn len(&self) -> usize {
        self.by_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_value.is_empty()
    }
}

/// Short and long codes of every aggregate economy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSet {
    codes: AHashSet<String>,
}

impl AggregateSet {
    pub fn from_countries<'a>(rows: impl IntoIterator<Item = &'a CountryRow>) -> Self {
        let mut codes = AHashSet::new();
        for row in rows.into_iter().filter(|r| r.is_aggregate()) {
            codes.insert(row.id.clone());
            if !row.iso2_code.is_empty() {
                codes.insert(row.iso2_code.clone());
            }
        }
        Self { codes }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }
}

/// Classification of one economy as listed by `country/all`.
///
/// Aggregates carry empty classification codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EconomyClass {
    pub aggregate: bool,
    pub region: CodeName,
    pub adminregion: CodeName,
    pub income_level: CodeName,
    pub lending_type: CodeName,
    pub capital_city: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl EconomyClass {
    pub fn from_row(row: &CountryRow) -> Self {
        let aggregate = row.is_aggregate();
        let class = |c: &CodeName| {
            if aggregate {
                CodeName::default()
            } else {
                CodeName {
                    id: c.id.trim().to_string(),
                    value: c.value.trim().to_string(),
                }
            }
        };
        let coord = |s: &str| s.trim().parse::<f64>().ok();
        let capital = row.capital_city.trim();
        Self {
            aggregate,
            region: class(&row.region),
            adminregion: class(&row.adminregion),
            income_level: class(&row.income_level),
            lending_type: class(&row.lending_type),
            capital_city: (!capital.is_empty()).then(|| capital.to_string()),
            longitude: coord(&row.longitude),
            latitude: coord(&row.latitude),
        }
    }
}

/// Per-code classification of every economy, plus the aggregate codes.
#[derive(Debug, Clone, Default)]
pub struct EconomyTable {
    classes: AHashMap<String, EconomyClass>,
    aggregates: Arc<AggregateSet>,
}

impl EconomyTable {
    pub fn from_countries(rows: &[CountryRow]) -> Self {
        let classes = rows
            .iter()
            .map(|r| (r.id.clone(), EconomyClass::from_row(r)))
            .collect();
        Self {
            classes,
            aggregates: Arc::new(AggregateSet::from_countries(rows)),
        }
    }

    pub fn get(&self, code: &str) -> Option<&EconomyClass> {
        self.classes.get(code)
    }

    pub fn aggregates(&self) -> &Arc<AggregateSet> {
        &self.aggregates
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// The client's memo tables.
#[derive(Debug, Default)]
pub struct Catalog {
    concepts: RwLock<AHashMap<u32, Arc<DimensionInfo>>>,
    periods: RwLock<AHashMap<u32, Arc<PeriodTable>>>,
    latest: RwLock<AHashMap<(u32, String), String>>,
    metadata_flags: RwLock<AHashMap<u32, bool>>,
    economies: RwLock<Option<Arc<EconomyTable>>>,
}

fn read<K, V>(map: &RwLock<AHashMap<K, V>>, key: &K) -> Option<V>
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    map.read()
        .unwrap_or_else(|e| e.into_inner())
        .get(key)
        .cloned()
}

/// Insert unless present; returns whatever ends up stored.
fn store<K, V>(map: &RwLock<AHashMap<K, V>>, key: K, value: V) -> V
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    map.write()
        .unwrap_or_else(|e| e.into_inner())
        .entry(key)
        .or_insert(value)
        .clone()
}

impl Catalog {
    pub fn clear(&self) {
        self.concepts.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.periods.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.latest.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.metadata_flags
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        *self.economies.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Client {
    /// Dimensions of `db` (default database when `None`), fetched once.
    pub fn concepts(&self, db: Option<u32>) -> Result<Arc<DimensionInfo>> {
        let db = self.db_or_default(db);
        if let Some(info) = read(&self.catalog.concepts, &db) {
            return Ok(info);
        }

        log::debug!("discovering concepts of database {db}");
        let opts = FetchOptions::default().concepts(true);
        let mut rows: Vec<(String, String)> = Vec::new();
        for row in self.fetch(&format!("sources/{db}/concepts"), &opts) {
            let row = row?;
            let id = row.get("id").and_then(|v| v.as_str()).unwrap_or_default();
            let name = row.get("value").and_then(|v| v.as_str()).unwrap_or(id);
            rows.push((id.to_string(), name.to_string()));
        }
        let info = DimensionInfo::from_concepts(
            db,
            rows.iter().map(|(id, name)| (id.as_str(), name.as_str())),
        );
        Ok(store(&self.catalog.concepts, db, Arc::new(info)))
    }

    /// Time display value → key table of `db`, fetched once.
    pub fn periods(&self, db: Option<u32>) -> Result<Arc<PeriodTable>> {
        let db = self.db_or_default(db);
        if let Some(table) = read(&self.catalog.periods, &db) {
            return Ok(table);
        }

        log::debug!("loading time periods of database {db}");
        let mut pairs = Vec::new();
        for row in self.features(TIME, "all", Some(db))? {
            let row = row?;
            if let (Some(id), Some(value)) = (
                row.get("id").and_then(|v| v.as_str()),
                row.get("value").and_then(|v| v.as_str()),
            ) {
                pairs.push((value.to_string(), id.to_string()));
            }
        }
        Ok(store(
            &self.catalog.periods,
            db,
            Arc::new(PeriodTable::from_pairs(pairs)),
        ))
    }

    /// Classification of every economy, fetched once per client from
    /// `country/all` in the client language. Classifications are the same in
    /// every database.
    pub fn economy_table(&self) -> Result<Arc<EconomyTable>> {
        if let Some(table) = self
            .catalog
            .economies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Ok(table);
        }

        log::debug!("loading economy classification");
        let countries = self.countries(None)?;
        let table = Arc::new(EconomyTable::from_countries(&countries));
        let mut slot = self
            .catalog
            .economies
            .write()
            .unwrap_or_else(|e| e.into_inner());
        Ok(slot.get_or_insert(table).clone())
    }

    /// Aggregate economies, short and long codes.
    pub fn aggregates(&self) -> Result<Arc<AggregateSet>> {
        Ok(self.economy_table()?.aggregates().clone())
    }

    /// The API's first listed element of a dimension: what the `mrv` token
    /// stands for. The API does not promise this is the most recent one.
    pub fn latest(&self, dimension: &str, db: Option<u32>) -> Result<String> {
        let db = self.db_or_default(db);
        let key = (db, dimension.to_string());
        if let Some(id) = read(&self.catalog.latest, &key) {
            return Ok(id);
        }

        let first = match self.features(dimension, "all", Some(db))?.next() {
            Some(row) => row?
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            None => String::new(),
        };
        log::debug!("mrv for {dimension} in database {db} is {first:?}");
        Ok(store(&self.catalog.latest, key, first))
    }

    /// Whether `db` advertises metadata (`metadataavailability == "Y"`).
    pub fn has_metadata(&self, db: Option<u32>) -> Result<bool> {
        let db = self.db_or_default(db);
        if let Some(flag) = read(&self.catalog.metadata_flags, &db) {
            return Ok(flag);
        }
        let flag = self
            .source(Some(db))?
            .and_then(|s| {
                s.get("metadataavailability")
                    .and_then(|v| v.as_str())
                    .map(|v| v.eq_ignore_ascii_case("y"))
            })
            .unwrap_or(false);
        Ok(store(&self.catalog.metadata_flags, db, flag))
    }

    /// Rows of `country/all` in the given language (client default when `None`).
    pub fn countries(&self, lang: Option<&str>) -> Result<Vec<CountryRow>> {
        let mut opts = FetchOptions::default();
        if let Some(lang) = lang {
            opts = opts.lang(lang);
        }
        self.fetch("country/all", &opts)
            .map(|row| {
                let row = row?;
                serde_json::from_value(row)
                    .map_err(|e| Error::format("country/all", format!("bad country row: {e}")))
            })
            .collect()
    }

    /// Drop every memoized lookup, including the coder table.
    pub fn clear_caches(&self) {
        self.catalog.clear();
        self.reset_coder();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonyms_map_to_canonical_names() {
        let info = DimensionInfo::from_concepts(
            57,
            [
                ("States", "States"),
                ("Year", "Year"),
                ("Indicator", "Indicator"),
                ("Version", "Version"),
            ],
        );
        assert_eq!(info.require(ECONOMY).unwrap().key, "states");
        assert_eq!(info.require(TIME).unwrap().key, "year");
        assert_eq!(info.require(SERIES).unwrap().key, "indicator");
        assert_eq!(info.require("version").unwrap().name, "Version");
        assert_eq!(info.canonical_for_concept("Year"), TIME);
    }

    #[test]
    fn spaces_are_quoted_before_matching() {
        assert_eq!(concept_key("Admin Region"), "admin%20region");
        assert_eq!(canonical_name(&concept_key("Receiving Countries ")), ECONOMY);
        assert_eq!(canonical_name(&concept_key("Receiving Countries")), ECONOMY);
    }

    #[test]
    fn missing_dimension_is_configuration_error() {
        let info = DimensionInfo::from_concepts(9, [("Country", "Country")]);
        assert!(matches!(info.require(TIME), Err(Error::Configuration(_))));
    }

    #[test]
    fn period_table_passes_unknown_values_through() {
        let t = PeriodTable::from_pairs([("2015".to_string(), "YR2015".to_string())]);
        assert_eq!(t.resolve("2015"), "YR2015");
        assert_eq!(t.resolve("YR2016"), "YR2016");
    }

    #[test]
    fn aggregate_set_holds_both_code_forms() {
        let row = |id: &str, iso2: &str, region: &str| CountryRow {
            id: id.into(),
            iso2_code: iso2.into(),
            name: id.into(),
            region: CodeName {
                id: region.into(),
                value: String::new(),
            },
            ..Default::default()
        };
        let rows = [row("WLD", "1W", "NA"), row("BRA", "BR", "LCN")];
        let set = AggregateSet::from_countries(&rows);
        assert!(set.contains("WLD") && set.contains("1W"));
        assert!(!set.contains("BRA") && !set.contains("BR"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn aggregates_lose_their_classification() {
        let code = |id: &str, value: &str| CodeName {
            id: id.into(),
            value: value.into(),
        };
        let brazil = CountryRow {
            id: "BRA".into(),
            iso2_code: "BR".into(),
            name: "Brazil".into(),
            region: code("LCN", "Latin America & Caribbean "),
            income_level: code("UMC", "Upper middle income"),
            capital_city: "Brasilia ".into(),
            longitude: "-47.9292".into(),
            latitude: "".into(),
            ..Default::default()
        };
        let world = CountryRow {
            id: "WLD".into(),
            iso2_code: "1W".into(),
            name: "World".into(),
            region: code("NA", "Aggregates"),
            income_level: code("NA", "Aggregates"),
            ..Default::default()
        };
        let table = EconomyTable::from_countries(&[brazil, world]);

        let bra = table.get("BRA").unwrap();
        assert!(!bra.aggregate);
        assert_eq!(bra.region, code("LCN", "Latin America & Caribbean"));
        assert_eq!(bra.income_level.id, "UMC");
        assert_eq!(bra.capital_city.as_deref(), Some("Brasilia"));
        assert_eq!(bra.longitude, Some(-47.9292));
        assert_eq!(bra.latitude, None);

        let wld = table.get("WLD").unwrap();
        assert!(wld.aggregate);
        assert_eq!(wld.region, CodeName::default());
        assert_eq!(wld.capital_city, None);
        assert!(table.aggregates().contains("1W"));
        assert!(table.get("XKX").is_none());
    }
}
