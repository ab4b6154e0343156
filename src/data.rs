//! Observations, reshaped into one flat record per data point.

use crate::api::{Client, FetchOptions, Refetch};
use crate::catalog::{AggregateSet, DimensionInfo, ECONOMY, SERIES, TIME};
use crate::chunk::Bindings;
use crate::error::{Error, Result};
use crate::models::Observation;
use crate::query::Param;
use ahash::AHashSet;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// A data request. Dimension values accept anything [`Param`] converts from.
///
/// ### Example
/// ```no_run
/// # use wbgapi::{Client, data::DataRequest};
/// let cli = Client::default();
/// let req = DataRequest::new("SP.POP.TOTL")
///     .economy(["BRA", "ARG"])
///     .time(2010..2020)
///     .skip_blanks(true);
/// for rec in cli.data(&req)? {
///     let rec = rec?;
///     println!("{:?}", rec.value);
/// }
/// # Ok::<(), wbgapi::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub series: Param,
    pub economy: Param,
    pub time: Param,
    /// Most recent `n` values, same periods for every economy.
    pub mrv: Option<u32>,
    /// Most recent `n` non-empty values, periods vary by economy.
    /// Ignored when `mrv` is set.
    pub mrnev: Option<u32>,
    pub skip_blanks: bool,
    pub skip_aggs: bool,
    /// Keep each dimension's display name next to its id.
    pub labels: bool,
    /// Numeric time values (`2015`) instead of keys (`YR2015`) where possible.
    pub numeric_time_keys: bool,
    /// Extra query parameters.
    pub params: Vec<(String, String)>,
    /// Extra database-specific dimensions (e.g. `version`).
    pub dimensions: Vec<(String, Param)>,
    pub db: Option<u32>,
}

impl DataRequest {
    pub fn new(series: impl Into<Param>) -> Self {
        Self {
            series: series.into(),
            economy: Param::all(),
            time: Param::all(),
            mrv: None,
            mrnev: None,
            skip_blanks: false,
            skip_aggs: false,
            labels: false,
            numeric_time_keys: false,
            params: Vec::new(),
            dimensions: Vec::new(),
            db: None,
        }
    }

    pub fn economy(mut self, economy: impl Into<Param>) -> Self {
        self.economy = economy.into();
        self
    }

    pub fn time(mut self, time: impl Into<Param>) -> Self {
        self.time = time.into();
        self
    }

    pub fn mrv(mut self, n: u32) -> Self {
        self.mrv = Some(n);
        self
    }

    pub fn mrnev(mut self, n: u32) -> Self {
        self.mrnev = Some(n);
        self
    }

    pub fn skip_blanks(mut self, yes: bool) -> Self {
        self.skip_blanks = yes;
        self
    }

    pub fn skip_aggs(mut self, yes: bool) -> Self {
        self.skip_aggs = yes;
        self
    }

    pub fn labels(mut self, yes: bool) -> Self {
        self.labels = yes;
        self
    }

    pub fn numeric_time_keys(mut self, yes: bool) -> Self {
        self.numeric_time_keys = yes;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn dimension(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.dimensions.push((name.into(), value.into()));
        self
    }

    pub fn db(mut self, db: u32) -> Self {
        self.db = Some(db);
        self
    }

    fn fetch_options(&self) -> FetchOptions {
        let mut opts = FetchOptions::default();
        for (k, v) in &self.params {
            opts = opts.param(k.clone(), v);
        }
        if let Some(n) = self.mrv {
            opts = opts.param("mrv", n);
        } else if let Some(n) = self.mrnev {
            opts = opts.param("mrnev", n);
        }
        opts
    }
}

/// A dimension element id: text, or a number for numeric time keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Id {
    Text(String),
    Number(i64),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Text(s) => f.write_str(s),
            Id::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Id(Id),
    Labeled { id: Id, value: String },
}

impl DimensionValue {
    pub fn id(&self) -> &Id {
        match self {
            DimensionValue::Id(id) | DimensionValue::Labeled { id, .. } => id,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            DimensionValue::Id(_) => None,
            DimensionValue::Labeled { value, .. } => Some(value),
        }
    }
}

/// One observation. Serializes as `{"value": .., "<dimension>": .., "aggregate": ..}`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub value: Option<f64>,
    /// Canonical dimension name and element, in response order.
    pub dimensions: Vec<(String, DimensionValue)>,
    /// Whether the economy is an aggregate; `None` when the row has no
    /// economy dimension.
    pub aggregate: Option<bool>,
}

impl DataRecord {
    pub fn get(&self, dimension: &str) -> Option<&DimensionValue> {
        self.dimensions
            .iter()
            .find(|(d, _)| d == dimension)
            .map(|(_, v)| v)
    }

    /// Ids of `dimensions`, in that order; missing ones are empty.
    pub fn key(&self, dimensions: &[&str]) -> Vec<String> {
        dimensions
            .iter()
            .map(|d| self.get(d).map(|v| v.id().to_string()).unwrap_or_default())
            .collect()
    }
}

impl Serialize for DataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = 1 + self.dimensions.len() + usize::from(self.aggregate.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("value", &self.value)?;
        for (name, v) in &self.dimensions {
            map.serialize_entry(name, v)?;
        }
        if let Some(agg) = self.aggregate {
            map.serialize_entry("aggregate", &agg)?;
        }
        map.end()
    }
}

/// Keep the first record of every distinct `key` tuple, in input order.
pub fn first_seen<I>(records: I, key: &[&str]) -> Vec<DataRecord>
where
    I: IntoIterator<Item = DataRecord>,
{
    let mut seen: AHashSet<Vec<String>> = AHashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.key(key)))
        .collect()
}

/// Lazy record stream returned by [`Client::data`].
pub struct DataRecords<'c> {
    rows: Refetch<'c>,
    info: Arc<DimensionInfo>,
    aggs: Arc<AggregateSet>,
    skip_blanks: bool,
    skip_aggs: bool,
    labels: bool,
    numeric_time_keys: bool,
}

impl DataRecords<'_> {
    /// `None` when the row is filtered out.
    fn reshape(&self, obs: Observation) -> Option<DataRecord> {
        if self.skip_blanks && obs.value.is_none() {
            return None;
        }
        let mut rec = DataRecord {
            value: obs.value,
            dimensions: Vec::with_capacity(obs.variable.len()),
            aggregate: None,
        };
        for var in obs.variable {
            let name = self.info.canonical_for_concept(&var.concept);
            let mut id = Id::Text(var.id);
            if name == ECONOMY {
                let is_agg = self.aggs.contains(&id.to_string());
                if self.skip_aggs && is_agg {
                    return None;
                }
                rec.aggregate = Some(is_agg);
            } else if name == TIME
                && self.numeric_time_keys
                && !var.value.is_empty()
                && var.value.bytes().all(|b| b.is_ascii_digit())
            {
                if let Ok(n) = var.value.parse() {
                    id = Id::Number(n);
                }
            }
            let value = if self.labels {
                DimensionValue::Labeled { id, value: var.value }
            } else {
                DimensionValue::Id(id)
            };
            rec.dimensions.push((name, value));
        }
        Some(rec)
    }
}

impl Iterator for DataRecords<'_> {
    type Item = Result<DataRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            let obs: Observation = match serde_json::from_value(row) {
                Ok(obs) => obs,
                Err(e) => return Some(Err(Error::format("data", format!("bad observation: {e}")))),
            };
            if let Some(rec) = self.reshape(obs) {
                return Some(Ok(rec));
            }
        }
    }
}

impl Client {
    /// Observations matching `req`. Long series, economy or time lists are
    /// split across several requests, in that priority.
    pub fn data(&self, req: &DataRequest) -> Result<DataRecords<'_>> {
        let db = self.db_or_default(req.db);
        let info = self.concepts(Some(db))?;
        let series_key = info.require(SERIES)?.key.clone();
        let economy_key = info.require(ECONOMY)?.key.clone();
        let time_key = info.require(TIME)?.key.clone();

        let mut template =
            format!("sources/{db}/{series_key}/{{series}}/{economy_key}/{{economy}}/{time_key}/{{time}}");
        for (name, value) in &req.dimensions {
            let key = info.require(name)?.key.clone();
            let value = self.query_param(value, Some(name.as_str()), Some(db))?;
            template.push_str(&format!("/{key}/{value}"));
        }

        let bindings = Bindings::from([
            ("series".to_string(), self.query_param(&req.series, Some(SERIES), Some(db))?),
            ("economy".to_string(), self.query_param(&req.economy, Some(ECONOMY), Some(db))?),
            ("time".to_string(), self.query_param(&req.time, Some(TIME), Some(db))?),
        ]);
        let aggs = self.aggregates()?;
        let rows = self.refetch(
            &template,
            &["series", "economy", "time"],
            &bindings,
            &req.fetch_options(),
        )?;
        Ok(DataRecords {
            rows,
            info,
            aggs,
            skip_blanks: req.skip_blanks,
            skip_aggs: req.skip_aggs,
            labels: req.labels,
            numeric_time_keys: req.numeric_time_keys,
        })
    }

    /// First record of `req`, requested one observation per page. Pin `time`
    /// or use `mrv`/`mrnev` for a predictable answer.
    pub fn data_get(&self, req: &DataRequest) -> Result<Option<DataRecord>> {
        let req = req.clone().param("per_page", 1);
        self.data(&req)?.next().transpose()
    }

    /// Footnote of one data point, if any.
    pub fn footnote(
        &self,
        series: &str,
        economy: &str,
        time: impl Into<Param>,
        db: Option<u32>,
    ) -> Result<Option<String>> {
        let db = self.db_or_default(db);
        let time = self.query_param(&time.into(), Some(TIME), Some(db))?;
        let bindings = Bindings::from([("ids".to_string(), format!("{economy}~{series}~{time}"))]);
        let records = self.probe(&format!("sources/{db}/footnote/{{ids}}/metadata"), &[], &bindings)?;
        Ok(records
            .into_iter()
            .find_map(|r| r.fields.get("FootNote").map(str::to_string)))
    }
}
