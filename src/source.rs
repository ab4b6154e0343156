//! Databases and their dimension elements ("features").
//!
//! Every database lists the elements of each dimension under
//! `sources/{db}/{concept key}/{ids}`. The helpers here resolve the concept
//! key through the catalog, so callers always use canonical names.

use crate::api::{Client, FetchOptions, Pager, Refetch};
use crate::catalog::{ECONOMY, EconomyClass, SERIES, TIME};
use crate::chunk::Bindings;
use crate::error::{Error, Result};
use crate::models::CodeName;
use crate::query::{Param, TextQuery, text_matches};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One element of a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(default)]
    pub value: String,
}

impl Feature {
    fn from_row(url: &str, row: Value) -> Result<Self> {
        serde_json::from_value(row).map_err(|e| Error::format(url, format!("bad feature row: {e}")))
    }
}

/// A classification code, or code and name in labeled listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Class {
    Id(String),
    Labeled { id: String, value: String },
}

impl Class {
    fn new(c: &CodeName, labels: bool) -> Self {
        if labels {
            Class::Labeled {
                id: c.id.clone(),
                value: c.value.clone(),
            }
        } else {
            Class::Id(c.id.clone())
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Class::Id(id) | Class::Labeled { id, .. } => id,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Class::Id(_) => None,
            Class::Labeled { value, .. } => Some(value),
        }
    }
}

/// An economy of a database with its classification.
///
/// Codes `country/all` does not list (sub-national units, for one) have no
/// classification: every optional field is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Economy {
    pub id: String,
    pub value: String,
    pub aggregate: Option<bool>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub region: Option<Class>,
    pub adminregion: Option<Class>,
    #[serde(rename = "lendingType")]
    pub lending_type: Option<Class>,
    #[serde(rename = "incomeLevel")]
    pub income_level: Option<Class>,
    #[serde(rename = "capitalCity")]
    pub capital_city: Option<String>,
}

impl Economy {
    fn build(feature: Feature, class: Option<&EconomyClass>, labels: bool) -> Self {
        let tag = |c: Option<&CodeName>| c.map(|c| Class::new(c, labels));
        Self {
            aggregate: class.map(|c| c.aggregate),
            longitude: class.and_then(|c| c.longitude),
            latitude: class.and_then(|c| c.latitude),
            region: tag(class.map(|c| &c.region)),
            adminregion: tag(class.map(|c| &c.adminregion)),
            lending_type: tag(class.map(|c| &c.lending_type)),
            income_level: tag(class.map(|c| &c.income_level)),
            capital_city: class.and_then(|c| c.capital_city.clone()),
            id: feature.id,
            value: feature.value,
        }
    }
}

impl Client {
    /// Every database the API knows.
    pub fn sources(&self) -> Pager<'_> {
        self.fetch("sources", &FetchOptions::default().param("databid", "y"))
    }

    /// The record of one database (default database when `None`).
    pub fn source(&self, db: Option<u32>) -> Result<Option<Value>> {
        let db = self.db_or_default(db);
        self.get(
            &format!("sources/{db}"),
            &FetchOptions::default().param("databid", "y"),
        )
    }

    /// Elements of `dimension` (canonical name) selected by `id`, an encoded
    /// `;` separated list or `all`. Long lists are chunked.
    pub fn features(&self, dimension: &str, id: &str, db: Option<u32>) -> Result<Refetch<'_>> {
        if id.is_empty() {
            return Ok(Refetch::empty(self));
        }
        let db = self.db_or_default(db);
        let info = self.concepts(Some(db))?;
        let key = info.require(dimension)?.key.clone();
        let bindings = Bindings::from([
            ("source".to_string(), db.to_string()),
            ("concept".to_string(), key),
            ("id".to_string(), id.to_string()),
        ]);
        self.refetch(
            "sources/{source}/{concept}/{id}",
            &["id"],
            &bindings,
            &FetchOptions::default(),
        )
    }

    /// A single element of `dimension`.
    pub fn feature(&self, dimension: &str, id: &str, db: Option<u32>) -> Result<Option<Value>> {
        let db = self.db_or_default(db);
        let info = self.concepts(Some(db))?;
        let key = &info.require(dimension)?.key;
        self.get(&format!("sources/{db}/{key}/{id}"), &FetchOptions::default())
    }

    /// Series of a database whose name matches `q`. Without a leading `!`
    /// the trailing unit parenthetical of a series name is not searched.
    ///
    /// ### Example
    /// ```no_run
    /// # use wbgapi::Client;
    /// let cli = Client::default();
    /// for s in cli.series("all", "population", None)? {
    ///     println!("{}  {}", s.id, s.value);
    /// }
    /// # Ok::<(), wbgapi::Error>(())
    /// ```
    pub fn series(&self, id: impl Into<Param>, q: &str, db: Option<u32>) -> Result<Vec<Feature>> {
        let q = TextQuery::parse(q);
        self.list_features(SERIES, &id.into(), db, |f| text_matches(q.as_ref(), &f.value, true))
    }

    /// Economies of a database with their region, income and lending
    /// classification. `labels` pairs every classification code with its
    /// name; `skip_aggs` drops aggregates.
    ///
    /// ### Example
    /// ```no_run
    /// # use wbgapi::Client;
    /// let cli = Client::default();
    /// for e in cli.economies("all", "congo", true, true, None)? {
    ///     println!("{}  {}  {:?}", e.id, e.value, e.income_level);
    /// }
    /// # Ok::<(), wbgapi::Error>(())
    /// ```
    pub fn economies(
        &self,
        id: impl Into<Param>,
        q: &str,
        labels: bool,
        skip_aggs: bool,
        db: Option<u32>,
    ) -> Result<Vec<Economy>> {
        let q = TextQuery::parse(q);
        let table = self.economy_table()?;
        let found = self.list_features(ECONOMY, &id.into(), db, |f| {
            text_matches(q.as_ref(), &f.value, false)
        })?;
        let mut out: Vec<Economy> = found
            .into_iter()
            .map(|f| {
                let class = table.get(&f.id);
                Economy::build(f, class, labels)
            })
            .collect();
        if skip_aggs {
            out.retain(|e| e.aggregate != Some(true));
        }
        Ok(out)
    }

    /// One economy with its classification.
    pub fn economy(&self, id: &str, labels: bool, db: Option<u32>) -> Result<Option<Economy>> {
        let table = self.economy_table()?;
        let Some(row) = self.feature(ECONOMY, id, db)? else {
            return Ok(None);
        };
        let f = Feature::from_row(ECONOMY, row)?;
        let class = table.get(&f.id);
        Ok(Some(Economy::build(f, class, labels)))
    }

    /// Time periods of a database.
    pub fn periods_list(&self, id: impl Into<Param>, q: &str, db: Option<u32>) -> Result<Vec<Feature>> {
        let q = TextQuery::parse(q);
        self.list_features(TIME, &id.into(), db, |f| text_matches(q.as_ref(), &f.value, false))
    }

    pub(crate) fn list_features(
        &self,
        dimension: &str,
        id: &Param,
        db: Option<u32>,
        keep: impl Fn(&Feature) -> bool,
    ) -> Result<Vec<Feature>> {
        let ids = self.query_param(id, Some(dimension), db)?;
        let mut out = Vec::new();
        for row in self.features(dimension, &ids, db)? {
            let f = Feature::from_row(dimension, row?)?;
            if keep(&f) {
                out.push(f);
            }
        }
        log::debug!("{} {dimension} feature(s) listed", out.len());
        Ok(out)
    }
}
