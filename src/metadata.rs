//! Metadata records.
//!
//! Metadata endpoints answer with concept-level rows whose variables each
//! carry a `metatype` list of `{id, value}` fields. Flattened, that is a
//! stream of `(concept, entity, field)` triples in which the fields of one
//! entity are contiguous; [`Assembler`] folds it back into one
//! [`MetadataRecord`] per `(concept, entity)` run.

use crate::api::{Client, FetchOptions, Refetch};
use crate::catalog::{ECONOMY, SERIES, TIME};
use crate::chunk::Bindings;
use crate::error::Result;
use crate::query::Param;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One metadata field of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTriple {
    pub concept: String,
    pub id: String,
    pub name: Option<String>,
    pub field: String,
    pub value: String,
}

/// Insertion-ordered field map; re-setting a field keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub concept: String,
    pub id: String,
    pub name: Option<String>,
    pub fields: Fields,
}

impl fmt::Display for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========")?;
        writeln!(f, "{}: {}", self.concept, self.id)?;
        writeln!(f)?;
        let mut first = true;
        for (k, v) in self.fields.iter() {
            if !first {
                writeln!(f, "--------")?;
            }
            first = false;
            writeln!(f, "{k}: {v}")?;
        }
        Ok(())
    }
}

/// Which top-level concept groups to keep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConceptFilter {
    #[default]
    All,
    Only(Vec<String>),
}

impl ConceptFilter {
    pub fn only<S: Into<String>>(concepts: impl IntoIterator<Item = S>) -> Self {
        ConceptFilter::Only(concepts.into_iter().map(Into::into).collect())
    }

    pub fn accepts(&self, concept: &str) -> bool {
        match self {
            ConceptFilter::All => true,
            ConceptFilter::Only(c) => c.iter().any(|x| x == concept),
        }
    }
}

/// Groups a pre-grouped triple stream into records. The first error ends the
/// stream.
pub struct Assembler<I> {
    input: I,
    current: Option<MetadataRecord>,
    done: bool,
}

/// Fold `triples` into records; see [`Assembler`].
pub fn assemble<I>(triples: I) -> Assembler<I::IntoIter>
where
    I: IntoIterator<Item = Result<MetadataTriple>>,
{
    Assembler {
        input: triples.into_iter(),
        current: None,
        done: false,
    }
}

impl<I> Iterator for Assembler<I>
where
    I: Iterator<Item = Result<MetadataTriple>>,
{
    type Item = Result<MetadataRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.input.next() {
                None => {
                    self.done = true;
                    return self.current.take().map(Ok);
                }
                Some(Err(e)) => {
                    self.done = true;
                    self.current = None;
                    return Some(Err(e));
                }
                Some(Ok(t)) => {
                    let same = self
                        .current
                        .as_ref()
                        .is_some_and(|m| m.concept == t.concept && m.id == t.id);
                    let finished = if same {
                        None
                    } else {
                        self.current.replace(MetadataRecord {
                            concept: t.concept,
                            id: t.id,
                            name: t.name,
                            fields: Fields::default(),
                        })
                    };
                    if let Some(m) = self.current.as_mut() {
                        m.fields.set(t.field, t.value);
                    }
                    if finished.is_some() {
                        return finished.map(Ok);
                    }
                }
            }
        }
    }
}

fn field_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Triples of one concept-level row, filtered by `filter`.
pub fn concept_triples(row: &Value, filter: &ConceptFilter) -> Vec<MetadataTriple> {
    let concept = row.get("id").and_then(Value::as_str).unwrap_or_default();
    if !filter.accepts(concept) {
        return Vec::new();
    }
    let mut out = Vec::new();
    for var in row
        .get("variable")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
    {
        let id = var.get("id").and_then(Value::as_str).unwrap_or_default();
        let name = var
            .get("name")
            .or_else(|| var.get("value"))
            .and_then(Value::as_str)
            .map(str::to_string);
        for field in var
            .get("metatype")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            out.push(MetadataTriple {
                concept: concept.to_string(),
                id: id.to_string(),
                name: name.clone(),
                field: field
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                value: field.get("value").map(field_text).unwrap_or_default(),
            });
        }
    }
    out
}

/// Boxed record stream returned by [`Client::metadata`].
pub type MetadataRecords<'c> = Box<dyn Iterator<Item = Result<MetadataRecord>> + 'c>;

fn records_from<'c>(rows: Refetch<'c>, filter: ConceptFilter) -> MetadataRecords<'c> {
    let triples = rows.flat_map(move |row| match row {
        Ok(row) => concept_triples(&row, &filter)
            .into_iter()
            .map(Ok)
            .collect::<Vec<_>>(),
        Err(e) => vec![Err(e)],
    });
    Box::new(assemble(triples))
}

/// Metadata of one series, with the optional series×economy and series×time
/// notes keyed by economy and time id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub meta: MetadataRecord,
    pub economies: Option<Fields>,
    pub time: Option<Fields>,
}

/// Metadata of one economy, with the optional economy×series notes keyed by
/// series id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyMetadata {
    pub meta: MetadataRecord,
    pub series: Option<Fields>,
}

impl Client {
    /// Metadata records of a path template, chunking `chunkable` slots as
    /// needed (see [`Client::refetch`]).
    ///
    /// ### Example
    /// ```no_run
    /// # use wbgapi::{Client, metadata::ConceptFilter};
    /// # use std::collections::BTreeMap;
    /// let cli = Client::default();
    /// let mut b = BTreeMap::new();
    /// b.insert("series".to_string(), "SP.POP.TOTL".to_string());
    /// for m in cli.metadata("sources/2/series/{series}/metadata", &["series"], &b, ConceptFilter::All)? {
    ///     let m = m?;
    ///     println!("{} {} {}", m.concept, m.id, m.fields.len());
    /// }
    /// # Ok::<(), wbgapi::Error>(())
    /// ```
    pub fn metadata(
        &self,
        template: &str,
        chunkable: &[&str],
        bindings: &Bindings,
        filter: ConceptFilter,
    ) -> Result<MetadataRecords<'_>> {
        let rows = self.refetch(
            template,
            chunkable,
            bindings,
            &FetchOptions::default().concepts(true),
        )?;
        Ok(records_from(rows, filter))
    }

    /// Cross-dimension metadata lookup. The API answers requests for
    /// combinations that have no notes with malformed payloads instead of an
    /// empty list, so format and API errors here mean "no data". Transport
    /// failures still propagate.
    pub fn probe(
        &self,
        template: &str,
        chunkable: &[&str],
        bindings: &Bindings,
    ) -> Result<Vec<MetadataRecord>> {
        let collected: Result<Vec<MetadataRecord>> = self
            .metadata(template, chunkable, bindings, ConceptFilter::All)
            .and_then(|records| records.collect());
        match collected {
            Err(e) if e.is_empty_probe() => {
                log::warn!("metadata probe treated as empty: {e}");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Series metadata, optionally with notes per economy and per time
    /// period (`Param::none()` to skip, `"all"` for every element). Empty
    /// when the database has no metadata.
    pub fn series_metadata(
        &self,
        id: impl Into<Param>,
        economies: impl Into<Param>,
        time: impl Into<Param>,
        db: Option<u32>,
    ) -> Result<Vec<SeriesMetadata>> {
        let db = self.db_or_default(db);
        if !self.has_metadata(Some(db))? {
            return Ok(Vec::new());
        }
        let economies = self.cross_ids(economies.into(), ECONOMY, db)?;
        let time = self.cross_ids(time.into(), TIME, db)?;
        let series = self.query_param(&id.into(), Some(SERIES), Some(db))?;
        let bindings = Bindings::from([("series".to_string(), series)]);
        let records = self
            .metadata(
                &format!("sources/{db}/series/{{series}}/metadata"),
                &["series"],
                &bindings,
                ConceptFilter::All,
            )?
            .collect::<Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(records.len());
        for meta in records {
            let economies = if economies.is_empty() {
                None
            } else {
                let ids: Vec<String> = economies.iter().map(|e| format!("{e}~{}", meta.id)).collect();
                Some(self.cross_notes(db, "Country-Series", &ids, 0)?)
            };
            let time = if time.is_empty() {
                None
            } else {
                let ids: Vec<String> = time.iter().map(|t| format!("{}~{t}", meta.id)).collect();
                Some(self.cross_notes(db, "Series-Time", &ids, 1)?)
            };
            out.push(SeriesMetadata {
                meta,
                economies,
                time,
            });
        }
        Ok(out)
    }

    /// Economy metadata, optionally with notes per series.
    pub fn economy_metadata(
        &self,
        id: impl Into<Param>,
        series: impl Into<Param>,
        db: Option<u32>,
    ) -> Result<Vec<EconomyMetadata>> {
        let db = self.db_or_default(db);
        if !self.has_metadata(Some(db))? {
            return Ok(Vec::new());
        }
        let series = self.cross_ids(series.into(), SERIES, db)?;
        let economy = self.query_param(&id.into(), Some(ECONOMY), Some(db))?;
        let bindings = Bindings::from([("economy".to_string(), economy)]);
        // the metadata endpoint wants `country` whatever the dimension is called
        let records = self
            .metadata(
                &format!("sources/{db}/country/{{economy}}/metadata"),
                &["economy"],
                &bindings,
                ConceptFilter::All,
            )?
            .collect::<Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(records.len());
        for meta in records {
            let series = if series.is_empty() {
                None
            } else {
                let ids: Vec<String> = series.iter().map(|s| format!("{}~{s}", meta.id)).collect();
                Some(self.cross_notes(db, "Country-Series", &ids, 1)?)
            };
            out.push(EconomyMetadata { meta, series });
        }
        Ok(out)
    }

    /// Ids of the second dimension of a cross-dimension lookup. `all` expands
    /// to the full listing, which can be large for series.
    fn cross_ids(&self, param: Param, dimension: &str, db: u32) -> Result<Vec<String>> {
        if param.is_empty() {
            return Ok(Vec::new());
        }
        if param.is_all() {
            let listed = self.list_features(dimension, &param, Some(db), |_| true)?;
            return Ok(listed.into_iter().map(|f| f.id).collect());
        }
        let joined = self.query_param(&param, Some(dimension), Some(db))?;
        Ok(joined.split(';').map(str::to_string).collect())
    }

    /// Notes of a `concept` intersection, keyed by part `key_part` of the
    /// `a~b` record ids.
    fn cross_notes(&self, db: u32, concept: &str, ids: &[String], key_part: usize) -> Result<Fields> {
        let bindings = Bindings::from([("ids".to_string(), ids.join(";"))]);
        let mut notes = Fields::default();
        for rec in self.probe(
            &format!("sources/{db}/{concept}/{{ids}}/metadata"),
            &["ids"],
            &bindings,
        )? {
            let key = rec.id.split('~').nth(key_part).unwrap_or_default().to_string();
            if let Some(text) = rec.fields.get(concept) {
                notes.set(key, text);
            }
        }
        Ok(notes)
    }
}
