//! Free-text economy names to codes.
//!
//! The lookup table holds, for every non-aggregate economy, its own code, a
//! regex derived from its English name and any alias patterns. Entries are
//! tried in ascending `order` (stable, so economies keep API order within a
//! priority) and the first hit wins. Names nobody matches resolve to `None`.
//!
//! Aliases come from a JSON document keyed by code:
//!
//! ```json
//! {
//!   "SWZ": ["swaziland"],
//!   "COD": {"order": 5, "patterns": ["democratic republic of (the )?congo", ":drc"]}
//! }
//! ```
//!
//! A leading `:` makes a pattern an exact (case-insensitive) match; anything
//! else is a regex matched on word boundaries. In regex patterns `and` also
//! matches `&`, `st` also matches `saint`, and spaces match any whitespace.

use crate::api::Client;
use crate::error::{Error, Result};
use crate::models::CountryRow;
use ahash::AHashMap;
use regex::{NoExpand, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

pub const DEFAULT_ORDER: i32 = 10;

static BUNDLED_ALIASES: &str = include_str!("../data/aliases.json");

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAlias {
    Patterns(Vec<String>),
    Entry {
        #[serde(default = "default_order")]
        order: i32,
        #[serde(default)]
        patterns: Vec<String>,
    },
}

fn default_order() -> i32 {
    DEFAULT_ORDER
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub order: i32,
    pub patterns: Vec<String>,
}

/// User-editable alias patterns keyed by economy code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: AHashMap<String, Alias>,
}

impl AliasTable {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: HashMap<String, RawAlias> =
            serde_json::from_str(s).map_err(|e| Error::AliasTable(e.to_string()))?;
        let entries = raw
            .into_iter()
            .map(|(code, alias)| {
                let alias = match alias {
                    RawAlias::Patterns(patterns) => Alias {
                        order: DEFAULT_ORDER,
                        patterns,
                    },
                    RawAlias::Entry { order, patterns } => Alias { order, patterns },
                };
                (code, alias)
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// The table shipped with the crate.
    pub fn bundled() -> Self {
        Self::from_json_str(BUNDLED_ALIASES).unwrap_or_else(|e| {
            log::error!("bundled alias table is invalid: {e}");
            Self::default()
        })
    }

    pub fn get(&self, code: &str) -> Option<&Alias> {
        self.entries.get(code)
    }

    pub fn insert(&mut self, code: impl Into<String>, alias: Alias) {
        self.entries.insert(code.into(), alias);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static US_UK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((u\.?s\.?|u\.?k\.?)\)").expect("static regex"));
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(.*\)").expect("static regex"));
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9&]").expect("static regex"));
static AND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\band\b").expect("static regex"));
static ST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bst\b").expect("static regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Normalize a name for matching.
///
/// Keeps the inner text of `(US)`/`(UK)` and drops other parentheticals and
/// apostrophes; every other non-alphanumeric character becomes a space and
/// whitespace runs collapse to one space.
pub fn clean(s: &str) -> String {
    let s = s.to_lowercase();
    let s = US_UK.replace_all(&s, |c: &regex::Captures| c[1].replace('.', ""));
    let s = PARENTHETICAL.replace_all(&s, "");
    let s = s.replace('\'', "");
    let s = NON_WORD.replace_all(&s, " ");
    SPACES.replace_all(&s, " ").trim().to_string()
}

/// Turn lower-cased pattern text into the regex body described in the module
/// docs.
fn widen(s: &str) -> String {
    let s = AND.replace_all(s, NoExpand("(and|&)"));
    let s = ST.replace_all(&s, NoExpand("(st|saint)"));
    SPACES.replace_all(&s, NoExpand(r"\s+")).into_owned()
}

fn bounded(body: &str) -> Result<Regex> {
    Regex::new(&format!(r"\b{body}\b"))
        .map_err(|e| Error::AliasTable(format!("bad pattern {body:?}: {e}")))
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Regex(Regex),
}

/// One row of the lookup table.
#[derive(Debug, Clone)]
pub struct LookupEntry {
    matcher: Matcher,
    pub code: String,
    pub priority: i32,
}

impl LookupEntry {
    fn exact(text: &str, code: &str, priority: i32) -> Self {
        Self {
            matcher: Matcher::Exact(text.to_string()),
            code: code.to_string(),
            priority,
        }
    }

    fn regex(body: &str, code: &str, priority: i32) -> Result<Self> {
        Ok(Self {
            matcher: Matcher::Regex(bounded(body)?),
            code: code.to_string(),
            priority,
        })
    }

    pub fn pattern(&self) -> &str {
        match &self.matcher {
            Matcher::Exact(s) => s,
            Matcher::Regex(r) => r.as_str(),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.matcher, Matcher::Regex(_))
    }

    /// `prepared` must already be [`clean`]ed.
    pub fn matches(&self, prepared: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(s) => s == prepared,
            Matcher::Regex(r) => r.is_match(prepared),
        }
    }
}

/// Immutable name → code table.
#[derive(Debug, Clone, Default)]
pub struct Coder {
    entries: Vec<LookupEntry>,
    names: AHashMap<String, String>,
}

impl Coder {
    /// Build from `country/all` rows; aggregates are skipped.
    pub fn build(economies: &[CountryRow], aliases: &AliasTable) -> Result<Self> {
        let mut entries = Vec::new();
        let mut names = AHashMap::new();
        for row in economies.iter().filter(|r| !r.is_aggregate()) {
            names.insert(row.id.clone(), row.name.clone());
            let (order, patterns) = match aliases.get(&row.id) {
                Some(a) => (a.order, a.patterns.as_slice()),
                None => (DEFAULT_ORDER, &[][..]),
            };
            entries.push(LookupEntry::exact(&row.id.to_lowercase(), &row.id, order));
            entries.push(LookupEntry::regex(&widen(&clean(&row.name)), &row.id, order)?);
            for p in patterns {
                let entry = match p.strip_prefix(':') {
                    Some(exact) => LookupEntry::exact(&clean(exact), &row.id, order),
                    None => LookupEntry::regex(&widen(p.to_lowercase().trim()), &row.id, order)?,
                };
                entries.push(entry);
            }
        }
        entries.sort_by_key(|e| e.priority);
        log::debug!("coder table built: {} entries for {} economies", entries.len(), names.len());
        Ok(Self { entries, names })
    }

    pub fn entries(&self) -> &[LookupEntry] {
        &self.entries
    }

    /// English name of an economy code.
    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    /// Code for `name`, or `None` when nothing matches.
    pub fn code(&self, name: &str) -> Option<&str> {
        let prepared = clean(name);
        let hit = self.entries.iter().find(|e| e.matches(&prepared));
        if let Some(e) = hit {
            log::trace!("{name:?} matched {:?} -> {}", e.pattern(), e.code);
        }
        hit.map(|e| e.code.as_str())
    }

    /// Resolve every name; repeated inputs appear once, at their first position.
    pub fn code_many<I, S>(&self, names: I) -> Resolution
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rows: Vec<Resolved> = Vec::new();
        for name in names {
            let name = name.as_ref();
            if rows.iter().any(|r| r.input == name) {
                continue;
            }
            let code = self.code(name).map(str::to_string);
            let canonical = code
                .as_deref()
                .and_then(|c| self.name_of(c))
                .map(str::to_string);
            rows.push(Resolved {
                input: name.to_string(),
                code,
                canonical,
            });
        }
        Resolution { rows }
    }
}

/// One resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub input: String,
    pub code: Option<String>,
    /// The economy's English name when resolved.
    pub canonical: Option<String>,
}

/// Ordered input → code map returned by [`Coder::code_many`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    rows: Vec<Resolved>,
}

impl Resolution {
    pub fn get(&self, input: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.input == input)
            .and_then(|r| r.code.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolved> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Only the rows worth a second look: unresolved names and names that
    /// differ from the economy's own name.
    pub fn summary(&self) -> Resolution {
        let rows = self
            .rows
            .iter()
            .filter(|r| match &r.canonical {
                Some(name) => r.input.to_lowercase() != name.to_lowercase(),
                None => true,
            })
            .cloned()
            .collect();
        Resolution { rows }
    }

    /// `[ORIGINAL NAME, WBG NAME, ISO_CODE]` rows, header first.
    pub fn report(&self) -> Vec<[String; 3]> {
        let mut out = vec![[
            "ORIGINAL NAME".to_string(),
            "WBG NAME".to_string(),
            "ISO_CODE".to_string(),
        ]];
        for r in &self.rows {
            out.push([
                r.input.clone(),
                r.canonical.clone().unwrap_or_default(),
                r.code.clone().unwrap_or_default(),
            ]);
        }
        out
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.report();
        let mut widths = [0usize; 3];
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        for (i, row) in rows.iter().enumerate() {
            writeln!(
                f,
                "{:<w0$}  {:<w1$}  {}",
                row[0],
                row[1],
                row[2],
                w0 = widths[0],
                w1 = widths[1]
            )?;
            if i == 0 {
                writeln!(
                    f,
                    "{}  {}  {}",
                    "-".repeat(widths[0]),
                    "-".repeat(widths[1]),
                    "-".repeat(widths[2])
                )?;
            }
        }
        Ok(())
    }
}

impl Client {
    /// The coder table, built on first use from the English economy list.
    pub fn coder(&self) -> Result<Arc<Coder>> {
        if let Some(c) = self.coder.read().unwrap_or_else(|e| e.into_inner()).clone() {
            return Ok(c);
        }
        let countries = self.countries(Some("en"))?;
        let coder = Arc::new(Coder::build(&countries, &self.aliases)?);
        let mut slot = self.coder.write().unwrap_or_else(|e| e.into_inner());
        Ok(slot.get_or_insert(coder).clone())
    }

    /// ### Example
    /// ```no_run
    /// # use wbgapi::Client;
    /// let cli = Client::default();
    /// assert_eq!(cli.code("Swaziland")?.as_deref(), Some("SWZ"));
    /// # Ok::<(), wbgapi::Error>(())
    /// ```
    pub fn code(&self, name: &str) -> Result<Option<String>> {
        Ok(self.coder()?.code(name).map(str::to_string))
    }

    pub fn code_many<I, S>(&self, names: I) -> Result<Resolution>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.coder()?.code_many(names))
    }

    pub(crate) fn reset_coder(&self) {
        *self.coder.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
