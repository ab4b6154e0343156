//! Query parameter codec.
//!
//! Turns caller arguments into the `;`-joined strings the API expects in URL
//! path segments. Time values go through the database's period table, so
//! `2015` and `YR2015` are interchangeable; the `mrv` token is replaced with
//! the first element the API lists for the dimension.

use crate::api::Client;
use crate::catalog::TIME;
use crate::error::Result;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::ops::{Range, RangeInclusive};
use std::sync::LazyLock;

// Codes use - _ . ; footnote and metadata ids use ~ ; ranges use :
const PARAM_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b';')
    .remove(b'~')
    .remove(b':');

/// A dimension argument: one identifier, several, or the `mrv` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    One(String),
    Many(Vec<String>),
    /// "most recent value": resolved to the first listed element.
    Mrv,
}

impl Param {
    pub fn all() -> Self {
        Param::One("all".into())
    }

    /// No identifiers: an optional dimension argument left out.
    pub fn none() -> Self {
        Param::Many(Vec::new())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Param::One(s) if s == "all")
    }

    /// Number of identifiers, counting `;` separated parts of a single value.
    pub fn len(&self) -> usize {
        match self {
            Param::One(s) => s.split(';').count(),
            Param::Many(v) => v.len(),
            Param::Mrv => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Param::One(s) => s.is_empty(),
            Param::Many(v) => v.is_empty(),
            Param::Mrv => false,
        }
    }
}

impl Default for Param {
    fn default() -> Self {
        Param::all()
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        if s == "mrv" {
            Param::Mrv
        } else {
            Param::One(s.to_string())
        }
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::from(s.as_str())
    }
}

impl From<&String> for Param {
    fn from(s: &String) -> Self {
        Param::from(s.as_str())
    }
}

macro_rules! param_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Param {
            fn from(v: $t) -> Self {
                Param::One(v.to_string())
            }
        })*
    };
}

param_from_int!(i32, i64, u32, u64, usize);

impl<T: ToString> From<Vec<T>> for Param {
    fn from(v: Vec<T>) -> Self {
        Param::Many(v.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString> From<&[T]> for Param {
    fn from(v: &[T]) -> Self {
        Param::Many(v.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString, const N: usize> From<[T; N]> for Param {
    fn from(v: [T; N]) -> Self {
        Param::Many(v.iter().map(ToString::to_string).collect())
    }
}

impl From<Range<i32>> for Param {
    fn from(r: Range<i32>) -> Self {
        Param::Many(r.map(|y| y.to_string()).collect())
    }
}

impl From<RangeInclusive<i32>> for Param {
    fn from(r: RangeInclusive<i32>) -> Self {
        Param::Many(r.map(|y| y.to_string()).collect())
    }
}

fn escape(value: &str) -> String {
    percent_encoding::utf8_percent_encode(value, PARAM_SAFE).to_string()
}

impl Client {
    /// Encode `param` for `dimension` (canonical name) of `db`.
    ///
    /// ### Example
    /// ```no_run
    /// # use wbgapi::{Client, Param};
    /// let cli = Client::default();
    /// // "YR2010;YR2011;YR2012" for WDI
    /// let t = cli.query_param(&Param::from(2010..2013), Some("time"), None)?;
    /// # Ok::<(), wbgapi::Error>(())
    /// ```
    pub fn query_param(&self, param: &Param, dimension: Option<&str>, db: Option<u32>) -> Result<String> {
        let is_time = dimension == Some(TIME);
        let values: Vec<String> = match param {
            Param::Mrv => match dimension {
                Some(d) if d != TIME => vec![self.latest(d, db)?],
                _ => vec!["mrv".to_string()],
            },
            Param::One(s) if is_time && !param.is_all() => {
                let periods = self.periods(db)?;
                s.split(';').map(|v| periods.resolve(v).to_string()).collect()
            }
            Param::One(s) => vec![s.clone()],
            Param::Many(items) if is_time => {
                let periods = self.periods(db)?;
                items.iter().map(|v| periods.resolve(v).to_string()).collect()
            }
            Param::Many(items) => items.clone(),
        };
        Ok(values.iter().map(|v| escape(v)).collect::<Vec<_>>().join(";"))
    }
}

static TRAILING_PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*\([^)]+?\)\s*$").expect("static regex"));

/// Case-insensitive substring search used by the listing helpers.
///
/// A leading `!` asks for a full-text search. Without it, listings that
/// support it ignore a trailing parenthetical of the candidate, so
/// `"gdp"` does not match every `"... (current US$)"` series by its unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    needle: String,
    full: bool,
}

impl TextQuery {
    /// `None` for an empty query, which matches everything.
    pub fn parse(q: &str) -> Option<Self> {
        if q.is_empty() {
            return None;
        }
        let q = q.to_lowercase();
        Some(match q.strip_prefix('!') {
            Some(rest) => Self {
                needle: rest.to_string(),
                full: true,
            },
            None => Self {
                needle: q,
                full: false,
            },
        })
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Full substring match.
    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.needle)
    }

    /// Honors the `!` flag: without it a trailing parenthetical is ignored.
    pub fn matches_short(&self, text: &str) -> bool {
        if self.full {
            return self.matches(text);
        }
        let text = match TRAILING_PARENTHETICAL.captures(text) {
            Some(c) => c.get(1).map_or(text, |m| m.as_str()),
            None => text,
        };
        text.to_lowercase().contains(&self.needle)
    }
}

/// `q` against `text`; an absent query matches everything.
pub(crate) fn text_matches(q: Option<&TextQuery>, text: &str, short: bool) -> bool {
    match q {
        None => true,
        Some(q) if short => q.matches_short(text),
        Some(q) => q.matches(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Param::from("mrv"), Param::Mrv);
        assert_eq!(Param::from("BRA"), Param::One("BRA".into()));
        assert_eq!(Param::from(2015), Param::One("2015".into()));
        assert_eq!(
            Param::from(vec!["USA", "CAN"]),
            Param::Many(vec!["USA".into(), "CAN".into()])
        );
        assert_eq!(Param::from(2010..2013).len(), 3);
        assert_eq!(Param::from(2010..=2013).len(), 4);
        assert!(Param::default().is_all());
        assert_eq!(Param::from("A;B").len(), 2);
    }

    #[test]
    fn escape_keeps_separators() {
        assert_eq!(escape("USA;CAN"), "USA;CAN");
        assert_eq!(escape("USA~SP.POP.TOTL~YR2015"), "USA~SP.POP.TOTL~YR2015");
        assert_eq!(escape("a b"), "a%20b");
    }

    #[test]
    fn text_query_flags() {
        let q = TextQuery::parse("GDP").unwrap();
        assert!(!q.is_full());
        assert!(q.matches_short("GDP per capita (current US$)"));
        assert!(!q.matches_short("Something (GDP)"));
        assert!(q.matches("Something (GDP)"));

        let full = TextQuery::parse("!gdp").unwrap();
        assert!(full.matches_short("Something (GDP)"));
        assert!(TextQuery::parse("").is_none());
        assert!(text_matches(None, "anything", true));
    }
}
