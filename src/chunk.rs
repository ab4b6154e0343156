//! Adaptive URL chunking.
//!
//! The API rejects URLs above roughly 1500 characters, yet callers routinely
//! ask for hundreds of economies or series at once. [`chunk`] splits the
//! semicolon-delimited values bound to a template's placeholders into the
//! fewest sub-requests that each fit under a length limit.
//!
//! Slots are tried in the caller's priority order. Within a slot the value is
//! bisected repeatedly, always cutting at the first `;` at or after the
//! midpoint of a chunk. A chunk with no `;` past its midpoint cannot be cut;
//! when the largest chunk is in that state the slot is exhausted and the next
//! slot is chunked once for every chunk of this one.
//!
//! ```
//! use wbgapi::chunk::{chunk, UrlTemplate};
//! use std::collections::BTreeMap;
//!
//! let tpl = UrlTemplate::parse("http://x/{a}/data");
//! let mut b = BTreeMap::new();
//! b.insert("a".to_string(), "AAA;BBB;CCC;DDD".to_string());
//! let urls = chunk(&tpl, &["a"], &b, 22).unwrap();
//! assert_eq!(urls, vec!["http://x/AAA;BBB/data", "http://x/CCC;DDD/data"]);
//! ```

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Values bound to template placeholders.
pub type Bindings = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(String),
}

/// A URL with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    segments: Vec<Segment>,
}

impl UrlTemplate {
    /// Parse `text`; an unmatched `{` is kept literally.
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = text;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                break;
            };
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            segments.push(Segment::Slot(rest[open + 1..close].to_string()));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Self { segments }
    }

    /// Placeholder names in order of appearance.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, bindings: &Bindings) -> Result<String> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Slot(name) => match bindings.get(name) {
                    Some(v) => out.push_str(v),
                    None => {
                        return Err(Error::Configuration(format!(
                            "no value bound to URL placeholder {{{name}}}"
                        )));
                    }
                },
            }
        }
        Ok(out)
    }
}

/// Bind `template` into URLs shorter than `max_len`.
///
/// Every value of every slot in `slots` appears in exactly one emitted URL,
/// and emitted URLs follow the original value order. Slots not listed are
/// rendered as bound.
pub fn chunk(
    template: &UrlTemplate,
    slots: &[&str],
    bindings: &Bindings,
    max_len: usize,
) -> Result<Vec<String>> {
    // surface a missing binding before any chunking work
    let full = template.render(bindings)?;
    chunk_slots(template, slots, bindings, max_len).map_err(|e| match e {
        Error::ChunkLimit { max_length, .. } => Error::ChunkLimit {
            url: full,
            max_length,
        },
        other => other,
    })
}

fn chunk_slots(
    template: &UrlTemplate,
    slots: &[&str],
    bindings: &Bindings,
    max_len: usize,
) -> Result<Vec<String>> {
    let Some((&slot, rest)) = slots.split_first() else {
        let url = template.render(bindings)?;
        if url.len() < max_len {
            return Ok(vec![url]);
        }
        return Err(Error::ChunkLimit {
            url,
            max_length: max_len,
        });
    };

    let Some(value) = bindings.get(slot) else {
        return Err(Error::Configuration(format!(
            "chunkable slot {{{slot}}} has no bound value"
        )));
    };

    let mut chunks = vec![value.clone()];
    loop {
        let largest = largest(&chunks);
        let probe = rebind(bindings, slot, &chunks[largest]);
        if template.render(&probe)?.len() < max_len {
            log::trace!("slot {slot}: {} chunk(s) fit", chunks.len());
            return chunks
                .iter()
                .map(|c| template.render(&rebind(bindings, slot, c)))
                .collect();
        }

        if bisect(&chunks[largest]).is_none() {
            log::trace!("slot {slot} exhausted at {} chunk(s)", chunks.len());
            let mut out = Vec::new();
            for c in &chunks {
                out.extend(chunk_slots(template, rest, &rebind(bindings, slot, c), max_len)?);
            }
            return Ok(out);
        }

        chunks = chunks
            .into_iter()
            .flat_map(|c| match bisect(&c) {
                Some((left, right)) => vec![left.to_string(), right.to_string()],
                None => vec![c],
            })
            .collect();
    }
}

/// Index of the longest chunk; the first one wins ties.
fn largest(chunks: &[String]) -> usize {
    let mut best = 0;
    for (i, c) in chunks.iter().enumerate() {
        if c.len() > chunks[best].len() {
            best = i;
        }
    }
    best
}

/// Split at the first `;` at or after the midpoint. Never scans backwards.
pub fn bisect(value: &str) -> Option<(&str, &str)> {
    let mid = value.len() / 2;
    // ';' is ASCII, so a byte match is always a char boundary
    let cut = value.bytes().skip(mid).position(|b| b == b';')? + mid;
    Some((&value[..cut], &value[cut + 1..]))
}

fn rebind(bindings: &Bindings, slot: &str, value: &str) -> Bindings {
    let mut b = bindings.clone();
    b.insert(slot.to_string(), value.to_string());
    b
}
