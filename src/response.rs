//! Response envelope decoding.
//!
//! The API wraps records in several different envelopes depending on the
//! endpoint. [`Envelope::classify`] recognizes them in a fixed order:
//!
//! 1. `[header, records]`: the classic v2 shape (records may be `null`).
//! 2. `{"message": [...]}` (or a header carrying `message`): an API error.
//! 3. `{"source": [{"concept": [...]}], ...}`: concept lists and metadata.
//! 4. `{"source": {"data": [...]}, ...}`: the data endpoints.
//! 5. any other object: a bare header with no record array.
//!
//! Anything else is a response-format error.

use crate::error::{Error, Result};
use crate::models::{ApiMessage, Header};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// `[header, records]`
    Paged { header: Value, records: Value },
    /// Server-reported error.
    Message(ApiMessage),
    /// Header-only object; carries no record array.
    HeaderOnly(Value),
    /// `source` is a list of concept dicts.
    ConceptSource { header: Value, source: Vec<Value> },
    /// `source` is an object with a `data` list.
    DataSource { header: Value, data: Vec<Value> },
}

/// One decoded page: the paging header and its records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub header: Header,
    pub records: Vec<Value>,
}

impl Envelope {
    pub fn classify(url: &str, v: Value) -> Result<Self> {
        match v {
            Value::Array(mut arr) => {
                if arr.is_empty() || !arr[0].is_object() {
                    return Err(Error::format(url, "array response without a header object"));
                }
                if let Some(msg) = message_of(&arr[0]) {
                    return Ok(Envelope::Message(msg));
                }
                if arr.len() < 2 {
                    return Err(Error::format(url, "array response without a record list"));
                }
                let records = arr.swap_remove(1);
                let header = arr.swap_remove(0);
                Ok(Envelope::Paged { header, records })
            }
            Value::Object(mut obj) => {
                if let Some(msg) = obj.get("message").and_then(first_message) {
                    return Ok(Envelope::Message(msg));
                }
                match obj.remove("source") {
                    Some(Value::Array(source)) if source.first().is_some_and(Value::is_object) => {
                        Ok(Envelope::ConceptSource {
                            header: Value::Object(obj),
                            source,
                        })
                    }
                    Some(Value::Object(mut src)) if src.contains_key("data") => {
                        match src.remove("data") {
                            Some(Value::Array(data)) => Ok(Envelope::DataSource {
                                header: Value::Object(obj),
                                data,
                            }),
                            Some(Value::Null) => Ok(Envelope::DataSource {
                                header: Value::Object(obj),
                                data: Vec::new(),
                            }),
                            _ => Err(Error::format(url, "source.data is not a list")),
                        }
                    }
                    Some(other) => {
                        obj.insert("source".into(), other);
                        Ok(Envelope::HeaderOnly(Value::Object(obj)))
                    }
                    None => Ok(Envelope::HeaderOnly(Value::Object(obj))),
                }
            }
            _ => Err(Error::format(url, "expected a JSON array or object")),
        }
    }

    /// Split into header and records. `want_concepts` selects the concept
    /// list of a concept envelope instead of the first concept's variables.
    pub fn into_page(self, url: &str, want_concepts: bool) -> Result<Page> {
        let (header, records) = match self {
            Envelope::Message(msg) => {
                return Err(Error::Api {
                    url: url.to_string(),
                    key: msg.key,
                    value: msg.value,
                });
            }
            Envelope::HeaderOnly(_) => {
                return Err(Error::format(url, "response carries no record list"));
            }
            Envelope::Paged { header, records } => {
                let records = match records {
                    Value::Array(r) => r,
                    Value::Null => Vec::new(),
                    _ => return Err(Error::format(url, "record element is not a list")),
                };
                (header, records)
            }
            Envelope::DataSource { header, data } => (header, data),
            Envelope::ConceptSource { header, mut source } => {
                let concepts = match source.swap_remove(0).get_mut("concept").map(Value::take) {
                    Some(Value::Array(c)) => c,
                    _ => return Err(Error::format(url, "source entry without a concept list")),
                };
                let records = if want_concepts {
                    concepts
                } else {
                    match concepts.into_iter().next() {
                        Some(mut first) => match first.get_mut("variable").map(Value::take) {
                            Some(Value::Array(vars)) => vars,
                            _ => {
                                return Err(Error::format(url, "concept without a variable list"));
                            }
                        },
                        None => Vec::new(),
                    }
                };
                (header, records)
            }
        };
        let header: Header = serde_json::from_value(header)
            .map_err(|e| Error::format(url, format!("bad paging header: {e}")))?;
        Ok(Page { header, records })
    }
}

fn message_of(header: &Value) -> Option<ApiMessage> {
    header.get("message").and_then(first_message)
}

fn first_message(m: &Value) -> Option<ApiMessage> {
    let first = match m {
        Value::Array(a) => a.first()?.clone(),
        Value::Null => return None,
        other => other.clone(),
    };
    match first {
        Value::String(s) => Some(ApiMessage {
            id: None,
            key: "message".into(),
            value: s,
        }),
        obj @ Value::Object(_) => serde_json::from_value(obj).ok(),
        _ => None,
    }
}
