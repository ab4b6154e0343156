//! Client configuration.
//!
//! Defaults target the public World Bank API v2. Every field can be
//! overridden from the environment with [`Config::from_env`]:
//!
//! | variable                | field            |
//! |-------------------------|------------------|
//! | `WBGAPI_ENDPOINT`       | `endpoint`       |
//! | `WBGAPI_LANG`           | `lang`           |
//! | `WBGAPI_DB`             | `db`             |
//! | `WBGAPI_PER_PAGE`       | `per_page`       |
//! | `WBGAPI_MAX_URL_LENGTH` | `max_url_length` |

use crate::error::{Error, Result};
use std::str::FromStr;

pub const DEFAULT_ENDPOINT: &str = "https://api.worldbank.org/v2";
pub const DEFAULT_PER_PAGE: u32 = 1000;
/// Leaves headroom under the server's ~1500 character limit.
pub const DEFAULT_MAX_URL_LENGTH: usize = 1400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// API root, without trailing slash.
    pub endpoint: String,
    /// Language segment inserted after the endpoint (`en`, `fr`, ...).
    pub lang: String,
    /// Database used when a call does not name one (2 = WDI).
    pub db: u32,
    /// Page size requested from the API.
    pub per_page: u32,
    /// Upper bound (exclusive) on the length of any physical request URL.
    pub max_url_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            lang: "en".into(),
            db: 2,
            per_page: DEFAULT_PER_PAGE,
            max_url_length: DEFAULT_MAX_URL_LENGTH,
        }
    }
}

impl Config {
    /// Defaults overridden by any `WBGAPI_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = get("WBGAPI_ENDPOINT") {
            cfg.endpoint = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("WBGAPI_LANG") {
            cfg.lang = v;
        }
        if let Some(v) = get("WBGAPI_DB") {
            cfg.db = parse_var("WBGAPI_DB", &v)?;
        }
        if let Some(v) = get("WBGAPI_PER_PAGE") {
            cfg.per_page = parse_var("WBGAPI_PER_PAGE", &v)?;
        }
        if let Some(v) = get("WBGAPI_MAX_URL_LENGTH") {
            cfg.max_url_length = parse_var("WBGAPI_MAX_URL_LENGTH", &v)?;
        }
        if cfg.per_page == 0 {
            return Err(Error::Configuration("per_page must be positive".into()));
        }
        Ok(cfg)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("{name}: invalid value {value:?}")))
}
