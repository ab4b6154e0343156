//! Synchronous client for the **World Bank API (v2)** `sources` family of endpoints.
//!
//! A [`Client`] is a session: it owns the configuration, the HTTP transport and
//! every memoized lookup (dimension names, time periods, aggregates, the coder
//! table). Two clients never share caches.
//!
//! Requests are lazy. [`Client::fetch`] returns a [`Pager`] that requests the
//! next page only when the current one is drained; [`Client::refetch`] first
//! splits an oversized request into URLs under the configured length limit
//! (see [`crate::chunk`]) and pages through each of them in order.
//!
//! ### Notes
//! - The API sometimes serializes `total` and `per_page` as **strings**; both forms are accepted.
//! - The core never retries. [`HttpTransport`] retries transient 5xx/network failures itself.
//!
//! Typical usage:
//! ```no_run
//! # use wbgapi::{Client, FetchOptions};
//! let client = Client::default();
//! for row in client.fetch("sources", &FetchOptions::default()) {
//!     let row = row?;
//!     println!("{} {}", row["id"], row["name"]);
//! }
//! # Ok::<(), wbgapi::Error>(())
//! ```

use crate::catalog::Catalog;
use crate::chunk::{self, Bindings, UrlTemplate};
use crate::coder::{AliasTable, Coder};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::response::{Envelope, Page};
use crate::transport::{HttpTransport, Transport};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, RwLock};

// Allow -, _, . and ~ unescaped in query values
const QUERY_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Widest `page` value assumed when budgeting URL length.
const PAGE_RESERVE: u64 = 999_999;

/// Per-request options for [`Client::fetch`] and friends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Extra query parameters, sent in order after `per_page`.
    pub params: Vec<(String, String)>,
    /// Return concept-level rows instead of the first concept's variables.
    pub concepts: bool,
    /// Language override.
    pub lang: Option<String>,
    /// Page size override.
    pub per_page: Option<u32>,
}

impl FetchOptions {
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn concepts(mut self, concepts: bool) -> Self {
        self.concepts = concepts;
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }
}

pub struct Client {
    pub config: Config,
    transport: Arc<dyn Transport>,
    pub(crate) catalog: Catalog,
    pub(crate) aliases: AliasTable,
    pub(crate) coder: RwLock<Option<Arc<Coder>>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(Config::default()).expect("reqwest client build")
    }
}

impl Client {
    /// Client over the default reqwest transport.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self::with_transport(config, HttpTransport::new()?))
    }

    /// Client over any transport; tests use in-memory ones.
    pub fn with_transport(config: Config, transport: impl Transport + 'static) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            catalog: Catalog::default(),
            aliases: AliasTable::bundled(),
            coder: RwLock::new(None),
        }
    }

    /// Replace the alias table used by the coder. Drops any coder table
    /// already built.
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self.reset_coder();
        self
    }

    pub(crate) fn db_or_default(&self, db: Option<u32>) -> u32 {
        db.unwrap_or(self.config.db)
    }

    fn root(&self, lang: Option<&str>) -> String {
        format!(
            "{}/{}",
            self.config.endpoint,
            lang.unwrap_or(&self.config.lang)
        )
    }

    /// Iterate over every record of `path` (relative to `{endpoint}/{lang}/`),
    /// requesting pages on demand.
    ///
    /// ### Example
    /// ```no_run
    /// # use wbgapi::{Client, FetchOptions};
    /// let cli = Client::default();
    /// let n = cli.fetch("country/all", &FetchOptions::default()).count();
    /// ```
    pub fn fetch(&self, path: &str, opts: &FetchOptions) -> Pager<'_> {
        let url = format!("{}/{}", self.root(opts.lang.as_deref()), path);
        Pager::new(self, url, opts.clone())
    }

    /// First record of `path`, requested with `per_page=1`.
    pub fn get(&self, path: &str, opts: &FetchOptions) -> Result<Option<Value>> {
        let url = format!("{}/{}", self.root(opts.lang.as_deref()), path);
        let opts = opts.clone().per_page(1);
        let page = self.request(&query_url(&url, &self.query(&opts, 1)), opts.concepts)?;
        Ok(page.records.into_iter().next())
    }

    /// Like [`Client::fetch`] for a path template whose `{slot}` values may
    /// be too long for one URL. `chunkable` lists, in priority order, the
    /// slots that may be split at `;` boundaries.
    ///
    /// Chunking happens up front, so an impossible request fails here with
    /// [`Error::ChunkLimit`] before anything is sent.
    pub fn refetch(
        &self,
        template: &str,
        chunkable: &[&str],
        bindings: &Bindings,
        opts: &FetchOptions,
    ) -> Result<Refetch<'_>> {
        let tpl = UrlTemplate::parse(&format!("{}/{}", self.root(opts.lang.as_deref()), template));
        let reserve = query_url("", &self.query(opts, PAGE_RESERVE)).len();
        let budget = self.config.max_url_length.saturating_sub(reserve);
        let urls = chunk::chunk(&tpl, chunkable, bindings, budget).map_err(|e| match e {
            Error::ChunkLimit { url, .. } => Error::ChunkLimit {
                url,
                max_length: self.config.max_url_length,
            },
            other => other,
        })?;
        if urls.len() > 1 {
            log::debug!("request split into {} URLs", urls.len());
        }
        Ok(Refetch {
            client: self,
            urls: urls.into(),
            opts: opts.clone(),
            current: None,
            failed: false,
        })
    }

    /// Query parameters for one page, in the order they are sent.
    fn query(&self, opts: &FetchOptions, page: u64) -> Vec<(String, String)> {
        let per_page = opts.per_page.unwrap_or(self.config.per_page);
        let mut q = vec![("per_page".to_string(), per_page.to_string())];
        for (k, v) in &opts.params {
            match q.iter_mut().find(|(qk, _)| qk == k) {
                Some(existing) => existing.1 = v.clone(),
                None => q.push((k.clone(), v.clone())),
            }
        }
        q.retain(|(k, _)| k != "page" && k != "format");
        q.push(("page".into(), page.to_string()));
        q.push(("format".into(), "json".into()));
        q
    }

    /// One physical request: status check, JSON decode, envelope dispatch.
    pub(crate) fn request(&self, url: &str, want_concepts: bool) -> Result<Page> {
        log::debug!("GET {url}");
        let resp = self.transport.get(url)?;
        if !resp.is_success() {
            return Err(resp.into_transport_error(url));
        }
        let v: Value = serde_json::from_str(&resp.body)
            .map_err(|e| Error::format(url, format!("JSON decoding error: {e}")))?;
        Envelope::classify(url, v)?.into_page(url, want_concepts)
    }
}

fn query_url(base: &str, query: &[(String, String)]) -> String {
    let qs = query
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                percent_encoding::utf8_percent_encode(k, QUERY_SAFE),
                percent_encoding::utf8_percent_encode(v, QUERY_SAFE)
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{qs}")
}

/// Lazy record sequence over all pages of one URL.
///
/// The first page fixes the expected `total`; pages are requested until the
/// running sum of the header's `per_page` reaches it. Any error ends the
/// sequence.
pub struct Pager<'c> {
    client: &'c Client,
    url: String,
    opts: FetchOptions,
    page: u64,
    total: Option<u64>,
    read: u64,
    buffer: VecDeque<Value>,
    done: bool,
}

impl<'c> Pager<'c> {
    fn new(client: &'c Client, url: String, opts: FetchOptions) -> Self {
        Self {
            client,
            url,
            opts,
            page: 1,
            total: None,
            read: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Total record count reported by the first page, once it has been read.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    fn load_page(&mut self) -> Result<()> {
        let url = query_url(&self.url, &self.client.query(&self.opts, self.page));
        let page = self.client.request(&url, self.opts.concepts)?;
        if self.total.is_none() {
            self.total = Some(page.header.total);
        }
        if page.header.per_page == 0 {
            // nothing would ever advance the running count
            self.done = true;
        }
        self.read += page.header.per_page;
        self.page += 1;
        self.buffer.extend(page.records);
        Ok(())
    }
}

impl Iterator for Pager<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(v) = self.buffer.pop_front() {
                return Some(Ok(v));
            }
            if self.done {
                return None;
            }
            if matches!(self.total, Some(total) if self.read >= total) {
                self.done = true;
                return None;
            }
            if let Err(e) = self.load_page() {
                self.done = true;
                self.buffer.clear();
                return Some(Err(e));
            }
        }
    }
}

/// Lazy record sequence over every URL of a chunked request, in order.
pub struct Refetch<'c> {
    client: &'c Client,
    urls: VecDeque<String>,
    opts: FetchOptions,
    current: Option<Pager<'c>>,
    failed: bool,
}

impl<'c> Refetch<'c> {
    /// A sequence with nothing to request.
    pub(crate) fn empty(client: &'c Client) -> Self {
        Self {
            client,
            urls: VecDeque::new(),
            opts: FetchOptions::default(),
            current: None,
            failed: false,
        }
    }

    /// Physical URLs not yet started.
    pub fn pending_urls(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}

impl Iterator for Refetch<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(pager) = self.current.as_mut() {
                match pager.next() {
                    Some(Err(e)) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                    Some(ok) => return Some(ok),
                    None => self.current = None,
                }
            }
            let url = self.urls.pop_front()?;
            self.current = Some(Pager::new(self.client, url, self.opts.clone()));
        }
    }
}
