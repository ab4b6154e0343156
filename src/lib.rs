//! wbgapi
//!
//! A Rust client for the dimensional `sources` endpoints of the World Bank
//! API (v2). Pairs with the `wbgapi` CLI.
//!
//! ### Features
//! - Lazy, auto-paging iteration over every response envelope the API uses
//! - Transparent splitting of requests that would exceed the URL length limit
//! - Per-database dimension discovery (`country`, `states`, `year`, ... become `economy`, `time`)
//! - Observations reshaped into flat records, optionally labeled
//! - Metadata records for series, economies and footnotes
//! - Free-text economy names resolved to codes
//!
//! ### Example
//! ```no_run
//! use wbgapi::{Client, data::DataRequest};
//!
//! let client = Client::default();
//! let req = DataRequest::new("SP.POP.TOTL")
//!     .economy(["DEU", "USA"])
//!     .time(2010..=2020)
//!     .skip_blanks(true);
//! for rec in client.data(&req)? {
//!     println!("{}", serde_json::to_string(&rec?)?);
//! }
//! assert_eq!(client.code("Swaziland")?.as_deref(), Some("SWZ"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod catalog;
pub mod chunk;
pub mod coder;
pub mod config;
pub mod data;
pub mod error;
pub mod metadata;
pub mod models;
pub mod query;
pub mod response;
pub mod source;
pub mod transport;

pub use api::{Client, FetchOptions, Pager, Refetch};
pub use config::Config;
pub use error::{Error, Result};
pub use query::Param;
pub use transport::{HttpResponse, HttpTransport, Transport};
