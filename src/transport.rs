//! The HTTP collaborator.
//!
//! The core only needs "GET this URL, give me status, reason and body". Anything
//! that can do that implements [`Transport`]; closures do too, which keeps
//! tests free of sockets.

use crate::error::{Error, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use std::time::Duration;

/// Raw response handed back to the core. JSON decoding happens in the core so
/// that decode failures are reported as response-format errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    /// A `200 OK` carrying `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            reason: "OK".into(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

impl<F> Transport for F
where
    F: Fn(&str) -> Result<HttpResponse> + Send + Sync,
{
    fn get(&self, url: &str) -> Result<HttpResponse> {
        self(url)
    }
}

/// Blocking reqwest transport with a small retry for transient failures
/// (5xx and network errors).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30)) // total request timeout
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("wbgapi-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| Error::Network {
                url: String::new(),
                source,
            })?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut last: Option<Error> = None;
        for backoff_ms in [100u64, 300, 700] {
            match self.http.get(url).send() {
                Ok(r) if r.status().is_server_error() => {
                    log::debug!("HTTP {} from {url}, retrying", r.status());
                    last = Some(into_response(url, r)?.into_transport_error(url));
                }
                Ok(r) => return into_response(url, r),
                Err(source) => {
                    log::debug!("network error for {url}: {source}");
                    last = Some(Error::Network {
                        url: url.to_string(),
                        source,
                    });
                }
            }
            std::thread::sleep(Duration::from_millis(backoff_ms));
        }
        Err(last.unwrap_or_else(|| Error::format(url, "no response")))
    }
}

fn into_response(url: &str, r: reqwest::blocking::Response) -> Result<HttpResponse> {
    let status = r.status();
    let reason = status.canonical_reason().unwrap_or_default().to_string();
    let body = r.text().map_err(|source| Error::Network {
        url: url.to_string(),
        source,
    })?;
    Ok(HttpResponse {
        status: status.as_u16(),
        reason,
        body,
    })
}

impl HttpResponse {
    pub(crate) fn into_transport_error(self, url: &str) -> Error {
        Error::Transport {
            url: url.to_string(),
            status: self.status,
            reason: self.reason,
        }
    }
}
