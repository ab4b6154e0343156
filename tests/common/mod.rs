//! In-memory API used by the integration tests.
#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use wbgapi::{Client, Config, HttpResponse, Transport};

pub const ENDPOINT: &str = "http://mock/v2";

/// Answers with the body of the first route whose needle occurs in the URL;
/// anything else is a 404. Every requested URL is recorded.
#[derive(Clone, Default)]
pub struct MockApi {
    routes: Vec<(String, Result<String, u16>)>,
    hits: Arc<Mutex<Vec<String>>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, needle: &str, body: impl ToString) -> Self {
        self.routes.push((needle.to_string(), Ok(body.to_string())));
        self
    }

    pub fn status(mut self, needle: &str, status: u16) -> Self {
        self.routes.push((needle.to_string(), Err(status)));
        self
    }

    /// URLs requested so far, in order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hits_containing(&self, needle: &str) -> Vec<String> {
        self.hits().into_iter().filter(|u| u.contains(needle)).collect()
    }

    pub fn client(&self) -> Client {
        self.client_with(Config::default())
    }

    pub fn client_with(&self, mut config: Config) -> Client {
        config.endpoint = ENDPOINT.to_string();
        Client::with_transport(config, self.clone())
    }
}

impl Transport for MockApi {
    fn get(&self, url: &str) -> wbgapi::Result<HttpResponse> {
        self.hits.lock().unwrap().push(url.to_string());
        let route = self.routes.iter().find(|(needle, _)| url.contains(needle.as_str()));
        Ok(match route {
            Some((_, Ok(body))) => HttpResponse::ok(body.clone()),
            Some((_, Err(status))) => HttpResponse {
                status: *status,
                reason: "Mock Status".into(),
                body: String::new(),
            },
            None => HttpResponse {
                status: 404,
                reason: "Not Found".into(),
                body: String::new(),
            },
        })
    }
}

/// `[header, records]` with a single page.
pub fn paged(records: Value) -> Value {
    let total = records.as_array().map_or(0, Vec::len);
    json!([{"page": 1, "pages": 1, "per_page": "1000", "total": total}, records])
}

/// Concept-list envelope (`source[0].concept`).
pub fn concept_envelope(concepts: Value) -> Value {
    let total = concepts
        .as_array()
        .and_then(|c| c.first())
        .and_then(|c| c["variable"].as_array())
        .map_or(1, Vec::len);
    json!({
        "page": 1, "pages": 1, "per_page": "1000", "total": total,
        "source": [{"id": "2", "name": "World Development Indicators", "concept": concepts}]
    })
}

/// Data envelope (`source.data`).
pub fn data_envelope(rows: Value) -> Value {
    let total = rows.as_array().map_or(0, Vec::len);
    json!({
        "page": 1, "pages": 1, "per_page": "1000", "total": total, "lastupdated": "2024-01-01",
        "source": {"id": "2", "name": "World Development Indicators", "data": rows}
    })
}

pub fn wdi_concepts() -> Value {
    json!({
        "page": 1, "pages": 1, "per_page": "1000", "total": 3,
        "source": [{"id": "2", "name": "World Development Indicators", "concept": [
            {"id": "Country", "value": "Country"},
            {"id": "Series", "value": "Series"},
            {"id": "Time", "value": "Time"}
        ]}]
    })
}

pub fn wdi_time() -> Value {
    concept_envelope(json!([{"id": "Time", "variable": [
        {"id": "YR2015", "value": "2015"},
        {"id": "YR2014", "value": "2014"},
        {"id": "YR2013", "value": "2013"}
    ]}]))
}

fn class(id: &str, value: &str) -> Value {
    json!({"id": id, "iso2code": "", "value": value})
}

#[allow(clippy::too_many_arguments)]
fn country(
    id: &str,
    iso2: &str,
    name: &str,
    region: Value,
    admin: Value,
    income: Value,
    lending: Value,
    capital: &str,
    lon: &str,
    lat: &str,
) -> Value {
    json!({
        "id": id, "iso2Code": iso2, "name": name,
        "region": region, "adminregion": admin, "incomeLevel": income, "lendingType": lending,
        "capitalCity": capital, "longitude": lon, "latitude": lat
    })
}

fn aggregate(id: &str, iso2: &str, name: &str) -> Value {
    country(
        id,
        iso2,
        name,
        class("NA", "Aggregates"),
        class("", ""),
        class("NA", "Aggregates"),
        class("", "Aggregates"),
        "",
        "",
        "",
    )
}

/// `country/all`: three economies and two aggregates.
pub fn countries() -> Value {
    paged(json!([
        country(
            "BRA", "BR", "Brazil",
            class("LCN", "Latin America & Caribbean "),
            class("LAC", "Latin America & Caribbean (excluding high income)"),
            class("UMC", "Upper middle income"),
            class("IBD", "IBRD"),
            "Brasilia", "-47.9292", "-15.7801",
        ),
        country(
            "CAN", "CA", "Canada",
            class("NAC", "North America"),
            class("", ""),
            class("HIC", "High income"),
            class("LNX", "Not classified"),
            "Ottawa", "-75.6919", "45.4215",
        ),
        country(
            "SWZ", "SZ", "Eswatini",
            class("SSF", "Sub-Saharan Africa "),
            class("SSA", "Sub-Saharan Africa (excluding high income)"),
            class("LMC", "Lower middle income"),
            class("IBD", "IBRD"),
            "Mbabane", "31.4659", "-26.5225",
        ),
        aggregate("EUU", "EU", "European Union"),
        aggregate("WLD", "1W", "World")
    ]))
}

/// Concepts, time periods and the country list of database 2.
pub fn wdi() -> MockApi {
    MockApi::new()
        .route("/sources/2/concepts", wdi_concepts())
        .route("/sources/2/time/all", wdi_time())
        .route("/en/country/all", countries())
}
