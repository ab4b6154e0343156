mod common;

use common::{paged, wdi};
use serde_json::json;
use std::collections::BTreeMap;
use wbgapi::catalog::ECONOMY;
use wbgapi::{Config, Error, FetchOptions};

fn small_urls() -> Config {
    Config {
        max_url_length: 200,
        ..Config::default()
    }
}

#[test]
fn long_id_lists_are_split_without_loss() {
    let api = wdi().route("/sources/2/country/", paged(json!([{"id": "X", "value": "x"}])));
    let client = api.client_with(small_urls());

    let codes: Vec<String> = (0..60).map(|i| format!("C{i:02}")).collect();
    let rows = client
        .features(ECONOMY, &codes.join(";"), None)
        .unwrap()
        .collect::<wbgapi::Result<Vec<_>>>()
        .unwrap();

    let hits = api.hits_containing("/sources/2/country/");
    assert!(hits.len() > 1);
    assert_eq!(rows.len(), hits.len());
    assert!(hits.iter().all(|u| u.len() < 200), "{hits:?}");

    let seen: Vec<String> = hits
        .iter()
        .map(|u| {
            let tail = u.split("/country/").nth(1).unwrap();
            tail.split('?').next().unwrap().to_string()
        })
        .collect();
    assert_eq!(seen.join(";"), codes.join(";"));
}

#[test]
fn refetch_reports_pending_urls_before_sending() {
    let api = wdi();
    let client = api.client_with(small_urls());
    let mut b = BTreeMap::new();
    b.insert("ids".to_string(), (0..60).map(|i| format!("C{i:02}")).collect::<Vec<_>>().join(";"));
    let refetch = client
        .refetch("things/{ids}", &["ids"], &b, &FetchOptions::default())
        .unwrap();
    let pending: Vec<&str> = refetch.pending_urls().collect();
    assert!(pending.len() > 1);
    assert!(pending.iter().all(|u| u.starts_with("http://mock/v2/en/things/C")));
    assert!(api.hits().is_empty());
}

#[test]
fn unsplittable_request_fails_before_any_request() {
    let api = wdi();
    let client = api.client_with(Config {
        max_url_length: 60,
        ..Config::default()
    });
    let mut b = BTreeMap::new();
    b.insert("ids".to_string(), "Z".repeat(40));
    let err = client
        .refetch("things/{ids}", &["ids"], &b, &FetchOptions::default())
        .err()
        .unwrap();
    match err {
        Error::ChunkLimit { url, max_length } => {
            assert_eq!(max_length, 60);
            assert!(url.contains("ZZZZ"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(api.hits().is_empty());
}
