mod common;

use common::{MockApi, paged};
use serde_json::{Value, json};
use wbgapi::{Error, FetchOptions};

fn page(n: u64, count: u64, per_page: Value) -> Value {
    let records: Vec<Value> = (0..count)
        .map(|i| json!({"id": format!("P{n}-{i}")}))
        .collect();
    json!([{"page": n, "pages": 3, "per_page": per_page, "total": 250}, records])
}

#[test]
fn three_pages_of_250_records() {
    let api = MockApi::new()
        .route("items?per_page=100&page=1&", page(1, 100, json!(100)))
        .route("items?per_page=100&page=2&", page(2, 100, json!("100")))
        .route("items?per_page=100&page=3&", page(3, 50, json!(100)));
    let client = api.client();

    let mut pager = client.fetch("items", &FetchOptions::default().per_page(100));
    assert_eq!(pager.total(), None);
    let first = pager.next().unwrap().unwrap();
    assert_eq!(first["id"], "P1-0");
    assert_eq!(pager.total(), Some(250));
    let rest: Vec<Value> = pager.collect::<wbgapi::Result<_>>().unwrap();
    assert_eq!(rest.len() + 1, 250);
    assert_eq!(rest.last().unwrap()["id"], "P3-49");

    let hits = api.hits();
    assert_eq!(hits.len(), 3);
    for (i, url) in hits.iter().enumerate() {
        assert!(url.contains(&format!("page={}", i + 1)), "{url}");
        assert!(url.ends_with("format=json"), "{url}");
        assert!(url.starts_with("http://mock/v2/en/items?"), "{url}");
    }
}

#[test]
fn pages_are_requested_lazily() {
    let api = MockApi::new()
        .route("items?per_page=100&page=1&", page(1, 100, json!(100)))
        .route("items?per_page=100&page=2&", page(2, 100, json!(100)));
    let client = api.client();
    let taken = client
        .fetch("items", &FetchOptions::default().per_page(100))
        .take(100)
        .count();
    assert_eq!(taken, 100);
    assert_eq!(api.hits().len(), 1);
}

#[test]
fn caller_params_and_language_reach_the_url() {
    let api = MockApi::new().route("/fr/sources", paged(json!([{"id": "2"}])));
    let client = api.client();
    let opts = FetchOptions::default().lang("fr").param("databid", "y");
    assert_eq!(client.fetch("sources", &opts).count(), 1);
    let url = &api.hits()[0];
    assert_eq!(
        url,
        "http://mock/v2/fr/sources?per_page=1000&databid=y&page=1&format=json"
    );
}

#[test]
fn every_envelope_shape_yields_records() {
    let api = MockApi::new()
        .route("/shape/array", paged(json!([{"id": "A"}, {"id": "B"}])))
        .route(
            "/shape/null",
            json!([{"page": 1, "pages": 0, "per_page": 50, "total": 0}, null]),
        )
        .route(
            "/shape/concepts",
            json!({"page": 1, "pages": 1, "per_page": 50, "total": 2, "source": [{"concept": [
                {"id": "Series", "variable": [{"id": "S1"}, {"id": "S2"}]},
                {"id": "Other", "variable": [{"id": "ignored"}]}
            ]}]}),
        )
        .route(
            "/shape/data",
            json!({"page": 1, "pages": 1, "per_page": "50", "total": "1", "source": {"data": [{"value": 1}]}}),
        );
    let client = api.client();
    let opts = FetchOptions::default();
    let ids = |path: &str| -> Vec<Value> {
        client
            .fetch(path, &opts)
            .collect::<wbgapi::Result<Vec<_>>>()
            .unwrap()
    };

    assert_eq!(ids("shape/array").len(), 2);
    assert!(ids("shape/null").is_empty());
    let vars = ids("shape/concepts");
    assert_eq!(vars.len(), 2);
    assert_eq!(vars[1]["id"], "S2");
    assert_eq!(ids("shape/data")[0]["value"], 1);

    let concepts: Vec<Value> = client
        .fetch("shape/concepts", &FetchOptions::default().concepts(true))
        .collect::<wbgapi::Result<_>>()
        .unwrap();
    assert_eq!(concepts.len(), 2);
    assert_eq!(concepts[1]["id"], "Other");
}

#[test]
fn api_message_is_an_api_error() {
    let api = MockApi::new().route(
        "/bad",
        json!([{"message": [{"id": "120", "key": "Invalid value", "value": "The provided parameter value is not valid"}]}]),
    );
    let client = api.client();
    let err = client
        .fetch("bad", &FetchOptions::default())
        .next()
        .unwrap()
        .unwrap_err();
    match err {
        Error::Api { key, url, .. } => {
            assert_eq!(key, "Invalid value");
            assert!(url.contains("/bad?"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unrecognized_bodies_are_format_errors() {
    let api = MockApi::new()
        .route("/text", "<html>maintenance</html>")
        .route("/number", "42")
        .route("/header-only", json!({"page": 1, "pages": 1, "per_page": 50, "total": 0}));
    let client = api.client();
    for path in ["text", "number", "header-only"] {
        let err = client
            .fetch(path, &FetchOptions::default())
            .next()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, Error::ResponseFormat { .. }), "{path}: {err:?}");
    }
}

#[test]
fn non_success_status_is_a_transport_error_and_ends_the_sequence() {
    let api = MockApi::new().status("/down", 503);
    let client = api.client();
    let mut pager = client.fetch("down", &FetchOptions::default());
    match pager.next() {
        Some(Err(Error::Transport { status, url, .. })) => {
            assert_eq!(status, 503);
            assert!(url.contains("/down?"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(pager.next().is_none());
    assert_eq!(api.hits().len(), 1);
}

#[test]
fn get_returns_the_first_record_only() {
    let api = MockApi::new().route("/sources/2?", paged(json!([{"id": "2", "name": "WDI"}])));
    let client = api.client();
    let v = client
        .get("sources/2", &FetchOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(v["name"], "WDI");
    assert!(api.hits()[0].contains("per_page=1&"));
}
