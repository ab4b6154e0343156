mod common;

use common::{MockApi, concept_envelope, countries, paged, wdi};
use serde_json::json;
use std::sync::Arc;
use wbgapi::catalog::{ECONOMY, SERIES, TIME};
use wbgapi::{Error, Param};

#[test]
fn concepts_are_discovered_once_per_database() {
    let api = wdi().route(
        "/sources/57/concepts",
        json!({"page": 1, "pages": 1, "per_page": 50, "total": 4, "source": [{"concept": [
            {"id": "States", "value": "States"},
            {"id": "Year", "value": "Year"},
            {"id": "Indicator", "value": "Indicator"},
            {"id": "Version", "value": "Version"}
        ]}]}),
    );
    let client = api.client();

    let wdi = client.concepts(None).unwrap();
    assert_eq!(wdi.require(ECONOMY).unwrap().key, "country");
    let sub = client.concepts(Some(57)).unwrap();
    assert_eq!(sub.require(ECONOMY).unwrap().key, "states");
    assert_eq!(sub.require(TIME).unwrap().key, "year");
    assert_eq!(sub.require(SERIES).unwrap().key, "indicator");
    assert_eq!(sub.require("version").unwrap().key, "version");

    client.concepts(Some(57)).unwrap();
    client.concepts(Some(2)).unwrap();
    assert_eq!(api.hits_containing("/concepts").len(), 2);

    client.clear_caches();
    client.concepts(Some(2)).unwrap();
    assert_eq!(api.hits_containing("/concepts").len(), 3);
}

#[test]
fn aggregates_hold_both_code_forms() {
    let api = MockApi::new().route("/en/country/all", countries());
    let client = api.client();
    let aggs = client.aggregates().unwrap();
    for code in ["EUU", "EU", "WLD", "1W"] {
        assert!(aggs.contains(code), "{code}");
    }
    for code in ["BRA", "BR", "SWZ", "CAN"] {
        assert!(!aggs.contains(code), "{code}");
    }
    assert_eq!(aggs.len(), 4);
    client.aggregates().unwrap();
    assert_eq!(api.hits().len(), 1);
}

#[test]
fn time_values_and_keys_are_interchangeable() {
    let api = wdi();
    let client = api.client();
    assert_eq!(
        client
            .query_param(&Param::from(2013..=2015), Some(TIME), None)
            .unwrap(),
        "YR2013;YR2014;YR2015"
    );
    assert_eq!(
        client
            .query_param(&Param::from(vec!["YR2014", "2015"]), Some(TIME), None)
            .unwrap(),
        "YR2014;YR2015"
    );
    assert_eq!(
        client.query_param(&Param::from(2014), Some(TIME), None).unwrap(),
        "YR2014"
    );
    // unknown display values pass through
    assert_eq!(
        client.query_param(&Param::from("1999"), Some(TIME), None).unwrap(),
        "1999"
    );
    assert_eq!(
        client.query_param(&Param::all(), Some(TIME), None).unwrap(),
        "all"
    );
    assert_eq!(api.hits_containing("/time/all").len(), 1);
}

#[test]
fn lists_join_and_scalars_pass_through() {
    let client = MockApi::new().client();
    assert_eq!(
        client
            .query_param(&Param::from(["USA", "CAN", "MEX"]), Some(ECONOMY), None)
            .unwrap(),
        "USA;CAN;MEX"
    );
    assert_eq!(
        client
            .query_param(&Param::from("SP.POP.TOTL"), Some(SERIES), None)
            .unwrap(),
        "SP.POP.TOTL"
    );
    assert_eq!(client.query_param(&Param::from(7), None, None).unwrap(), "7");
}

#[test]
fn mrv_is_the_first_listed_element() {
    let api = wdi().route(
        "/sources/2/country/all",
        concept_envelope(json!([{"id": "Country", "variable": [
            {"id": "ZWE", "value": "Zimbabwe"},
            {"id": "ABW", "value": "Aruba"}
        ]}])),
    );
    let client = api.client();
    assert_eq!(
        client.query_param(&Param::Mrv, Some(ECONOMY), None).unwrap(),
        "ZWE"
    );
    assert_eq!(
        client.query_param(&Param::from("mrv"), Some(ECONOMY), None).unwrap(),
        "ZWE"
    );
    assert_eq!(api.hits_containing("/sources/2/country/all").len(), 1);
    // the time dimension keeps the token for the API to interpret
    assert_eq!(client.query_param(&Param::Mrv, Some(TIME), None).unwrap(), "mrv");
}

#[test]
fn unknown_dimension_is_a_configuration_error() {
    let client = wdi().client();
    let err = client.features("version", "all", None).err().unwrap();
    assert!(matches!(err, Error::Configuration(_)), "{err:?}");
}

#[test]
fn metadata_flag_is_read_from_the_source_record() {
    let api = MockApi::new()
        .route(
            "/sources/2?",
            paged(json!([{"id": "2", "name": "WDI", "metadataavailability": "y"}])),
        )
        .route(
            "/sources/11?",
            paged(json!([{"id": "11", "name": "Africa", "metadataavailability": "N"}])),
        );
    let client = api.client();
    assert!(client.has_metadata(None).unwrap());
    assert!(!client.has_metadata(Some(11)).unwrap());
    assert!(client.has_metadata(Some(2)).unwrap());
    assert_eq!(api.hits().len(), 2);
    assert!(api.hits()[0].contains("databid=y"));
}

#[test]
fn concurrent_first_builds_share_one_snapshot() {
    let api = wdi();
    let client = api.client();
    let (a, b) = std::thread::scope(|s| {
        let first = s.spawn(|| client.concepts(Some(2)).unwrap());
        let second = s.spawn(|| client.concepts(Some(2)).unwrap());
        (first.join().unwrap(), second.join().unwrap())
    });
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &client.concepts(Some(2)).unwrap()));

    let aggs: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| client.aggregates().unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(aggs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    // at most one fetch per thread, never more
    assert!(api.hits_containing("/concepts").len() <= 2);
    assert!(api.hits_containing("/en/country/all").len() <= 4);
}
