//! Live API tests. Run with: `cargo test --features online -- --nocapture`
#![cfg(feature = "online")]

use wbgapi::catalog::{ECONOMY, TIME};
use wbgapi::data::DataRequest;
use wbgapi::{Client, FetchOptions};

#[test]
fn wdi_concepts_are_canonical() {
    let cli = Client::default();
    let info = cli.concepts(Some(2)).unwrap();
    assert_eq!(info.require(ECONOMY).unwrap().key, "country");
    assert!(info.contains(TIME));
}

#[test]
fn population_for_two_years() {
    let cli = Client::default();
    let req = DataRequest::new("SP.POP.TOTL")
        .economy("DEU")
        .time(2019..=2020)
        .labels(true);
    let recs: Vec<_> = cli
        .data(&req)
        .unwrap()
        .collect::<wbgapi::Result<_>>()
        .unwrap();
    assert_eq!(recs.len(), 2);
    assert!(recs.iter().all(|r| r.get("economy").unwrap().id().to_string() == "DEU"));
}

#[test]
fn sources_list_is_not_empty() {
    let cli = Client::default();
    assert!(cli.sources().take(5).count() > 0);
    assert!(cli.get("sources/2", &FetchOptions::default()).unwrap().is_some());
}

#[test]
fn coder_resolves_common_names() {
    let cli = Client::default();
    assert_eq!(cli.code("Swaziland").unwrap().as_deref(), Some("SWZ"));
    assert_eq!(cli.code("Toronto").unwrap(), None);
}

#[test]
fn economy_carries_its_classification() {
    let cli = Client::default();
    let bra = cli.economy("BRA", true, None).unwrap().unwrap();
    assert_eq!(bra.aggregate, Some(false));
    assert_eq!(bra.region.unwrap().id(), "LCN");
    assert!(bra.capital_city.is_some());
}

#[test]
fn long_economy_list_is_chunked() {
    let cli = Client::default();
    let all: Vec<String> = cli
        .economies("all", "", false, true, None)
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert!(all.len() > 150);
    let back = cli.economies(all.clone(), "", false, false, None).unwrap();
    assert_eq!(back.len(), all.len());
}
