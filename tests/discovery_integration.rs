//! End-to-end discovery scenarios.
//!
//! Drives [`DiscoveryService`] the way a transport would: identifiers arrive
//! base64url encoded, bodies arrive as JSON and go through the strict `io`
//! parsers before they reach the service. Each test builds its own
//! `SQLite` store, so scenarios share no state.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Arc;

use discovery_index::io::{
    parse_encoded_asset_links, parse_limit_param, parse_search_request, parse_specific_asset_ids,
};
use discovery_index::services::DiscoveryService;
use discovery_index::storage::SqliteLinkStore;
use discovery_index::{AssetLink, ErrorKind, SpecificAssetId, codec};
use serde_json::{Value, json};
use tempfile::TempDir;

const AAS_A: &str = "urn:aas:test:assembler-1";
const AAS_B: &str = "urn:aas:test:oil-refinery";
const AAS_C: &str = "urn:aas:test:rail-signal";

fn service() -> DiscoveryService {
    DiscoveryService::with_defaults(Arc::new(SqliteLinkStore::in_memory().unwrap()))
}

fn pairs(list: &[(&str, &str)]) -> Vec<SpecificAssetId> {
    list.iter()
        .map(|(name, value)| SpecificAssetId::new(*name, *value))
        .collect()
}

fn link(name: &str, value: &str) -> AssetLink {
    AssetLink::new(name, value)
}

fn put(service: &DiscoveryService, shell: &str, list: &[(&str, &str)]) {
    service
        .replace(&codec::encode_str(shell), &pairs(list))
        .unwrap();
}

fn names_to_values(found: &[SpecificAssetId]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in found {
        map.entry(pair.name.clone())
            .or_default()
            .push(pair.value.clone());
    }
    map
}

fn search_ids(service: &DiscoveryService, constraints: &[AssetLink]) -> Vec<String> {
    service
        .search(constraints, Some(10), None)
        .unwrap()
        .ids()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// The dataset most scenarios start from.
fn seeded() -> DiscoveryService {
    let service = service();
    put(
        &service,
        AAS_A,
        &[
            ("globalAssetId", "urn:ga:green-circuit"),
            ("serialNumber", "SN-red-circuit"),
            ("line", "L1"),
        ],
    );
    put(
        &service,
        AAS_B,
        &[("serialNumber", "SN-engine-unit"), ("plant", "SPIDERTRON-YARD")],
    );
    put(&service, AAS_C, &[("assetTag", "belt-yellow")]);
    service
}

// ============================================================================
// Replace / get / remove
// ============================================================================

#[test]
fn test_empty_index_returns_empty_page_without_cursor() {
    let page = service().search(&[], Some(5), None).unwrap();
    assert!(page.result.is_empty());
    assert!(page.is_last());
}

#[test]
fn test_replace_then_get_reflects_latest_set_only() {
    let service = service();
    let encoded = codec::encode_str(AAS_A);

    put(
        &service,
        AAS_A,
        &[
            ("globalAssetId", "urn:ga:green-circuit"),
            ("serialNumber", "SN-iron-gear"),
            ("plant", "NAUVIS"),
        ],
    );
    let first = names_to_values(&service.get(&encoded).unwrap());
    assert_eq!(first["plant"], vec!["NAUVIS"]);
    assert_eq!(first["serialNumber"], vec!["SN-iron-gear"]);

    put(
        &service,
        AAS_A,
        &[
            ("globalAssetId", "urn:ga:green-circuit"),
            ("serialNumber", "SN-red-circuit"),
            ("line", "L1"),
        ],
    );
    let second = names_to_values(&service.get(&encoded).unwrap());
    assert_eq!(second["serialNumber"], vec!["SN-red-circuit"]);
    assert_eq!(second["line"], vec!["L1"]);
    assert!(!second.contains_key("plant"));

    // The replaced pair no longer matches anything.
    assert!(search_ids(&service, &[link("plant", "NAUVIS")]).is_empty());
}

#[test]
fn test_multiple_shells_are_independent() {
    let service = seeded();
    let b = names_to_values(&service.get(&codec::encode_str(AAS_B)).unwrap());
    assert_eq!(b["plant"], vec!["SPIDERTRON-YARD"]);
    let c = service.get(&codec::encode_str(AAS_C)).unwrap();
    assert_eq!(c, pairs(&[("assetTag", "belt-yellow")]));
}

#[test]
fn test_external_subject_id_survives_through_json_body() {
    let service = service();
    let body = json!([
        {
            "name": "serialNumber",
            "value": "SN-42",
            "externalSubjectId": {"type": "ExternalReference", "keys": [{"type": "GlobalReference", "value": "urn:tenant:x"}]}
        },
        {"name": "plant", "value": "NAUVIS", "externalSubjectId": null}
    ]);
    let parsed = parse_specific_asset_ids(&body).unwrap();
    service
        .replace(&codec::encode_str("urn:aas:test:subject"), &parsed)
        .unwrap();

    let stored = service.get(&codec::encode_str("urn:aas:test:subject")).unwrap();
    assert_eq!(stored, parsed);
    let as_json = serde_json::to_value(&stored).unwrap();
    assert_eq!(as_json[0]["externalSubjectId"]["keys"][0]["value"], "urn:tenant:x");
    assert!(as_json[1].get("externalSubjectId").is_none());
}

#[test]
fn test_remove_then_absent_everywhere() {
    let service = seeded();
    let encoded = codec::encode_str(AAS_A);
    service.get(&encoded).unwrap();

    service.remove(&encoded).unwrap();
    assert_eq!(service.get(&encoded).unwrap_err().kind(), ErrorKind::NotFound);
    assert!(
        !search_ids(&service, &[link("globalAssetId", "urn:ga:green-circuit")])
            .contains(&AAS_A.to_string())
    );
}

#[test]
fn test_replace_removes_old_pairs_and_double_remove_is_not_found() {
    let service = service();
    let shell = "urn:aas:test:blue-science";
    let encoded = codec::encode_str(shell);

    put(&service, shell, &[("alpha", "steam-power"), ("beta", "coal-burner")]);
    put(&service, shell, &[("gamma", "solar-array"), ("delta", "accumulator-bank")]);

    let got = names_to_values(&service.get(&encoded).unwrap());
    assert!(got.contains_key("gamma"));
    assert!(got.contains_key("delta"));
    assert!(!got.contains_key("alpha"));
    assert!(!got.contains_key("beta"));

    service.remove(&encoded).unwrap();
    assert_eq!(service.get(&encoded).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.remove(&encoded).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.get(&encoded).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_empty_replace_removes_shell() {
    let service = seeded();
    service.replace(&codec::encode_str(AAS_C), &[]).unwrap();
    assert_eq!(
        service.get(&codec::encode_str(AAS_C)).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(search_ids(&service, &[link("assetTag", "belt-yellow")]).is_empty());
}

#[test]
fn test_unencoded_identifier_is_rejected_for_every_operation() {
    let service = seeded();
    let raw = "urn:aas:not-encoded:crude-oil";

    assert_eq!(service.get(raw).unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(
        service
            .replace(raw, &pairs(&[("foo", "barrel")]))
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );
    assert_eq!(service.remove(raw).unwrap_err().kind(), ErrorKind::Validation);
}

// ============================================================================
// Search
// ============================================================================

#[test]
fn test_search_matrix() {
    let service = seeded();

    assert_eq!(
        search_ids(&service, &[link("globalAssetId", "urn:ga:green-circuit")]),
        vec![AAS_A]
    );
    assert_eq!(
        search_ids(&service, &[link("serialNumber", "SN-red-circuit")]),
        vec![AAS_A]
    );
    assert_eq!(
        search_ids(&service, &[link("plant", "SPIDERTRON-YARD")]),
        vec![AAS_B]
    );
    assert_eq!(
        search_ids(
            &service,
            &[
                link("globalAssetId", "urn:ga:green-circuit"),
                link("serialNumber", "SN-red-circuit"),
            ]
        ),
        vec![AAS_A]
    );
    assert!(search_ids(&service, &[link("serialNumber", "SN-does-not-exist")]).is_empty());
}

#[test]
fn test_search_is_conjunctive_not_disjunctive() {
    let service = seeded();
    // Each pair matches a different shell; together they match none.
    assert!(
        search_ids(
            &service,
            &[link("plant", "SPIDERTRON-YARD"), link("assetTag", "belt-yellow")]
        )
        .is_empty()
    );
    // Name alone does not match when the value differs.
    assert!(search_ids(&service, &[link("plant", "NAUVIS")]).is_empty());
}

#[test]
fn test_shared_and_unique_pairs() {
    let service = service();
    let d = "urn:aas:test:copper-plate";
    let e = "urn:aas:test:iron-gear";
    put(&service, d, &[("sharedTag", "train-signal"), ("uniqueD", "uranium-fuel-cell")]);
    put(&service, e, &[("sharedTag", "train-signal"), ("uniqueE", "rocket-control-unit")]);

    assert_eq!(search_ids(&service, &[link("sharedTag", "train-signal")]), vec![d, e]);
    assert_eq!(search_ids(&service, &[link("uniqueD", "uranium-fuel-cell")]), vec![d]);
    assert_eq!(search_ids(&service, &[link("uniqueE", "rocket-control-unit")]), vec![e]);
    assert!(search_ids(&service, &[link("nonexistent", "biters-don't-index")]).is_empty());
}

#[test]
fn test_empty_constraints_list_every_shell() {
    let service = seeded();
    assert_eq!(search_ids(&service, &[]), vec![AAS_A, AAS_B, AAS_C]);
}

#[test]
fn test_pagination_limit_one_cursor_points_to_next() {
    let service = service();
    let copper = "urn:aas:test:copper";
    let iron = "urn:aas:test:iron";
    put(&service, iron, &[("pageGroup", "science-pack-3")]);
    put(&service, copper, &[("pageGroup", "science-pack-3")]);
    let constraints = [link("pageGroup", "science-pack-3")];

    let first = service.search(&constraints, Some(1), None).unwrap();
    assert_eq!(first.ids(), vec![copper]);
    let cursor = first.next_cursor().expect("a second page exists");
    assert_eq!(codec::decode_str(cursor).unwrap(), iron);

    let second = service.search(&constraints, Some(1), Some(cursor)).unwrap();
    assert_eq!(second.ids(), vec![iron]);
    assert!(second.is_last());
}

#[test]
fn test_pagination_walks_every_match_once() {
    let service = service();
    for i in 0..25 {
        put(&service, &format!("urn:aas:test:shell-{i:02}"), &[("batch", "b1")]);
    }
    put(&service, "urn:aas:test:outsider", &[("batch", "b2")]);

    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = service
            .search(&[link("batch", "b1")], Some(7), cursor.as_deref())
            .unwrap();
        assert!(page.result.len() <= 7);
        collected.extend(page.ids().into_iter().map(str::to_string));
        match page.next_cursor() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }

    let expected: Vec<String> = (0..25).map(|i| format!("urn:aas:test:shell-{i:02}")).collect();
    assert_eq!(collected, expected);
}

#[test]
fn test_cursor_survives_deletion_of_its_shell() {
    let service = service();
    for name in ["urn:p:1", "urn:p:2", "urn:p:3", "urn:p:4"] {
        put(&service, name, &[("pageGroup", "yellow")]);
    }
    let constraints = [link("pageGroup", "yellow")];

    let first = service.search(&constraints, Some(1), None).unwrap();
    assert_eq!(first.ids(), vec!["urn:p:1"]);
    let cursor = first.next_cursor().unwrap().to_string();
    assert_eq!(codec::decode_str(&cursor).unwrap(), "urn:p:2");

    // The shell the cursor names disappears between pages.
    service.remove(&codec::encode_str("urn:p:2")).unwrap();

    let second = service.search(&constraints, Some(2), Some(&cursor)).unwrap();
    assert_eq!(second.ids(), vec!["urn:p:3", "urn:p:4"]);
    assert!(second.is_last());
}

#[test]
fn test_search_with_thousands_of_constraints() {
    let service = service();
    let wide: Vec<(String, String)> = (0..1500)
        .map(|i| (format!("k{i}"), "v".to_string()))
        .collect();
    let wide_pairs: Vec<SpecificAssetId> = wide
        .iter()
        .map(|(n, v)| SpecificAssetId::new(n.as_str(), v.as_str()))
        .collect();
    service
        .replace(&codec::encode_str("urn:aas:test:wide"), &wide_pairs)
        .unwrap();
    service
        .replace(&codec::encode_str("urn:aas:test:partial"), &wide_pairs[..1499])
        .unwrap();

    let constraints: Vec<AssetLink> = wide.iter().map(|(n, v)| link(n, v)).collect();
    let page = service.search(&constraints, Some(10), None).unwrap();
    assert_eq!(page.ids(), vec!["urn:aas:test:wide"]);
    assert!(page.is_last());

    let mut repeated = constraints.clone();
    repeated.extend(constraints.iter().cloned());
    let page = service.search(&repeated, Some(10), None).unwrap();
    assert_eq!(page.ids(), vec!["urn:aas:test:wide"]);
}

#[test]
fn test_exact_page_boundary_has_no_cursor() {
    let service = service();
    put(&service, "urn:a", &[("k", "v")]);
    put(&service, "urn:b", &[("k", "v")]);
    let page = service.search(&[link("k", "v")], Some(2), None).unwrap();
    assert_eq!(page.ids(), vec!["urn:a", "urn:b"]);
    assert!(page.is_last());
}

#[test]
fn test_limit_zero_and_absent_use_default() {
    let service = service();
    for i in 0..3 {
        put(&service, &format!("urn:s{i}"), &[("k", "v")]);
    }
    assert_eq!(service.search(&[], Some(0), None).unwrap().result.len(), 3);
    assert_eq!(service.search(&[], None, None).unwrap().result.len(), 3);
}

#[test]
fn test_negative_limit_is_rejected() {
    let request = parse_search_request(&json!({
        "assetLinks": [{"name": "serialNumber", "value": "SN-red-circuit"}],
        "limit": -5
    }))
    .unwrap();
    let err = seeded().search_request(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_bad_cursor_is_rejected() {
    let err = seeded()
        .search(&[link("plant", "SPIDERTRON-YARD")], Some(1), Some("not-base64!!!"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_search_request_body_roundtrip() {
    let service = seeded();
    let request = parse_search_request(&json!({
        "assetLinks": [
            {"name": "plant", "value": "SPIDERTRON-YARD"},
            {"name": "serialNumber", "value": "SN-engine-unit"}
        ],
        "limit": 10
    }))
    .unwrap();
    let page = service.search_request(&request).unwrap();
    assert_eq!(page.ids(), vec![AAS_B]);

    let body = serde_json::to_value(&page).unwrap();
    assert_eq!(body["result"], json!([AAS_B]));
    assert!(body["paging_metadata"].get("cursor").is_none());
}

// ============================================================================
// Query-string form
// ============================================================================

fn encoded_link(name: &str, value: &str) -> String {
    codec::encode_str(&json!({"name": name, "value": value}).to_string())
}

#[test]
fn test_query_form_single_pair() {
    let service = seeded();
    let constraints =
        parse_encoded_asset_links(&[encoded_link("plant", "SPIDERTRON-YARD")]).unwrap();
    assert_eq!(search_ids(&service, &constraints), vec![AAS_B]);
}

#[test]
fn test_query_form_repeated_and_comma_separated_agree() {
    let service = seeded();
    let plant = encoded_link("plant", "SPIDERTRON-YARD");
    let serial = encoded_link("serialNumber", "SN-engine-unit");

    let repeated = parse_encoded_asset_links(&[plant.clone(), serial.clone()]).unwrap();
    let joined = parse_encoded_asset_links(&[format!("{plant},{serial}")]).unwrap();
    assert_eq!(repeated, joined);
    assert_eq!(search_ids(&service, &repeated), vec![AAS_B]);
}

#[test]
fn test_query_form_pagination_with_limit_param() {
    let service = service();
    put(&service, "urn:aas:test:copper", &[("pageGroup", "science-pack-3")]);
    put(&service, "urn:aas:test:iron", &[("pageGroup", "science-pack-3")]);
    let constraints =
        parse_encoded_asset_links(&[encoded_link("pageGroup", "science-pack-3")]).unwrap();
    let limit = parse_limit_param(Some("1")).unwrap();

    let first = service.search(&constraints, limit, None).unwrap();
    let cursor = first.next_cursor().unwrap().to_string();
    assert_ne!(codec::decode_str(&cursor).unwrap(), first.ids()[0]);

    let second = service.search(&constraints, limit, Some(&cursor)).unwrap();
    assert_eq!(second.result.len(), 1);
    assert_ne!(first.ids(), second.ids());
    assert!(second.is_last());
}

#[test]
fn test_query_form_malformed_asset_ids() {
    assert_eq!(
        parse_encoded_asset_links(&["%%ZZ-invalid"]).unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert!(parse_limit_param(Some("ten")).is_err());
}

// ============================================================================
// Body shape rejection
// ============================================================================

fn rejects_pairs(body: &Value) {
    let err = parse_specific_asset_ids(body).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation, "body {body} should be rejected");
}

fn rejects_search(body: &Value) {
    let err = parse_search_request(body).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation, "body {body} should be rejected");
}

#[test]
fn test_replace_body_with_malformed_values() {
    rejects_pairs(&json!([{"name": ""}, {"value": ""}, {"name": 123, "value": true}]));
    rejects_pairs(&json!([{"name": "", "value": "some-value"}]));
    rejects_pairs(&json!([{"name": "serialNumber", "value": ""}]));
    rejects_pairs(&json!([{"foo": "abc", "bar": "xyz"}]));
}

#[test]
fn test_replace_body_with_wrong_shape() {
    rejects_pairs(&json!({"name": "x", "value": "y"}));
    rejects_pairs(&json!("not-an-array"));
    rejects_pairs(&json!("this-is-a-plain-string"));
    rejects_pairs(&Value::Null);
}

#[test]
fn test_search_body_with_wrong_shape() {
    rejects_search(&json!({"assetLinks": "not-an-array", "limit": 10}));
    rejects_search(&json!({
        "assetLinks": [{"name": 123, "value": true}, {"name": "ok"}, {"value": "ok"}],
        "limit": 5
    }));
    rejects_search(&json!([{"name": "foo", "value": "bar"}]));
    rejects_search(&Value::Null);
    rejects_search(&json!({}));
}

#[test]
fn test_rejected_replace_leaves_previous_state() {
    let service = seeded();
    let encoded = codec::encode_str(AAS_B);
    let before = service.get(&encoded).unwrap();

    let err = service
        .replace(&encoded, &pairs(&[("ok", "1"), ("", "broken")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(service.get(&encoded).unwrap(), before);
}

// ============================================================================
// Durability and concurrency
// ============================================================================

#[test]
fn test_link_sets_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("discovery.db");
    {
        let store = SqliteLinkStore::new(&path).unwrap();
        let service = DiscoveryService::with_defaults(Arc::new(store));
        put(&service, AAS_A, &[("serialNumber", "SN-red-circuit")]);
    }

    let reopened = DiscoveryService::with_defaults(Arc::new(SqliteLinkStore::new(&path).unwrap()));
    assert_eq!(
        search_ids(&reopened, &[link("serialNumber", "SN-red-circuit")]),
        vec![AAS_A]
    );
}

#[test]
fn test_concurrent_writers_and_readers_see_whole_sets() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteLinkStore::new(dir.path().join("concurrent.db")).unwrap());
    let service = DiscoveryService::with_defaults(store);

    let writers: Vec<_> = (0..4)
        .map(|worker| {
            let service = service.clone();
            std::thread::spawn(move || {
                for round in 0..20 {
                    let shell = codec::encode_str(&format!("urn:aas:worker-{worker}"));
                    let round = round.to_string();
                    service
                        .replace(
                            &shell,
                            &[
                                SpecificAssetId::new("round", round.as_str()),
                                SpecificAssetId::new("pair", round.as_str()),
                            ],
                        )
                        .unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let service = service.clone();
        std::thread::spawn(move || {
            for round in 0..20 {
                let value = round.to_string();
                // A shell matching one half of a set must match the other half too.
                let round_only = service
                    .search(&[AssetLink::new("round", value.as_str())], Some(100), None)
                    .unwrap();
                for id in round_only.ids() {
                    let set = service.get(&codec::encode_str(id));
                    if let Ok(set) = set {
                        assert_eq!(set.len(), 2);
                    }
                }
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    reader.join().unwrap();

    let everything = service.search(&[], Some(100), None).unwrap();
    assert_eq!(everything.result.len(), 4);
    for id in everything.ids() {
        let set = service.get(&codec::encode_str(id)).unwrap();
        assert_eq!(
            set,
            vec![
                SpecificAssetId::new("round", "19"),
                SpecificAssetId::new("pair", "19")
            ]
        );
    }
}
