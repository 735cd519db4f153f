//! The engine's cross-operation laws: round-trips, idempotence, the
//! strict contract, ordering guarantees and map fusion.

use serde_json::json;
use treepath::{exists, get, parse_path, set, unset, GetOptions, SetOptions, Value};

fn v(data: serde_json::Value) -> Value {
    Value::from(data)
}

fn fixture() -> Value {
    v(json!({
        "site": {"name": "demo", "tags": ["a", "b"]},
        "users": [
            {"id": 1, "name": "Ada", "score": 10},
            {"id": 2, "name": "Lin", "score": 20},
            {"id": 3, "name": "Mia", "score": 30}
        ]
    }))
}

#[test]
fn test_set_get_round_trip_on_leaf_paths() {
    for path in ["site.name", "users[1].score", "site.meta.created", "users[0].tags"] {
        let mut data = fixture();
        set(&mut data, path, v(json!("sentinel")), &SetOptions::default()).unwrap();
        assert_eq!(
            get(&data, path, &GetOptions::default()).unwrap(),
            v(json!("sentinel")),
            "round trip failed for '{}'",
            path
        );
    }
}

#[test]
fn test_set_is_idempotent() {
    let mut once = fixture();
    set(&mut once, "site.kind", v(json!("blog")), &SetOptions::default()).unwrap();
    let mut twice = fixture();
    set(&mut twice, "site.kind", v(json!("blog")), &SetOptions::default()).unwrap();
    set(&mut twice, "site.kind", v(json!("blog")), &SetOptions::default()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_unset_is_idempotent() {
    let mut once = fixture();
    unset(&mut once, "users[?id>1]", false).unwrap();
    let mut twice = fixture();
    unset(&mut twice, "users[?id>1]", false).unwrap();
    unset(&mut twice, "users[?id>1]", false).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_strict_contract() {
    let data = fixture();
    let strict = GetOptions {
        default: Value::Null,
        strict: true,
    };

    // every strict success matches the non-strict result
    for path in ["site.name", "users[?id==2].name[]", "users[0].score"] {
        let strict_result = get(&data, path, &strict).unwrap();
        let lax_result = get(&data, path, &GetOptions::default()).unwrap();
        assert_eq!(strict_result, lax_result, "strict mismatch for '{}'", path);
    }

    // every strict failure is a default / false / no-op without strict
    for path in ["site.missing", "users[9].name", "site.name.deeper"] {
        assert!(get(&data, path, &strict).is_err());
        assert_eq!(
            get(&data, path, &GetOptions::default()).unwrap(),
            Value::Null
        );
        assert!(!exists(&data, path, false).unwrap());

        let mut target = fixture();
        assert!(unset(&mut target, path, true).is_err());
        unset(&mut target, path, false).unwrap();
        assert_eq!(target, fixture());
    }
}

#[test]
fn test_mutation_through_the_same_binding() {
    let mut data = fixture();
    set(&mut data, "site.name", v(json!("renamed")), &SetOptions::default()).unwrap();
    unset(&mut data, "users[0]", false).unwrap();
    // the original binding observes both mutations
    assert_eq!(
        get(&data, "site.name", &GetOptions::default()).unwrap(),
        v(json!("renamed"))
    );
    assert_eq!(
        get(&data, "users|$len", &GetOptions::default()).unwrap(),
        v(json!(2))
    );
}

#[test]
fn test_parse_determinism() {
    for path in [
        "a.b.c",
        "users[?id>=2 && name==x].tags[1:5:2]|$len",
        "$$root[].v",
        ".[?.|$len>3]",
        "a.**.b[0]|$unique|$sorted(true)",
    ] {
        assert_eq!(parse_path(path).unwrap(), parse_path(path).unwrap());
    }
}

#[test]
fn test_wildcard_order_follows_insertion_order() {
    let data = v(json!({"m": {"z": 1, "a": 2, "k": 3}}));
    assert_eq!(
        get(&data, "m.*", &GetOptions::default()).unwrap(),
        v(json!([1, 2, 3]))
    );
}

#[test]
fn test_sequence_order_is_preserved() {
    let data = v(json!({"n": [5, 3, 9, 1]}));
    assert_eq!(
        get(&data, "n[?.>2]", &GetOptions::default()).unwrap(),
        v(json!([5, 3, 9]))
    );
}

#[test]
fn test_map_fusion() {
    let data = v(json!({"a": [{"b": 1}, {"b": 2}, {"x": 9}]}));
    let fused = get(&data, "a[].b", &GetOptions::default()).unwrap();

    let plain = get(&data, "a", &GetOptions::default()).unwrap();
    let by_hand: Vec<Value> = plain
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item.as_object().and_then(|map| map.get("b")).cloned())
        .collect();

    assert_eq!(fused, Value::Array(by_hand));
}

#[test]
fn test_boundary_cases() {
    let data = v(json!({"list": [1, 2, 3], "leaf": 7}));

    // whole document
    assert_eq!(get(&data, ".", &GetOptions::default()).unwrap(), data);
    // index -len is the first element
    assert_eq!(
        get(&data, "list[-3]", &GetOptions::default()).unwrap(),
        v(json!(1))
    );
    // empty slice is an empty sequence
    assert_eq!(
        get(&data, "list[1:1]", &GetOptions::default()).unwrap(),
        v(json!([]))
    );
    // deep wildcard over a leaf visits only that leaf
    assert_eq!(
        get(&data, "leaf.**", &GetOptions::default()).unwrap(),
        v(json!([7]))
    );
}
