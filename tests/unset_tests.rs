use serde_json::json;
use treepath::{unset, PathError, Value};

fn v(data: serde_json::Value) -> Value {
    Value::from(data)
}

fn apply(data: &mut Value, path: &str) {
    unset(data, path, false).unwrap();
}

#[test]
fn test_unset_nested_key() {
    let mut data = v(json!({"a": {"b": {"c": 1, "d": 2}}}));
    apply(&mut data, "a.b.c");
    assert_eq!(data, v(json!({"a": {"b": {"d": 2}}})));
}

#[test]
fn test_unset_mapped_key_from_all_elements() {
    let mut data = v(json!({"a": {"b": [{"c": 1, "d": 10}, {"c": 2, "d": 20}]}}));
    apply(&mut data, "a.b[].c");
    assert_eq!(data, v(json!({"a": {"b": [{"d": 10}, {"d": 20}]}})));
}

#[test]
fn test_unset_terminal_map_empties_the_sequence() {
    let mut data = v(json!({"a": {"b": [1, 2, 3]}}));
    apply(&mut data, "a.b[]");
    assert_eq!(data, v(json!({"a": {"b": []}})));
}

#[test]
fn test_unset_key_from_filter_matches() {
    let mut data = v(json!({"a": {"b": [{"id": 1, "c": 10}, {"id": 2, "c": 20}]}}));
    apply(&mut data, "a.b[?id==2].c");
    assert_eq!(data, v(json!({"a": {"b": [{"id": 1, "c": 10}, {"id": 2}]}})));
}

#[test]
fn test_unset_removes_filter_matches_at_terminal() {
    let mut data = v(json!({"a": {"users": [{"id": 1}, {"id": 2}, {"id": 3}]}}));
    apply(&mut data, "a.users[?id>1]");
    assert_eq!(data, v(json!({"a": {"users": [{"id": 1}]}})));
}

#[test]
fn test_unset_scalar_elements_with_self_predicate() {
    let mut data = v(json!({"a": {"b": [1, 2, 3, 4, 5]}}));
    apply(&mut data, "a.b[?.|$even==true]");
    assert_eq!(data, v(json!({"a": {"b": [1, 3, 5]}})));

    let mut data = v(json!({"a": {"b": [1, 2, 3, 4, 5]}}));
    apply(&mut data, "a.b[?.|$even==false]");
    assert_eq!(data, v(json!({"a": {"b": [2, 4]}})));
}

#[test]
fn test_unset_scalar_elements_with_threshold_predicate() {
    let mut data = v(json!({"a": {"b": [1, 2, 3, 4, 5]}}));
    apply(&mut data, "a.b[?.|$gt(3)==false]");
    assert_eq!(data, v(json!({"a": {"b": [4, 5]}})));
}

#[test]
fn test_unset_list_index() {
    let mut data = v(json!({"a": {"b": [{"id": 1}, {"id": 2}, {"id": 3}]}}));
    apply(&mut data, "a.b[1]");
    assert_eq!(data, v(json!({"a": {"b": [{"id": 1}, {"id": 3}]}})));

    apply(&mut data, "a.b[-1]");
    assert_eq!(data, v(json!({"a": {"b": [{"id": 1}]}})));
}

#[test]
fn test_unset_list_slice() {
    let mut data = v(json!({"a": {"b": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}]}}));
    apply(&mut data, "a.b[1:3]");
    assert_eq!(data, v(json!({"a": {"b": [{"id": 1}, {"id": 4}]}})));
}

#[test]
fn test_unset_stepped_slice() {
    let mut data = v(json!({"n": [0, 1, 2, 3, 4, 5]}));
    apply(&mut data, "n[::2]");
    assert_eq!(data, v(json!({"n": [1, 3, 5]})));
}

#[test]
fn test_unset_nested_key_through_slice() {
    let mut data = v(json!({"a": {"b": [
        {"id": 1, "c": 10},
        {"id": 2, "c": 20},
        {"id": 3, "c": 30}
    ]}}));
    apply(&mut data, "a.b[1:3].c");
    assert_eq!(
        data,
        v(json!({"a": {"b": [{"id": 1, "c": 10}, {"id": 2}, {"id": 3}]}}))
    );
}

#[test]
fn test_unset_wildcard_key() {
    let mut data = v(json!({"a": {
        "u1": {"debug": true, "id": 1},
        "u2": {"debug": false, "id": 2}
    }}));
    apply(&mut data, "a.*.debug");
    assert_eq!(data, v(json!({"a": {"u1": {"id": 1}, "u2": {"id": 2}}})));
}

#[test]
fn test_unset_terminal_wildcard_clears_container() {
    let mut data = v(json!({"a": {"b": {"x": 1, "y": 2}, "c": [1, 2]}}));
    apply(&mut data, "a.b.*");
    apply(&mut data, "a.c.*");
    assert_eq!(data, v(json!({"a": {"b": {}, "c": []}})));
}

#[test]
fn test_unset_deep_wildcard_key() {
    let mut data = v(json!({"a": {
        "g1": {"u1": {"debug": true, "id": 1}},
        "g2": {"nested": {"u2": {"debug": false, "id": 2}}}
    }}));
    apply(&mut data, "a.**.debug");
    assert_eq!(
        data,
        v(json!({"a": {
            "g1": {"u1": {"id": 1}},
            "g2": {"nested": {"u2": {"id": 2}}}
        }}))
    );
}

#[test]
fn test_unset_terminal_deep_wildcard_drops_leaves() {
    let mut data = v(json!({"a": {"x": 1, "b": {"y": 2, "z": {"w": 3}}}}));
    apply(&mut data, "a.**");
    assert_eq!(data, v(json!({"a": {"b": {"z": {}}}})));
}

#[test]
fn test_unset_missing_target_is_a_no_op() {
    let mut data = v(json!({"a": {"b": {"c": 1}}}));
    apply(&mut data, "a.b.x");
    apply(&mut data, "a.missing[0]");
    assert_eq!(data, v(json!({"a": {"b": {"c": 1}}})));
}

#[test]
fn test_unset_strict_raises_when_path_missing() {
    let mut data = v(json!({"a": {"b": {}}}));
    let err = unset(&mut data, "a.b.c", true).unwrap_err();
    assert!(matches!(err, PathError::Resolution { .. }));
}

#[test]
fn test_unset_rejects_root_token_at_any_position() {
    let mut data = v(json!({"a": {"b": {"c": 1}}, "x": 2}));
    let err = unset(&mut data, "a.b.$$root.x", false).unwrap_err();
    assert!(matches!(err, PathError::Parse { .. }));

    let err = unset(&mut data, "$$root.a", false).unwrap_err();
    assert!(matches!(err, PathError::Parse { .. }));
    assert_eq!(data, v(json!({"a": {"b": {"c": 1}}, "x": 2})));
}

#[test]
fn test_unset_root_sequence_selector() {
    let mut data = v(json!([{"id": 1}, {"id": 2}, {"id": 3}]));
    apply(&mut data, ".[?id>2]");
    assert_eq!(data, v(json!([{"id": 1}, {"id": 2}])));
}
