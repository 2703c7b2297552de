//! Circular reference and depth limit tests

mod common;

use common::Harness;
use otter_bridge::{BridgeConfig, CycleDetection, inspect};
use serde_json::json;

const CIRCULAR_MESSAGE: &str = "Unable to map objects with circular reference.";

fn assert_circular(h: &Harness, fixture: serde_json::Value) {
    let baseline = h.realm.live_objects();
    assert!(h.convert(fixture).is_err());
    let (name, message) = h.exception();
    assert_eq!(name, "CircularReferenceError");
    assert_eq!(message, CIRCULAR_MESSAGE);
    h.assert_released(baseline);
}

#[test]
fn test_list_containing_itself() {
    let h = Harness::new();
    assert_circular(
        &h,
        json!({ "type": "list", "items": [
            { "type": "int", "value": 1 },
            { "type": "self" }
        ] }),
    );
}

#[test]
fn test_set_containing_itself() {
    let h = Harness::new();
    assert_circular(&h, json!({ "type": "set", "items": [ { "type": "self" } ] }));
}

#[test]
fn test_map_key_and_value_cycles() {
    let h = Harness::new();
    assert_circular(
        &h,
        json!({ "type": "map", "entries": [
            { "key": { "type": "self" }, "value": { "type": "int", "value": 1 } }
        ] }),
    );
    assert_circular(
        &h,
        json!({ "type": "map", "entries": [
            { "key": { "type": "string", "value": "me" }, "value": { "type": "self" } }
        ] }),
    );
}

#[test]
fn test_object_and_array_cycles() {
    let h = Harness::new();
    assert_circular(
        &h,
        json!({ "type": "object", "entries": [
            { "key": { "type": "string", "value": "me" }, "value": { "type": "self" } }
        ] }),
    );
    assert_circular(
        &h,
        json!({ "type": "object", "entries": [
            { "key": { "type": "self" }, "value": { "type": "int", "value": 1 } }
        ] }),
    );
    assert_circular(
        &h,
        json!({ "type": "object_array", "items": [ { "type": "self" } ] }),
    );
}

#[test]
fn test_nested_self_reference_is_caught() {
    let h = Harness::new();
    assert_circular(
        &h,
        json!({ "type": "list", "items": [
            { "type": "list", "items": [ { "type": "self" } ] }
        ] }),
    );
}

#[test]
fn test_shared_reference_is_not_a_cycle() {
    for mode in [CycleDetection::Shallow, CycleDetection::Ancestors] {
        let h = Harness::new();
        let shared = h.heap.new_list();
        let root = h.heap.list_of([Some(shared), Some(shared)]);

        let value = h
            .convert_root(Some(root), BridgeConfig::new().cycle_detection(mode))
            .unwrap();
        assert_eq!(inspect(&value), "[ [], [] ]");
    }
}

/// `a = [b]`, `b = [a]`
fn indirect_cycle(h: &Harness) -> otter_bridge::HostRef {
    let a = h.heap.new_list();
    let b = h.heap.list_of([Some(a)]);
    h.heap.append(a, Some(b)).unwrap();
    a
}

#[test]
fn test_indirect_cycle_hits_depth_limit_when_shallow() {
    let h = Harness::new();
    let baseline = h.realm.live_objects();
    let root = indirect_cycle(&h);

    let result = h.convert_root(Some(root), BridgeConfig::new().max_depth(Some(64)));
    assert!(result.is_err());
    let (name, message) = h.exception();
    assert_eq!(name, "RangeError");
    assert_eq!(message, "Maximum conversion depth of 64 exceeded.");
    h.assert_released(baseline);
}

#[test]
fn test_indirect_cycle_hits_default_depth_limit() {
    let h = Harness::new();
    let baseline = h.realm.live_objects();

    // `a = { b: b }`, `b = { a: a }` through string-keyed objects
    let a = h.heap.new_js_object();
    let b = h.heap.new_js_object();
    h.heap.insert(a, Some(h.heap.string("b")), Some(b)).unwrap();
    h.heap.insert(b, Some(h.heap.string("a")), Some(a)).unwrap();

    assert!(h.convert_root(Some(a), BridgeConfig::default()).is_err());
    let (name, message) = h.exception();
    assert_eq!(name, "RangeError");
    assert_eq!(message, "Maximum conversion depth of 512 exceeded.");
    h.assert_released(baseline);

    // Same through host maps, whose entries nest one pair array deeper
    let a = h.heap.new_map();
    let b = h.heap.new_map();
    h.heap.insert(a, Some(h.heap.string("b")), Some(b)).unwrap();
    h.heap.insert(b, Some(h.heap.string("a")), Some(a)).unwrap();

    assert!(h.convert_root(Some(a), BridgeConfig::default()).is_err());
    assert_eq!(h.exception().0, "RangeError");
    h.assert_released(baseline);
}

#[test]
fn test_deep_nesting_without_limit() {
    let h = Harness::new();
    let mut root = h.heap.new_list();
    for _ in 0..2000 {
        root = h.heap.list_of([Some(root)]);
    }

    let value = h
        .convert_root(Some(root), BridgeConfig::new().max_depth(None))
        .unwrap();
    let mut depth = 0;
    let mut current = value;
    while let Some(items) = current.array_items() {
        depth += 1;
        match items.first() {
            Some(inner) => current = inner.clone(),
            None => break,
        }
    }
    assert_eq!(depth, 2001);
}

#[test]
fn test_zero_depth_means_unlimited() {
    let h = Harness::new();
    let mut config = BridgeConfig::default();
    config.max_depth = Some(0);

    let root = h.heap.list_of([Some(h.heap.new_list())]);
    let value = h.convert_root(Some(root), config).unwrap();
    assert_eq!(inspect(&value), "[ [] ]");
}

#[test]
fn test_indirect_cycle_detected_with_ancestors() {
    let h = Harness::new();
    let baseline = h.realm.live_objects();
    let root = indirect_cycle(&h);

    let config = BridgeConfig::new().cycle_detection(CycleDetection::Ancestors);
    assert!(h.convert_root(Some(root), config).is_err());
    let (name, _) = h.exception();
    assert_eq!(name, "CircularReferenceError");
    h.assert_released(baseline);
}

#[test]
fn test_depth_limit_boundary() {
    let h = Harness::new();
    let mut root = h.heap.new_list();
    for _ in 0..4 {
        root = h.heap.list_of([Some(root)]);
    }

    let value = h
        .convert_root(Some(root), BridgeConfig::new().max_depth(Some(5)))
        .unwrap();
    assert_eq!(inspect(&value), "[ [ [ [ [] ] ] ] ]");

    assert!(
        h.convert_root(Some(root), BridgeConfig::new().max_depth(Some(4)))
            .is_err()
    );
    assert_eq!(h.exception().0, "RangeError");

    assert!(
        h.convert_root(Some(root), BridgeConfig::new().max_depth(None))
            .is_ok()
    );
}
