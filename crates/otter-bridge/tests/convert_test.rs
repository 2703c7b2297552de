//! Integration tests for host to script value conversion

mod common;

use common::Harness;
use otter_bridge::{BridgeConfig, BridgeError, HostFixture, LocalRef, Marshaller, inspect};
use serde_json::json;

#[test]
fn test_null_converts_to_null() {
    let h = Harness::new();
    let value = h.convert(json!({ "type": "null" })).unwrap();
    assert!(value.is_null());
    assert!(!h.realm.has_exception());
}

#[test]
fn test_boxed_scalars() {
    let h = Harness::new();

    let value = h.convert(json!({ "type": "int", "value": 42 })).unwrap();
    assert_eq!(value.as_number(), Some(42.0));
    assert_eq!(value.as_int(), None);

    let value = h
        .convert(json!({ "type": "long", "value": 9_007_199_254_740_993_i64 }))
        .unwrap();
    assert_eq!(value.as_int(), Some(9_007_199_254_740_993));

    let value = h.convert(json!({ "type": "float", "value": 0.1 })).unwrap();
    assert_eq!(value.as_number(), Some(f64::from(0.1_f32)));

    let value = h.convert(json!({ "type": "double", "value": -2.5 })).unwrap();
    assert_eq!(value.as_number(), Some(-2.5));

    let value = h.convert(json!({ "type": "boolean", "value": false })).unwrap();
    assert_eq!(value.as_bool(), Some(false));

    let value = h.convert(json!({ "type": "string", "value": "héllo" })).unwrap();
    assert_eq!(value.as_str(), Some("héllo"));
}

#[test]
fn test_nested_object() {
    let h = Harness::new();
    let value = h
        .convert(json!({ "type": "object", "entries": [
            { "key": { "type": "string", "value": "a" }, "value": { "type": "int", "value": 1 } },
            { "key": { "type": "string", "value": "b" }, "value": { "type": "list", "items": [
                { "type": "boolean", "value": true },
                { "type": "string", "value": "x" }
            ] } }
        ] }))
        .unwrap();

    assert_eq!(inspect(&value), r#"{ a: 1, b: [ true, "x" ] }"#);
    assert_eq!(value.keys().unwrap(), vec!["a", "b"]);
    assert!(value.get("b").unwrap().is_array());
}

#[test]
fn test_lists() {
    let h = Harness::new();
    let value = h.convert(json!({ "type": "list" })).unwrap();
    assert_eq!(inspect(&value), "[]");

    let value = h
        .convert(json!({
            "type": "list",
            "class": "java.util.Collections$UnmodifiableRandomAccessList",
            "items": [ { "type": "null" }, { "type": "unit" } ]
        }))
        .unwrap();
    assert_eq!(inspect(&value), "[ null, undefined ]");
}

#[test]
fn test_map_builds_map_instance() {
    let h = Harness::new();
    let value = h
        .convert(json!({ "type": "map", "entries": [
            { "key": { "type": "string", "value": "k" }, "value": { "type": "int", "value": 1 } },
            { "key": { "type": "int", "value": 2 }, "value": { "type": "list" } }
        ] }))
        .unwrap();

    assert!(value.is_map());
    assert_eq!(inspect(&value), r#"Map(2) { "k" => 1, 2 => [] }"#);
}

#[test]
fn test_set_builds_set_instance() {
    let h = Harness::new();
    let value = h
        .convert(json!({ "type": "set", "items": [
            { "type": "string", "value": "a" },
            { "type": "string", "value": "b" },
            { "type": "null" }
        ] }))
        .unwrap();
    assert!(value.is_set());
    assert_eq!(inspect(&value), r#"Set(3) { "a", "b", null }"#);

    // Distinct host members may convert to the same script value
    let value = h
        .convert(json!({ "type": "set", "items": [
            { "type": "int", "value": 1 },
            { "type": "long", "value": 1 }
        ] }))
        .unwrap();
    assert_eq!(inspect(&value), "Set(1) { 1 }");
}

#[test]
fn test_custom_map_constructor() {
    let h = Harness::new();
    h.realm
        .define_global("HostMap", h.realm.global("Map").unwrap());
    h.realm.remove_global("Map");

    let config = BridgeConfig::new().map_constructor("HostMap");
    let value = h
        .convert_with(json!({ "type": "map" }), config)
        .unwrap();
    assert_eq!(inspect(&value), "Map(0) {}");
}

#[test]
fn test_throwable() {
    let h = Harness::new();
    let value = h
        .convert(json!({
            "type": "throwable",
            "class": "java.lang.IllegalStateException",
            "stack": [
                { "class_name": "com.example.Foo", "method": "bar", "file": "Foo.kt", "line": 12 },
                { "class_name": "com.example.Main", "method": "main" }
            ]
        }))
        .unwrap();

    assert!(value.is_error());
    assert_eq!(
        value.get("name").unwrap().as_str(),
        Some("java.lang.IllegalStateException")
    );
    assert_eq!(value.get("message").unwrap().as_str(), Some(""));
    let stack: Vec<String> = value
        .get("stack")
        .unwrap()
        .array_items()
        .unwrap()
        .iter()
        .map(|frame| frame.as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        stack,
        vec![
            "com.example.Foo.bar(Foo.kt:12)",
            "com.example.Main.main(Unknown Source)"
        ]
    );
}

#[test]
fn test_throwable_inside_list() {
    let h = Harness::new();
    let value = h
        .convert(json!({ "type": "list", "items": [
            { "type": "throwable", "class": "java.lang.RuntimeException", "message": "boom" }
        ] }))
        .unwrap();
    assert_eq!(inspect(&value), "[ [java.lang.RuntimeException: boom] ]");
}

#[test]
fn test_primitive_arrays() {
    let h = Harness::new();

    let value = h
        .convert(json!({ "type": "int_array", "values": [1, 2, 3] }))
        .unwrap();
    assert_eq!(inspect(&value), "[ 1, 2, 3 ]");
    let items = value.array_items().unwrap();
    assert!(items.iter().all(|item| item.as_int().is_some()));

    let value = h
        .convert(json!({ "type": "long_array", "values": [i64::MAX, -1] }))
        .unwrap();
    assert_eq!(value.array_items().unwrap()[0].as_int(), Some(i64::MAX));

    let value = h
        .convert(json!({ "type": "double_array", "values": [0.5, -1.0] }))
        .unwrap();
    assert_eq!(inspect(&value), "[ 0.5, -1 ]");

    let value = h
        .convert(json!({ "type": "float_array", "values": [1.5] }))
        .unwrap();
    assert_eq!(value.array_items().unwrap()[0].as_number(), Some(1.5));

    let value = h
        .convert(json!({ "type": "boolean_array", "values": [true, false] }))
        .unwrap();
    assert_eq!(inspect(&value), "[ true, false ]");

    let value = h
        .convert(json!({ "type": "int_array", "values": [] }))
        .unwrap();
    assert_eq!(inspect(&value), "[]");
}

#[test]
fn test_object_array() {
    let h = Harness::new();
    let value = h
        .convert(json!({ "type": "object_array", "items": [
            { "type": "string", "value": "a" },
            { "type": "null" },
            { "type": "int_array", "values": [7] }
        ] }))
        .unwrap();
    assert_eq!(inspect(&value), r#"[ "a", null, [ 7 ] ]"#);
}

#[test]
fn test_unit_converts_to_undefined() {
    let h = Harness::new();
    let value = h.convert(json!({ "type": "unit" })).unwrap();
    assert!(value.is_undefined());

    let config = BridgeConfig::new().unit_class("java.lang.Void");
    let value = h
        .convert_with(json!({ "type": "opaque", "class": "java.lang.Void" }), config)
        .unwrap();
    assert!(value.is_undefined());
}

#[test]
fn test_unsupported_type() {
    let h = Harness::new();
    let baseline = h.realm.live_objects();
    let result = h.convert(json!({ "type": "opaque", "class": "java.lang.Thread" }));
    assert!(result.is_err());

    let (name, message) = h.exception();
    assert_eq!(name, "TypeMappingError");
    assert_eq!(
        message,
        "Cannot convert host type 'java.lang.Thread' to a js value."
    );
    h.assert_released(baseline);
}

#[test]
fn test_non_string_key_discards_object() {
    let h = Harness::new();
    let baseline = h.realm.live_objects();
    let result = h.convert(json!({ "type": "object", "entries": [
        { "key": { "type": "string", "value": "a" }, "value": { "type": "list" } },
        { "key": { "type": "int", "value": 1 }, "value": { "type": "int", "value": 2 } }
    ] }));
    assert!(result.is_err());

    let (name, message) = h.exception();
    assert_eq!(name, "TypeMappingError");
    assert!(message.contains("only string keys are supported"));
    h.assert_released(baseline);
}

#[test]
fn test_null_key_is_not_a_string() {
    let h = Harness::new();
    let result = h.convert(json!({ "type": "object", "entries": [
        { "key": { "type": "null" }, "value": { "type": "int", "value": 2 } }
    ] }));
    assert!(result.is_err());
    assert_eq!(h.exception().0, "TypeMappingError");
}

#[test]
fn test_missing_set_constructor() {
    let h = Harness::new();
    h.realm.remove_global("Set");
    let baseline = h.realm.live_objects();

    let result = h.convert(json!({ "type": "set", "items": [ { "type": "int", "value": 1 } ] }));
    assert!(result.is_err());
    let (name, message) = h.exception();
    assert_eq!(name, "TypeMappingError");
    assert_eq!(message, "JS constructor 'Set' not found.");
    h.assert_released(baseline);
}

#[test]
fn test_failed_set_member_yields_no_set() {
    let h = Harness::new();
    let baseline = h.realm.live_objects();
    let result = h.convert(json!({ "type": "set", "items": [
        { "type": "string", "value": "ok" },
        { "type": "opaque", "class": "java.io.File" }
    ] }));
    assert!(result.is_err());
    assert_eq!(h.exception().0, "TypeMappingError");
    assert!(!h.realm.has_exception());
    h.assert_released(baseline);
}

#[test]
fn test_failed_object_array_element_propagates() {
    let h = Harness::new();
    let baseline = h.realm.live_objects();
    let result = h.convert(json!({ "type": "object_array", "items": [
        { "type": "int", "value": 1 },
        { "type": "list", "items": [ { "type": "opaque", "class": "java.net.Socket" } ] }
    ] }));
    assert!(result.is_err());
    let (_, message) = h.exception();
    assert!(message.contains("java.net.Socket"));
    h.assert_released(baseline);
}

#[test]
fn test_host_fault_is_internal_error() {
    let h = Harness::new();
    let baseline = h.realm.live_objects();
    let list = h
        .build(json!({ "type": "list", "items": [ { "type": "int", "value": 1 } ] }))
        .unwrap();
    h.heap.fail_element_access(list);

    let result = h.convert_root(Some(list), BridgeConfig::default());
    assert!(result.is_err());
    let (name, message) = h.exception();
    assert_eq!(name, "InternalError");
    assert!(message.contains("element access failed"));
    h.assert_released(baseline);
}

#[test]
fn test_try_convert_raises_nothing() {
    let h = Harness::new();
    let fixture = HostFixture::from_json(r#"{ "type": "opaque", "class": "java.lang.Thread" }"#)
        .unwrap();
    let root = fixture.build(&h.heap).unwrap().unwrap();
    let local = LocalRef::new(&h.heap, h.heap.local(root));

    let result = Marshaller::new(&h.heap, &h.realm).try_convert(Some(&*local));
    assert!(matches!(
        result,
        Err(BridgeError::UnsupportedType(ref class)) if class == "java.lang.Thread"
    ));
    assert!(!h.realm.has_exception());
}

#[test]
fn test_successful_conversion_releases_host_refs() {
    let h = Harness::new();
    let baseline = h.realm.live_objects();
    let value = h
        .convert(json!({ "type": "map", "entries": [
            { "key": { "type": "string", "value": "xs" }, "value": { "type": "set", "items": [
                { "type": "long_array", "values": [1, 2] }
            ] } }
        ] }))
        .unwrap();
    assert_eq!(h.heap.live_local_refs(), 0);
    assert!(h.realm.live_objects() > baseline);

    drop(value);
    h.assert_released(baseline);
}
