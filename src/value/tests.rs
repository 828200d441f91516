use chrono::DateTime;
use rstest::rstest;
use serde_json::json;

use crate::{Blob, PathSegment, Value, ValueError, ValueKind};

#[rstest]
#[case(Value::Undefined, false)]
#[case(Value::Null, false)]
#[case(false.into(), false)]
#[case(0.into(), false)]
#[case(f64::NAN.into(), false)]
#[case("".into(), false)]
#[case(true.into(), true)]
#[case((-1).into(), true)]
#[case("0".into(), true)]
#[case(Value::object(), true)]
#[case(Value::Array(Vec::new()), true)]
fn truthiness(#[case] value: Value, #[case] expected: bool) {
    assert_eq!(value.is_truthy(), expected);
}

#[test]
fn from_json() {
    let value = Value::from(json!({"a": [1, "x", null, true], "b": {}}));
    let Value::Object(map) = &value else {
        panic!("expected object, got {value:?}");
    };
    assert_eq!(map.keys().collect::<Vec<_>>(), ["a", "b"]);
    assert_eq!(
        map["a"],
        Value::Array(vec![1.into(), "x".into(), Value::Null, true.into()])
    );
    assert_eq!(map["b"].kind(), ValueKind::Object);
}

#[test]
fn json_key_order_is_kept() {
    let value = Value::from(json!({"name": 1, "tags": [], "address": {"zip": 2, "city": 3}}));
    let map = value.as_object().unwrap();
    assert_eq!(map.keys().collect::<Vec<_>>(), ["name", "tags", "address"]);
    let address = map["address"].as_object().unwrap();
    assert_eq!(address.keys().collect::<Vec<_>>(), ["zip", "city"]);

    let json = value.to_json().unwrap().to_string();
    assert_eq!(json, r#"{"name":1,"tags":[],"address":{"zip":2,"city":3}}"#);
}

#[test]
fn to_json() {
    let date = DateTime::from_timestamp_millis(1_500).unwrap();
    let value = Value::from_iter([
        ("n", Value::from(1.5)),
        ("d", date.into()),
        ("list", vec![Value::Null, "s".into()].into()),
    ]);
    assert_eq!(
        value.to_json().unwrap(),
        json!({"n": 1.5, "d": "1970-01-01T00:00:01.500Z", "list": [null, "s"]})
    );
}

#[rstest]
#[case(Value::Undefined, "", ValueKind::Undefined)]
#[case(Value::from_iter([("a", vec![Value::from(1), Value::Undefined])]), "a.1", ValueKind::Undefined)]
#[case(Value::from_iter([("f", Blob::new("f.bin", vec![1u8]))]), "f", ValueKind::Blob)]
#[case(Value::from_iter([("x", f64::INFINITY)]), "x", ValueKind::Number)]
fn to_json_unrepresentable(#[case] value: Value, #[case] path: &str, #[case] kind: ValueKind) {
    assert_eq!(
        value.to_json(),
        Err(ValueError::Unrepresentable {
            path: path.into(),
            kind
        })
    );
}

#[test]
fn error_message() {
    let e = Value::from_iter([("a", Value::Undefined)]).to_json().unwrap_err();
    assert_eq!(e.to_string(), "undefined at `a` has no JSON representation");
}

#[test]
fn serialize() {
    let value = Value::from_iter([("a", Value::Undefined), ("b", 2.into())]);
    assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":null,"b":2}"#);
    assert!(serde_json::to_string(&Value::from(Blob::new("f", Vec::<u8>::new()))).is_err());
}

#[test]
fn child_by_numeric_key() {
    let value = Value::from(json!({"0": "zero", "list": ["a"]}));
    assert_eq!(value.child(&PathSegment::Index(0)), Some(&Value::from("zero")));
    assert_eq!(
        value.child(&"list".into()).and_then(|l| l.child(&PathSegment::Index(0))),
        Some(&Value::from("a"))
    );
    assert_eq!(
        value.child(&"list".into()).and_then(|l| l.child(&"0".into())),
        None
    );
}

#[test]
fn option_conversion() {
    assert!(Value::from(None::<i32>).is_undefined());
    assert_eq!(Value::from(Some("x")), Value::from("x"));
}

#[test]
fn kind_display() {
    assert_eq!(ValueKind::Undefined.to_string(), "undefined");
    assert_eq!(Value::from(Blob::new("f", Vec::<u8>::new())).kind().to_string(), "blob");
}
