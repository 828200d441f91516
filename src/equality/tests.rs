use chrono::DateTime;
use rstest::rstest;
use serde_json::json;

use crate::{get_left_unequal_paths, is_equal_deep, Blob, Value};

fn date(ms: i64) -> Value {
    Value::Date(DateTime::from_timestamp_millis(ms).unwrap())
}

fn nested_array(tail: Value) -> Value {
    Value::from_iter([(
        "nestedArray",
        Value::Array(vec![1.into(), Value::Undefined, Value::Null, date(0), tail]),
    )])
}

#[rstest]
#[case(1.into(), 1.into())]
#[case(Value::Null, Value::Null)]
#[case(Value::Undefined, Value::Undefined)]
#[case(date(0), date(0))]
#[case(json!({}).into(), json!({}).into())]
#[case(json!({"a": 1}).into(), json!({"a": 1}).into())]
#[case(json!({"a": 1, "b": {"c": 2}}).into(), json!({"a": 1, "b": {"c": 2}}).into())]
#[case(json!({"b": 2, "a": 1}).into(), json!({"a": 1, "b": 2}).into())]
#[case(nested_array("x".into()), nested_array("x".into()))]
fn equal(#[case] a: Value, #[case] b: Value) {
    assert!(is_equal_deep(&a, &b));
    assert!(is_equal_deep(&b, &a));
}

#[rstest]
#[case(1.into(), 2.into())]
#[case(Value::Null, Value::Undefined)]
#[case(Value::Undefined, Value::Null)]
#[case(date(0), date(1))]
#[case(json!({}).into(), json!({"a": 1}).into())]
#[case(json!({"a": 1}).into(), json!({"a": 2}).into())]
#[case(json!({"a": 1}).into(), json!({"aa": 1}).into())]
#[case(json!({"a": 1, "b": {"c": 2}}).into(), json!({"a": 1, "b": {"c": 3}}).into())]
#[case(json!([1, 2]).into(), json!({"0": 1, "1": 2}).into())]
#[case(json!("1").into(), json!(1).into())]
#[case(nested_array("x".into()), nested_array("y".into()))]
fn not_equal(#[case] a: Value, #[case] b: Value) {
    assert!(!is_equal_deep(&a, &b));
    assert!(!is_equal_deep(&b, &a));
}

#[test]
fn blobs_compare_by_handle() {
    let a = Blob::new("a.txt", b"same".to_vec());
    let b = Blob::new("a.txt", b"same".to_vec());
    assert!(is_equal_deep(&a.clone().into(), &a.clone().into()));
    assert!(!is_equal_deep(&a.into(), &b.into()));
}

#[rstest]
#[case(f64::NAN.into())]
#[case(Value::from_iter([("score", f64::NAN)]))]
#[case(Value::from(vec![f64::NAN, 1.0]))]
#[case(Value::Undefined)]
#[case(date(5))]
fn equal_to_itself(#[case] value: Value) {
    assert!(is_equal_deep(&value, &value));
    assert!(is_equal_deep(&value, &value.clone()));
    assert_eq!(get_left_unequal_paths(&value, &value), Vec::<String>::new());
}

#[test]
fn nan_is_not_equal_to_numbers() {
    assert!(!is_equal_deep(&f64::NAN.into(), &0.into()));
}

#[rstest]
#[case(1.into(), 1.into())]
#[case(Value::Null, Value::Null)]
#[case(Value::Undefined, Value::Undefined)]
#[case(date(0), date(0))]
#[case(json!({}).into(), json!({}).into())]
#[case(json!({"a": [1, {"b": null}]}).into(), json!({"a": [1, {"b": null}]}).into())]
fn no_unequal_paths(#[case] a: Value, #[case] b: Value) {
    assert_eq!(get_left_unequal_paths(&a, &b), Vec::<String>::new());
}

#[rstest]
#[case(1.into(), 2.into(), &[""])]
#[case(Value::Null, Value::Undefined, &[""])]
#[case(Value::Undefined, Value::Null, &[""])]
#[case(date(0), date(1), &[""])]
#[case(json!({"a": 1}).into(), json!({"a": 2}).into(), &["a"])]
#[case(json!({"a": 1}).into(), json!({"aa": 1}).into(), &["a"])]
#[case(json!({"a": 1, "b": {"c": 2}}).into(), json!({"a": 1, "b": {"c": 3}}).into(), &["b.c"])]
#[case(json!({"a": {"b": 1}}).into(), json!({"a": 1}).into(), &["a"])]
#[case(json!({"a": [1, 2]}).into(), json!({"a": [1]}).into(), &["a", "a.1"])]
#[case(json!({"a": [1]}).into(), json!({"a": [1, 2]}).into(), &["a"])]
fn unequal_paths(#[case] a: Value, #[case] b: Value, #[case] expected: &[&str]) {
    assert_eq!(get_left_unequal_paths(&a, &b), expected);
}

#[test]
fn unequal_paths_stop_at_each_divergence() {
    let file_a = Blob::new("fileA", Vec::<u8>::new());
    let file_b = Blob::new("fileB", Vec::<u8>::new());
    let a = Value::from_iter([(
        "nestedArray",
        Value::Array(vec![
            1.into(),
            Value::Undefined,
            Value::Null,
            date(5),
            json!({"deeply": {"nested": ["object", "missing"]}}).into(),
            file_a.into(),
        ]),
    )]);
    let b = Value::from_iter([(
        "nestedArray",
        Value::Array(vec![
            1.into(),
            Value::Undefined,
            Value::Null,
            date(1),
            json!({"deeply": {"nested": ["objectt"]}}).into(),
            file_b.into(),
        ]),
    )]);
    assert_eq!(
        get_left_unequal_paths(&a, &b),
        [
            "nestedArray.3",
            "nestedArray.4.deeply.nested",
            "nestedArray.4.deeply.nested.0",
            "nestedArray.4.deeply.nested.1",
            "nestedArray.5",
        ]
    );
}
