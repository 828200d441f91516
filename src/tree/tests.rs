use assert_call::{call, CallRecorder};
use rstest::rstest;
use serde_json::json;

use crate::{
    batch, effect, get_reactive, remove, set, signalify, unsignalify, unsignalify_subscribed,
    ArrayKeys, NodeValue, SignalTree, TreeNode, Value, MAX_ARRAY_PADDING,
};

fn value(json: serde_json::Value) -> Value {
    json.into()
}

#[test]
fn signalify_round_trip() {
    let v = value(json!({"a": [1, {"b": null}], "c": "x"}));
    let keys = ArrayKeys::new();
    let tree = signalify(&v, &keys);
    assert_eq!(unsignalify(&tree), v);
    assert_eq!(tree.array_keys(), None);
    assert!(get_reactive(&tree, "a").unwrap().array_keys().is_some());
}

#[test]
fn signalify_keeps_opaque_leaves_whole() {
    let date = chrono::DateTime::from_timestamp_millis(0).unwrap();
    let v = Value::from_iter([("when", date)]);
    let tree = signalify(&v, &ArrayKeys::new());
    let when = get_reactive(&tree, "when").unwrap();
    assert!(matches!(when.peek(), NodeValue::Leaf(Value::Date(d)) if d == date));
}

#[test]
fn array_keys_are_unique_across_trees() {
    let keys = ArrayKeys::new();
    let a = signalify(&value(json!([1, 2])), &keys);
    let b = signalify(&value(json!([3])), &keys);
    assert_eq!(a.array_keys(), Some(vec![0, 1]));
    assert_eq!(b.array_keys(), Some(vec![2]));
    assert_eq!(keys.peek_next(), 3);
}

#[test]
fn get_reactive_returns_none_for_missing() {
    let tree = SignalTree::new(value(json!({"a": {"b": 1}, "list": [1]})));
    assert!(tree.get("a.b").is_some());
    assert!(tree.get("a.c").is_none());
    assert!(tree.get("a.b.c").is_none());
    assert!(tree.get("list.1").is_none());
    assert!(tree.get("").is_none());

    let empty = SignalTree::new(Value::Null);
    assert!(empty.get("a").is_none());
}

#[test]
fn remove_keeps_identity_keys_of_remaining_entries() {
    let tree = SignalTree::new(value(json!({"arr": [10, 20, 30]})));
    let arr = tree.get("arr").unwrap();
    assert_eq!(arr.array_keys(), Some(vec![0, 1, 2]));
    let third = tree.get("arr.2").unwrap();

    assert!(tree.remove("arr.1"));

    assert_eq!(arr.array_keys(), Some(vec![0, 2]));
    assert!(TreeNode::ptr_eq(&tree.get("arr.1").unwrap(), &third));
    assert_eq!(tree.snapshot(), value(json!({"arr": [10, 30]})));
}

#[test]
fn remove_object_key() {
    let tree = SignalTree::new(value(json!({"a": 1, "b": 2, "c": 3})));
    assert!(tree.remove("b"));
    assert_eq!(tree.snapshot(), value(json!({"a": 1, "c": 3})));
    let Value::Object(map) = tree.snapshot() else {
        unreachable!()
    };
    assert_eq!(map.keys().collect::<Vec<_>>(), ["a", "c"]);
}

#[test]
fn remove_missing_does_not_notify() {
    let mut cr = CallRecorder::new();
    let tree = SignalTree::new(value(json!({"a": {"b": 1}, "list": [1]})));
    let _e = effect({
        let tree = tree.clone();
        move |sc| call!("{}", tree.snapshot_subscribed(sc).to_json().unwrap())
    });
    cr.verify(r#"{"a":{"b":1},"list":[1]}"#);

    assert!(!tree.remove("a.c"));
    assert!(!tree.remove("x.y"));
    assert!(!tree.remove("list.3"));
    assert!(!tree.remove(""));
    cr.verify(());
}

#[test]
fn set_creates_intermediate_containers() {
    let tree = SignalTree::new(Value::object());
    let node = tree.set("a.b.0", "x").unwrap();
    assert!(TreeNode::ptr_eq(&node, &tree.get("a.b.0").unwrap()));
    assert_eq!(tree.snapshot(), value(json!({"a": {"b": ["x"]}})));
}

#[rstest]
#[case(Value::Undefined)]
#[case(Value::Null)]
#[case(false.into())]
#[case(0.into())]
#[case(f64::NAN.into())]
#[case("".into())]
fn set_on_valueless_root(#[case] root: Value) {
    let tree = SignalTree::new(root.clone());
    tree.set("name", "n");
    assert_eq!(tree.snapshot(), value(json!({"name": "n"})));

    let tree = SignalTree::new(root);
    tree.set("0", 1);
    assert_eq!(tree.snapshot(), Value::from_iter([("0", 1)]));
}

#[test]
fn falsy_root_has_no_children() {
    let tree = SignalTree::new(Value::from(0));
    assert!(tree.get("0").is_none());
    assert!(!tree.remove("0"));
    assert_eq!(tree.snapshot(), Value::from(0));
}

#[test]
fn nested_array_keys_assigned_parent_first() {
    let keys = ArrayKeys::new();
    let tree = signalify(&value(json!([[1], [2, 3]])), &keys);
    assert_eq!(tree.array_keys(), Some(vec![0, 2]));
    assert_eq!(get_reactive(&tree, "0").unwrap().array_keys(), Some(vec![1]));
    assert_eq!(get_reactive(&tree, "1").unwrap().array_keys(), Some(vec![3, 4]));
}

#[test]
fn set_nested_array_keys_assigned_parent_first() {
    let tree = SignalTree::new(value(json!({"list": [1]})));
    tree.set("list.1", value(json!([7, 8])));
    assert_eq!(tree.get("list").unwrap().array_keys(), Some(vec![0, 1]));
    assert_eq!(tree.get("list.1").unwrap().array_keys(), Some(vec![2, 3]));
}

#[test]
fn set_far_past_array_end_is_rejected() {
    let tree = SignalTree::new(value(json!({"list": [1]})));
    let far = MAX_ARRAY_PADDING + 2;
    assert!(tree.set(format!("list.{far}").as_str(), 2).is_none());
    assert!(tree.set(format!("fresh.{far}").as_str(), 2).is_none());
    assert!(tree.set(format!("list.0.{far}").as_str(), 2).is_none());
    assert_eq!(tree.snapshot(), value(json!({"list": [1]})));
}

#[test]
fn set_large_numeric_key_on_object_is_allowed() {
    let far = MAX_ARRAY_PADDING * 4;
    let tree = SignalTree::new(value(json!({"byId": {}})));
    assert!(tree.set(format!("byId.{far}").as_str(), 1).is_some());
    let tree = SignalTree::new(Value::Undefined);
    assert!(tree.set(format!("{far}").as_str(), 1).is_some());
    assert_eq!(tree.snapshot(), Value::from_iter([(far.to_string(), 1)]));
}

#[test]
fn set_pads_array_holes() {
    let tree = SignalTree::new(value(json!({"list": [1]})));
    tree.set("list.3", 4);
    assert_eq!(
        tree.snapshot(),
        Value::from_iter([(
            "list",
            Value::Array(vec![1.into(), Value::Undefined, Value::Undefined, 4.into()])
        )])
    );
}

#[test]
fn set_replaces_leaf_on_the_way() {
    let tree = SignalTree::new(value(json!({"a": 1})));
    tree.set("a.b", true);
    assert_eq!(tree.snapshot(), value(json!({"a": {"b": true}})));
}

#[test]
fn set_existing_array_index_assigns_fresh_key() {
    let tree = SignalTree::new(value(json!({"list": [1, 2]})));
    tree.set("list.0", 5);
    assert_eq!(tree.get("list").unwrap().array_keys(), Some(vec![2, 1]));
    assert_eq!(tree.snapshot(), value(json!({"list": [5, 2]})));
}

#[test]
fn set_numeric_segment_on_object_uses_string_key() {
    let tree = SignalTree::new(value(json!({"byId": {}})));
    tree.set("byId.7", "seven");
    assert_eq!(tree.snapshot(), value(json!({"byId": {"7": "seven"}})));
}

#[test]
fn set_empty_path_is_noop() {
    let tree = SignalTree::new(value(json!({"a": 1})));
    assert!(tree.set("", 2).is_none());
    assert_eq!(tree.snapshot(), value(json!({"a": 1})));
}

#[test]
fn set_is_observed_atomically() {
    let mut cr = CallRecorder::new();
    let tree = SignalTree::new(Value::object());
    let _e = effect({
        let tree = tree.clone();
        move |sc| call!("{}", tree.snapshot_subscribed(sc).to_json().unwrap())
    });
    cr.verify("{}");

    tree.set("a.b.c", 1);
    cr.verify(r#"{"a":{"b":{"c":1}}}"#);
}

#[test]
fn free_functions_share_batch_with_caller() {
    let mut cr = CallRecorder::new();
    let keys = ArrayKeys::new();
    let root = signalify(&value(json!({"a": 1, "b": 2})), &keys);
    let _e = effect({
        let root = root.clone();
        move |sc| call!("{}", unsignalify_subscribed(&root, sc).to_json().unwrap())
    });
    cr.verify(r#"{"a":1,"b":2}"#);

    batch(|_| {
        set(&root, "a", 10, &keys);
        remove(&root, "b");
    });
    cr.verify(r#"{"a":10}"#);
}

#[test]
fn leaf_write_with_equal_value_does_not_notify() {
    let mut cr = CallRecorder::new();
    let node = TreeNode::leaf("x");
    let _e = effect({
        let node = node.clone();
        move |sc| call!("{:?}", node.get(sc))
    });
    cr.verify(r#"Leaf(String("x"))"#);

    batch(|ac| node.write(NodeValue::Leaf("x".into()), ac));
    cr.verify(());

    batch(|ac| node.write(NodeValue::Leaf("y".into()), ac));
    cr.verify(r#"Leaf(String("y"))"#);
}

#[test]
fn nan_leaf_rewrite_does_not_notify() {
    let mut cr = CallRecorder::new();
    let tree = SignalTree::new(Value::from_iter([("score", f64::NAN)]));
    let _e = effect({
        let node = tree.get("score").unwrap();
        move |sc| call!("{:?}", node.get(sc))
    });
    cr.verify("Leaf(Number(NaN))");

    tree.reconcile(&Value::from_iter([("score", f64::NAN)]), false);
    cr.verify(());

    tree.reconcile(&Value::from_iter([("score", 1)]), false);
    cr.verify("Leaf(Number(1.0))");
}

#[test]
fn subscribed_snapshot_tracks_nested_leaf() {
    let mut cr = CallRecorder::new();
    let tree = SignalTree::new(value(json!({"a": {"b": 1}})));
    let _e = effect({
        let tree = tree.clone();
        move |sc| call!("{}", tree.snapshot_subscribed(sc).to_json().unwrap())
    });
    cr.verify(r#"{"a":{"b":1}}"#);

    let b = tree.get("a.b").unwrap();
    batch(|ac| b.write(NodeValue::Leaf(2.into()), ac));
    cr.verify(r#"{"a":{"b":2}}"#);
}
