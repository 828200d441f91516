use tracing::trace;

use crate::{
    batch,
    tree::{signalify, ArrayEntry, ArrayKeys, NodeValue, TreeNode},
    ActionContext, Value,
};


/// Merges `incoming` into `node` in place.
///
/// Branches present on both sides are updated recursively, so cells of unchanged leaves keep
/// their identity and do not notify. New branches get fresh cells (and fresh identity keys for
/// array entries). Unless `is_partial`, object keys and array tail entries missing from
/// `incoming` are dropped. `is_partial` applies to the top level only; nested values are merged
/// as full values.
///
/// An `undefined` incoming value leaves the node untouched, so this cannot clear a field to
/// `undefined`; use [`set`](crate::set) for that.
pub fn reconcile(node: &TreeNode, incoming: &Value, is_partial: bool, keys: &ArrayKeys) {
    if incoming.is_undefined() {
        return;
    }
    trace!(is_partial, kind = %incoming.kind(), "reconcile");
    batch(|ac| reconcile_in(node, incoming, is_partial, keys, ac));
}

fn reconcile_in(
    node: &TreeNode,
    incoming: &Value,
    is_partial: bool,
    keys: &ArrayKeys,
    ac: &mut ActionContext,
) {
    match incoming {
        Value::Undefined => {}
        Value::Array(items) => reconcile_array(node, items, is_partial, keys, ac),
        Value::Object(map) => reconcile_object(node, map, is_partial, keys, ac),
        leaf => node.write(NodeValue::Leaf(leaf.clone()), ac),
    }
}

fn reconcile_array(
    node: &TreeNode,
    items: &[Value],
    is_partial: bool,
    keys: &ArrayKeys,
    ac: &mut ActionContext,
) {
    if !matches!(&*node.borrow_peek(), NodeValue::Array(_)) {
        node.write(NodeValue::empty_array(), ac);
    }
    let existing: Vec<TreeNode> = match &*node.borrow_peek() {
        NodeValue::Array(entries) => entries.iter().map(|e| e.node.clone()).collect(),
        _ => Vec::new(),
    };
    for (child, item) in existing.iter().zip(items) {
        reconcile_in(child, item, false, keys, ac);
    }

    let appended: Vec<ArrayEntry> = items
        .iter()
        .skip(existing.len())
        .map(|item| ArrayEntry::new(item, keys))
        .collect();
    let truncate = !is_partial && existing.len() > items.len();
    if appended.is_empty() && !truncate {
        return;
    }
    if let NodeValue::Array(entries) = &mut *node.state().borrow_mut(ac) {
        entries.extend(appended);
        if truncate {
            entries.truncate(items.len());
        }
    }
}

fn reconcile_object(
    node: &TreeNode,
    map: &crate::value::Object,
    is_partial: bool,
    keys: &ArrayKeys,
    ac: &mut ActionContext,
) {
    if !matches!(&*node.borrow_peek(), NodeValue::Object(_)) {
        node.write(NodeValue::empty_object(), ac);
    }
    let mut added = Vec::new();
    for (key, item) in map {
        match node.child(&key.as_str().into()) {
            Some(child) => reconcile_in(&child, item, false, keys, ac),
            None => added.push((key.clone(), signalify(item, keys))),
        }
    }
    let stale: Vec<String> = if is_partial {
        Vec::new()
    } else {
        match &*node.borrow_peek() {
            NodeValue::Object(children) => children
                .keys()
                .filter(|key| !map.contains_key(*key))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    };
    if added.is_empty() && stale.is_empty() {
        return;
    }
    if let NodeValue::Object(children) = &mut *node.state().borrow_mut(ac) {
        children.extend(added);
        for key in &stale {
            children.shift_remove(key);
        }
    }
}
