use std::{
    cell::{Cell, Ref},
    rc::Rc,
};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    batch, is_equal_deep,
    path::{Path, PathSegment},
    reconcile, ActionContext, SignalContext, State, Value,
};

#[cfg(test)]
mod tests;

/// Source of array entry identity keys.
///
/// Keys increase monotonically and are never reused. Clones share the counter, so every tree
/// built from the same generator hands out distinct keys.
#[derive(Clone, Debug, Default)]
pub struct ArrayKeys(Rc<Cell<u64>>);

impl ArrayKeys {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn starting_at(first: u64) -> Self {
        Self(Rc::new(Cell::new(first)))
    }

    /// Takes the next key.
    pub fn next_key(&self) -> u64 {
        let key = self.0.get();
        self.0.set(key + 1);
        key
    }

    /// The key the next call to [`next_key`](Self::next_key) will return.
    pub fn peek_next(&self) -> u64 {
        self.0.get()
    }
}

/// The value held by a [`TreeNode`].
#[derive(Clone, Debug)]
pub enum NodeValue {
    Leaf(Value),
    Array(Vec<ArrayEntry>),
    Object(IndexMap<String, TreeNode>),
}

impl NodeValue {
    pub fn empty_array() -> Self {
        NodeValue::Array(Vec::new())
    }
    pub fn empty_object() -> Self {
        NodeValue::Object(IndexMap::new())
    }
    pub fn is_container(&self) -> bool {
        !matches!(self, NodeValue::Leaf(_))
    }
}

/// An array element: a node plus an identity key that stays with it when its position changes.
#[derive(Clone, Debug)]
pub struct ArrayEntry {
    pub key: u64,
    pub node: TreeNode,
}

impl ArrayEntry {
    /// Takes a key, then signalifies `value`, so an entry's key precedes the keys of its
    /// descendants.
    pub fn new(value: &Value, keys: &ArrayKeys) -> Self {
        Self::with_node(keys, || signalify(value, keys))
    }

    fn with_node(keys: &ArrayKeys, node: impl FnOnce() -> TreeNode) -> Self {
        let key = keys.next_key();
        Self { key, node: node() }
    }
}

/// A reactive cell mirroring one position of a plain value.
#[derive(Clone, Debug)]
pub struct TreeNode(State<NodeValue>);

impl TreeNode {
    pub fn new(value: NodeValue) -> Self {
        Self(State::new(value))
    }
    pub fn leaf(value: impl Into<Value>) -> Self {
        Self::new(NodeValue::Leaf(value.into()))
    }

    pub fn state(&self) -> &State<NodeValue> {
        &self.0
    }
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        State::ptr_eq(&this.0, &other.0)
    }

    pub fn borrow_peek(&self) -> Ref<'_, NodeValue> {
        self.0.borrow_peek()
    }
    pub fn peek(&self) -> NodeValue {
        self.0.peek()
    }
    pub fn borrow(&self, sc: &mut SignalContext) -> Ref<'_, NodeValue> {
        self.0.borrow(sc)
    }
    pub fn get(&self, sc: &mut SignalContext) -> NodeValue {
        self.0.get(sc)
    }

    /// Returns `true` unless the node is a falsy leaf.
    pub fn has_value(&self) -> bool {
        !matches!(&*self.borrow_peek(), NodeValue::Leaf(v) if !v.is_truthy())
    }
    pub fn is_container(&self) -> bool {
        self.borrow_peek().is_container()
    }

    /// Identity keys of the array entries, or `None` if the node does not hold an array.
    pub fn array_keys(&self) -> Option<Vec<u64>> {
        match &*self.borrow_peek() {
            NodeValue::Array(entries) => Some(entries.iter().map(|e| e.key).collect()),
            _ => None,
        }
    }

    /// Looks up the child node for one segment without subscribing.
    pub fn child(&self, segment: &PathSegment) -> Option<TreeNode> {
        match (&*self.borrow_peek(), segment) {
            (NodeValue::Array(entries), PathSegment::Index(index)) => {
                entries.get(*index).map(|e| e.node.clone())
            }
            (NodeValue::Object(map), segment) => map.get(&segment.to_key()).cloned(),
            _ => None,
        }
    }

    /// Replaces the held value.
    ///
    /// Writing a leaf equal to the current leaf does not notify.
    pub fn write(&self, value: NodeValue, ac: &mut ActionContext) {
        let unchanged = match (&*self.borrow_peek(), &value) {
            (NodeValue::Leaf(old), NodeValue::Leaf(new)) => is_equal_deep(old, new),
            _ => false,
        };
        if !unchanged {
            self.0.set(value, ac);
        }
    }

    /// Builds a child with `build` and stores it under `segment`, reshaping a leaf into the
    /// container the segment implies. Returns the new child.
    pub(crate) fn insert_child(
        &self,
        segment: &PathSegment,
        build: impl FnOnce() -> TreeNode,
        keys: &ArrayKeys,
        ac: &mut ActionContext,
    ) -> TreeNode {
        let mut value = self.0.borrow_mut(ac);
        match (&mut *value, segment) {
            (NodeValue::Object(map), segment) => {
                let node = build();
                map.insert(segment.to_key(), node.clone());
                node
            }
            (NodeValue::Array(entries), PathSegment::Index(index)) => {
                insert_entry(entries, *index, build, keys)
            }
            (value, PathSegment::Index(index)) => {
                let mut entries = Vec::new();
                let node = insert_entry(&mut entries, *index, build, keys);
                *value = NodeValue::Array(entries);
                node
            }
            (value, PathSegment::Key(key)) => {
                let node = build();
                *value = NodeValue::Object(IndexMap::from([(key.clone(), node.clone())]));
                node
            }
        }
    }

    pub(crate) fn remove_child(&self, segment: &PathSegment, ac: &mut ActionContext) -> bool {
        let exists = match (&*self.borrow_peek(), segment) {
            (NodeValue::Array(entries), PathSegment::Index(index)) => *index < entries.len(),
            (NodeValue::Object(map), segment) => map.contains_key(&segment.to_key()),
            _ => false,
        };
        if exists {
            match (&mut *self.0.borrow_mut(ac), segment) {
                (NodeValue::Array(entries), PathSegment::Index(index)) => {
                    entries.remove(*index);
                }
                (NodeValue::Object(map), segment) => {
                    map.shift_remove(&segment.to_key());
                }
                _ => unreachable!(),
            }
        }
        exists
    }
}

/// Writes a freshly keyed entry at `index`, padding any gap with `undefined` entries.
fn insert_entry(
    entries: &mut Vec<ArrayEntry>,
    index: usize,
    build: impl FnOnce() -> TreeNode,
    keys: &ArrayKeys,
) -> TreeNode {
    while entries.len() < index {
        entries.push(ArrayEntry::new(&Value::Undefined, keys));
    }
    let entry = ArrayEntry::with_node(keys, build);
    let node = entry.node.clone();
    if index < entries.len() {
        entries[index] = entry;
    } else {
        entries.push(entry);
    }
    node
}

/// Builds a reactive mirror of `value`.
///
/// Leaves (including dates and blobs) become one cell. Arrays become a cell holding freshly keyed
/// entries; objects a cell holding one child node per key.
pub fn signalify(value: &Value, keys: &ArrayKeys) -> TreeNode {
    TreeNode::new(signalify_value(value, keys))
}

pub(crate) fn signalify_value(value: &Value, keys: &ArrayKeys) -> NodeValue {
    match value {
        Value::Array(items) => NodeValue::Array(
            items
                .iter()
                .map(|item| ArrayEntry::new(item, keys))
                .collect(),
        ),
        Value::Object(map) => NodeValue::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), signalify(item, keys)))
                .collect(),
        ),
        leaf => NodeValue::Leaf(leaf.clone()),
    }
}

/// Reads the plain value mirrored by `node` without subscribing.
pub fn unsignalify(node: &TreeNode) -> Value {
    match &*node.borrow_peek() {
        NodeValue::Leaf(value) => value.clone(),
        NodeValue::Array(entries) => {
            Value::Array(entries.iter().map(|e| unsignalify(&e.node)).collect())
        }
        NodeValue::Object(map) => Value::Object(
            map.iter()
                .map(|(key, node)| (key.clone(), unsignalify(node)))
                .collect(),
        ),
    }
}

/// Reads the plain value mirrored by `node`, subscribing to every cell in the subtree.
pub fn unsignalify_subscribed(node: &TreeNode, sc: &mut SignalContext) -> Value {
    match &*node.borrow(sc) {
        NodeValue::Leaf(value) => value.clone(),
        NodeValue::Array(entries) => Value::Array(
            entries
                .iter()
                .map(|e| unsignalify_subscribed(&e.node, sc))
                .collect(),
        ),
        NodeValue::Object(map) => Value::Object(
            map.iter()
                .map(|(key, node)| (key.clone(), unsignalify_subscribed(node, sc)))
                .collect(),
        ),
    }
}

/// Finds the node at `path` without subscribing.
///
/// Returns `None` for the empty path, for a root without value, and on any missing key or
/// shape mismatch.
pub fn get_reactive(root: &TreeNode, path: impl Into<Path>) -> Option<TreeNode> {
    let path = path.into();
    if path.is_empty() || !root.has_value() {
        return None;
    }
    let mut node = root.clone();
    for segment in path.iter() {
        node = node.child(segment)?;
    }
    Some(node)
}

/// Largest number of `undefined` entries a single `set` may pad an array with.
pub const MAX_ARRAY_PADDING: usize = 1 << 16;

fn needs_excess_padding(root: &TreeNode, path: &Path) -> bool {
    let mut current = Some(root.clone());
    for (i, segment) in path.iter().enumerate() {
        let node = current.take();
        if let PathSegment::Index(index) = segment {
            // A valueless root is replaced by an object, which never pads.
            let len = if i == 0 && !root.has_value() {
                None
            } else {
                node.as_ref().map_or(Some(0), |n| match &*n.borrow_peek() {
                    NodeValue::Array(entries) => Some(entries.len()),
                    NodeValue::Object(_) => None,
                    NodeValue::Leaf(_) => Some(0),
                })
            };
            if len.is_some_and(|len| *index > len.saturating_add(MAX_ARRAY_PADDING)) {
                return true;
            }
        }
        current = node.and_then(|n| n.child(segment));
    }
    false
}

/// Writes `value` at `path`, creating missing containers on the way.
///
/// An intermediate container is kept if it exists; otherwise an array is created when the next
/// segment is numeric and an object when it is not. The final segment always receives a freshly
/// built subtree, and array writes always assign a fresh identity key. All writes are one batch.
///
/// Returns the node now at `path`. Returns `None` without writing for the empty path or when an
/// index lies more than [`MAX_ARRAY_PADDING`] entries past the end of its array.
pub fn set(
    root: &TreeNode,
    path: impl Into<Path>,
    value: impl Into<Value>,
    keys: &ArrayKeys,
) -> Option<TreeNode> {
    let path = path.into();
    if path.is_empty() {
        return None;
    }
    if needs_excess_padding(root, &path) {
        debug!(%path, "set rejected: index too far past the end of the array");
        return None;
    }
    let value = value.into();
    trace!(%path, "set");
    batch(|ac| {
        if !root.has_value() {
            root.0.set(NodeValue::empty_object(), ac);
        }
        let mut current = root.clone();
        for (i, segment) in path.iter().enumerate() {
            let next = path.get(i + 1);
            if next.is_some() {
                if let Some(child) = current.child(segment).filter(TreeNode::is_container) {
                    current = child;
                    continue;
                }
            }
            let build = || match next {
                None => signalify(&value, keys),
                Some(PathSegment::Index(_)) => TreeNode::new(NodeValue::empty_array()),
                Some(PathSegment::Key(_)) => TreeNode::new(NodeValue::empty_object()),
            };
            current = current.insert_child(segment, build, keys, ac);
        }
        Some(current)
    })
}

/// Removes the element or key at `path`.
///
/// Later array entries shift down and keep their identity keys. Nothing is written, and `false`
/// is returned, if the target does not exist.
pub fn remove(root: &TreeNode, path: impl Into<Path>) -> bool {
    let path = path.into();
    let Some((parent_path, last)) = path.split_last() else {
        return false;
    };
    if !root.has_value() {
        return false;
    }
    let parent = if parent_path.is_empty() {
        Some(root.clone())
    } else {
        get_reactive(root, &parent_path)
    };
    let Some(parent) = parent else {
        return false;
    };
    let removed = batch(|ac| parent.remove_child(last, ac));
    trace!(%path, removed, "remove");
    removed
}

/// A tree root bundled with the key generator used for everything written into it.
#[derive(Clone, Debug)]
pub struct SignalTree {
    root: TreeNode,
    keys: ArrayKeys,
}

impl SignalTree {
    pub fn new(value: impl Into<Value>) -> Self {
        Self::with_keys(value, ArrayKeys::new())
    }
    pub fn with_keys(value: impl Into<Value>, keys: ArrayKeys) -> Self {
        let root = signalify(&value.into(), &keys);
        Self { root, keys }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }
    pub fn keys(&self) -> &ArrayKeys {
        &self.keys
    }

    pub fn get(&self, path: impl Into<Path>) -> Option<TreeNode> {
        get_reactive(&self.root, path)
    }
    pub fn set(&self, path: impl Into<Path>, value: impl Into<Value>) -> Option<TreeNode> {
        set(&self.root, path, value, &self.keys)
    }
    pub fn remove(&self, path: impl Into<Path>) -> bool {
        remove(&self.root, path)
    }
    pub fn reconcile(&self, value: &Value, is_partial: bool) {
        reconcile(&self.root, value, is_partial, &self.keys)
    }

    /// One-shot copy of the current value.
    pub fn snapshot(&self) -> Value {
        unsignalify(&self.root)
    }
    /// Copy of the current value that subscribes the running effect to the whole tree.
    pub fn snapshot_subscribed(&self, sc: &mut SignalContext) -> Value {
        unsignalify_subscribed(&self.root, sc)
    }
}
