//! Arena storage for schema documents.
//!
//! Every JSON value of every loaded document lives in one [`SchemaGraph`]
//! and is addressed by a [`NodeId`]. Containers hold the ids of their
//! children, so a `$ref` slot can be swapped for a link to its target in
//! place, and recursive schemas become cycles in the graph rather than
//! infinitely deep trees.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::pointer::{parse_index, JsonPointer};
use crate::reference::RefId;

/// Handle to a node in a [`SchemaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// A JSON value whose children are graph nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<NodeId>),
    Object(IndexMap<String, NodeId>),
}

impl Node {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, NodeId>> {
        match self {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[NodeId]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }

    /// The JSON type name, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Number(_) => "number",
            Node::String(_) => "string",
            Node::Array(_) => "array",
            Node::Object(_) => "object",
        }
    }
}

/// Contents of one arena slot.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Value(Node),
    /// A `$ref` node registered with the resolver but not yet resolved.
    Pending { reference: RefId, raw: String },
    /// A `$ref` node replaced by the node it resolved to.
    Link { target: NodeId, raw: String },
}

/// Arena holding every document seen during one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    slots: Vec<Slot>,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots in the arena.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Copy `value` into the arena and return the id of its root.
    pub fn insert(&mut self, value: &Value) -> NodeId {
        let node = match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => Node::Number(n.clone()),
            Value::String(s) => Node::String(s.clone()),
            Value::Array(items) => Node::Array(items.iter().map(|item| self.insert(item)).collect()),
            Value::Object(map) => Node::Object(
                map.iter()
                    .map(|(key, child)| (key.clone(), self.insert(child)))
                    .collect(),
            ),
        };
        self.push(Slot::Value(node))
    }

    fn push(&mut self, slot: Slot) -> NodeId {
        self.slots.push(slot);
        NodeId(self.slots.len() - 1)
    }

    pub(crate) fn slot(&self, id: NodeId) -> &Slot {
        &self.slots[id.0]
    }

    /// The value stored at `id` itself, without following links.
    ///
    /// Returns `None` for reference slots and ids outside this graph.
    pub(crate) fn value(&self, id: NodeId) -> Option<&Node> {
        match self.slots.get(id.0)? {
            Slot::Value(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        id.0 < self.slots.len()
    }

    /// Mark a `$ref` slot as registered with `reference`.
    pub(crate) fn mark_pending(&mut self, id: NodeId, reference: RefId, raw: &str) {
        self.slots[id.0] = Slot::Pending {
            reference,
            raw: raw.to_string(),
        };
    }

    /// Replace a `$ref` slot with a link to the node it resolved to.
    pub(crate) fn link(&mut self, id: NodeId, target: NodeId) {
        let raw = match &self.slots[id.0] {
            Slot::Pending { raw, .. } | Slot::Link { raw, .. } => raw.clone(),
            Slot::Value(_) => return,
        };
        self.slots[id.0] = Slot::Link { target, raw };
    }

    /// Follow resolved links from `id` to the node they end at.
    ///
    /// Stops at a pending slot.
    pub(crate) fn follow(&self, mut id: NodeId) -> NodeId {
        let mut seen = HashSet::new();
        while let Some(Slot::Link { target, .. }) = self.slots.get(id.0) {
            if !seen.insert(id) {
                break;
            }
            id = *target;
        }
        id
    }

    /// Value of the string-typed `id` property of an object node, if any.
    pub(crate) fn schema_id(&self, id: NodeId) -> Option<&str> {
        let map = self.value(id)?.as_object()?;
        self.value(*map.get("id")?)?.as_str()
    }
}

/// A fully dereferenced schema: a read-only view over the graph produced by
/// a resolution pass.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    graph: SchemaGraph,
    root: NodeId,
}

impl ResolvedSchema {
    pub(crate) fn new(graph: SchemaGraph, root: NodeId) -> Self {
        Self { graph, root }
    }

    /// Id of the root node, with any top-level reference already followed.
    pub fn root(&self) -> NodeId {
        self.graph.follow(self.root)
    }

    /// The node at `id`, transparently following resolved references.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.value(self.graph.follow(id))
    }

    /// Child of object node `id` under `key`.
    pub fn get(&self, id: NodeId, key: &str) -> Option<NodeId> {
        let child = self.node(id)?.as_object()?.get(key)?;
        Some(self.graph.follow(*child))
    }

    /// Element `index` of array node `id`.
    pub fn index(&self, id: NodeId, index: usize) -> Option<NodeId> {
        let child = self.node(id)?.as_array()?.get(index)?;
        Some(self.graph.follow(*child))
    }

    /// Evaluate a JSON pointer (with or without a leading `#`) from the root.
    ///
    /// Returns `None` when the pointer is malformed or addresses nothing.
    pub fn pointer(&self, pointer: &str) -> Option<NodeId> {
        let pointer = JsonPointer::parse(pointer.strip_prefix('#').unwrap_or(pointer)).ok()?;
        let mut current = self.root();
        for segment in pointer.segments() {
            current = match self.node(current)? {
                Node::Object(map) => self.graph.follow(*map.get(segment)?),
                Node::Array(items) => {
                    let idx = if segment == "-" {
                        items.len().checked_sub(1)?
                    } else {
                        parse_index(segment)?
                    };
                    self.graph.follow(*items.get(idx)?)
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// True if both ids end at the same node.
    pub fn same_node(&self, a: NodeId, b: NodeId) -> bool {
        self.graph.follow(a) == self.graph.follow(b)
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    /// Materialize the schema as a plain JSON value.
    ///
    /// Resolved references are inlined. A reference whose target is already
    /// being written on the current path would recurse forever, so it is
    /// written back as its original `{"$ref": ...}` object.
    pub fn to_value(&self) -> Value {
        self.export(self.root, &mut Vec::new())
    }

    /// Materialize the subtree at `id`, or `None` if `id` is not in this graph.
    pub fn value_at(&self, id: NodeId) -> Option<Value> {
        self.graph
            .contains(id)
            .then(|| self.export(id, &mut Vec::new()))
    }

    fn export(&self, id: NodeId, path: &mut Vec<NodeId>) -> Value {
        match self.graph.slot(id) {
            Slot::Pending { raw, .. } => ref_object(raw),
            Slot::Link { target, raw } => {
                let target = self.graph.follow(*target);
                if path.contains(&target) || !matches!(self.graph.slot(target), Slot::Value(_)) {
                    ref_object(raw)
                } else {
                    self.export(target, path)
                }
            }
            Slot::Value(node) => match node {
                Node::Null => Value::Null,
                Node::Bool(b) => Value::Bool(*b),
                Node::Number(n) => Value::Number(n.clone()),
                Node::String(s) => Value::String(s.clone()),
                Node::Array(items) => {
                    path.push(id);
                    let out = items.iter().map(|item| self.export(*item, path)).collect();
                    path.pop();
                    Value::Array(out)
                }
                Node::Object(map) => {
                    path.push(id);
                    let out: Map<String, Value> = map
                        .iter()
                        .map(|(key, child)| (key.clone(), self.export(*child, path)))
                        .collect();
                    path.pop();
                    Value::Object(out)
                }
            },
        }
    }
}

fn ref_object(raw: &str) -> Value {
    let mut map = Map::new();
    map.insert("$ref".to_string(), Value::String(raw.to_string()));
    Value::Object(map)
}
