//! A single `$ref` and its resolution lifecycle.

use serde_json::Value;

use crate::error::ResolveError;
use crate::graph::{Node, NodeId, SchemaGraph};
use crate::pointer::JsonPointer;
use crate::types::json_type_name;
use crate::uri;

/// Index of a [`Reference`] in its resolver's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefId(pub(crate) usize);

/// Lifecycle of a reference.
///
/// A reference is parsed when it is constructed, so it starts out
/// `Unresolved`. Resolution moves it through `Resolving` to `Resolved`;
/// asking to resolve a reference that is still `Resolving` means the
/// resolution path has looped back on itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceState {
    Unresolved,
    Resolving,
    Resolved(NodeId),
}

/// One `$ref`, bound to the resolution scope it was found in.
#[derive(Debug, Clone)]
pub struct Reference {
    source_uri: String,
    reference: String,
    uri: String,
    pointer: JsonPointer,
    state: ReferenceState,
    slot: Option<NodeId>,
}

impl Reference {
    /// Parse a reference from a raw `$ref` string.
    ///
    /// The string is trimmed; its location part becomes [`Reference::uri`]
    /// and its fragment is decoded as the pointer. A missing or empty
    /// fragment addresses the root of the target document.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidPointer` if the fragment is neither
    /// empty nor starts with `/`.
    pub fn parse(reference: &str, source_uri: &str) -> Result<Self, ResolveError> {
        let reference = reference.trim();
        let (location, pointer) = if reference.is_empty() {
            ("", JsonPointer::default())
        } else {
            let pointer = uri::extract_fragment(reference).unwrap_or_default();
            (uri::extract_location(reference), JsonPointer::parse(pointer)?)
        };

        Ok(Self {
            source_uri: source_uri.to_string(),
            reference: reference.to_string(),
            uri: location.to_string(),
            pointer,
            state: ReferenceState::Unresolved,
            slot: None,
        })
    }

    /// Classify a JSON value and parse it when it is a reference.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::NotAReference` if `value` is not an object with
    /// a `$ref` property, and `ResolveError::InvalidPointer` if `$ref` is not a
    /// string or holds a malformed pointer.
    pub fn from_value(value: &Value, source_uri: &str) -> Result<Self, ResolveError> {
        let raw = value
            .as_object()
            .and_then(|map| map.get("$ref"))
            .ok_or(ResolveError::NotAReference)?;
        match raw {
            Value::String(s) => Self::parse(s, source_uri),
            other => Err(ResolveError::invalid_pointer(
                &other.to_string(),
                format!("$ref must be a string, got {}", json_type_name(other)),
            )),
        }
    }

    /// Classify the graph node `id`, remembering it as the slot to replace
    /// once the reference is resolved.
    pub(crate) fn from_node(
        graph: &SchemaGraph,
        id: NodeId,
        source_uri: &str,
    ) -> Result<Self, ResolveError> {
        let raw = graph
            .value(id)
            .and_then(Node::as_object)
            .and_then(|map| map.get("$ref"))
            .ok_or(ResolveError::NotAReference)?;
        let mut reference = match graph.value(*raw) {
            Some(Node::String(s)) => Self::parse(s, source_uri)?,
            other => {
                let found = other.map_or("reference", Node::type_name);
                return Err(ResolveError::invalid_pointer(
                    "$ref",
                    format!("$ref must be a string, got {found}"),
                ));
            }
        };
        reference.slot = Some(id);
        Ok(reference)
    }

    /// The resolution scope active where the reference was found.
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// The trimmed `$ref` string.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Location part of the reference, still relative to [`Self::source_uri`].
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn pointer(&self) -> &JsonPointer {
        &self.pointer
    }

    pub fn state(&self) -> ReferenceState {
        self.state
    }

    /// The node this reference resolved to, once resolved.
    pub fn resolved(&self) -> Option<NodeId> {
        match self.state {
            ReferenceState::Resolved(id) => Some(id),
            _ => None,
        }
    }

    /// Graph slot holding the `$ref` object, if the reference came from a document.
    pub fn slot(&self) -> Option<NodeId> {
        self.slot
    }

    pub(crate) fn begin_resolving(&mut self) {
        self.state = ReferenceState::Resolving;
    }

    pub(crate) fn finish(&mut self, target: NodeId) {
        self.state = ReferenceState::Resolved(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_splits_location_and_pointer() {
        let r = Reference::parse("  other.json#/definitions/a~1b  ", "http://x/root.json").unwrap();
        assert_eq!(r.reference(), "other.json#/definitions/a~1b");
        assert_eq!(r.uri(), "other.json");
        assert_eq!(r.pointer().segments(), &["definitions", "a/b"]);
        assert_eq!(r.source_uri(), "http://x/root.json");
        assert_eq!(r.state(), ReferenceState::Unresolved);
        assert!(r.resolved().is_none());
    }

    #[test]
    fn missing_fragment_targets_document_root() {
        let r = Reference::parse("other.json", "").unwrap();
        assert!(r.pointer().is_root());

        let r = Reference::parse("#", "").unwrap();
        assert_eq!(r.uri(), "");
        assert!(r.pointer().is_root());

        let r = Reference::parse("   ", "").unwrap();
        assert_eq!(r.uri(), "");
        assert!(r.pointer().is_root());
    }

    #[test]
    fn fragment_without_slash_is_invalid() {
        assert!(matches!(
            Reference::parse("#foo", ""),
            Err(ResolveError::InvalidPointer { .. })
        ));
        assert!(matches!(
            Reference::parse("other.json#*", ""),
            Err(ResolveError::InvalidPointer { .. })
        ));
    }

    #[test]
    fn from_value_classifies() {
        assert!(matches!(
            Reference::from_value(&json!({ "type": "string" }), ""),
            Err(ResolveError::NotAReference)
        ));
        assert!(matches!(
            Reference::from_value(&json!(["$ref"]), ""),
            Err(ResolveError::NotAReference)
        ));
        assert!(matches!(
            Reference::from_value(&json!({ "$ref": 5 }), ""),
            Err(ResolveError::InvalidPointer { .. })
        ));
        let r = Reference::from_value(&json!({ "$ref": "#/a" }), "").unwrap();
        assert_eq!(r.pointer().segments(), &["a"]);
    }

    #[test]
    fn from_node_records_slot() {
        let mut graph = SchemaGraph::new();
        let id = graph.insert(&json!({ "$ref": "#/definitions/a", "type": "ignored" }));
        let r = Reference::from_node(&graph, id, "file:///s.json").unwrap();
        assert_eq!(r.slot(), Some(id));
        assert_eq!(r.reference(), "#/definitions/a");

        let scalar = graph.insert(&json!("$ref"));
        assert!(matches!(
            Reference::from_node(&graph, scalar, ""),
            Err(ResolveError::NotAReference)
        ));
    }
}
