//! Reference resolution - replaces every `$ref` in a schema graph with the
//! node it points to.
//!
//! Resolution of one document happens in two phases. A depth-first walk over
//! the schema-bearing properties registers every `$ref` node it finds, bound
//! to the resolution scope (`id`) in effect at that point. The registered
//! references are then resolved in discovery order. Resolving a reference may
//! fetch another document, which is itself walked and resolved before it is
//! handed back, so every document in the cache is fully dereferenced.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::ResolveError;
use crate::graph::{Node, NodeId, ResolvedSchema, SchemaGraph, Slot};
use crate::loader::FetchDocument;
use crate::pointer::parse_index;
use crate::reference::{RefId, Reference, ReferenceState};
use crate::types::{ARRAY_SCHEMA_KEYWORDS, MAP_SCHEMA_KEYWORDS, SINGLE_SCHEMA_KEYWORDS};
use crate::uri;

/// Cache key of the document a resolution pass started from, used by
/// references with an empty location part.
const SELF_LOCATION: &str = "";

/// How `find_references` reached a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    /// Root of a document handed to [`RefResolver::resolve`].
    Entry,
    /// Root of a document fetched by [`RefResolver::fetch_ref`].
    Fetched,
    Nested,
}

/// Resolve every `$ref` in `schema` and return the dereferenced view.
///
/// `source_uri` is the location `schema` was loaded from and may be empty
/// for in-memory documents. External documents are requested from `fetcher`
/// at most once per absolute location.
///
/// # Errors
///
/// Returns the first error hit while resolving references in discovery order.
pub fn dereference(
    schema: &Value,
    source_uri: &str,
    fetcher: &dyn FetchDocument,
) -> Result<ResolvedSchema, ResolveError> {
    let mut resolver = RefResolver::new(fetcher);
    let root = resolver.resolve(schema, source_uri)?;
    Ok(resolver.into_schema(root))
}

/// Walks schema documents, registers their references and resolves them.
///
/// Owns the document cache and the reference registry for one resolution pass.
pub struct RefResolver<'a> {
    fetcher: &'a dyn FetchDocument,
    graph: SchemaGraph,
    references: Vec<Reference>,
    documents: HashMap<String, NodeId>,
}

impl<'a> RefResolver<'a> {
    pub fn new(fetcher: &'a dyn FetchDocument) -> Self {
        Self {
            fetcher,
            graph: SchemaGraph::new(),
            references: Vec::new(),
            documents: HashMap::new(),
        }
    }

    /// Load `document` into the graph and resolve all of its references.
    ///
    /// Returns the id of the document root. Each `$ref` slot in the document
    /// is replaced by a link to its target. The document becomes the target
    /// of references with an empty location, replacing the root of any
    /// earlier call.
    pub fn resolve(&mut self, document: &Value, source_uri: &str) -> Result<NodeId, ResolveError> {
        let root = self.graph.insert(document);
        self.resolve_document(root, source_uri, Walk::Entry)?;
        Ok(root)
    }

    /// Resolve one registered reference.
    ///
    /// Resolving an already resolved reference returns the cached node.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::CircularReference` if the reference is already
    /// being resolved further up the call chain.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this resolver.
    pub fn resolve_reference(&mut self, id: RefId) -> Result<NodeId, ResolveError> {
        let reference = &self.references[id.0];
        match reference.state() {
            ReferenceState::Resolved(target) => return Ok(target),
            ReferenceState::Resolving => {
                return Err(ResolveError::CircularReference {
                    reference: reference.reference().to_string(),
                })
            }
            ReferenceState::Unresolved => {}
        }

        let location = reference.uri().to_string();
        let source_uri = reference.source_uri().to_string();
        debug!(reference = %reference.reference(), scope = %source_uri, "resolving reference");

        let document = self.fetch_ref(&location, &source_uri)?;

        // Fetching may have resolved this reference through another path.
        if let Some(target) = self.references[id.0].resolved() {
            return Ok(target);
        }

        self.references[id.0].begin_resolving();
        let target = self.walk_pointer(id, document)?;
        self.references[id.0].finish(target);
        if let Some(slot) = self.references[id.0].slot() {
            self.graph.link(slot, target);
        }
        Ok(target)
    }

    /// Fetch the document (or node) `reference` points to, relative to `source_uri`.
    ///
    /// An absolute URI that still carries a pointer fragment is resolved
    /// through a transient reference. Otherwise the document is served from
    /// the cache, or fetched, cached and fully resolved first.
    pub fn fetch_ref(&mut self, reference: &str, source_uri: &str) -> Result<NodeId, ResolveError> {
        let absolute = uri::resolve(reference, source_uri)?;
        let location = uri::extract_location(&absolute).to_string();

        if let Some(fragment) = uri::extract_fragment(&absolute).filter(|f| f.starts_with('/')) {
            let transient = Reference::parse(&format!("#{fragment}"), &location)?;
            let id = self.register(transient);
            return self.resolve_reference(id);
        }

        if let Some(document) = self.documents.get(&location) {
            trace!(location = %location, "document cache hit");
            return Ok(*document);
        }

        debug!(location = %location, "fetching document");
        let value = self.fetcher.fetch(&location)?;
        let root = self.graph.insert(&value);
        self.documents.insert(location.clone(), root);
        self.resolve_document(root, &location, Walk::Fetched)?;
        Ok(root)
    }

    /// The registered reference `id`, or `None` if this resolver never issued it.
    pub fn reference(&self, id: RefId) -> Option<&Reference> {
        self.references.get(id.0)
    }

    /// Every reference registered so far, in discovery order.
    pub fn references(&self) -> impl Iterator<Item = (RefId, &Reference)> {
        self.references
            .iter()
            .enumerate()
            .map(|(idx, reference)| (RefId(idx), reference))
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    /// Finish the pass and expose the graph from `root`.
    pub fn into_schema(self, root: NodeId) -> ResolvedSchema {
        ResolvedSchema::new(self.graph, root)
    }

    fn resolve_document(
        &mut self,
        root: NodeId,
        source_uri: &str,
        walk: Walk,
    ) -> Result<(), ResolveError> {
        let mut queue = VecDeque::new();
        self.find_references(root, source_uri, walk, &mut queue)?;
        debug!(count = queue.len(), source = %source_uri, "registered references");
        self.resolve_references(queue)
    }

    fn resolve_references(&mut self, queue: VecDeque<RefId>) -> Result<(), ResolveError> {
        for id in queue {
            self.resolve_reference(id)?;
        }
        Ok(())
    }

    fn find_references(
        &mut self,
        id: NodeId,
        parent_scope: &str,
        walk: Walk,
        queue: &mut VecDeque<RefId>,
    ) -> Result<(), ResolveError> {
        let Some(Node::Object(map)) = self.graph.value(id) else {
            return Ok(());
        };

        let scope = match self.graph.schema_id(id).map(str::trim) {
            Some(schema_id) if !schema_id.is_empty() => {
                let scope = uri::resolve(schema_id, parent_scope)?;
                trace!(scope = %scope, "entering resolution scope");
                scope
            }
            _ => parent_scope.to_string(),
        };

        let mut children = Vec::new();
        for keyword in SINGLE_SCHEMA_KEYWORDS {
            if let Some(child) = map.get(*keyword) {
                children.push(*child);
            }
        }
        for keyword in ARRAY_SCHEMA_KEYWORDS {
            if let Some(Node::Array(items)) = map.get(*keyword).and_then(|c| self.graph.value(*c)) {
                children.extend(items.iter().copied());
            }
        }
        for keyword in MAP_SCHEMA_KEYWORDS {
            if let Some(Node::Object(entries)) = map.get(*keyword).and_then(|c| self.graph.value(*c)) {
                children.extend(entries.values().copied());
            }
        }

        self.register_document(id, parent_scope, &scope, walk);

        match Reference::from_node(&self.graph, id, &scope) {
            Ok(reference) => {
                let ref_id = self.register(reference);
                self.graph.mark_pending(id, ref_id, self.references[ref_id.0].reference());
                queue.push_back(ref_id);
                return Ok(());
            }
            Err(ResolveError::NotAReference) => {}
            Err(err) => return Err(err),
        }

        for child in children {
            self.find_references(child, &scope, Walk::Nested, queue)?;
        }
        Ok(())
    }

    /// Make a document root reachable under the location it was loaded from
    /// and the location its own `id` declares.
    ///
    /// An entry document always takes over these locations, including the
    /// empty self location. A fetched document never displaces an earlier one.
    fn register_document(&mut self, root: NodeId, source_uri: &str, scope: &str, walk: Walk) {
        let locations = [uri::extract_location(source_uri), uri::extract_location(scope)];
        match walk {
            Walk::Entry => {
                self.documents.insert(SELF_LOCATION.to_string(), root);
                for location in locations {
                    self.documents.insert(location.to_string(), root);
                }
            }
            Walk::Fetched => {
                for location in locations {
                    self.documents.entry(location.to_string()).or_insert(root);
                }
            }
            Walk::Nested => {}
        }
    }

    fn register(&mut self, reference: Reference) -> RefId {
        self.references.push(reference);
        RefId(self.references.len() - 1)
    }

    /// Follow links and resolve pending references until `id` is a plain value.
    fn settle(&mut self, mut id: NodeId) -> Result<NodeId, ResolveError> {
        loop {
            match self.graph.slot(id) {
                Slot::Value(_) => return Ok(id),
                Slot::Link { target, .. } => id = *target,
                Slot::Pending { reference, .. } => {
                    let reference = *reference;
                    id = self.resolve_reference(reference)?;
                }
            }
        }
    }

    fn walk_pointer(&mut self, id: RefId, document: NodeId) -> Result<NodeId, ResolveError> {
        let reference = &self.references[id.0];
        let raw = reference.reference().to_string();
        let segments = reference.pointer().segments().to_vec();
        let document_id = self.graph.schema_id(document).map(str::to_string);
        let fail = |message: String| ResolveError::PointerResolution {
            reference: raw.clone(),
            document_id: document_id.clone(),
            message,
        };

        let mut current = document;
        let mut remaining = segments.iter();
        loop {
            current = self.settle(current)?;
            let Some(segment) = remaining.next() else {
                break;
            };
            trace!(segment = %segment, "walking pointer");

            current = match self.graph.value(current) {
                Some(Node::Object(map)) => *map
                    .get(segment)
                    .ok_or_else(|| fail(format!("property \"{segment}\" not found")))?,
                Some(Node::Array(items)) => {
                    let index = if segment == "-" {
                        items.len().checked_sub(1)
                    } else {
                        parse_index(segment)
                    };
                    *index.and_then(|i| items.get(i)).ok_or_else(|| {
                        fail(format!(
                            "index \"{segment}\" out of range for array of length {}",
                            items.len()
                        ))
                    })?
                }
                Some(other) => {
                    return Err(fail(format!(
                        "cannot look up \"{segment}\" in a {}",
                        other.type_name()
                    )))
                }
                None => return Err(fail("pointer walked into an unresolved reference".to_string())),
            };
        }

        match self.graph.value(current) {
            Some(node) if node.is_object() => Ok(current),
            Some(node) => Err(fail(format!(
                "target is a {}, expected a schema object",
                node.type_name()
            ))),
            None => Err(fail("target is an unresolved reference".to_string())),
        }
    }
}
