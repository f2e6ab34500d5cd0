//! Schema Reference Resolver
//!
//! Cycle-safe resolution of `$ref` references and RFC 6901 JSON Pointers in
//! JSON Schema documents.
//!
//! Every `$ref` node is replaced by the node it points to, including
//! references into other documents. Each document is fetched once per
//! absolute location, each reference is resolved once, and a reference whose
//! resolution loops back on itself is reported instead of recursing forever.
//!
//! # Example
//!
//! ```
//! use schemaref::{dereference, ResolveError};
//! use serde_json::{json, Value};
//!
//! let schema = json!({
//!     "definitions": {
//!         "name": { "type": "string" }
//!     },
//!     "properties": {
//!         "first": { "$ref": "#/definitions/name" },
//!         "last": { "$ref": "#/definitions/name" }
//!     }
//! });
//!
//! // This schema only references itself, so nothing is ever fetched.
//! let offline = |uri: &str| -> Result<Value, ResolveError> {
//!     Err(ResolveError::NotFound { uri: uri.to_string() })
//! };
//!
//! let resolved = dereference(&schema, "", &offline).unwrap();
//! assert_eq!(
//!     resolved.to_value()["properties"]["first"],
//!     json!({ "type": "string" })
//! );
//! ```
//!
//! # Recursive schemas
//!
//! A reference may point at one of its own ancestors (`{"$ref": "#"}` inside
//! `properties`). The resolved graph then contains a cycle; navigate it with
//! [`ResolvedSchema::get`] and friends. [`ResolvedSchema::to_value`] writes
//! such back-edges out as the original `$ref` object.

mod error;
mod graph;
mod loader;
mod pointer;
mod reference;
mod resolver;
mod types;
pub mod uri;

pub use error::ResolveError;
pub use graph::{Node, NodeId, ResolvedSchema, SchemaGraph};
pub use loader::{
    is_url, load_schema, load_schema_auto, load_schema_str, source_uri, FetchDocument,
    FileRetriever, PredefinedRetriever, Retrieve, Retrieved, SchemaLoader,
};
pub use pointer::{escape_segment, unescape_segment, JsonPointer};
pub use reference::{RefId, Reference, ReferenceState};
pub use resolver::{dereference, RefResolver};
pub use types::{
    json_type_name, LoaderOptions, ARRAY_SCHEMA_KEYWORDS, MAP_SCHEMA_KEYWORDS,
    SCHEMA_MEDIA_TYPE, SINGLE_SCHEMA_KEYWORDS,
};

#[cfg(feature = "remote")]
pub use loader::HttpRetriever;
