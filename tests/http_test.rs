//! Remote retrieval against a local mock server.

#![cfg(feature = "remote")]

use mockito::Server;
use pretty_assertions::assert_eq;
use schemaref::{dereference, load_schema_auto, LoaderOptions, ResolveError, SchemaLoader};
use serde_json::json;

const SCHEMA_JSON: &str = "application/schema+json";

#[test]
fn external_document_fetched_once() {
    let mut server = Server::new();
    let root = server
        .mock("GET", "/root.json")
        .with_status(200)
        .with_header("content-type", SCHEMA_JSON)
        .with_body(
            r##"{
                "properties": {
                    "a": { "$ref": "defs.json#/definitions/a" },
                    "b": { "$ref": "defs.json#/definitions/b" }
                }
            }"##,
        )
        .expect(1)
        .create();
    let defs = server
        .mock("GET", "/defs.json")
        .with_status(200)
        .with_header("content-type", "application/json; charset=utf-8")
        .with_body(r#"{"definitions":{"a":{"type":"string"},"b":{"type":"integer"}}}"#)
        .expect(1)
        .create();

    let loader = SchemaLoader::default();
    let (schema, uri) = load_schema_auto(&format!("{}/root.json", server.url()), &loader).unwrap();
    let resolved = dereference(&schema, &uri, &loader).unwrap();

    assert_eq!(
        resolved.to_value(),
        json!({
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "integer" }
            }
        })
    );
    root.assert();
    defs.assert();
}

#[test]
fn wrong_media_type_is_rejected() {
    let mut server = Server::new();
    let _page = server
        .mock("GET", "/page.json")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("{}")
        .create();

    let loader = SchemaLoader::default();
    let schema = json!({ "items": { "$ref": format!("{}/page.json", server.url()) } });
    let err = dereference(&schema, "", &loader).unwrap_err();

    assert!(matches!(err, ResolveError::MediaType { ref content_type, .. } if content_type == "text/html"));
    assert_eq!(err.exit_code(), 2);
    assert!(err.is_fetch_error());
}

#[test]
fn exempt_prefix_accepts_any_media_type() {
    let mut server = Server::new();
    let _page = server
        .mock("GET", "/draft-03/schema")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body(r#"{"type":"object"}"#)
        .create();

    let loader = SchemaLoader::new(LoaderOptions::new().exempt_media_type(server.url()));
    let schema = json!({ "extends": { "$ref": format!("{}/draft-03/schema#", server.url()) } });
    let resolved = dereference(&schema, "", &loader).unwrap();

    assert_eq!(resolved.to_value(), json!({ "extends": { "type": "object" } }));
}

#[test]
fn http_error_status_is_a_fetch_error() {
    let mut server = Server::new();
    let _missing = server.mock("GET", "/missing.json").with_status(404).create();

    let loader = SchemaLoader::default();
    let schema = json!({ "not": { "$ref": format!("{}/missing.json", server.url()) } });
    let err = dereference(&schema, "", &loader).unwrap_err();

    assert!(matches!(err, ResolveError::HttpStatus { status: 404, .. }));
    assert!(err.is_fetch_error());
    assert_eq!(err.exit_code(), 3);
}
