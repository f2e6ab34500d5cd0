//! Property-based tests for JSON pointer encoding and lookup.
//!
//! Properties under test:
//! 1. escape/unescape roundtrip: `unescape_segment(escape_segment(s)) == s`
//! 2. fragment roundtrip: `parse(from_segments(segs).to_fragment()) == segs`
//! 3. lookup: a `$ref` built from any key's fragment resolves to that key's schema

use proptest::prelude::*;
use schemaref::{dereference, escape_segment, unescape_segment, JsonPointer, ResolveError};
use serde_json::{json, Value};

/// Keys including the characters pointers and URIs treat specially.
fn arb_segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("".to_string()),
        Just("/".to_string()),
        Just("~".to_string()),
        Just("~01".to_string()),
        Just("%25".to_string()),
        Just("a b#c?d".to_string()),
        Just("0".to_string()),
        Just("ünïcødé".to_string()),
        "[[:print:]]{0,24}",
        "\\PC{0,12}",
    ]
}

fn offline(uri: &str) -> Result<Value, ResolveError> {
    Err(ResolveError::NotFound {
        uri: uri.to_string(),
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, ..Default::default() })]

    #[test]
    fn escape_unescape_roundtrip(s in arb_segment()) {
        prop_assert_eq!(unescape_segment(&escape_segment(&s)), s);
    }

    #[test]
    fn fragment_roundtrip(segments in proptest::collection::vec(arb_segment(), 0..6)) {
        let fragment = JsonPointer::from_segments(segments.clone()).to_fragment();
        let parsed = JsonPointer::parse(&fragment).unwrap();
        prop_assert_eq!(parsed.segments(), segments.as_slice());
    }

    #[test]
    fn reference_to_any_key_resolves(key in arb_segment()) {
        let fragment = JsonPointer::from_segments(["definitions", key.as_str()]).to_fragment();
        let schema = json!({
            "definitions": { key.clone(): { "type": "string", "title": key.clone() } },
            "properties": { "p": { "$ref": format!("#{fragment}") } }
        });

        let resolved = dereference(&schema, "", &offline).unwrap();
        prop_assert_eq!(
            resolved.to_value()["properties"]["p"].clone(),
            json!({ "type": "string", "title": key })
        );
    }
}
