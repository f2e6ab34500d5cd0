//! Core types shared by the resolver and the document loader.

use std::time::Duration;

use serde_json::Value;

/// Properties holding a single nested schema.
pub const SINGLE_SCHEMA_KEYWORDS: &[&str] = &[
    "additionalItems",
    "additionalProperties",
    "extends",
    "items",
    "not",
];

/// Properties holding an array of nested schemas.
pub const ARRAY_SCHEMA_KEYWORDS: &[&str] = &[
    "disallow", "extends", "items", "type", "allOf", "anyOf", "oneOf",
];

/// Properties holding a map of name to nested schema.
pub const MAP_SCHEMA_KEYWORDS: &[&str] = &[
    "definitions",
    "dependencies",
    "patternProperties",
    "properties",
];

/// Media type every retrieved schema document should be served with.
pub const SCHEMA_MEDIA_TYPE: &str = "application/schema+json";

/// Media types accepted without an exemption.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &[SCHEMA_MEDIA_TYPE, "application/json"];

/// Prefix of the canonical meta-schema host, known to serve a wrong content type.
pub const JSON_SCHEMA_ORG: &str = "http://json-schema.org/";

/// Default timeout for HTTP requests (10 seconds).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Options for document retrieval.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Timeout applied to each HTTP request.
    pub http_timeout: Duration,
    /// When false, the content type reported by a retriever is ignored.
    pub check_media_type: bool,
    /// URI prefixes whose documents may report any content type.
    pub media_type_exemptions: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            check_media_type: true,
            media_type_exemptions: vec![JSON_SCHEMA_ORG.to_string()],
        }
    }
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP request timeout.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Enable or disable the content type check.
    pub fn check_media_type(mut self, check: bool) -> Self {
        self.check_media_type = check;
        self
    }

    /// Allow documents under `prefix` to report any content type.
    pub fn exempt_media_type(mut self, prefix: impl Into<String>) -> Self {
        self.media_type_exemptions.push(prefix.into());
        self
    }

    /// Returns true if `content_type` is acceptable for a document at `uri`.
    ///
    /// A missing content type is accepted. Parameters such as `charset`
    /// are ignored.
    pub fn accepts_media_type(&self, uri: &str, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return true;
        };
        if !self.check_media_type {
            return true;
        }
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        ACCEPTED_MEDIA_TYPES.contains(&essence.as_str())
            || self
                .media_type_exemptions
                .iter()
                .any(|prefix| uri.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!([1])), "array");
        assert_eq!(json_type_name(&json!({"a": 1})), "object");
    }

    #[test]
    fn accepts_schema_and_json_media_types() {
        let opts = LoaderOptions::default();
        assert!(opts.accepts_media_type("http://a/s.json", Some("application/schema+json")));
        assert!(opts.accepts_media_type(
            "http://a/s.json",
            Some("application/json; charset=utf-8")
        ));
        assert!(opts.accepts_media_type("http://a/s.json", None));
    }

    #[test]
    fn rejects_other_media_types() {
        let opts = LoaderOptions::default();
        assert!(!opts.accepts_media_type("http://a/s.json", Some("text/html")));
    }

    #[test]
    fn json_schema_org_is_exempt() {
        let opts = LoaderOptions::default();
        assert!(opts.accepts_media_type("http://json-schema.org/draft-04/schema", Some("text/plain")));
    }

    #[test]
    fn custom_exemption_and_disabled_check() {
        let opts = LoaderOptions::new().exempt_media_type("http://legacy.example/");
        assert!(opts.accepts_media_type("http://legacy.example/a.json", Some("text/plain")));

        let opts = LoaderOptions::new().check_media_type(false);
        assert!(opts.accepts_media_type("http://a/s.json", Some("text/html")));
    }
}
