//! Schema loading from various sources.
//!
//! Handles retrieving raw documents from files, HTTP URLs and in-memory
//! registrations, checking their media type and decoding them as JSON.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use tracing::debug;

use crate::error::ResolveError;
use crate::types::{LoaderOptions, SCHEMA_MEDIA_TYPE};
use crate::uri::UriParts;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Characters percent-encoded when a filesystem path becomes a `file://` URI.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Fetch a parsed document by its absolute location (no fragment).
///
/// This is the only way the resolver reaches outside the document it was
/// given. Implemented by [`SchemaLoader`] and by any
/// `Fn(&str) -> Result<Value, ResolveError>`.
pub trait FetchDocument {
    fn fetch(&self, location: &str) -> Result<Value, ResolveError>;
}

impl<F> FetchDocument for F
where
    F: Fn(&str) -> Result<Value, ResolveError>,
{
    fn fetch(&self, location: &str) -> Result<Value, ResolveError> {
        self(location)
    }
}

/// Raw bytes of a retrieved document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub bytes: Vec<u8>,
    /// Content type reported by the source, if it has such a notion.
    pub content_type: Option<String>,
}

/// Retrieve raw document bytes from one kind of source.
pub trait Retrieve {
    fn retrieve(&self, location: &str) -> Result<Retrieved, ResolveError>;
}

/// Reads `file://` URIs and plain filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRetriever;

impl Retrieve for FileRetriever {
    fn retrieve(&self, location: &str) -> Result<Retrieved, ResolveError> {
        let path = file_path(location);
        if !path.exists() {
            return Err(ResolveError::FileNotFound { path });
        }
        let bytes = std::fs::read(&path).map_err(|source| ResolveError::ReadError {
            path: path.clone(),
            source,
        })?;
        Ok(Retrieved {
            bytes,
            content_type: None,
        })
    }
}

/// Map a `file://` URI or a plain path to a filesystem path.
fn file_path(location: &str) -> PathBuf {
    match location.strip_prefix("file://") {
        Some(rest) => {
            // Skip an explicit host such as `file://localhost/tmp/a.json`.
            let path = match rest.find('/') {
                Some(idx) => &rest[idx..],
                None => rest,
            };
            PathBuf::from(percent_decode_str(path).decode_utf8_lossy().into_owned())
        }
        None => PathBuf::from(location),
    }
}

/// Fetches HTTP and HTTPS URLs with a blocking client.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpRetriever {
    timeout: Duration,
}

#[cfg(feature = "remote")]
impl HttpRetriever {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(feature = "remote")]
impl Retrieve for HttpRetriever {
    fn retrieve(&self, location: &str) -> Result<Retrieved, ResolveError> {
        use reqwest::header::{ACCEPT, CONTENT_TYPE};

        let network_error = |source| ResolveError::NetworkError {
            url: location.to_string(),
            source,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(network_error)?;

        let response = client
            .get(location)
            .header(ACCEPT, format!("{SCHEMA_MEDIA_TYPE}, application/json"))
            .send()
            .map_err(network_error)?;

        // Check for HTTP errors before reading the body
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::HttpStatus {
                url: location.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().map_err(network_error)?.to_vec();

        Ok(Retrieved {
            bytes,
            content_type,
        })
    }
}

/// Serves documents registered in memory, keyed by location.
#[derive(Debug, Clone, Default)]
pub struct PredefinedRetriever {
    documents: HashMap<String, String>,
}

impl PredefinedRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `json` as the document at `location`.
    pub fn insert(&mut self, location: impl Into<String>, json: impl Into<String>) {
        self.documents.insert(location.into(), json.into());
    }

    pub fn contains(&self, location: &str) -> bool {
        self.documents.contains_key(location)
    }
}

impl Retrieve for PredefinedRetriever {
    fn retrieve(&self, location: &str) -> Result<Retrieved, ResolveError> {
        let json = self
            .documents
            .get(location)
            .ok_or_else(|| ResolveError::NotFound {
                uri: location.to_string(),
            })?;
        Ok(Retrieved {
            bytes: json.as_bytes().to_vec(),
            content_type: Some(SCHEMA_MEDIA_TYPE.to_string()),
        })
    }
}

/// The document fetcher used by the CLI and most callers.
///
/// Picks a retriever by URI scheme (documents registered in memory take
/// precedence), keeps the raw bytes of every location it has retrieved,
/// checks the reported media type and decodes the bytes as JSON.
pub struct SchemaLoader {
    options: LoaderOptions,
    predefined: PredefinedRetriever,
    custom: HashMap<String, Box<dyn Retrieve + Send + Sync>>,
    cache: Mutex<HashMap<String, Retrieved>>,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(LoaderOptions::default())
    }
}

impl SchemaLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            predefined: PredefinedRetriever::new(),
            custom: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Serve `json` for `location` without touching the network or disk.
    pub fn with_document(mut self, location: impl Into<String>, json: impl Into<String>) -> Self {
        self.predefined.insert(location, json);
        self
    }

    /// Route every location with `scheme` to `retriever`.
    pub fn with_retriever(
        mut self,
        scheme: impl Into<String>,
        retriever: impl Retrieve + Send + Sync + 'static,
    ) -> Self {
        self.custom
            .insert(scheme.into().to_ascii_lowercase(), Box::new(retriever));
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Retrieve the raw bytes for `location`, from the cache when possible.
    ///
    /// The cache is not locked while a retriever runs, so a retriever may
    /// call back into this loader.
    pub fn retrieve(&self, location: &str) -> Result<Retrieved, ResolveError> {
        if let Some(retrieved) = self.cached(location) {
            debug!(location = %location, "raw document cache hit");
            return Ok(retrieved);
        }
        let retrieved = self.retrieve_uncached(location)?;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(cache
            .entry(location.to_string())
            .or_insert(retrieved)
            .clone())
    }

    fn cached(&self, location: &str) -> Option<Retrieved> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
    }

    fn retrieve_uncached(&self, location: &str) -> Result<Retrieved, ResolveError> {
        if self.predefined.contains(location) {
            return self.predefined.retrieve(location);
        }

        let scheme = UriParts::parse(location)?
            .scheme
            .map(|s| s.to_ascii_lowercase());
        if let Some(retriever) = scheme.as_deref().and_then(|s| self.custom.get(s)) {
            return retriever.retrieve(location);
        }

        debug!(location = %location, "retrieving document");
        match scheme.as_deref() {
            None | Some("file") => FileRetriever.retrieve(location),
            #[cfg(feature = "remote")]
            Some("http") | Some("https") => {
                HttpRetriever::new(self.options.http_timeout).retrieve(location)
            }
            Some(_) => Err(ResolveError::UnsupportedScheme {
                uri: location.to_string(),
            }),
        }
    }
}

impl FetchDocument for SchemaLoader {
    fn fetch(&self, location: &str) -> Result<Value, ResolveError> {
        let retrieved = self.retrieve(location)?;
        let content_type = retrieved.content_type.as_deref();
        if !self.options.accepts_media_type(location, content_type) {
            return Err(ResolveError::MediaType {
                uri: location.to_string(),
                content_type: content_type.unwrap_or_default().to_string(),
            });
        }
        serde_json::from_slice(&retrieved.bytes).map_err(|source| ResolveError::DocumentDecoding {
            uri: location.to_string(),
            source,
        })
    }
}

/// Load a schema from a file path.
///
/// # Errors
///
/// Returns `ResolveError::FileNotFound` if the file doesn't exist,
/// or `ResolveError::DocumentDecoding` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, ResolveError> {
    if !path.exists() {
        return Err(ResolveError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ResolveError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ResolveError::DocumentDecoding {
        uri: path.display().to_string(),
        source,
    })
}

/// Load a schema from a JSON string.
///
/// # Errors
///
/// Returns `ResolveError::DocumentDecoding` if the string isn't valid JSON.
pub fn load_schema_str(content: &str) -> Result<Value, ResolveError> {
    serde_json::from_str(content).map_err(|source| ResolveError::DocumentDecoding {
        uri: "<string>".to_string(),
        source,
    })
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// The URI a source should be resolved against.
///
/// URLs are used as-is; file paths become absolute `file://` URIs so that
/// relative references resolve next to the file.
pub fn source_uri(source: &str) -> String {
    if is_url(source) || source.starts_with("file://") {
        return source.to_string();
    }
    let path = Path::new(source);
    let absolute = path
        .canonicalize()
        .or_else(|_| std::env::current_dir().map(|dir| dir.join(path)))
        .unwrap_or_else(|_| path.to_path_buf());
    let display = absolute.to_string_lossy().replace('\\', "/");
    let encoded = utf8_percent_encode(&display, PATH);
    if display.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}

/// Load a schema from a file path or URL through `loader`.
///
/// Returns the document together with the URI it should be resolved against.
pub fn load_schema_auto(source: &str, loader: &SchemaLoader) -> Result<(Value, String), ResolveError> {
    let uri = source_uri(source);
    let document = if is_url(&uri) {
        loader.fetch(&uri)?
    } else {
        load_schema(&file_path(&uri))?
    };
    Ok((document, uri))
}
