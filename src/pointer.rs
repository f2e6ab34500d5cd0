//! RFC 6901 JSON Pointer decoding.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::ResolveError;

/// Characters percent-encoded when a segment is written into a URI fragment.
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A decoded JSON pointer: the ordered list of keys or indices it addresses.
///
/// The empty pointer addresses the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonPointer {
    segments: Vec<String>,
}

impl JsonPointer {
    /// Decode a pointer taken from the fragment of a reference.
    ///
    /// A non-empty pointer must start with `/`. Each segment has `~1` and `~0`
    /// unescaped in a single pass and is then percent-decoded.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidPointer` if the pointer lacks the leading
    /// slash or a segment percent-decodes to invalid UTF-8.
    pub fn parse(pointer: &str) -> Result<Self, ResolveError> {
        if pointer.is_empty() {
            return Ok(Self::default());
        }
        let Some(body) = pointer.strip_prefix('/') else {
            return Err(ResolveError::invalid_pointer(
                pointer,
                "a non-empty pointer must start with '/'",
            ));
        };

        let segments = body
            .split('/')
            .map(|raw| {
                let unescaped = unescape_segment(raw);
                percent_decode_str(&unescaped)
                    .decode_utf8()
                    .map(|decoded| decoded.into_owned())
                    .map_err(|_| {
                        ResolveError::invalid_pointer(pointer, format!("segment \"{raw}\" is not valid UTF-8"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }

    /// Build a pointer from already-decoded segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render the pointer for use as a URI fragment (escaped and percent-encoded).
    pub fn to_fragment(&self) -> String {
        self.segments
            .iter()
            .map(|segment| {
                format!(
                    "/{}",
                    utf8_percent_encode(&escape_segment(segment), FRAGMENT)
                )
            })
            .collect()
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", escape_segment(segment))?;
        }
        Ok(())
    }
}

/// Escape `~` and `/` in a key so it can be used as a pointer segment.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Replace `~1` with `/` and `~0` with `~` in one left-to-right pass, so that
/// `~01` decodes to `~1`. A `~` not followed by `0` or `1` is kept as-is.
pub fn unescape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.peek() {
                Some('0') => {
                    chars.next();
                    out.push('~');
                }
                Some('1') => {
                    chars.next();
                    out.push('/');
                }
                _ => out.push('~'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse an array index segment: `0` or digits without a leading zero.
pub(crate) fn parse_index(segment: &str) -> Option<usize> {
    let well_formed = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if well_formed {
        segment.parse().ok()
    } else {
        None
    }
}
