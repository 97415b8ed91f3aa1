//! `{{key}}` substitution over outgoing body chunks.
//!
//! Every chunk is scanned on its own, so a placeholder split across two
//! chunks goes out untouched. An opening `{{` with no closing `}}` after it
//! is literal text.

/// A placeholder key and the text that replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub key: String,
    pub value: String,
}

impl Template {
    /// Create a binding replacing `{{key}}` with `value`.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// What [`render`] did with a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No bindings or no placeholder; the input is the output and `out` is untouched.
    Unchanged,
    /// `out` holds the substituted chunk.
    Rendered,
    /// `out` holds the substituted chunk cut at the size limit.
    Truncated,
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == needle)
}

/// Appends `bytes` to `out` without letting it grow past `limit`.
/// Returns false if anything was cut.
fn push_limited(out: &mut Vec<u8>, bytes: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(out.len());
    if bytes.len() > room {
        out.extend_from_slice(&bytes[..room]);
        return false;
    }
    out.extend_from_slice(bytes);
    true
}

/// Substitutes placeholders in `chunk` into `out`.
///
/// Keys are looked up linearly in `bindings`; the first equal key wins and
/// unknown keys are dropped along with their delimiters. The output never
/// exceeds `max(limit, chunk.len())` bytes.
pub fn render(chunk: &[u8], bindings: &[Template], limit: usize, out: &mut Vec<u8>) -> Outcome {
    if bindings.is_empty() || find(chunk, b"{{").is_none() {
        return Outcome::Unchanged;
    }

    let limit = limit.max(chunk.len());
    let mut fits = true;
    let mut rest = chunk;
    out.clear();

    while let Some(open) = find(rest, b"{{") {
        let inner = &rest[open + 2..];
        let Some(close) = find(inner, b"}}") else {
            break;
        };

        fits &= push_limited(out, &rest[..open], limit);
        let key = &inner[..close];
        if let Some(binding) = bindings.iter().find(|b| b.key.as_bytes() == key) {
            fits &= push_limited(out, binding.value.as_bytes(), limit);
        }
        rest = &inner[close + 2..];
    }
    fits &= push_limited(out, rest, limit);

    if fits {
        Outcome::Rendered
    } else {
        Outcome::Truncated
    }
}
