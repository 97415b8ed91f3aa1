//! Lazy `key=value&key=value` lookup over query strings and form bodies.
//!
//! Nothing is decoded: values come back exactly as they appear on the wire.

/// Returns the value of the first pair in `source` whose key equals `name`.
///
/// Pairs are separated by `&` (empty segments are skipped) and split on the
/// first `=`. A key without `=` has an empty value. Returns `""` when no
/// pair matches.
pub fn param_value<'a>(source: &'a str, name: &str) -> &'a str {
    source
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| *key == name)
        .map_or("", |(_, value)| value)
}
