//! Shared path-string utilities.
//!
//! Index paths arrive as plain strings in whatever separator style the source
//! filesystem used (the index database stores Windows paths). Everything that
//! inspects path structure works on the canonical `/`-separated form.

use std::borrow::Cow;

/// Canonical separator used for depth counting and glob matching.
pub const CANONICAL_SEPARATOR: char = '/';

/// Convert `\` separators to `/`. Borrows when the path is already canonical.
pub fn to_canonical(path: &str) -> Cow<'_, str> {
    if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

/// Number of non-empty segments in the canonical form of `path`.
///
/// A leading root separator or doubled separators do not add segments, so
/// `/home/x/a.txt` and `C:\Users\x\a.txt` count 3 and 4 respectively.
pub fn segment_count(path: &str) -> usize {
    to_canonical(path)
        .split(CANONICAL_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .count()
}
