//! Page host normalization
//!
//! The white/black lists and the per-site override maps are keyed by the
//! normalized page host, never the raw value the tab reported.

/// Get the position after an optional `http://` or `https://` prefix.
#[inline]
fn scheme_end(host: &str) -> usize {
    let bytes = host.as_bytes();
    if bytes.len() >= 8 && bytes[..8].eq_ignore_ascii_case(b"https://") {
        8
    } else if bytes.len() >= 7 && bytes[..7].eq_ignore_ascii_case(b"http://") {
        7
    } else {
        0
    }
}

/// Normalize a page host into the key used by the site lists.
///
/// Lowercases, strips an optional `http(s)://` prefix and a leading `www.`,
/// and drops anything after the host itself (port, path, query, fragment)
/// along with a trailing dot.
pub fn resolve_site_key(page_host: &str) -> String {
    let trimmed = page_host.trim();
    let rest = &trimmed[scheme_end(trimmed)..];

    // Host end (first of: '/', '?', '#', ':', or end of string)
    let end = rest
        .bytes()
        .position(|b| matches!(b, b'/' | b'?' | b'#' | b':'))
        .unwrap_or(rest.len());

    let host = rest[..end].trim_end_matches('.').to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => host,
    }
}
