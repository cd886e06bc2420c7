//! Helpers for `/`-separated remote paths. Directory paths are kept with a
//! trailing separator so they can be told apart from file paths.

/// Joins path segments with `/`. Empty segments are skipped and an absolute
/// segment discards everything before it.
pub fn combine<S: AsRef<str>>(parts: &[S]) -> String {
    let mut out = String::new();
    for part in parts.iter().map(AsRef::as_ref).filter(|p| !p.is_empty()) {
        if part.starts_with('/') {
            out.clear();
        } else if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}

/// `path` with exactly one trailing `/`; the empty path becomes the root.
pub fn as_directory(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    format!("{}/", trimmed)
}

/// The form sent with `CWD`: no trailing `/` except for the root itself.
pub fn without_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Parent directory of an absolute path; `None` for the root and for
/// single-segment relative paths.
pub fn parent(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    Some(as_directory(&trimmed[..=idx]))
}

/// Last segment of the path, `/` for the root.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None if trimmed.is_empty() => "/",
        None => trimmed,
    }
}
