//! Slash-delimited, root-relative path helpers. The root is the empty string.

pub const ROOT: &str = "";

pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

pub fn parent(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => ROOT.to_string(),
    }
}

pub fn base_name(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, name)) => name,
        None => path,
    }
}

/// True when `path` is `ancestor` itself or lies below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Replaces the leading `old_prefix` of `path` with `new_prefix`.
/// Paths outside `old_prefix` come back unchanged.
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> String {
    if old_prefix.is_empty() || !is_within(path, old_prefix) {
        return path.to_string();
    }
    let rest = &path[old_prefix.len()..];
    let rest = rest.trim_start_matches('/');
    join(new_prefix, rest).trim_end_matches('/').to_string()
}
