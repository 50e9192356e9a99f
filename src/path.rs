//! Lexical path normalisation for module keys.
//!
//! Paths are slash-separated and never touch the filesystem.

/// Returns the shortest lexically equivalent path.
///
/// Repeated slashes collapse, `.` segments drop, `..` removes the preceding
/// segment and a trailing slash is removed. A path that cleans down to
/// nothing becomes the root `/`.
pub fn clean_path(path: &str) -> String {
    let cleaned = clean(path);
    if cleaned == "." {
        "/".to_string()
    } else {
        cleaned
    }
}

/// Cleans a subtree prefix; the root collapses to the empty prefix so that
/// `prefix + "/key"` stays a valid path.
pub fn clean_prefix(prefix: &str) -> String {
    match clean(prefix).as_str() {
        "/" | "." => String::new(),
        other => other.to_string(),
    }
}

/// Joins `prefix` and `path` the way a nested subtree does.
pub(crate) fn join(prefix: &str, path: &str) -> String {
    clean(&format!("{prefix}/{path}"))
}

/// Key holding the JSON child list of `path`.
pub(crate) fn child_list_key(path: &str) -> String {
    if path == "/" {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Full path of the child `name` of `path`.
pub(crate) fn child_path(path: &str, name: &str) -> String {
    if path == "/" {
        format!("/{name}")
    } else {
        format!("{path}/{name}")
    }
}

fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
