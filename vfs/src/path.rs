//! Pure path helpers shared by the VFS and the shell.
//!
//! Paths are always `/`-separated. Normalized paths are absolute, contain no
//! `.` or `..` segments and have no trailing slash (except the root itself).

/// Normalize an absolute or relative path into an absolute one rooted at `/`.
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Resolve `path` against `cwd`. Absolute paths ignore `cwd`.
#[must_use]
pub fn resolve(cwd: &str, path: &str) -> String {
    if path.starts_with('/') {
        normalize(path)
    } else if path.is_empty() {
        normalize(cwd)
    } else {
        normalize(&format!("{cwd}/{path}"))
    }
}

/// Parent directory of a normalized path; `None` for the root.
#[must_use]
pub fn parent(path: &str) -> Option<String> {
    let path = normalize(path);
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) | None => Some("/".to_string()),
        Some(idx) => Some(path[..idx].to_string()),
    }
}

/// Final component of a path; empty for the root.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Join a directory and a child name.
#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(normalize("/a/./b/../c/"), "/a/c");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("a//b"), "/a/b");
    }

    #[test]
    fn resolve_relative_and_absolute() {
        assert_eq!(resolve("/home/user", "docs"), "/home/user/docs");
        assert_eq!(resolve("/home/user", "../other"), "/home/other");
        assert_eq!(resolve("/home/user", "/etc"), "/etc");
        assert_eq!(resolve("/home/user", ""), "/home/user");
    }

    #[test]
    fn parent_and_name() {
        assert_eq!(parent("/a/b"), Some("/a".to_string()));
        assert_eq!(parent("/a"), Some("/".to_string()));
        assert_eq!(parent("/"), None);
        assert_eq!(file_name("/a/b.txt"), "b.txt");
        assert_eq!(file_name("/"), "");
        assert_eq!(join("/", "bin"), "/bin");
        assert_eq!(join("/usr", "bin"), "/usr/bin");
    }
}
