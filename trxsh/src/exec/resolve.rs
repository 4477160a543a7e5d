//! Command resolution against the virtual filesystem

use trx_vfs::{path, Vfs};

/// File suffixes that mark a VFS file as a runnable executable, in search order.
pub const EXECUTABLE_SUFFIXES: [&str; 2] = [".trx", ".exe"];

pub fn has_executable_suffix(name: &str) -> bool {
    EXECUTABLE_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Find the executable file a command name refers to.
///
/// Names with an executable suffix or a `/` are checked directly (relative to
/// the VFS cwd). Bare names are searched in each `PATH` directory in order,
/// trying `name.trx` before `name.exe`.
pub fn resolve_executable(name: &str, vfs: &dyn Vfs, path_var: Option<&str>) -> Option<String> {
    if name.is_empty() {
        return None;
    }

    if has_executable_suffix(name) || name.contains('/') {
        let resolved = vfs.resolve(name);
        return vfs.is_file(&resolved).then_some(resolved);
    }

    let path_var = path_var?;
    for dir in path_var.split(':').filter(|d| !d.is_empty()) {
        for suffix in EXECUTABLE_SUFFIXES {
            let candidate = vfs.resolve(&path::join(dir, &format!("{name}{suffix}")));
            if vfs.is_file(&candidate) {
                tracing::debug!(command = name, path = %candidate, "resolved executable");
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use trx_vfs::MemoryVfs;

    fn vfs() -> MemoryVfs {
        let vfs = MemoryVfs::new("test").with_dirs(&["/a", "/b", "/home"]);
        vfs.insert_file("/a/tool.exe", "x").unwrap();
        vfs.insert_file("/b/tool.trx", "x").unwrap();
        vfs.insert_file("/b/only.exe", "x").unwrap();
        vfs.insert_file("/home/local.trx", "x").unwrap();
        vfs
    }

    #[test]
    fn test_path_order_wins_over_suffix_order() {
        let vfs = vfs();
        assert_eq!(
            resolve_executable("tool", &vfs, Some("/a:/b")),
            Some("/a/tool.exe".to_string())
        );
        assert_eq!(
            resolve_executable("tool", &vfs, Some("/b:/a")),
            Some("/b/tool.trx".to_string())
        );
    }

    #[test]
    fn test_trx_before_exe_in_same_dir() {
        let vfs = vfs();
        vfs.insert_file("/a/tool.trx", "x").unwrap();
        assert_eq!(
            resolve_executable("tool", &vfs, Some("/a")),
            Some("/a/tool.trx".to_string())
        );
    }

    #[test]
    fn test_direct_paths() {
        let vfs = vfs();
        vfs.set_cwd("/home").unwrap();
        assert_eq!(
            resolve_executable("local.trx", &vfs, None),
            Some("/home/local.trx".to_string())
        );
        assert_eq!(
            resolve_executable("/b/only.exe", &vfs, None),
            Some("/b/only.exe".to_string())
        );
        assert_eq!(resolve_executable("./missing.trx", &vfs, Some("/a")), None);
    }

    #[test]
    fn test_not_found() {
        let vfs = vfs();
        assert_eq!(resolve_executable("nope", &vfs, Some("/a:/b")), None);
        assert_eq!(resolve_executable("tool", &vfs, None), None);
        assert_eq!(resolve_executable("tool", &vfs, Some("")), None);
    }
}
