use crate::{path, FileInfo, FileType, Vfs, VfsError, VfsResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

#[derive(Debug, Clone)]
enum MemEntry {
    File {
        content: String,
        mtime: SystemTime,
        ctime: SystemTime,
    },
    Dir {
        mtime: SystemTime,
        ctime: SystemTime,
    },
}

impl MemEntry {
    fn new_dir() -> Self {
        let now = SystemTime::now();
        Self::Dir {
            mtime: now,
            ctime: now,
        }
    }

    fn new_file(content: String) -> Self {
        let now = SystemTime::now();
        Self::File {
            content,
            mtime: now,
            ctime: now,
        }
    }

    fn to_file_info(&self, path: &str) -> FileInfo {
        let (size, file_type, mtime, ctime) = match self {
            Self::File {
                content,
                mtime,
                ctime,
            } => (content.len() as u64, FileType::Regular, *mtime, *ctime),
            Self::Dir { mtime, ctime } => (0, FileType::Directory, *mtime, *ctime),
        };
        FileInfo {
            path: path.to_string(),
            name: path::file_name(path).to_string(),
            size,
            file_type,
            mtime,
            ctime,
        }
    }
}

/// In-memory directory tree keyed by normalized absolute path.
pub struct MemoryVfs {
    namespace: String,
    entries: RwLock<BTreeMap<String, MemEntry>>,
    cwd: RwLock<String>,
}

impl Default for MemoryVfs {
    fn default() -> Self {
        Self::new("default")
    }
}

impl MemoryVfs {
    #[must_use]
    pub fn new(namespace: &str) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("/".to_string(), MemEntry::new_dir());
        Self {
            namespace: namespace.to_string(),
            entries: RwLock::new(entries),
            cwd: RwLock::new("/".to_string()),
        }
    }

    /// Create every directory in `dirs` (recursively) and return the tree.
    #[must_use]
    pub fn with_dirs(self, dirs: &[&str]) -> Self {
        for dir in dirs {
            if let Err(e) = self.mkdir(dir, true) {
                tracing::warn!(dir, error = %e, "failed to seed directory");
            }
        }
        self
    }

    /// Seed a file synchronously, creating parent directories.
    pub fn insert_file(&self, file_path: &str, content: &str) -> VfsResult<()> {
        let file_path = self.resolve(file_path);
        if let Some(parent) = path::parent(&file_path) {
            self.mkdir(&parent, true)?;
        }
        self.put_file(&file_path, content.to_string(), false)
    }

    fn entries(&self) -> RwLockReadGuard<'_, BTreeMap<String, MemEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entries_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<String, MemEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn put_file(&self, file_path: &str, content: String, append: bool) -> VfsResult<()> {
        let mut entries = self.entries_mut();
        let parent = path::parent(file_path)
            .ok_or_else(|| VfsError::is_directory(file_path))?;
        match entries.get(&parent) {
            Some(MemEntry::Dir { .. }) => {}
            Some(MemEntry::File { .. }) => return Err(VfsError::not_directory(parent)),
            None => return Err(VfsError::not_found(parent)),
        }
        match entries.get_mut(file_path) {
            Some(MemEntry::Dir { .. }) => Err(VfsError::is_directory(file_path)),
            Some(MemEntry::File {
                content: existing,
                mtime,
                ..
            }) => {
                if append {
                    existing.push_str(&content);
                } else {
                    *existing = content;
                }
                *mtime = SystemTime::now();
                Ok(())
            }
            None => {
                entries.insert(file_path.to_string(), MemEntry::new_file(content));
                Ok(())
            }
        }
    }

    fn children_of<'a>(
        entries: &'a BTreeMap<String, MemEntry>,
        dir: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a MemEntry)> + 'a {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        entries.iter().filter(move |(key, _)| {
            key.len() > prefix.len()
                && key.starts_with(&prefix)
                && !key[prefix.len()..].contains('/')
        })
    }
}

#[async_trait]
impl Vfs for MemoryVfs {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn cwd(&self) -> String {
        self.cwd.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_cwd(&self, dir: &str) -> VfsResult<()> {
        let target = self.resolve(dir);
        match self.entries().get(&target) {
            Some(MemEntry::Dir { .. }) => {}
            Some(MemEntry::File { .. }) => return Err(VfsError::not_directory(target)),
            None => return Err(VfsError::not_found(target)),
        }
        *self.cwd.write().unwrap_or_else(PoisonError::into_inner) = target;
        Ok(())
    }

    fn stat(&self, p: &str) -> VfsResult<FileInfo> {
        let p = self.resolve(p);
        self.entries()
            .get(&p)
            .map(|e| e.to_file_info(&p))
            .ok_or_else(|| VfsError::not_found(&p))
    }

    fn list(&self, dir: &str) -> VfsResult<Vec<FileInfo>> {
        let dir = self.resolve(dir);
        let entries = self.entries();
        match entries.get(&dir) {
            Some(MemEntry::Dir { .. }) => {}
            Some(MemEntry::File { .. }) => return Err(VfsError::not_directory(dir)),
            None => return Err(VfsError::not_found(dir)),
        }
        Ok(Self::children_of(&entries, &dir)
            .map(|(key, entry)| entry.to_file_info(key))
            .collect())
    }

    fn mkdir(&self, dir: &str, recursive: bool) -> VfsResult<()> {
        let dir = self.resolve(dir);
        let mut entries = self.entries_mut();
        match entries.get(&dir) {
            Some(MemEntry::Dir { .. }) if recursive => return Ok(()),
            Some(_) => return Err(VfsError::already_exists(dir)),
            None => {}
        }

        let mut missing = vec![dir.clone()];
        let mut cursor = path::parent(&dir);
        while let Some(parent) = cursor {
            match entries.get(&parent) {
                Some(MemEntry::Dir { .. }) => break,
                Some(MemEntry::File { .. }) => return Err(VfsError::not_directory(parent)),
                None if recursive => {
                    cursor = path::parent(&parent);
                    missing.push(parent);
                }
                None => return Err(VfsError::not_found(parent)),
            }
        }
        for p in missing.into_iter().rev() {
            entries.insert(p, MemEntry::new_dir());
        }
        Ok(())
    }

    fn remove(&self, target: &str, recursive: bool) -> VfsResult<()> {
        let target = self.resolve(target);
        if target == "/" {
            return Err(VfsError::invalid_argument("refusing to remove '/'"));
        }
        let mut entries = self.entries_mut();
        match entries.get(&target) {
            None => Err(VfsError::not_found(target)),
            Some(MemEntry::File { .. }) => {
                entries.remove(&target);
                Ok(())
            }
            Some(MemEntry::Dir { .. }) => {
                let prefix = format!("{target}/");
                let has_children = entries.keys().any(|k| k.starts_with(&prefix));
                if has_children && !recursive {
                    return Err(VfsError::directory_not_empty(target));
                }
                entries.retain(|k, _| k != &target && !k.starts_with(&prefix));
                Ok(())
            }
        }
    }

    async fn read(&self, p: &str) -> VfsResult<String> {
        let p = self.resolve(p);
        match self.entries().get(&p) {
            Some(MemEntry::File { content, .. }) => Ok(content.clone()),
            Some(MemEntry::Dir { .. }) => Err(VfsError::is_directory(p)),
            None => Err(VfsError::not_found(p)),
        }
    }

    async fn write(&self, p: &str, content: &str) -> VfsResult<()> {
        let p = self.resolve(p);
        self.put_file(&p, content.to_string(), false)
    }

    async fn append(&self, p: &str, content: &str) -> VfsResult<()> {
        let p = self.resolve(p);
        self.put_file(&p, content.to_string(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn root_exists() {
        let fs = MemoryVfs::default();
        assert!(fs.is_directory("/"));
        assert_eq!(fs.cwd(), "/");
    }

    #[test]
    fn write_read_append() {
        let fs = MemoryVfs::default();
        block_on(fs.write("/hello.txt", "hi\n")).unwrap();
        block_on(fs.append("/hello.txt", "there\n")).unwrap();
        assert_eq!(block_on(fs.read("/hello.txt")).unwrap(), "hi\nthere\n");
        assert_eq!(fs.stat("/hello.txt").unwrap().size, 9);
    }

    #[test]
    fn write_requires_parent() {
        let fs = MemoryVfs::default();
        let err = block_on(fs.write("/missing/file", "x")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn read_directory_is_error() {
        let fs = MemoryVfs::default().with_dirs(&["/bin"]);
        let err = block_on(fs.read("/bin")).unwrap_err();
        assert!(err.is_directory_error());
    }

    #[test]
    fn mkdir_recursive_and_strict() {
        let fs = MemoryVfs::default();
        assert!(fs.mkdir("/a/b/c", false).unwrap_err().is_not_found());
        fs.mkdir("/a/b/c", true).unwrap();
        assert!(fs.is_directory("/a/b"));
        assert_eq!(
            fs.mkdir("/a", false).unwrap_err(),
            VfsError::already_exists("/a")
        );
        fs.mkdir("/a", true).unwrap();
    }

    #[test]
    fn list_only_direct_children_sorted() {
        let fs = MemoryVfs::default().with_dirs(&["/d/sub/deep"]);
        fs.insert_file("/d/b.txt", "b").unwrap();
        fs.insert_file("/d/a.txt", "a").unwrap();
        let names: Vec<String> = fs.list("/d").unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
    }

    #[test]
    fn relative_paths_follow_cwd() {
        let fs = MemoryVfs::default().with_dirs(&["/home/user"]);
        fs.set_cwd("/home/user").unwrap();
        block_on(fs.write("notes", "x")).unwrap();
        assert!(fs.is_file("/home/user/notes"));
        assert_eq!(fs.resolve(".."), "/home");
        assert!(fs.set_cwd("/nope").unwrap_err().is_not_found());
    }

    #[test]
    fn remove_directory_needs_recursive_when_not_empty() {
        let fs = MemoryVfs::default().with_dirs(&["/x/y"]);
        assert_eq!(
            fs.remove("/x", false).unwrap_err(),
            VfsError::directory_not_empty("/x")
        );
        fs.remove("/x", true).unwrap();
        assert!(!fs.exists("/x"));
        assert!(!fs.exists("/x/y"));
        assert!(fs.remove("/", true).is_err());
    }
}
