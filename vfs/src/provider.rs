use crate::{path, FileInfo, VfsResult};
use async_trait::async_trait;

/// The filesystem collaborator consumed by the shell engine.
///
/// Every path argument may be absolute or relative; relative paths are
/// resolved against [`Vfs::cwd`]. Metadata operations are synchronous; content
/// operations may suspend.
#[async_trait]
pub trait Vfs: Send + Sync {
    /// Namespace identifying this tree (used to key version history).
    fn namespace(&self) -> &str;

    fn cwd(&self) -> String;

    fn set_cwd(&self, path: &str) -> VfsResult<()>;

    fn resolve(&self, path: &str) -> String {
        path::resolve(&self.cwd(), path)
    }

    fn stat(&self, path: &str) -> VfsResult<FileInfo>;

    fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    fn is_file(&self, path: &str) -> bool {
        self.stat(path).is_ok_and(|info| info.is_file())
    }

    fn is_directory(&self, path: &str) -> bool {
        self.stat(path).is_ok_and(|info| info.is_dir())
    }

    /// Directory entries sorted by name.
    fn list(&self, path: &str) -> VfsResult<Vec<FileInfo>>;

    fn mkdir(&self, path: &str, recursive: bool) -> VfsResult<()>;

    fn remove(&self, path: &str, recursive: bool) -> VfsResult<()>;

    async fn read(&self, path: &str) -> VfsResult<String>;

    async fn write(&self, path: &str, content: &str) -> VfsResult<()>;

    async fn append(&self, path: &str, content: &str) -> VfsResult<()>;
}
