//! Virtual filesystem collaborator for the trx shell.
//!
//! The shell engine never touches the host filesystem. Everything it reads or
//! writes goes through the [`Vfs`] trait, which keeps metadata operations
//! synchronous and content operations asynchronous so that remote or
//! browser-backed stores can suspend on I/O.

mod error;
mod memfs;
pub mod path;
mod provider;
mod types;

pub use error::{VfsError, VfsResult};
pub use memfs::MemoryVfs;
pub use provider::Vfs;
pub use types::{FileInfo, FileType};
