//! TRX Configuration System
//!
//! Provides YAML-based configuration for the trx shell.
//!
//! # Configuration Loading Priority
//!
//! 1. Compiled-in defaults
//! 2. `/etc/trx/trx.yaml` (system-wide)
//! 3. `~/.config/trx/trx.yaml` (user)
//! 4. `./trx.yaml` (project-local)
//! 5. `TRX_CONFIG=/path/to/config.yaml` (explicit)
//! 6. Environment variables (highest priority)
//!
//! # Example Configuration
//!
//! ```yaml
//! shell:
//!   prompt: "{green}{user}{reset}:{cwd}$ "
//!   path: "/bin:/usr/bin:/home/user/bin"
//!
//! sandbox:
//!   origin: "https://trx.example.com"
//!   proxy_endpoint: "https://proxy.example.com/fetch"
//!   features:
//!     network: true
//!     clipboard: false
//!
//! logging:
//!   level: debug
//! ```

#![allow(missing_docs)]

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::*;

/// Load configuration from default locations.
///
/// Searches for config files in order and merges them.
/// Environment variables override file values.
pub fn load() -> Result<TrxConfig, ConfigError> {
    ConfigLoader::new().load()
}

/// Load configuration from a specific file.
pub fn load_from_file(path: &str) -> Result<TrxConfig, ConfigError> {
    ConfigLoader::new().with_file(path).load()
}
