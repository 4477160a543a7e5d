use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("invalid JSON config: {0}")]
    ParseJson(#[from] serde_json::Error),

    /// VFS locations must be absolute; there is no cwd when config is read.
    #[error("{field} must be an absolute VFS path, got '{value}'")]
    RelativePath { field: &'static str, value: String },

    #[error("sandbox.origin must be an http(s) URL, got '{0}'")]
    InvalidOrigin(String),
}
