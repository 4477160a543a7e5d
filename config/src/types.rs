use crate::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrxConfig {
    pub shell: ShellConfig,
    pub sandbox: SandboxConfig,
    pub logging: LoggingConfig,
}

impl TrxConfig {
    /// Check the VFS locations: home, rc file, packages dir and every `PATH`
    /// entry must be absolute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("shell.home", self.shell.home.as_str()),
            ("shell.rc_file", self.shell.rc_file.as_str()),
            ("sandbox.packages_dir", self.sandbox.packages_dir.as_str()),
        ];
        let path_entries = self
            .shell
            .path
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(|dir| ("shell.path", dir));
        for (field, value) in fields.into_iter().chain(path_entries) {
            if !value.starts_with('/') {
                return Err(ConfigError::RelativePath {
                    field,
                    value: value.to_string(),
                });
            }
        }
        if !["http://", "https://"]
            .iter()
            .any(|scheme| self.sandbox.origin.starts_with(scheme))
        {
            return Err(ConfigError::InvalidOrigin(self.sandbox.origin.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Prompt template. Placeholders: `{cwd}`, `{user}`, `{status}` and the
    /// color names `{red}`, `{green}`, `{blue}`, `{yellow}`, `{cyan}`,
    /// `{bold}`, `{reset}`.
    pub prompt: String,
    /// Initial `PATH` inside the virtual filesystem.
    pub path: String,
    pub home: String,
    pub user: String,
    /// Script inside the VFS sourced at startup when it exists.
    pub rc_file: String,
    pub history: HistoryConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "{green}{user}{reset}:{blue}{cwd}{reset}$ ".to_string(),
            path: "/bin:/usr/bin".to_string(),
            home: "/home/user".to_string(),
            user: "user".to_string(),
            rc_file: "/home/user/.trxrc".to_string(),
            history: HistoryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Host path of the REPL history file.
    pub file: String,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: "~/.trx_history".to_string(),
            max_entries: 1000,
        }
    }
}

impl HistoryConfig {
    /// History file path with `~` and `$VAR` expanded.
    #[must_use]
    pub fn expanded_file(&self) -> String {
        shellexpand::full(&self.file)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| self.file.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Origin the host serves from. Relative endpoints resolve against it.
    pub origin: String,
    /// Same-origin endpoint `proxyFetch` routes requests through.
    pub proxy_endpoint: String,
    /// Executables below `<packages_dir>/<package>/` get package config access.
    pub packages_dir: String,
    pub features: FeatureConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            proxy_endpoint: "/api/proxy".to_string(),
            packages_dir: "/usr/lib/trx".to_string(),
            features: FeatureConfig::default(),
        }
    }
}

/// Host feature switches consulted for an executable's `@requires` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub network: bool,
    pub clipboard: bool,
    pub storage: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            network: true,
            clipboard: false,
            storage: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Pretty,
            filter: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}
