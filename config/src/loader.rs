use crate::{ConfigError, TrxConfig};
use regex::Regex;
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
    explicit_file: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            search_paths.push(home.join(".config/trx/trx.yaml"));
        }
        search_paths.push(PathBuf::from("./trx.yaml"));

        #[cfg(unix)]
        search_paths.insert(0, PathBuf::from("/etc/trx/trx.yaml"));

        Self {
            explicit_file: None,
            search_paths,
        }
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.explicit_file = Some(PathBuf::from(path));
        self
    }

    pub fn load(&self) -> Result<TrxConfig, ConfigError> {
        let mut config = TrxConfig::default();

        if let Ok(env_path) = std::env::var("TRX_CONFIG") {
            config = self.load_file(Path::new(&env_path))?;
        } else if let Some(ref explicit) = self.explicit_file {
            config = self.load_file(explicit)?;
        } else {
            for path in &self.search_paths {
                if path.exists() {
                    if let Ok(content) = std::fs::read_to_string(path) {
                        tracing::debug!(path = %path.display(), "merging config file");
                        config = self.merge_yaml(&config, &content)?;
                    }
                }
            }
        }

        self.apply_env_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn load_file(&self, path: &Path) -> Result<TrxConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            let expanded = self.expand_env_vars(&content);
            return Ok(serde_json::from_str(&expanded)?);
        }
        self.parse_yaml(&content)
    }

    fn parse_yaml(&self, content: &str) -> Result<TrxConfig, ConfigError> {
        let expanded = self.expand_env_vars(content);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    fn merge_yaml(&self, base: &TrxConfig, content: &str) -> Result<TrxConfig, ConfigError> {
        let overlay = self.parse_yaml(content)?;
        Ok(self.merge_configs(base, &overlay))
    }

    fn merge_configs(&self, base: &TrxConfig, overlay: &TrxConfig) -> TrxConfig {
        let defaults = TrxConfig::default();
        let mut result = base.clone();

        if overlay.shell != defaults.shell {
            result.shell = overlay.shell.clone();
        }
        if overlay.sandbox != defaults.sandbox {
            result.sandbox = overlay.sandbox.clone();
        }
        if overlay.logging != defaults.logging {
            result.logging = overlay.logging.clone();
        }

        result
    }

    fn expand_env_vars(&self, content: &str) -> String {
        let Ok(re) = Regex::new(r"\$\{([^}]+)\}") else {
            return content.to_string();
        };
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .to_string()
    }

    fn apply_env_overrides(&self, config: &mut TrxConfig) {
        if let Ok(path) = std::env::var("TRX_PATH") {
            if !path.is_empty() {
                config.shell.path = path;
            }
        }
        if let Ok(prompt) = std::env::var("TRX_PROMPT") {
            config.shell.prompt = prompt;
        }
        if let Ok(origin) = std::env::var("TRX_ORIGIN") {
            if !origin.is_empty() {
                config.sandbox.origin = origin;
            }
        }
        if let Ok(proxy) = std::env::var("TRX_PROXY_ENDPOINT") {
            if !proxy.is_empty() {
                config.sandbox.proxy_endpoint = proxy;
            }
        }
        if let Ok(level) = std::env::var("TRX_LOG_LEVEL") {
            if let Ok(l) = serde_yaml::from_str(&level) {
                config.logging.level = l;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogLevel;
    use std::io::Write;

    #[test]
    fn expand_env_vars_works() {
        std::env::set_var("TRX_TEST_VAR_123", "hello");
        let loader = ConfigLoader::new();
        let result = loader.expand_env_vars("value: ${TRX_TEST_VAR_123}");
        assert_eq!(result, "value: hello");
        std::env::remove_var("TRX_TEST_VAR_123");
    }

    #[test]
    fn missing_env_var_becomes_empty() {
        let loader = ConfigLoader::new();
        let result = loader.expand_env_vars("value: ${NONEXISTENT_VAR_XYZ}");
        assert_eq!(result, "value: ");
    }

    #[test]
    fn env_overrides_config() {
        std::env::set_var("TRX_PROXY_ENDPOINT", "https://proxy.test/p");
        let mut config = TrxConfig::default();
        let loader = ConfigLoader::new();
        loader.apply_env_overrides(&mut config);
        assert_eq!(config.sandbox.proxy_endpoint, "https://proxy.test/p");
        std::env::remove_var("TRX_PROXY_ENDPOINT");
    }

    #[test]
    fn overlay_only_replaces_changed_sections() {
        let loader = ConfigLoader::new();
        let base = TrxConfig::default();
        let merged = loader
            .merge_yaml(&base, "logging:\n  level: trace\n")
            .unwrap();
        assert_eq!(merged.logging.level, LogLevel::Trace);
        assert_eq!(merged.shell, base.shell);
    }

    #[test]
    fn explicit_yaml_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "shell:\n  user: alice").unwrap();
        let loader = ConfigLoader::new();
        let config = loader.load_file(file.path()).unwrap();
        assert_eq!(config.shell.user, "alice");
    }

    #[test]
    fn explicit_json_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"sandbox": {{"packages_dir": "/p"}}}}"#).unwrap();
        let loader = ConfigLoader::new();
        let config = loader.load_file(file.path()).unwrap();
        assert_eq!(config.sandbox.packages_dir, "/p");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let loader = ConfigLoader::new();
        let err = loader
            .load_file(Path::new("/definitely/not/here.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
