//! Configuration file management for deckforge.
//!
//! Provides a TOML-based config file at `~/.config/deckforge/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use deckforge_core::{BackendConfig, Limits};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub backend: BackendSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub limits: LimitsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSection {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl ServerSection {
    pub const DEFAULT_BIND: &str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 9400;
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: Self::DEFAULT_BIND.to_string(),
            port: Self::DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_faq_history: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_document_chars: Option<usize>,
}

impl LimitsSection {
    fn resolve(&self) -> Limits {
        let defaults = Limits::default();
        Limits {
            max_faq_history: self.max_faq_history.unwrap_or(defaults.max_faq_history),
            max_tool_calls: self.max_tool_calls.unwrap_or(defaults.max_tool_calls),
            max_document_chars: self
                .max_document_chars
                .unwrap_or(defaults.max_document_chars),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the deckforge config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/deckforge` or
/// `~/.config/deckforge`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("deckforge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("deckforge")
}

/// Return the path to the deckforge config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file if there is one. A file that exists but cannot be
/// read or parsed is logged and skipped.
pub fn load_optional_config_from(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }
    match load_config_from(path) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %format!("{e:#}"),
                "ignoring unusable config file"
            );
            None
        }
    }
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(&config_path(), config)
}

pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // Owner read/write only: the file holds an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line, highest priority.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct DeckforgeConfig {
    pub backend: BackendConfig,
    pub server: ServerSection,
    pub limits: Limits,
}

impl DeckforgeConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - API key: `--api-key` > `DECKFORGE_API_KEY` > `GEMINI_API_KEY` > `backend.api_key` > error
    /// - Base URL: `--base-url` > `DECKFORGE_BASE_URL` > `backend.base_url` > default
    /// - Models, timeout, server, limits: config file > default
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file_config = load_optional_config_from(&config_path());
        Self::resolve_with(cli, file_config.as_ref())
    }

    pub fn resolve_with(cli: &CliOverrides, file: Option<&ConfigFile>) -> Result<Self> {
        let section = file.map(|f| &f.backend);

        let api_key = if let Some(key) = cli.api_key.clone() {
            key
        } else if let Some(key) = BackendConfig::api_key_from_env() {
            key
        } else if let Some(key) = section.map(|s| s.api_key.clone()).filter(|k| !k.is_empty()) {
            key
        } else {
            bail!(
                "API key not found; set {} (or {}) or run `deckforge init` to create a config file",
                BackendConfig::API_KEY_ENV,
                BackendConfig::FALLBACK_API_KEY_ENV
            );
        };

        let mut backend = BackendConfig::new(api_key);

        let base_url = cli
            .base_url
            .clone()
            .or_else(BackendConfig::base_url_from_env)
            .or_else(|| section.and_then(|s| s.base_url.clone()));
        if let Some(url) = base_url {
            backend = backend.with_base_url(url);
        }

        if let Some(s) = section {
            if let Some(model) = &s.text_model {
                backend.text_model = model.clone();
            }
            if let Some(model) = &s.image_model {
                backend.image_model = model.clone();
            }
            if let Some(secs) = s.timeout_secs {
                if secs == 0 {
                    bail!("backend.timeout_secs must be greater than zero");
                }
                backend = backend.with_timeout(Duration::from_secs(secs));
            }
        }

        Ok(Self {
            backend,
            server: file.map(|f| f.server.clone()).unwrap_or_default(),
            limits: file.map(|f| f.limits.resolve()).unwrap_or_default(),
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        unsafe { std::env::remove_var("DECKFORGE_API_KEY") };
        unsafe { std::env::remove_var("GEMINI_API_KEY") };
        unsafe { std::env::remove_var("DECKFORGE_BASE_URL") };
    }

    fn file_with_key(key: &str) -> ConfigFile {
        ConfigFile {
            backend: BackendSection {
                api_key: key.to_string(),
                base_url: Some("http://file.example/v1beta".to_string()),
                text_model: Some("gemini-file-model".to_string()),
                image_model: None,
                timeout_secs: Some(30),
            },
            server: ServerSection::default(),
            limits: LimitsSection {
                max_faq_history: Some(4),
                ..LimitsSection::default()
            },
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("deckforge").join("config.toml");

        let original = file_with_key("file-key");
        save_config_to(&path, &original).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config_to(&path, &file_with_key("k")).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn optional_config_skips_missing_and_broken_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        assert!(load_optional_config_from(&path).is_none());

        std::fs::write(&path, "[backend]\napi_key = \"unterminated\n").unwrap();
        assert!(load_optional_config_from(&path).is_none());

        save_config_to(&path, &file_with_key("k")).unwrap();
        assert_eq!(load_optional_config_from(&path), Some(file_with_key("k")));
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let file: ConfigFile = toml::from_str("[backend]\napi_key = \"abc\"\n").unwrap();
        assert_eq!(file.server, ServerSection::default());
        assert_eq!(file.limits, LimitsSection::default());
        assert!(file.backend.base_url.is_none());
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("DECKFORGE_API_KEY", "env-key") };
        unsafe { std::env::set_var("DECKFORGE_BASE_URL", "http://env.example/v1beta") };

        let cli = CliOverrides {
            api_key: Some("cli-key".to_string()),
            base_url: Some("http://cli.example/v1beta/".to_string()),
        };
        let config = DeckforgeConfig::resolve_with(&cli, Some(&file_with_key("file-key"))).unwrap();
        assert_eq!(config.backend.api_key, "cli-key");
        assert_eq!(config.backend.base_url, "http://cli.example/v1beta");

        clear_env();
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("GEMINI_API_KEY", "gemini-env-key") };
        unsafe { std::env::set_var("DECKFORGE_BASE_URL", "http://env.example/v1beta") };

        let config =
            DeckforgeConfig::resolve_with(&CliOverrides::default(), Some(&file_with_key("file-key")))
                .unwrap();
        assert_eq!(config.backend.api_key, "gemini-env-key");
        assert_eq!(config.backend.base_url, "http://env.example/v1beta");

        clear_env();
    }

    #[test]
    fn deckforge_key_wins_over_gemini_key() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("GEMINI_API_KEY", "gemini") };
        unsafe { std::env::set_var("DECKFORGE_API_KEY", "deckforge") };

        let config = DeckforgeConfig::resolve_with(&CliOverrides::default(), None).unwrap();
        assert_eq!(config.backend.api_key, "deckforge");

        clear_env();
    }

    #[test]
    fn resolve_reads_file_sections() {
        let _lock = lock_env();
        clear_env();

        let config =
            DeckforgeConfig::resolve_with(&CliOverrides::default(), Some(&file_with_key("file-key")))
                .unwrap();
        assert_eq!(config.backend.api_key, "file-key");
        assert_eq!(config.backend.base_url, "http://file.example/v1beta");
        assert_eq!(config.backend.text_model, "gemini-file-model");
        assert_eq!(config.backend.image_model, BackendConfig::DEFAULT_IMAGE_MODEL);
        assert_eq!(config.backend.timeout, Duration::from_secs(30));
        assert_eq!(config.limits.max_faq_history, 4);
        assert_eq!(config.limits.max_tool_calls, Limits::DEFAULT_MAX_TOOL_CALLS);
        assert_eq!(config.server.port, ServerSection::DEFAULT_PORT);
    }

    #[test]
    fn resolve_rejects_zero_timeout() {
        let _lock = lock_env();
        clear_env();

        let mut file = file_with_key("k");
        file.backend.timeout_secs = Some(0);
        let err = DeckforgeConfig::resolve_with(&CliOverrides::default(), Some(&file)).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn resolve_errors_when_no_api_key() {
        let _lock = lock_env();
        clear_env();

        // Point XDG_CONFIG_HOME at an empty dir so no real config file is found.
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let result = DeckforgeConfig::resolve(&CliOverrides::default());

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("API key not found"), "unexpected error: {msg}");
        assert!(msg.contains("DECKFORGE_API_KEY"));
        assert!(msg.contains("deckforge init"));
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let _lock = lock_env();
        let path = config_path();
        assert!(
            path.ends_with("deckforge/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
