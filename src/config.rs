//! Configuration for lureforge.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LUREFORGE_HOME, LUREFORGE_LIBRARY, LUREFORGE_REWRITER_API_KEY)
//! 2. Config file (.lureforge/config.yaml)
//! 3. Defaults (~/.lureforge)
//!
//! Config file discovery:
//! - Searches current directory and parents for .lureforge/config.yaml
//! - `home` and `policies.dir` are relative to the .lureforge/ directory,
//!   `library` to the project root that contains it

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::ImportLimits;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Default environment variable holding the rewriter API key
pub const DEFAULT_API_KEY_ENV: &str = "LUREFORGE_REWRITER_API_KEY";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub rewriter: Option<RewriterConfig>,
    #[serde(default)]
    pub downloads: Option<DownloadsConfig>,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub limits: Option<ImportLimits>,
    #[serde(default)]
    pub policies: Option<PoliciesConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .lureforge/)
    pub home: Option<String>,
    /// Library directory (relative to the project root)
    pub library: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewriterConfig {
    /// Base URL of an OpenAI-compatible API; rewriting is off without one
    pub endpoint: Option<String>,
    pub model: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadsConfig {
    /// Origin serving `/system/` and `/images/` assets
    pub legacy_origin: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Public base URL of the library (object storage or web server)
    pub public_base_url: Option<String>,
    /// Tracking script injected into delivered documents
    pub tracking_script_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoliciesConfig {
    /// Directory of `<policy>.yaml` rule-table overrides
    pub dir: Option<String>,
}

/// Rewriter settings after defaults and env overrides
#[derive(Debug, Clone)]
pub struct RewriterSettings {
    pub endpoint: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for RewriterSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_seconds: 120,
        }
    }
}

impl RewriterSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub legacy_origin: String,
    pub timeout_seconds: u64,
    pub attempts: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            legacy_origin: "https://www.example.com".to_string(),
            timeout_seconds: 10,
            attempts: 2,
        }
    }
}

impl DownloadSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub public_base_url: Option<String>,
    pub tracking_script_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            public_base_url: None,
            tracking_script_url: "/tracking/track.js".to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to lureforge home (journals, catalog)
    pub home: PathBuf,
    /// Absolute path to the content library
    pub library: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub rewriter: RewriterSettings,
    pub downloads: DownloadSettings,
    pub storage: StorageSettings,
    pub limits: ImportLimits,
    /// Directory of rule-table overrides
    pub policies_dir: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".lureforge").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's location
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve configuration from an optional config file plus the environment
fn resolve(config_file: Option<PathBuf>) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".lureforge");

    let file = config_file.as_deref().map(load_config_file).transpose()?;

    // .lureforge/ and the project root containing it
    let dot_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let base_dir = dot_dir.parent().unwrap_or(Path::new("."));

    let home = match (env_var("LUREFORGE_HOME"), file.as_ref().and_then(|f| f.paths.home.as_ref())) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(home_path)) => resolve_path(dot_dir, home_path),
        (None, None) => default_home,
    };

    let library = match (env_var("LUREFORGE_LIBRARY"), file.as_ref().and_then(|f| f.paths.library.as_ref())) {
        (Some(env_lib), _) => PathBuf::from(env_lib),
        (None, Some(lib_path)) => resolve_path(base_dir, lib_path),
        (None, None) => home.join("library"),
    };

    let mut rewriter = RewriterSettings::default();
    let mut api_key_env = DEFAULT_API_KEY_ENV.to_string();
    if let Some(cfg) = file.as_ref().and_then(|f| f.rewriter.as_ref()) {
        rewriter.endpoint = cfg.endpoint.clone();
        if let Some(model) = &cfg.model {
            rewriter.model = model.clone();
        }
        if let Some(timeout) = cfg.timeout_seconds {
            rewriter.timeout_seconds = timeout;
        }
        if let Some(name) = &cfg.api_key_env {
            api_key_env = name.clone();
        }
    }
    rewriter.api_key = env_var(&api_key_env).or_else(|| env_var(DEFAULT_API_KEY_ENV));

    let mut downloads = DownloadSettings::default();
    if let Some(cfg) = file.as_ref().and_then(|f| f.downloads.as_ref()) {
        if let Some(origin) = &cfg.legacy_origin {
            downloads.legacy_origin = origin.trim_end_matches('/').to_string();
        }
        downloads.timeout_seconds = cfg.timeout_seconds.unwrap_or(downloads.timeout_seconds);
        downloads.attempts = cfg.attempts.unwrap_or(downloads.attempts).max(1);
    }

    let mut storage = StorageSettings::default();
    if let Some(cfg) = file.as_ref().and_then(|f| f.storage.as_ref()) {
        storage.public_base_url = cfg.public_base_url.clone();
        if let Some(script) = &cfg.tracking_script_url {
            storage.tracking_script_url = script.clone();
        }
    }

    let limits = file.as_ref().and_then(|f| f.limits.clone()).unwrap_or_default();

    let policies_dir = file
        .as_ref()
        .and_then(|f| f.policies.as_ref())
        .and_then(|p| p.dir.as_deref())
        .map(|dir| resolve_path(dot_dir, dir));

    Ok(ResolvedConfig {
        home,
        library,
        config_file,
        rewriter,
        downloads,
        storage,
        limits,
        policies_dir,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    resolve(find_config_file())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the lureforge home directory
pub fn lureforge_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the import journals directory ($LUREFORGE_HOME/imports)
pub fn imports_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("imports"))
}

/// Get the library directory.
pub fn library_dir() -> Result<PathBuf> {
    Ok(config()?.library.clone())
}

/// Get the catalog path ($LUREFORGE_HOME/catalog.json)
pub fn catalog_path() -> Result<PathBuf> {
    Ok(config()?.home.join("catalog.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let dot_dir = temp.path().join(".lureforge");
        std::fs::create_dir_all(&dot_dir).unwrap();

        let config_path = dot_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", content).unwrap();
        (temp, config_path)
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None).unwrap();

        if std::env::var("LUREFORGE_HOME").is_err() {
            let expected_home = dirs::home_dir().unwrap().join(".lureforge");
            assert_eq!(config.home, expected_home);
        }
        assert!(config.config_file.is_none());
        assert!(config.rewriter.endpoint.is_none());
        assert_eq!(config.downloads.attempts, 2);
        assert_eq!(config.limits.max_chunk_bytes, ImportLimits::default().max_chunk_bytes);
    }

    #[test]
    fn test_config_file_parsing() {
        let (_temp, config_path) = write_config(
            r#"
version: "1.0"
paths:
  home: ./
  library: ../library
rewriter:
  endpoint: http://localhost:8080/v1
  model: local-model
  api_key_env: MY_KEY
downloads:
  legacy_origin: https://legacy.example.com/
  attempts: 3
storage:
  public_base_url: https://cdn.example.com/content
limits:
  max_chunk_bytes: 4096
policies:
  dir: policies
"#,
        );

        let file = load_config_file(&config_path).unwrap();
        assert_eq!(file.version, "1.0");
        assert_eq!(file.paths.library, Some("../library".to_string()));
        assert_eq!(file.rewriter.as_ref().unwrap().api_key_env.as_deref(), Some("MY_KEY"));

        let config = resolve(Some(config_path.clone())).unwrap();
        assert_eq!(config.rewriter.model, "local-model");
        assert_eq!(config.rewriter.endpoint.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.downloads.legacy_origin, "https://legacy.example.com");
        assert_eq!(config.downloads.attempts, 3);
        assert_eq!(config.limits.max_chunk_bytes, 4096);
        // Unset limit fields keep their defaults
        assert_eq!(config.limits.max_ratio, 2.0);
        assert_eq!(
            config.storage.public_base_url.as_deref(),
            Some("https://cdn.example.com/content")
        );
        assert!(config.policies_dir.unwrap().ends_with("policies"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
