//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (applied by the binary)
//! 2. Environment variable (`FEDREG_*`)
//! 3. TOML config file
//! 4. Compiled default
//!
//! A missing config file is not an error: the service logs a warning and
//! starts with compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "FEDREG_CONFIG";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "FEDREG_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "fedreg.db";

/// Development secret used when none is configured
pub const DEFAULT_JWT_SECRET: &str = "fedreg-development-secret";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root folder holding the database, reports and uploads
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub inference: InferenceConfig,
    pub storage: StorageConfig,
    pub reports: ReportConfig,
    pub diagnosis: DiagnosisConfig,
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Username of the account created on an empty database
    pub admin_username: String,
    /// Password of that account; no account is created when unset
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            admin_username: "admin".to_string(),
            admin_password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Chat-completions endpoint of the vision-language model
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            model: "qwen-max".to_string(),
            timeout_secs: 60,
            max_tokens: 2000,
            temperature: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Upload to the remote bucket before falling back to local disk
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    /// Base URL objects are PUT to; defaults to the public base
    pub upload_base_url: Option<String>,
    /// Base URL objects are served from; defaults to `https://<bucket>.<endpoint>`
    pub public_base_url: Option<String>,
    pub upload_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            bucket: None,
            access_key_id: None,
            access_key_secret: None,
            upload_base_url: None,
            public_base_url: None,
            upload_timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    /// Public base URL for stored objects, if enough is configured to build one
    pub fn public_base(&self) -> Option<String> {
        if let Some(base) = &self.public_base_url {
            return Some(base.trim_end_matches('/').to_string());
        }
        match (&self.bucket, &self.endpoint) {
            (Some(bucket), Some(endpoint)) => {
                let host = endpoint
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .trim_end_matches('/');
                Some(format!("https://{}.{}", bucket, host))
            }
            _ => None,
        }
    }

    /// Base URL uploads are sent to
    pub fn upload_base(&self) -> Option<String> {
        self.upload_base_url
            .as_ref()
            .map(|u| u.trim_end_matches('/').to_string())
            .or_else(|| self.public_base())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// TrueType/OpenType font with wide glyph coverage
    pub font_path: Option<PathBuf>,
}

/// Backing store for diagnosis records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Database,
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "database" | "db" | "sqlite" => Ok(StoreBackend::Database),
            other => Err(Error::Config(format!("Unknown diagnosis store: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    pub store: StoreBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration from the resolved file, then apply environment overrides
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => match locate_config_file() {
                Some(path) => Self::from_file(&path)?,
                None => {
                    warn!("No config file found, using compiled defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `FEDREG_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (environment in production)
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ROOT_FOLDER_ENV) {
            self.root_folder = Some(PathBuf::from(v));
        }
        if let Some(v) = get("FEDREG_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("FEDREG_PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid FEDREG_PORT: {}", v),
            }
        }
        if let Some(v) = get("FEDREG_LOG_LEVEL") {
            self.logging.level = v.to_ascii_lowercase();
        }
        if let Some(v) = get("FEDREG_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = get("FEDREG_ADMIN_PASSWORD") {
            self.auth.admin_password = Some(v);
        }
        if let Some(v) = get("FEDREG_LLM_API_URL") {
            self.inference.api_url = Some(v);
        }
        if let Some(v) = get("FEDREG_LLM_API_KEY") {
            self.inference.api_key = Some(v);
        }
        if let Some(v) = get("FEDREG_LLM_MODEL") {
            self.inference.model = v;
        }
        if let Some(v) = get("FEDREG_ENABLE_OSS") {
            self.storage.enabled = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Some(v) = get("FEDREG_OSS_ENDPOINT") {
            self.storage.endpoint = Some(v);
        }
        if let Some(v) = get("FEDREG_OSS_BUCKET") {
            self.storage.bucket = Some(v);
        }
        if let Some(v) = get("FEDREG_OSS_ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(v);
        }
        if let Some(v) = get("FEDREG_OSS_ACCESS_KEY_SECRET") {
            self.storage.access_key_secret = Some(v);
        }
        if let Some(v) = get("FEDREG_REPORT_FONT") {
            self.reports.font_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("FEDREG_DIAGNOSIS_STORE") {
            match v.parse() {
                Ok(store) => self.diagnosis.store = store,
                Err(e) => warn!("Ignoring FEDREG_DIAGNOSIS_STORE: {}", e),
            }
        }
    }

    /// Resolve the root folder: CLI argument, then configured value, then OS default
    pub fn resolve_root_folder(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }
        if let Some(path) = &self.root_folder {
            return path.clone();
        }
        default_root_folder()
    }

    /// True when the session secret is still the development default
    pub fn uses_default_secret(&self) -> bool {
        self.auth.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Database file inside the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}

/// Directory holding locally persisted reports (served under `/docs`)
pub fn reports_dir(root: &Path) -> PathBuf {
    root.join("docs")
}

/// Directory holding locally persisted uploads (served under `/uploads`)
pub fn uploads_dir(root: &Path) -> PathBuf {
    root.join("uploads")
}

/// Locate a config file: `FEDREG_CONFIG`, then the user config dir, then `/etc`
fn locate_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!("{} points to missing file {}", CONFIG_ENV, path.display());
    }

    let user_config = dirs::config_dir().map(|d| d.join("fedreg").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/fedreg/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fedreg"))
        .unwrap_or_else(|| PathBuf::from("./fedreg_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.inference.model, "qwen-max");
        assert_eq!(config.inference.timeout_secs, 60);
        assert_eq!(config.storage.upload_timeout_secs, 30);
        assert!(!config.storage.enabled);
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.pagination.max_page_size, 100);
        assert_eq!(config.diagnosis.store, StoreBackend::Memory);
        assert!(config.uses_default_secret());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [inference]
            model = "qwen-vl-max"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.inference.model, "qwen-vl-max");
        assert_eq!(config.inference.timeout_secs, 60);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml_str("[server\nport = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides_toml() {
        let mut config = AppConfig::from_toml_str(
            r#"
            [inference]
            model = "from-toml"
            [storage]
            enabled = false
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            ("FEDREG_LLM_MODEL", "from-env"),
            ("FEDREG_ENABLE_OSS", "TRUE"),
            ("FEDREG_PORT", "not-a-port"),
            ("FEDREG_DIAGNOSIS_STORE", "database"),
            ("FEDREG_LLM_API_KEY", "   "),
        ]
        .into_iter()
        .collect();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.inference.model, "from-env");
        assert!(config.storage.enabled);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.diagnosis.store, StoreBackend::Database);
        assert!(config.inference.api_key.is_none());
    }

    #[test]
    fn test_root_folder_priority() {
        let mut config = AppConfig::default();
        assert_eq!(config.resolve_root_folder(None), default_root_folder());

        config.root_folder = Some(PathBuf::from("/srv/fedreg"));
        assert_eq!(config.resolve_root_folder(None), PathBuf::from("/srv/fedreg"));
        assert_eq!(
            config.resolve_root_folder(Some(Path::new("/opt/cli"))),
            PathBuf::from("/opt/cli")
        );
    }

    #[test]
    fn test_storage_public_base() {
        let mut storage = StorageConfig::default();
        assert!(storage.public_base().is_none());

        storage.bucket = Some("med-bucket".to_string());
        storage.endpoint = Some("https://oss-cn-hangzhou.aliyuncs.com/".to_string());
        assert_eq!(
            storage.public_base().as_deref(),
            Some("https://med-bucket.oss-cn-hangzhou.aliyuncs.com")
        );
        assert_eq!(storage.upload_base(), storage.public_base());

        storage.upload_base_url = Some("http://gateway.local/put/".to_string());
        assert_eq!(storage.upload_base().as_deref(), Some("http://gateway.local/put"));
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("sqlite".parse::<StoreBackend>().unwrap(), StoreBackend::Database);
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_directory_layout() {
        let root = Path::new("/data/fedreg");
        assert_eq!(database_path(root), PathBuf::from("/data/fedreg/fedreg.db"));
        assert_eq!(reports_dir(root), PathBuf::from("/data/fedreg/docs"));
        assert_eq!(uploads_dir(root), PathBuf::from("/data/fedreg/uploads"));
    }
}
