//! Configuration types for artifact-broker

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};
use utoipa::ToSchema;

/// Environment variable holding the listen port
pub const ENV_PORT: &str = "GO_API_PORT";

/// Environment variable holding the external executable path
pub const ENV_BINARY: &str = "AJUSTE_DIARIO_GFBR_BIN";

/// Environment variable holding the workspace root
pub const ENV_WORK_DIR: &str = "ARTIFACT_BROKER_WORK_DIR";

/// Executable name looked up under `<base>/bin` when nothing is configured
pub const DEFAULT_BINARY_NAME: &str = "AjusteDiarioGfbr";

/// External tool invocation settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolConfig {
    /// Path to the external executable (absolute, or relative to the working directory)
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Hard wall-clock deadline for one invocation (default: 10 minutes)
    #[serde(default = "default_tool_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Number of characters kept from each output stream on failure (default: 4000)
    #[serde(default = "default_tail_chars")]
    pub tail_chars: usize,

    /// Flag appended when the client disables backups (default: "--no-backup")
    #[serde(default = "default_no_backup_flag")]
    pub no_backup_flag: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            timeout: default_tool_timeout(),
            tail_chars: default_tail_chars(),
            no_backup_flag: default_no_backup_flag(),
        }
    }
}

/// Workspace storage settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Root directory under which every job gets its own workspace (default: "./work")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Prefix of workspace directory names (default: "job")
    #[serde(default = "default_workspace_prefix")]
    pub workspace_prefix: String,

    /// Extension forced onto uploaded files (default: "xlsx")
    #[serde(default = "default_input_extension")]
    pub input_extension: String,

    /// Name used when the upload carries no usable filename (default: "diario.xlsx")
    #[serde(default = "default_input_name")]
    pub default_input_name: String,

    /// Suffix inserted before the extension of the default backup path (default: ".backup")
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            workspace_prefix: default_workspace_prefix(),
            input_extension: default_input_extension(),
            default_input_name: default_input_name(),
            backup_suffix: default_backup_suffix(),
        }
    }
}

/// Artifact retention settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetentionConfig {
    /// How long artifacts stay downloadable after registration (default: 15 minutes)
    #[serde(default = "default_ttl", with = "duration_serde")]
    pub ttl: Duration,

    /// Interval between expiration sweeps (default: 1 minute)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8002)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Maximum accepted request body for uploads (default: 512 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Content type sent with artifact downloads (default: xlsx)
    #[serde(default = "default_artifact_content_type")]
    pub artifact_content_type: String,

    /// Prefix prepended to the download URLs returned by `POST /process` (default: "")
    #[serde(default)]
    pub url_prefix: String,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: false)
    #[serde(default)]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_upload_bytes: default_max_upload_bytes(),
            artifact_content_type: default_artifact_content_type(),
            url_prefix: String::new(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: false,
        }
    }
}

/// Main configuration for the broker
///
/// Fields are organized into logical sub-configs:
/// - [`tool`](ToolConfig) - external executable and its deadline
/// - [`storage`](StorageConfig) - workspace root and input naming
/// - [`retention`](RetentionConfig) - expiry and sweeping
/// - [`api`](ApiConfig) - HTTP surface
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// External tool settings
    #[serde(default)]
    pub tool: ToolConfig,

    /// Workspace storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Artifact retention settings
    #[serde(default)]
    pub retention: RetentionConfig,

    /// HTTP API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Build a configuration from the process environment
    ///
    /// Reads [`ENV_PORT`], [`ENV_BINARY`] and [`ENV_WORK_DIR`]; unset or
    /// blank variables keep their defaults. Relative paths are resolved
    /// against `base_dir`.
    pub fn from_env(base_dir: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.tool.binary_path = base_dir.join("bin").join(platform_binary_name());
        config.storage.work_dir = base_dir.join("work");

        if let Some(port) = env_value(ENV_PORT) {
            let port: u16 = port.parse().map_err(|_| Error::Config {
                message: format!("invalid port '{port}'"),
                key: Some(ENV_PORT.to_string()),
            })?;
            config.api.bind_address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        }

        if let Some(binary) = env_value(ENV_BINARY) {
            config.tool.binary_path = absolutize(Path::new(&binary), base_dir);
        }

        if let Some(work_dir) = env_value(ENV_WORK_DIR) {
            config.storage.work_dir = absolutize(Path::new(&work_dir), base_dir);
        }

        Ok(config)
    }

    /// Reject settings the broker cannot run with
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.retention.ttl.is_zero(), "retention.ttl", "must be positive"),
            (
                self.retention.sweep_interval.is_zero(),
                "retention.sweep_interval",
                "must be positive",
            ),
            (self.tool.timeout.is_zero(), "tool.timeout", "must be positive"),
            (self.tool.tail_chars == 0, "tool.tail_chars", "must be positive"),
            (
                self.storage.input_extension.trim_matches('.').is_empty(),
                "storage.input_extension",
                "must not be empty",
            ),
        ];

        for (failed, key, reason) in checks {
            if failed {
                return Err(Error::Config {
                    message: format!("{key} {reason}"),
                    key: Some(key.to_string()),
                });
            }
        }

        Ok(())
    }
}

/// Resolve the executable path and check that it exists
///
/// Relative paths are taken relative to `base_dir`. A bare name that does
/// not exist there is looked up on `PATH`.
pub fn resolve_binary_path(raw: &Path, base_dir: &Path) -> Result<PathBuf> {
    let candidate = absolutize(raw, base_dir);
    if candidate.is_file() {
        return Ok(candidate);
    }

    let is_bare_name = raw.components().count() == 1 && !raw.is_absolute();
    if is_bare_name && let Ok(found) = which::which(raw) {
        return Ok(found);
    }

    Err(Error::ExecutableNotFound { path: candidate })
}

fn absolutize(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn platform_binary_name() -> String {
    if cfg!(windows) {
        format!("{DEFAULT_BINARY_NAME}.exe")
    } else {
        DEFAULT_BINARY_NAME.to_string()
    }
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("bin").join(platform_binary_name())
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_tail_chars() -> usize {
    4000
}

fn default_no_backup_flag() -> String {
    "--no-backup".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_workspace_prefix() -> String {
    "job".to_string()
}

fn default_input_extension() -> String {
    "xlsx".to_string()
}

fn default_input_name() -> String {
    "diario.xlsx".to_string()
}

fn default_backup_suffix() -> String {
    ".backup".to_string()
}

fn default_ttl() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8002))
}

fn default_max_upload_bytes() -> usize {
    512 << 20
}

fn default_artifact_content_type() -> String {
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper (seconds as integers)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
