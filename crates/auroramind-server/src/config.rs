use auroramind_core::CoreSettings;
use auroramind_core::upstream::UpstreamConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub ai_service_url: Option<String>,
    pub service_token: Option<String>,
    pub ai_service_timeout: Duration,
    pub fallback_delay: Duration,
    pub storage_path: PathBuf,
    pub database_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    upstream: UpstreamSection,
    #[serde(default)]
    storage: StorageSection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamSection {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    service_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_fallback_delay_ms")]
    fallback_delay_ms: u64,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            url: None,
            service_token: None,
            timeout_secs: default_timeout_secs(),
            fallback_delay_ms: default_fallback_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StorageSection {
    #[serde(default = "default_storage_path")]
    local_path: String,
    #[serde(default)]
    database_path: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            local_path: default_storage_path(),
            database_path: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_fallback_delay_ms() -> u64 {
    50
}

fn default_storage_path() -> String {
    "./storage".to_string()
}

/// Blank strings count as unset.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_url(value: Option<String>) -> Option<String> {
    non_blank(value).map(|url| url.trim_end_matches('/').to_string())
}

impl GatewayConfig {
    pub fn load() -> anyhow::Result<Self> {
        if let Some(file_config) = load_from_file()? {
            return Ok(Self::from_file(file_config));
        }

        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    fn from_file(file: FileConfig) -> Self {
        Self {
            host: file.server.host,
            port: file.server.port,
            ai_service_url: normalize_url(file.upstream.url),
            service_token: non_blank(file.upstream.service_token),
            ai_service_timeout: Duration::from_secs(file.upstream.timeout_secs),
            fallback_delay: Duration::from_millis(file.upstream.fallback_delay_ms),
            storage_path: PathBuf::from(file.storage.local_path),
            database_path: non_blank(file.storage.database_path),
        }
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = non_blank(lookup("APP_HOST")).unwrap_or_else(default_host);
        let port = non_blank(lookup("APP_PORT"))
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or_else(default_port);
        let timeout_secs = non_blank(lookup("AI_SERVICE_TIMEOUT_SECS"))
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or_else(default_timeout_secs);
        let fallback_delay_ms = non_blank(lookup("FALLBACK_DELAY_MS"))
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or_else(default_fallback_delay_ms);
        let storage_path =
            non_blank(lookup("LOCAL_STORAGE_PATH")).unwrap_or_else(default_storage_path);

        Self {
            host,
            port,
            ai_service_url: normalize_url(lookup("AI_SERVICE_URL")),
            service_token: non_blank(lookup("SERVICE_TOKEN")),
            ai_service_timeout: Duration::from_secs(timeout_secs),
            fallback_delay: Duration::from_millis(fallback_delay_ms),
            storage_path: PathBuf::from(storage_path),
            database_path: non_blank(lookup("DATABASE_PATH")),
        }
    }

    pub fn core_settings(&self) -> CoreSettings {
        CoreSettings {
            upstream: UpstreamConfig {
                url: self.ai_service_url.clone(),
                service_token: self.service_token.clone(),
                timeout: self.ai_service_timeout,
                fallback_delay: self.fallback_delay,
            },
            storage_path: self.storage_path.clone(),
            database_path: self.database_path.clone(),
        }
    }
}

fn load_from_file() -> anyhow::Result<Option<FileConfig>> {
    let config_path = env::var("AURORAMIND_CONFIG").ok();
    let path = if let Some(path) = config_path {
        Some(path)
    } else if Path::new("gateway.toml").exists() {
        Some("gateway.toml".to_string())
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&path)
        .map_err(|err| anyhow::anyhow!("Failed to read config {}: {}", path, err))?;
    let parsed: FileConfig = toml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("Failed to parse config {}: {}", path, err))?;
    Ok(Some(parsed))
}
