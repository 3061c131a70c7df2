use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
///
/// Durations are humantime strings such as `"1h"` or `"30s"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub media: FileMediaConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub probe: FileProbeConfig,
    #[serde(default)]
    pub covers: FileCoversConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMediaConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reload_interval: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileProbeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCoversConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub web_root: Option<PathBuf>,
    pub collections_dir: Option<PathBuf>,
    pub reload_interval: Option<String>,
    pub probe_program: Option<PathBuf>,
    pub probe_args: Option<Vec<String>>,
    pub probe_timeout: Option<String>,
    pub probe_concurrency: Option<usize>,
    pub covers_enabled: Option<bool>,
    pub covers_interpreter: Option<PathBuf>,
    pub covers_timeout: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let mut env_config = Self::default();

        env_config.config_path =
            std::env::var("MEDIASHELF_CONFIG").ok().map(PathBuf::from);
        env_config.server_host = std::env::var("SERVER_HOST").ok();
        env_config.server_port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|s| s.parse().ok());
        env_config.web_root =
            std::env::var("MEDIASHELF_WEB_ROOT").ok().map(PathBuf::from);
        env_config.collections_dir = std::env::var("MEDIASHELF_COLLECTIONS_DIR")
            .ok()
            .map(PathBuf::from);
        env_config.reload_interval =
            std::env::var("MEDIASHELF_RELOAD_INTERVAL").ok();

        env_config.probe_program = std::env::var("MEDIASHELF_PROBE_PROGRAM")
            .ok()
            .map(PathBuf::from);
        env_config.probe_args = parse_csv_var("MEDIASHELF_PROBE_ARGS");
        env_config.probe_timeout =
            std::env::var("MEDIASHELF_PROBE_TIMEOUT").ok();
        env_config.probe_concurrency =
            std::env::var("MEDIASHELF_PROBE_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok());

        env_config.covers_enabled = parse_bool_var("MEDIASHELF_COVERS_ENABLED");
        env_config.covers_interpreter =
            std::env::var("MEDIASHELF_COVERS_INTERPRETER")
                .ok()
                .map(PathBuf::from);
        env_config.covers_timeout =
            std::env::var("MEDIASHELF_COVERS_TIMEOUT").ok();

        env_config
    }
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| {
        raw.split(',')
            .filter_map(|part| {
                let trimmed = part.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect()
    })
}

fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| parse_bool(&raw))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
