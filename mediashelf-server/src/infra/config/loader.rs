use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use super::{
    models::{
        CacheConfig, Config, ConfigMetadata, ConfigWarnings, CoversConfig,
        DEFAULT_COLLECTIONS_DIR, DEFAULT_COVERS_INTERPRETER,
        DEFAULT_COVERS_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT,
        DEFAULT_PROBE_CONCURRENCY, DEFAULT_PROBE_PROGRAM,
        DEFAULT_PROBE_TIMEOUT, DEFAULT_RELOAD_INTERVAL, DEFAULT_WEB_ROOT,
        MediaConfig, ProbeConfig, ServerConfig, default_probe_args,
    },
    sources::{EnvConfig, FileConfig},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("mediashelf.toml"),
        PathBuf::from("config/mediashelf.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => env_file_result(dotenvy::from_path(path))?,
            None => env_file_result(dotenvy::dotenv().map(|_| ()))?,
        };

        let env_config = EnvConfig::gather();
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let mut load = self.compose(file_config, env_config, config_path)?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env_config.config_path)
        {
            (Some(path), _) | (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned(),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }

    /// Merge file and environment values over the built-in defaults.
    ///
    /// Environment wins over the file, the file wins over defaults.
    pub fn compose(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();
        if config_path.is_none() {
            warnings.push_with_hint(
                "No mediashelf.toml detected; using environment variables and defaults",
                "Create mediashelf.toml or pass --config to pin settings",
            );
        }

        let FileConfig {
            server: file_server,
            media: file_media,
            cache: file_cache,
            probe: file_probe,
            covers: file_covers,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let media = MediaConfig {
            web_root: env
                .web_root
                .or(file_media.web_root)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WEB_ROOT)),
            collections_dir: env
                .collections_dir
                .or(file_media.collections_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_COLLECTIONS_DIR)),
        };

        let cache = CacheConfig {
            reload_interval: resolve_duration(
                "cache.reload_interval",
                env.reload_interval.or(file_cache.reload_interval),
                DEFAULT_RELOAD_INTERVAL,
            )?,
        };

        let probe = ProbeConfig {
            program: env
                .probe_program
                .or(file_probe.program)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROBE_PROGRAM)),
            args: env
                .probe_args
                .or(file_probe.args)
                .unwrap_or_else(default_probe_args),
            timeout: resolve_duration(
                "probe.timeout",
                env.probe_timeout.or(file_probe.timeout),
                DEFAULT_PROBE_TIMEOUT,
            )?,
            concurrency: env
                .probe_concurrency
                .or(file_probe.concurrency)
                .unwrap_or(DEFAULT_PROBE_CONCURRENCY),
        };

        let covers = CoversConfig {
            enabled: env.covers_enabled.or(file_covers.enabled).unwrap_or(true),
            interpreter: env
                .covers_interpreter
                .or(file_covers.interpreter)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_COVERS_INTERPRETER)),
            timeout: resolve_duration(
                "covers.timeout",
                env.covers_timeout.or(file_covers.timeout),
                DEFAULT_COVERS_TIMEOUT,
            )?,
        };

        let config = Config {
            server,
            media,
            cache,
            probe,
            covers,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };
        validate(&config, &mut warnings)?;

        Ok(ConfigLoad { config, warnings })
    }
}

/// A missing or unreadable `.env` is not an error; a malformed one is.
fn env_file_result(
    result: Result<(), dotenvy::Error>,
) -> Result<bool, ConfigLoadError> {
    match result {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(_)) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn resolve_duration(
    key: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(value) => humantime::parse_duration(value.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration { key, value, source }
        }),
        None => Ok(default),
    }
}

fn validate(
    config: &Config,
    warnings: &mut ConfigWarnings,
) -> Result<(), ConfigLoadError> {
    if config.cache.reload_interval.is_zero() {
        return Err(ConfigLoadError::Invalid {
            key: "cache.reload_interval",
            reason: "must be greater than zero".into(),
        });
    }
    if config.probe.timeout.is_zero() {
        return Err(ConfigLoadError::Invalid {
            key: "probe.timeout",
            reason: "must be greater than zero".into(),
        });
    }
    if config.probe.concurrency == 0 {
        return Err(ConfigLoadError::Invalid {
            key: "probe.concurrency",
            reason: "must be at least 1".into(),
        });
    }
    if !config.media.web_root.is_dir() {
        warnings.push_with_hint(
            format!(
                "web root {} does not exist",
                config.media.web_root.display()
            ),
            "Set media.web_root or MEDIASHELF_WEB_ROOT",
        );
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {key}: '{value}'")]
    InvalidDuration {
        key: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to load .env file")]
    EnvFile(#[from] dotenvy::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::sources::FileProbeConfig;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_without_sources() {
        let load = ConfigLoader::new()
            .compose(None, EnvConfig::default(), None)
            .unwrap();

        let config = load.config;
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.cache.reload_interval, Duration::from_secs(3600));
        assert_eq!(config.probe.program, PathBuf::from("ffprobe"));
        assert_eq!(config.probe.concurrency, 1);
        assert_eq!(
            config.collections_root(),
            PathBuf::from("./wwwroot/multimedia")
        );
        assert!(!load.warnings.is_empty());
    }

    #[test]
    fn environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mediashelf.toml");
        fs::write(
            &path,
            r#"
[server]
port = 8080

[media]
web_root = "/srv/www"

[cache]
reload_interval = "15m"

[probe]
program = "/opt/probe"
timeout = "30s"
concurrency = 4
"#,
        )
        .unwrap();
        let file = read_file_config(&path).unwrap();
        let env = EnvConfig {
            server_port: Some(9090),
            reload_interval: Some("2h".into()),
            ..Default::default()
        };

        let config = ConfigLoader::new()
            .compose(Some(file), env, Some(path))
            .unwrap()
            .config;

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.media.web_root, PathBuf::from("/srv/www"));
        assert_eq!(config.cache.reload_interval, Duration::from_secs(7200));
        assert_eq!(config.probe.program, PathBuf::from("/opt/probe"));
        assert_eq!(config.probe.timeout, Duration::from_secs(30));
        assert_eq!(config.probe.concurrency, 4);
    }

    #[test]
    fn rejects_bad_durations_and_zero_values() {
        let env = EnvConfig {
            reload_interval: Some("soon".into()),
            ..Default::default()
        };
        let err = ConfigLoader::new().compose(None, env, None).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidDuration { key: "cache.reload_interval", .. }
        ));

        let file = FileConfig {
            probe: FileProbeConfig {
                concurrency: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = ConfigLoader::new()
            .compose(Some(file), EnvConfig::default(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::Invalid { key: "probe.concurrency", .. }
        ));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let loader = ConfigLoader::new().with_config_path("/nope/mediashelf.toml");
        let err = loader.load_file_config(&EnvConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mediashelf.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        let err = read_file_config(&path).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
        assert!(err.to_string().contains("mediashelf.toml"));
    }
}
