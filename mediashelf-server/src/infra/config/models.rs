use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use mediashelf_core::{
    CommandProbeConfig, CoverGeneratorConfig, collaborators::probe::FFPROBE_DURATION_ARGS,
};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_WEB_ROOT: &str = "./wwwroot";
pub const DEFAULT_COLLECTIONS_DIR: &str = "multimedia";
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_PROBE_PROGRAM: &str = "ffprobe";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_CONCURRENCY: usize = 1;
pub const DEFAULT_COVERS_INTERPRETER: &str = "python3";
pub const DEFAULT_COVERS_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub cache: CacheConfig,
    pub probe: ProbeConfig,
    pub covers: CoversConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Directory holding every collection directory.
    pub fn collections_root(&self) -> PathBuf {
        self.media.web_root.join(&self.media.collections_dir)
    }

    pub fn web_root(&self) -> &Path {
        &self.media.web_root
    }

    /// Point the served root somewhere else, keeping every other default.
    pub fn with_web_root(mut self, web_root: impl Into<PathBuf>) -> Self {
        self.media.web_root = web_root.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
            media: MediaConfig {
                web_root: PathBuf::from(DEFAULT_WEB_ROOT),
                collections_dir: PathBuf::from(DEFAULT_COLLECTIONS_DIR),
            },
            cache: CacheConfig {
                reload_interval: DEFAULT_RELOAD_INTERVAL,
            },
            probe: ProbeConfig {
                program: PathBuf::from(DEFAULT_PROBE_PROGRAM),
                args: default_probe_args(),
                timeout: DEFAULT_PROBE_TIMEOUT,
                concurrency: DEFAULT_PROBE_CONCURRENCY,
            },
            covers: CoversConfig {
                enabled: true,
                interpreter: PathBuf::from(DEFAULT_COVERS_INTERPRETER),
                timeout: DEFAULT_COVERS_TIMEOUT,
            },
            metadata: ConfigMetadata::default(),
        }
    }
}

/// ffprobe arguments that print only the container duration.
pub fn default_probe_args() -> Vec<String> {
    FFPROBE_DURATION_ARGS.iter().map(|arg| arg.to_string()).collect()
}

/// Listener address.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind, e.g. `0.0.0.0`.
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Served root; static pages and collections live below it.
    pub web_root: PathBuf,
    /// Collections directory, relative to `web_root` unless absolute.
    pub collections_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Period of the reload cache's full invalidation.
    pub reload_interval: Duration,
}

/// External duration probe settings.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub program: PathBuf,
    /// Arguments placed before the asset path.
    pub args: Vec<String>,
    /// Per-invocation limit.
    pub timeout: Duration,
    /// New assets probed at once during one sync; at least 1.
    pub concurrency: usize,
}

impl ProbeConfig {
    pub fn command_config(&self) -> CommandProbeConfig {
        CommandProbeConfig {
            program: self.program.clone(),
            args: self.args.clone(),
            timeout: self.timeout,
        }
    }
}

/// Post-sync cover script settings.
#[derive(Debug, Clone)]
pub struct CoversConfig {
    /// When false, no cover script is ever launched.
    pub enabled: bool,
    pub interpreter: PathBuf,
    pub timeout: Duration,
}

impl CoversConfig {
    pub fn generator_config(&self) -> CoverGeneratorConfig {
        CoverGeneratorConfig {
            interpreter: self.interpreter.clone(),
            timeout: self.timeout,
        }
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    /// TOML file that was read, if any.
    pub config_path: Option<PathBuf>,
    /// Whether a `.env` file was applied.
    pub env_file_loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

/// Non-fatal findings collected while loading configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
