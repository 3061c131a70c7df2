//! Duration probing through an external tool.
//!
//! The probe is invoked as `<program> [args..] <asset-path>` and must print a
//! single floating point number of seconds on stdout and exit with status 0.
//! Anything else is a [`ProbeError`]; callers treat that as "duration
//! unknown" and move on.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{process::Command, time::timeout};
use tracing::trace;

/// Why a single probe invocation produced no duration.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The program could not be started.
    #[error("failed to launch probe '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The invocation exceeded its time limit and was killed.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// Non-zero exit.
    #[error("probe exited with {0}")]
    ExitStatus(String),

    /// Output was not a finite, non-negative number of seconds.
    #[error("unusable probe output: {0:?}")]
    Unparsable(String),
}

/// Measures the playback duration of a media file, in seconds.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration of the file at `path`, in (possibly fractional) seconds.
    async fn probe(&self, path: &Path) -> Result<f64, ProbeError>;
}

/// Arguments that make `ffprobe` print only the container duration.
pub const FFPROBE_DURATION_ARGS: &[&str] = &[
    "-v",
    "error",
    "-show_entries",
    "format=duration",
    "-of",
    "default=noprint_wrappers=1:nokey=1",
];

/// How [`CommandProbe`] invokes its program.
#[derive(Debug, Clone)]
pub struct CommandProbeConfig {
    /// Executable, looked up on `PATH` when relative.
    pub program: PathBuf,
    /// Arguments placed before the asset path.
    pub args: Vec<String>,
    /// Upper bound for one invocation; the child is killed when it elapses.
    pub timeout: Duration,
}

impl Default for CommandProbeConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffprobe"),
            args: FFPROBE_DURATION_ARGS.iter().map(|a| a.to_string()).collect(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// [`DurationProbe`] backed by a single-shot subprocess.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    config: CommandProbeConfig,
}

impl CommandProbe {
    /// Probe running `config.program`.
    pub fn new(config: CommandProbeConfig) -> Self {
        Self { config }
    }

    /// Effective invocation settings.
    pub fn config(&self) -> &CommandProbeConfig {
        &self.config
    }
}

impl Default for CommandProbe {
    fn default() -> Self {
        Self::new(CommandProbeConfig::default())
    }
}

#[async_trait]
impl DurationProbe for CommandProbe {
    async fn probe(&self, path: &Path) -> Result<f64, ProbeError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| ProbeError::Spawn {
            program: self.config.program.display().to_string(),
            source,
        })?;

        // Dropping the pending future on timeout kills the child.
        let output = timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProbeError::Timeout(self.config.timeout))?
            .map_err(|source| ProbeError::Spawn {
                program: self.config.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::ExitStatus(output.status.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!(path = %path.display(), output = %stdout.trim(), "probe output");
        parse_seconds(&stdout)
    }
}

/// Parse the probe's stdout into a finite, non-negative number of seconds.
pub fn parse_seconds(raw: &str) -> Result<f64, ProbeError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(ProbeError::Unparsable(trimmed.to_string())),
    }
}
