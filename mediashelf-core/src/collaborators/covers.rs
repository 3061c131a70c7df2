use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::{process::Command, task::JoinHandle, time::timeout};
use tracing::{debug, info, warn};

/// Interpreter and time limit for cover scripts.
#[derive(Debug, Clone)]
pub struct CoverGeneratorConfig {
    /// Program used to run the collection's script, e.g. `python3`.
    pub interpreter: PathBuf,
    /// The script is killed once this elapses.
    pub timeout: Duration,
}

impl Default for CoverGeneratorConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Runs a collection's cover/thumbnail script after a successful sync.
///
/// Purely best-effort: the script runs in the background with the
/// collection directory as its working directory, and neither its exit
/// status nor its output affects the synchronization result.
#[derive(Debug, Clone, Default)]
pub struct CoverGenerator {
    config: CoverGeneratorConfig,
}

impl CoverGenerator {
    /// Generator using `config`.
    pub fn new(config: CoverGeneratorConfig) -> Self {
        Self { config }
    }

    /// Launch `script` from `collection_dir` without waiting for it.
    ///
    /// Returns `None` when the script does not exist.
    pub fn spawn(
        &self,
        collection_dir: &Path,
        script: &str,
    ) -> Option<JoinHandle<()>> {
        let script_path = collection_dir.join(script);
        if !script_path.is_file() {
            debug!(script = %script_path.display(), "cover script not present; skipping");
            return None;
        }

        let mut command = Command::new(&self.config.interpreter);
        command
            .arg(script)
            .current_dir(collection_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let limit = self.config.timeout;
        let label = script_path.display().to_string();
        Some(tokio::spawn(async move {
            let status = match command.spawn() {
                Ok(mut child) => timeout(limit, child.wait()).await,
                Err(err) => {
                    warn!(script = %label, error = %err, "failed to launch cover script");
                    return;
                }
            };
            match status {
                Ok(Ok(status)) if status.success() => {
                    info!(script = %label, "cover script finished")
                }
                Ok(Ok(status)) => {
                    warn!(script = %label, %status, "cover script exited unsuccessfully")
                }
                Ok(Err(err)) => {
                    warn!(script = %label, error = %err, "cover script wait failed")
                }
                Err(_) => {
                    warn!(script = %label, ?limit, "cover script timed out")
                }
            }
        }))
    }
}
