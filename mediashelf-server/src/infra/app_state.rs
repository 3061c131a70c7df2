use std::{fmt, sync::Arc};

use mediashelf_core::{
    CommandProbe, CoverGenerator, DurationProbe, IndexSynchronizer,
};

use super::{cache::ReloadCache, config::Config};

/// Handles shared by every request task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<ReloadCache>,
    pub synchronizer: Arc<IndexSynchronizer>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("web_root", &self.config.web_root())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build state around the external command probe described by `config`.
    pub fn from_config(config: Config) -> Self {
        let probe = Arc::new(CommandProbe::new(config.probe.command_config()));
        Self::with_probe(config, probe)
    }

    /// Build state with a caller-supplied duration probe.
    pub fn with_probe(config: Config, probe: Arc<dyn DurationProbe>) -> Self {
        let mut synchronizer =
            IndexSynchronizer::new(config.collections_root(), probe)
                .with_probe_concurrency(config.probe.concurrency);
        if config.covers.enabled {
            synchronizer = synchronizer.with_cover_generator(CoverGenerator::new(
                config.covers.generator_config(),
            ));
        }

        Self {
            cache: Arc::new(ReloadCache::new(config.web_root())),
            synchronizer: Arc::new(synchronizer),
            config: Arc::new(config),
        }
    }
}
