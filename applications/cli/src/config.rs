/// CLI configuration
use aural_decode::ReaderOptions;
use aural_playback::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment overrides, e.g. `AURAL_SCHEDULER__QUEUE_DEPTH=16`
const ENV_PREFIX: &str = "AURAL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AuralConfig {
    #[serde(default)]
    pub reader: ReaderOptions,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl AuralConfig {
    /// Load configuration from an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::from_sources(path, environment())
    }

    fn from_sources(path: Option<&Path>, env: config::Environment) -> anyhow::Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            anyhow::ensure!(path.exists(), "config file not found: {}", path.display());
            settings = settings.add_source(config::File::from(path));
        }

        // Environment wins over the file
        settings = settings.add_source(env);

        let config: Self = settings.build()?.try_deserialize()?;
        config.scheduler.validate()?;
        Ok(config)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("reader.raw_extensions")
}
