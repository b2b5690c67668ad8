use std::path::{Path, PathBuf};

use crate::{
    backend::BackendPreference,
    foundation::error::{VidstyleError, VidstyleResult},
    style::model::{ParameterSet, StyleSelector},
};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// What to process: supplied by the caller for a single run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub style: StyleSelector,
    #[serde(default)]
    pub params: ParameterSet,
}

impl RunRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        style: StyleSelector,
        params: ParameterSet,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            style,
            params,
        }
    }

    pub fn validate(&self) -> VidstyleResult<()> {
        if self.input.as_os_str().is_empty() {
            return Err(VidstyleError::validation("input path must not be empty"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(VidstyleError::validation("output path must not be empty"));
        }
        if self.input == self.output {
            return Err(VidstyleError::validation(
                "output path must differ from the input path",
            ));
        }
        Ok(())
    }
}

/// How to process: tuning knobs shared by runs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    /// Worker threads; `None` means available parallelism minus one (at least 1).
    pub workers: Option<usize>,
    pub backend: BackendPreference,
    /// Where per-run temporary artifacts go; defaults to the system temp dir.
    pub temp_dir: Option<PathBuf>,
    /// Capacity of the bounded progress channel.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: None,
            backend: BackendPreference::Auto,
            temp_dir: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> VidstyleResult<Self> {
        use anyhow::Context as _;
        let f = std::fs::File::open(path)
            .with_context(|| format!("open pipeline config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(std::io::BufReader::new(f))
            .with_context(|| format!("parse pipeline config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies `VIDSTYLE_BATCH_SIZE`, `VIDSTYLE_WORKERS` and `VIDSTYLE_BACKEND` when set
    /// and parseable; anything else is ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env_parse::<usize>("VIDSTYLE_BATCH_SIZE").filter(|&n| n > 0) {
            self.batch_size = n;
        }
        if let Some(n) = env_parse::<usize>("VIDSTYLE_WORKERS").filter(|&n| n > 0) {
            self.workers = Some(n);
        }
        if let Some(pref) = env_parse::<BackendPreference>("VIDSTYLE_BACKEND") {
            self.backend = pref;
        }
        self
    }

    pub fn validate(&self) -> VidstyleResult<()> {
        if self.batch_size == 0 {
            return Err(VidstyleError::validation("batch_size must be >= 1"));
        }
        if let Some(0) = self.workers {
            return Err(VidstyleError::validation(
                "workers must be >= 1 when set",
            ));
        }
        if self.event_capacity == 0 {
            return Err(VidstyleError::validation("event_capacity must be >= 1"));
        }
        Ok(())
    }

    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }

    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Available parallelism minus one for the coordinating thread, never below 1.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
