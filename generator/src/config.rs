use crate::{
    dag,
    executors::Executors,
    jobs::{environment::EnvironmentConfig, JobSettings},
    mixture::Mixture,
    sweep::sampler::Sampler,
};
use globset::{Glob, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Error,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{error, warn};

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config {path:?}: {source}")]
    Read { path: PathBuf, source: Error },
    #[error("Config is invalid: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Globs were invalid")]
    InvalidGlobs(#[from] globset::Error),
    #[error("Executor not supported: {0}")]
    UnsupportedExecutor(String),
    #[error("Executor parameter {0} is invalid")]
    InvalidExecutorParameter(String),
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    // simulation CLI, invoked by every generated job
    pub cli: PathBuf,
    // storage root, every sweep gets its own directory below it and receives the merged archives
    pub storage: PathBuf,
    // scheduler the finished DAGs are submitted to, see Executors::load for the selection
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub job: JobSettings,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub sampler: Sampler,
    // named sweeps, processed in name order
    pub sweeps: BTreeMap<String, SweepConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    // Name of the selected executor, see Executors::load for the selection proccess
    pub name: String,
    // parameters for the executor, interpreted by the executor itself
    pub parameter: Option<BTreeMap<String, serde_yaml::Value>>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "condor".to_string(),
            parameter: None,
        }
    }
}

/// A single electric field sweep for one gas mixture
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    // mixture specification, e.g. "C4H10 0.5 Ar"
    pub components: String,
    // minimum number of distinct field points
    pub points: usize,
    // field points per job
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    // overrides job.collisions
    pub collisions: Option<u32>,
}

fn default_batch_size() -> usize {
    1
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let content = fs::read_to_string(path).map_err(|source| ConfigErrors::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_yaml::from_str(&content)?)
    }

    /// Sweeps whose name matches any of the glob `patterns`, all sweeps if there are none
    pub fn select(&self, patterns: &[String]) -> Result<Vec<(&str, &SweepConfig)>, ConfigErrors> {
        if patterns.is_empty() {
            return Ok(self
                .sweeps
                .iter()
                .map(|(name, sweep)| (name.as_str(), sweep))
                .collect());
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        let globs = builder.build()?;

        Ok(self
            .sweeps
            .iter()
            .filter(|(name, _)| globs.is_match(name.as_str()))
            .map(|(name, sweep)| (name.as_str(), sweep))
            .collect())
    }

    /// Report every problem at once instead of piece-by-piece, returns true if an error was found
    pub fn preflight_checks(&self) -> bool {
        let mut contains_error = false;

        if self.sweeps.is_empty() {
            error!("No sweep was defined, there is nothing to generate");
            contains_error = true;
        }

        match check_executable(&self.cli) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "cli {} is not executable, the generated jobs will likely fail",
                    self.cli.to_string_lossy()
                );
            }
            // the CLI usually lives on a shared filesystem that isn't mounted on the submit node
            Err(e) => {
                warn!(
                    "Failed to determine if cli ({}) is an executable: {e}",
                    self.cli.to_string_lossy()
                );
            }
        }

        if dag::has_whitespace(&self.storage) {
            error!(
                "storage ({}) contains whitespace, DAG descriptors can't reference it",
                self.storage.to_string_lossy()
            );
            contains_error = true;
        }

        if let Err(e) = Executors::load(&self.executor) {
            error!("executor.name ({}) failed to load: {e}", self.executor.name);
            contains_error = true;
        }

        if let Err(e) = self.sampler.validate() {
            error!("sampler is invalid: {e}");
            contains_error = true;
        }

        if self.job.request_cpus == 0 {
            error!("job.request_cpus cannot be 0");
            contains_error = true;
        }

        // sweeps are stored by mixture name, two of them can't share a directory
        let mut directories: BTreeMap<String, &str> = BTreeMap::new();

        for (name, sweep) in self.sweeps.iter() {
            match Mixture::parse(&sweep.components) {
                Ok(mixture) => {
                    let directory = mixture.canonical_name();
                    if let Some(other) = directories.get(&directory) {
                        error!(
                            "sweeps.{name} and sweeps.{other} both describe {directory} and would overwrite each other"
                        );
                        contains_error = true;
                    } else {
                        directories.insert(directory, name);
                    }
                }
                Err(e) => {
                    error!("sweeps.{name}.components ({}) is invalid: {e}", sweep.components);
                    contains_error = true;
                }
            }

            if sweep.points == 0 {
                error!("sweeps.{name}.points cannot be 0, a sweep can't be a NOP");
                contains_error = true;
            }

            if sweep.batch_size == 0 {
                error!("sweeps.{name}.batch_size cannot be 0");
                contains_error = true;
            } else if sweep.batch_size > sweep.points {
                warn!(
                    "sweeps.{name}.batch_size ({}) exceeds points ({}), the sweep runs as a single job",
                    sweep.batch_size, sweep.points
                );
            }
        }

        contains_error
    }
}
