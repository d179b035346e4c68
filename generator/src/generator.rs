use crate::{
    config::{ConfigErrors, GeneratorConfig, SweepConfig},
    dag::{DagDescriptor, DagError, DagJob},
    executors::{ExecutorError, Executors},
    jobs::{self, environment::Environment, JobContext, JobFiles},
    mixture::{Mixture, SpecError},
    sweep::{
        self, layout::SweepLayout, sampler::SamplingError, ArtifactState, MergeUnit,
        PartitionError, WorkUnit,
    },
};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    process::ExitStatus,
};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid mixture: {0}")]
    Spec(#[from] SpecError),
    #[error("Sampling failed: {0}")]
    Sampling(#[from] SamplingError),
    #[error("Partitioning failed: {0}")]
    Partition(#[from] PartitionError),
    #[error("Failed to assemble DAG: {0}")]
    Dag(#[from] DagError),
    #[error("Sweep produced no work units")]
    Empty,
    #[error("{directory:?} is already used by sweep {other}")]
    SharedDirectory { directory: PathBuf, other: String },
    #[error("Failed to write {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Submission failed: {0}")]
    Submission(#[from] ExecutorError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> SweepError + '_ {
    move |source| SweepError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Everything that will be written for a single sweep
///
/// Building a plan doesn't touch the filesystem, so a malformed sweep fails before
/// anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    pub name: String,
    pub layout: SweepLayout,
    pub units: Vec<WorkUnit>,
    pub jobs: Vec<JobFiles>,
    pub merge: JobFiles,
    pub dag: DagDescriptor,
}

/// Outcome of writing a sweep to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub name: String,
    pub directory: PathBuf,
    pub dag: PathBuf,
    pub pending: usize,
    pub satisfied: usize,
    pub partial: usize,
}

impl SweepPlan {
    #[instrument(skip(sweep, config, environment), level = "debug")]
    pub fn build(
        name: &str,
        sweep: &SweepConfig,
        config: &GeneratorConfig,
        environment: &Environment,
    ) -> Result<Self, SweepError> {
        let mixture = Mixture::parse(&sweep.components)?;
        let layout = SweepLayout::new(&config.storage, mixture.canonical_name());

        let samples = config.sampler.sample(sweep.points)?;
        let units = sweep::partition(&samples, sweep.batch_size, &layout)?;
        if units.is_empty() {
            return Err(SweepError::Empty);
        }

        let context = JobContext {
            cli: &config.cli,
            mixture: &mixture,
            collisions: sweep.collisions.unwrap_or(config.job.collisions),
            settings: &config.job,
            environment,
        };

        let jobs = units
            .iter()
            .map(|unit| jobs::unit_job(unit, &context))
            .collect::<Vec<_>>();
        let merge_unit = MergeUnit::new(&units, &layout);
        let merge = jobs::merge_job(&merge_unit, &context);

        let dag = DagDescriptor::assemble(
            units
                .iter()
                .zip(jobs.iter())
                .map(|(unit, job)| DagJob::new(unit.id(), job.submission_path.clone()))
                .collect(),
            DagJob::new(merge_unit.id(), merge.submission_path.clone()),
        )?;

        debug!(
            "Planned {} jobs for {} points in {}",
            units.len(),
            samples.len(),
            layout.root().display()
        );

        Ok(Self {
            name: name.to_string(),
            layout,
            units,
            jobs,
            merge,
            dag,
        })
    }

    /// Write all job files and the DAG
    ///
    /// Jobs whose artifact is already complete are still written so the DAG stays
    /// complete, their scripts exit early when the scheduler runs them.
    #[instrument(skip(self), fields(sweep = %self.name), level = "info")]
    pub fn write(&self) -> Result<SweepReport, SweepError> {
        self.layout.create().map_err(io_error(self.layout.root()))?;

        let mut report = SweepReport {
            name: self.name.clone(),
            directory: self.layout.root().to_path_buf(),
            dag: self.layout.dag(),
            pending: 0,
            satisfied: 0,
            partial: 0,
        };

        for (unit, job) in self.units.iter().zip(self.jobs.iter()) {
            match unit.state().map_err(io_error(&unit.artifact))? {
                ArtifactState::Complete => {
                    info!("Skipping {}, artifact already exists", unit.artifact.display());
                    report.satisfied += 1;
                }
                ArtifactState::Partial => {
                    warn!(
                        "Artifact {} is empty, regenerating it",
                        unit.artifact.display()
                    );
                    report.partial += 1;
                    report.pending += 1;
                }
                ArtifactState::Missing => {
                    debug!("Job {} is pending", unit.id());
                    report.pending += 1;
                }
            }

            job.write().map_err(io_error(&job.script_path))?;
        }

        self.merge.write().map_err(io_error(&self.merge.script_path))?;

        fs::write(&report.dag, self.dag.to_string()).map_err(io_error(&report.dag))?;

        info!(
            "Wrote {} jobs ({} pending, {} done) to {}",
            self.units.len(),
            report.pending,
            report.satisfied,
            report.dag.display()
        );

        Ok(report)
    }
}

/// Result of a single sweep within a run
#[derive(Debug)]
pub struct SweepOutcome {
    pub name: String,
    pub result: Result<(SweepReport, Option<ExitStatus>), SweepError>,
}

impl SweepOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives plan, write and (optionally) submit for every selected sweep
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    environment: Environment,
    executor: Executors,
}

impl Generator {
    /// set up with the environment of the current process
    pub fn load(config: GeneratorConfig) -> Result<Self, ConfigErrors> {
        let environment = config.environment.capture();

        Self::new(config, environment)
    }

    pub fn new(config: GeneratorConfig, environment: Environment) -> Result<Self, ConfigErrors> {
        let executor = Executors::load(&config.executor)?;

        Ok(Self {
            config,
            environment,
            executor,
        })
    }

    pub fn plan(&self, name: &str, sweep: &SweepConfig) -> Result<SweepPlan, SweepError> {
        SweepPlan::build(name, sweep, &self.config, &self.environment)
    }

    /// Generate a single sweep and submit it if requested
    pub fn generate(
        &self,
        name: &str,
        sweep: &SweepConfig,
        submit: bool,
    ) -> Result<(SweepReport, Option<ExitStatus>), SweepError> {
        self.execute(&self.plan(name, sweep)?, submit)
    }

    fn execute(
        &self,
        plan: &SweepPlan,
        submit: bool,
    ) -> Result<(SweepReport, Option<ExitStatus>), SweepError> {
        let report = plan.write()?;

        let status = if submit {
            info!("Submitting {}", report.dag.display());
            self.executor.submit(&report.dag)?
        } else {
            None
        };

        Ok((report, status))
    }

    /// Run all sweeps matching `patterns`, a failing sweep doesn't stop the others
    #[instrument(skip(self), level = "info")]
    pub fn run(&self, patterns: &[String], submit: bool) -> Result<Vec<SweepOutcome>, ConfigErrors> {
        let selected = self.config.select(patterns)?;

        if selected.is_empty() {
            warn!("No sweep matches {patterns:?}");
        }

        // sweep directory -> sweep that wrote it during this run
        let mut claimed: BTreeMap<PathBuf, &str> = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(selected.len());

        for (name, sweep) in selected {
            let result = self.plan(name, sweep).and_then(|plan| {
                if let Some(other) = claimed.get(plan.layout.root()) {
                    return Err(SweepError::SharedDirectory {
                        directory: plan.layout.root().to_path_buf(),
                        other: other.to_string(),
                    });
                }
                claimed.insert(plan.layout.root().to_path_buf(), name);

                self.execute(&plan, submit)
            });

            if let Err(ref e) = result {
                error!("Sweep {name} failed: {e}");
            }

            outcomes.push(SweepOutcome {
                name: name.to_string(),
                result,
            });
        }

        Ok(outcomes)
    }
}
