pub mod condor;

use crate::config::{ConfigErrors, ExecutorConfig};
use std::{
    io,
    path::{Path, PathBuf},
    process::ExitStatus,
    time::Duration,
};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to spawn {binary:?}: {source}")]
    Spawn { binary: PathBuf, source: io::Error },
    #[error("Failed to wait for the scheduler: {0}")]
    Wait(#[from] io::Error),
    #[error("Submission of {dag:?} failed with {status}")]
    Failed { dag: PathBuf, status: ExitStatus },
    #[error("Submission of {dag:?} timed out after {timeout:?}")]
    Timeout { dag: PathBuf, timeout: Duration },
}

/// Scheduler backends a finished DAG can be handed to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Executors {
    Condor(condor::CondorExecutor),
    /// only generate, never submit
    DryRun,
}

impl Executors {
    pub fn load(config: &ExecutorConfig) -> Result<Self, ConfigErrors> {
        match config.name.to_lowercase().as_str() {
            "condor" | "htcondor" => Ok(Self::Condor(condor::CondorExecutor::load(config)?)),
            "dry-run" | "none" => Ok(Self::DryRun),
            _ => Err(ConfigErrors::UnsupportedExecutor(config.name.clone())),
        }
    }

    /// Submit the descriptor at `dag`
    ///
    /// Returns the exit status of the scheduler, or `None` if nothing was submitted.
    pub fn submit(&self, dag: &Path) -> Result<Option<ExitStatus>, ExecutorError> {
        match self {
            Self::Condor(executor) => executor.submit(dag).map(Some),
            Self::DryRun => {
                info!("Dry run, not submitting {}", dag.display());

                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condor::CondorExecutor;
    use std::collections::BTreeMap;

    fn config(name: &str, parameter: &str) -> ExecutorConfig {
        ExecutorConfig {
            name: name.to_string(),
            parameter: if parameter.is_empty() {
                None
            } else {
                Some(serde_yaml::from_str::<BTreeMap<String, serde_yaml::Value>>(parameter).unwrap())
            },
        }
    }

    #[test]
    fn loads_condor_parameters() {
        let executors = Executors::load(&config(
            "HTCondor",
            "{binary: /usr/bin/condor_submit_dag, args: [-force], timeout: 1500}",
        ))
        .unwrap();

        assert_eq!(
            executors,
            Executors::Condor(CondorExecutor {
                binary: PathBuf::from("/usr/bin/condor_submit_dag"),
                args: vec!["-force".into()],
                timeout: Some(Duration::from_millis(1500)),
            })
        );
        assert_eq!(
            Executors::load(&config("condor", "")).unwrap(),
            Executors::Condor(CondorExecutor::default())
        );
    }

    #[test]
    fn rejects_unknown_executors_and_parameters() {
        assert!(matches!(
            Executors::load(&config("slurm", "")),
            Err(ConfigErrors::UnsupportedExecutor(name)) if name == "slurm"
        ));
        assert!(matches!(
            Executors::load(&config("condor", "{timeout: soon}")),
            Err(ConfigErrors::InvalidExecutorParameter(key)) if key == "timeout"
        ));
        assert!(matches!(
            Executors::load(&config("condor", "{priority: 3}")),
            Err(ConfigErrors::InvalidExecutorParameter(key)) if key == "priority"
        ));
    }

    #[test]
    fn dry_run_submits_nothing() {
        assert_eq!(
            Executors::DryRun.submit(Path::new("/nonexistent/dag")).unwrap(),
            None
        );
    }

    #[test]
    fn exit_status_decides_submission_result() {
        let accepting = CondorExecutor {
            binary: PathBuf::from("true"),
            ..Default::default()
        };
        let rejecting = CondorExecutor {
            binary: PathBuf::from("false"),
            ..Default::default()
        };

        assert!(accepting.submit(Path::new("dag")).unwrap().success());
        assert!(matches!(
            rejecting.submit(Path::new("dag")),
            Err(ExecutorError::Failed { .. })
        ));
    }

    #[test]
    fn missing_binary_fails_to_spawn() {
        let missing = CondorExecutor {
            binary: PathBuf::from("/nonexistent/condor_submit_dag"),
            ..Default::default()
        };

        assert!(matches!(
            missing.submit(Path::new("dag")),
            Err(ExecutorError::Spawn { .. })
        ));
    }

    #[test]
    fn slow_submission_times_out() {
        // the descriptor path doubles as the argument to sleep
        let slow = CondorExecutor {
            binary: PathBuf::from("sleep"),
            args: Vec::new(),
            timeout: Some(Duration::from_millis(50)),
        };

        assert!(matches!(
            slow.submit(Path::new("5")),
            Err(ExecutorError::Timeout { .. })
        ));
    }
}
