use super::ExecutorError;
use crate::config::{ConfigErrors, ExecutorConfig};
use std::{
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

pub const DEFAULT_BINARY: &str = "condor_submit_dag";

/// Executor that hands the DAG to DAGMan via `condor_submit_dag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondorExecutor {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl Default for CondorExecutor {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            args: Vec::new(),
            timeout: None,
        }
    }
}

impl CondorExecutor {
    pub fn load(config: &ExecutorConfig) -> Result<Self, ConfigErrors> {
        let mut executor = Self::default();
        let Some(ref parameter) = config.parameter else {
            return Ok(executor);
        };

        for (key, value) in parameter.iter() {
            match key.as_str() {
                "binary" => match value.as_str() {
                    Some(binary) => executor.binary = PathBuf::from(binary),
                    None => {
                        warn!("executor.parameter.binary must be a string");
                        return Err(ConfigErrors::InvalidExecutorParameter(key.clone()));
                    }
                },
                "args" => match value
                    .as_sequence()
                    .map(|args| {
                        args.iter()
                            .map(|arg| arg.as_str().map(String::from))
                            .collect::<Option<Vec<_>>>()
                    })
                {
                    Some(Some(args)) => executor.args = args,
                    _ => {
                        warn!("executor.parameter.args must be a list of strings");
                        return Err(ConfigErrors::InvalidExecutorParameter(key.clone()));
                    }
                },
                "timeout" => match value.as_u64() {
                    Some(millis) => executor.timeout = Some(Duration::from_millis(millis)),
                    None => {
                        warn!("executor.parameter.timeout must be a natural number (ms)");
                        return Err(ConfigErrors::InvalidExecutorParameter(key.clone()));
                    }
                },
                _ => {
                    warn!("executor.parameter.{key} is not supported by the condor executor");
                    return Err(ConfigErrors::InvalidExecutorParameter(key.clone()));
                }
            }
        }

        Ok(executor)
    }

    /// Run the submit binary on `dag`, a non-zero exit status is a failed submission
    #[instrument(skip(self), level = "info")]
    pub fn submit(&self, dag: &Path) -> Result<ExitStatus, ExecutorError> {
        let start = Instant::now();
        let mut child = Command::new(&self.binary)
            .args(self.args.iter())
            .arg(dag)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        debug!("Scheduler submission running as {}", child.id());

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout)? {
                Some(status) => status,
                None => {
                    // child hasn't exited yet
                    child.kill()?;
                    child.wait()?;

                    return Err(ExecutorError::Timeout {
                        dag: dag.to_path_buf(),
                        timeout,
                    });
                }
            },
            None => child.wait()?,
        };

        debug!(
            "Finished in {} ms | status: {}",
            start.elapsed().as_millis(),
            status
        );

        if status.success() {
            info!("Submitted {}", dag.display());

            Ok(status)
        } else {
            Err(ExecutorError::Failed {
                dag: dag.to_path_buf(),
                status,
            })
        }
    }
}
