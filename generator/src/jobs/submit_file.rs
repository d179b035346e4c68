use std::{fmt, path::PathBuf};

/// Submission description of a single scheduler job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitDescription {
    pub executable: PathBuf,
    pub getenv: bool,
    pub output: PathBuf,
    pub error: PathBuf,
    pub log: PathBuf,
    pub request_cpus: u32,
    /// runtime hint in seconds, passed through to the scheduler
    pub request_runtime: Option<u64>,
    pub should_transfer_files: bool,
}

fn condor_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

impl fmt::Display for SubmitDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "executable   = {}", self.executable.display())?;
        // scripts are self-contained, everything they need is baked in
        writeln!(f, "arguments    =")?;
        writeln!(f, "getenv       = {}", condor_bool(self.getenv))?;
        writeln!(f)?;
        writeln!(f, "output       = {}", self.output.display())?;
        writeln!(f, "error        = {}", self.error.display())?;
        writeln!(f, "log          = {}", self.log.display())?;
        writeln!(f)?;
        writeln!(f, "request_cpus = {}", self.request_cpus)?;
        if let Some(runtime) = self.request_runtime {
            writeln!(f, "+RequestRuntime = {runtime}")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "should_transfer_files = {}",
            yes_no(self.should_transfer_files)
        )?;
        writeln!(f)?;
        writeln!(f, "queue")
    }
}
