use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::debug;

/// file extension of the artifacts produced by the simulation CLI
pub const ARTIFACT_EXTENSION: &str = "gas";
pub const DAG_FILE: &str = "dag";

/// Directory layout of a single sweep
///
/// ```text
/// <storage>/<name>/data/<i>.gas
/// <storage>/<name>/jobs/submissions/{script_<i>.sh, job_<i>.sub, dag}
/// <storage>/<name>/jobs/{logs,error,output}/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepLayout {
    storage: PathBuf,
    name: String,
    root: PathBuf,
}

impl SweepLayout {
    pub fn new(storage: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        let storage = storage.into();
        let name = name.into();
        let root = storage.join(&name);

        Self {
            storage,
            name,
            root,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &Path {
        &self.storage
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn jobs(&self) -> PathBuf {
        self.root.join("jobs")
    }

    pub fn submissions(&self) -> PathBuf {
        self.jobs().join("submissions")
    }

    pub fn logs(&self) -> PathBuf {
        self.jobs().join("logs")
    }

    pub fn errors(&self) -> PathBuf {
        self.jobs().join("error")
    }

    pub fn outputs(&self) -> PathBuf {
        self.jobs().join("output")
    }

    pub fn dag(&self) -> PathBuf {
        self.submissions().join(DAG_FILE)
    }

    pub fn artifact(&self, index: usize) -> PathBuf {
        self.data().join(format!("{index}.{ARTIFACT_EXTENSION}"))
    }

    /// base name handed to the merge step, the CLI appends `.tar.gz`
    pub fn archive_base(&self) -> PathBuf {
        self.root.join(format!("{}.{ARTIFACT_EXTENSION}", self.name))
    }

    pub fn archive(&self) -> PathBuf {
        self.root
            .join(format!("{}.{ARTIFACT_EXTENSION}.tar.gz", self.name))
    }

    /// Paths for the job with the given suffix, i.e., the batch index or `merge`
    pub fn job_files(&self, suffix: &str) -> JobPaths {
        let submissions = self.submissions();

        JobPaths {
            script: submissions.join(format!("script_{suffix}.sh")),
            submission: submissions.join(format!("job_{suffix}.sub")),
            output: self.outputs().join(format!("output_{suffix}")),
            error: self.errors().join(format!("error_{suffix}")),
            log: self.logs().join(format!("log_{suffix}")),
        }
    }

    /// create all directories of the layout, existing ones are left alone
    pub fn create(&self) -> io::Result<()> {
        for dir in [
            self.data(),
            self.submissions(),
            self.logs(),
            self.errors(),
            self.outputs(),
        ] {
            fs::create_dir_all(&dir)?;
            debug!(dir = ?dir, "Created directory");
        }

        Ok(())
    }
}

/// Scheduler bookkeeping files of a single job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub script: PathBuf,
    pub submission: PathBuf,
    pub output: PathBuf,
    pub error: PathBuf,
    pub log: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_layout() {
        let layout = SweepLayout::new("/storage", "Ar_99.5-C4H10_0.5");

        assert_eq!(
            layout.artifact(3),
            PathBuf::from("/storage/Ar_99.5-C4H10_0.5/data/3.gas")
        );
        assert_eq!(
            layout.dag(),
            PathBuf::from("/storage/Ar_99.5-C4H10_0.5/jobs/submissions/dag")
        );
        assert_eq!(
            layout.archive(),
            PathBuf::from("/storage/Ar_99.5-C4H10_0.5/Ar_99.5-C4H10_0.5.gas.tar.gz")
        );

        let merge = layout.job_files("merge");
        assert_eq!(
            merge.submission,
            PathBuf::from("/storage/Ar_99.5-C4H10_0.5/jobs/submissions/job_merge.sub")
        );
        assert_eq!(
            merge.log,
            PathBuf::from("/storage/Ar_99.5-C4H10_0.5/jobs/logs/log_merge")
        );
    }

    #[test]
    fn create_is_repeatable() {
        let storage = tempfile::tempdir().unwrap();
        let layout = SweepLayout::new(storage.path(), "Ar");

        layout.create().unwrap();
        layout.create().unwrap();

        assert!(layout.data().is_dir());
        assert!(layout.outputs().is_dir());
    }
}
