pub mod environment;
pub mod script;
pub mod submit_file;

use crate::{
    mixture::Mixture,
    sweep::{MergeUnit, WorkUnit},
};
use environment::Environment;
use script::{path_arg, Script};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use submit_file::SubmitDescription;
use tracing::trace;

/// Resource hints and scheduler options shared by all jobs
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JobSettings {
    #[serde(default = "default_request_cpus")]
    pub request_cpus: u32,
    // seconds, only applied to the batch jobs
    #[serde(default = "default_request_runtime")]
    pub request_runtime: Option<u64>,
    #[serde(default = "default_collisions")]
    pub collisions: u32,
    #[serde(default = "default_true")]
    pub getenv: bool,
    #[serde(default = "default_true")]
    pub should_transfer_files: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            request_cpus: default_request_cpus(),
            request_runtime: default_request_runtime(),
            collisions: default_collisions(),
            getenv: default_true(),
            should_transfer_files: default_true(),
        }
    }
}

fn default_request_cpus() -> u32 {
    1
}

fn default_request_runtime() -> Option<u64> {
    Some(7200)
}

fn default_collisions() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

/// Everything a job needs besides its own unit
#[derive(Debug, Clone, Copy)]
pub struct JobContext<'a> {
    pub cli: &'a Path,
    pub mixture: &'a Mixture,
    pub collisions: u32,
    pub settings: &'a JobSettings,
    pub environment: &'a Environment,
}

/// Script and submission description of a single job, plus where they go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFiles {
    pub script_path: PathBuf,
    pub script: Script,
    pub submission_path: PathBuf,
    pub submission: SubmitDescription,
}

impl JobFiles {
    /// write script (executable) and submission description, replacing existing files
    pub fn write(&self) -> std::io::Result<()> {
        fs::write(&self.script_path, self.script.to_string())?;
        fs::set_permissions(&self.script_path, fs::Permissions::from_mode(0o755))?;
        fs::write(&self.submission_path, self.submission.to_string())?;

        trace!(
            script = ?self.script_path,
            submission = ?self.submission_path,
            "Wrote job files"
        );

        Ok(())
    }
}

/// format the sample points the way the CLI expects them
pub fn format_samples(samples: &[f64]) -> Vec<String> {
    samples.iter().map(|value| format!("{value:.4}")).collect()
}

/// Job simulating a single batch
///
/// The script skips the CLI call when the artifact already exists and isn't empty,
/// so re-running a finished node is a no-op.
pub fn unit_job(unit: &WorkUnit, context: &JobContext) -> JobFiles {
    let mut args = vec![path_arg(context.cli), "generate".into(), "--components".into()];
    args.extend(context.mixture.tokens().iter().cloned());
    args.push("--efield".into());
    args.extend(format_samples(&unit.samples));
    args.extend([
        "--collisions".into(),
        context.collisions.to_string(),
        "--output".into(),
        path_arg(&unit.artifact),
    ]);

    let script = Script::new(context.environment.clone())
        .guarded_by(&unit.artifact)
        .command(args);

    JobFiles {
        script_path: unit.files.script.clone(),
        script,
        submission_path: unit.files.submission.clone(),
        submission: SubmitDescription {
            executable: unit.files.script.clone(),
            getenv: context.settings.getenv,
            output: unit.files.output.clone(),
            error: unit.files.error.clone(),
            log: unit.files.log.clone(),
            request_cpus: context.settings.request_cpus,
            request_runtime: context.settings.request_runtime,
            should_transfer_files: context.settings.should_transfer_files,
        },
    }
}

/// Job merging all batch artifacts and moving the archive to the storage root
pub fn merge_job(merge: &MergeUnit, context: &JobContext) -> JobFiles {
    let mut args = vec![path_arg(context.cli), "merge".into(), "-i".into()];
    args.extend(merge.inputs.iter().map(|input| path_arg(input)));
    args.extend(["--tar".into(), "-o".into(), path_arg(&merge.archive_base)]);

    let script = Script::new(context.environment.clone())
        .command(args)
        .command([
            "mv".to_string(),
            path_arg(&merge.archive),
            path_arg(&merge.destination),
        ]);

    JobFiles {
        script_path: merge.files.script.clone(),
        script,
        submission_path: merge.files.submission.clone(),
        submission: SubmitDescription {
            executable: merge.files.script.clone(),
            getenv: context.settings.getenv,
            output: merge.files.output.clone(),
            error: merge.files.error.clone(),
            log: merge.files.log.clone(),
            request_cpus: default_request_cpus(),
            request_runtime: None,
            should_transfer_files: context.settings.should_transfer_files,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::{layout::SweepLayout, partition};
    use pretty_assertions::assert_eq;

    fn fixture() -> (Mixture, JobSettings, Environment, SweepLayout) {
        (
            Mixture::parse("C4H10 0.5 Ar").unwrap(),
            JobSettings::default(),
            Environment::default(),
            SweepLayout::new("/storage", "Ar_99.5-C4H10_0.5"),
        )
    }

    #[test]
    fn samples_use_four_decimals() {
        assert_eq!(
            format_samples(&[1.0, 2.5, 10_000.0, 3.14159]),
            vec!["1.0000", "2.5000", "10000.0000", "3.1416"]
        );
    }

    #[test]
    fn unit_job_invokes_generate() {
        let (mixture, settings, environment, layout) = fixture();
        let context = JobContext {
            cli: Path::new("/opt/gas-cli"),
            mixture: &mixture,
            collisions: 10,
            settings: &settings,
            environment: &environment,
        };
        let units = partition(&[1.0, 1.5, 2.0], 2, &layout).unwrap();
        let job = unit_job(&units[0], &context);

        assert_eq!(
            job.script.commands,
            vec![vec![
                "/opt/gas-cli",
                "generate",
                "--components",
                "C4H10",
                "0.5",
                "Ar",
                "--efield",
                "1.0000",
                "1.5000",
                "--collisions",
                "10",
                "--output",
                "/storage/Ar_99.5-C4H10_0.5/data/0.gas",
            ]]
        );
        assert_eq!(job.script.guard, Some(units[0].artifact.clone()));
        assert_eq!(job.submission.executable, units[0].files.script);
        assert_eq!(job.submission.request_runtime, Some(7200));
        assert_eq!(
            job.submission_path,
            PathBuf::from("/storage/Ar_99.5-C4H10_0.5/jobs/submissions/job_0.sub")
        );
    }

    #[test]
    fn merge_job_archives_and_relocates() {
        let (mixture, settings, environment, layout) = fixture();
        let context = JobContext {
            cli: Path::new("/opt/gas-cli"),
            mixture: &mixture,
            collisions: 10,
            settings: &settings,
            environment: &environment,
        };
        let units = partition(&[1.0, 1.5, 2.0], 2, &layout).unwrap();
        let job = merge_job(&MergeUnit::new(&units, &layout), &context);

        assert_eq!(job.script.guard, None);
        assert_eq!(
            job.script.to_string(),
            "#!/bin/sh
set -e
/opt/gas-cli merge -i /storage/Ar_99.5-C4H10_0.5/data/0.gas /storage/Ar_99.5-C4H10_0.5/data/1.gas --tar -o /storage/Ar_99.5-C4H10_0.5/Ar_99.5-C4H10_0.5.gas
mv /storage/Ar_99.5-C4H10_0.5/Ar_99.5-C4H10_0.5.gas.tar.gz /storage
"
        );
        assert_eq!(job.submission.request_runtime, None);
        assert_eq!(job.submission.request_cpus, 1);
    }

    #[test]
    fn write_marks_script_executable() {
        let storage = tempfile::tempdir().unwrap();
        let (mixture, settings, environment, _) = fixture();
        let layout = SweepLayout::new(storage.path(), "Ar");
        layout.create().unwrap();

        let context = JobContext {
            cli: Path::new("/opt/gas-cli"),
            mixture: &mixture,
            collisions: 3,
            settings: &settings,
            environment: &environment,
        };
        let units = partition(&[42.0], 1, &layout).unwrap();
        let job = unit_job(&units[0], &context);
        job.write().unwrap();

        let mode = fs::metadata(&job.script_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
        assert_eq!(
            fs::read_to_string(&job.submission_path).unwrap(),
            job.submission.to_string()
        );
    }
}
