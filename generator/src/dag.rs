//! DAG descriptor consumed by the grid scheduler
//!
//! ```text
//! JOB <id> <submission-descriptor-path>
//! ...
//! PARENT <id1> <id2> ... CHILD <merge-id>
//! ```
//!
//! All batch jobs fan in to a single merge job. The descriptor is kept as a
//! structured record and only turned into text on `Display`, parsing goes
//! through the same validation as assembling.

use itertools::Itertools;
use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DagError {
    #[error("Job {0} is declared more than once")]
    DuplicateJob(String),
    #[error("Job {0} is used as a parent but never declared")]
    UndeclaredParent(String),
    #[error("Merge job {0} is never declared")]
    UndeclaredChild(String),
    #[error("Merge job {0} can't be its own parent")]
    ChildIsParent(String),
    #[error("Expected exactly one PARENT ... CHILD line, found {0}")]
    DependencyCount(usize),
    #[error("Submission path {0:?} contains whitespace, JOB lines can't carry it")]
    WhitespaceInPath(PathBuf),
    #[error("Malformed line {line}: {content}")]
    Malformed { line: usize, content: String },
}

/// A `JOB` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagJob {
    pub id: String,
    pub submission: PathBuf,
}

impl DagJob {
    pub fn new(id: impl Into<String>, submission: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            submission: submission.into(),
        }
    }
}

/// Fan-in dependency of every batch job onto the merge job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanIn {
    pub parents: Vec<String>,
    pub child: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagDescriptor {
    jobs: Vec<DagJob>,
    merge: DagJob,
    dependency: FanIn,
}

impl DagDescriptor {
    /// Assemble the descriptor from the batch jobs (in batch order) and the merge job
    pub fn assemble(jobs: Vec<DagJob>, merge: DagJob) -> Result<Self, DagError> {
        let dependency = FanIn {
            parents: jobs.iter().map(|job| job.id.clone()).collect(),
            child: merge.id.clone(),
        };

        Self::validated(jobs, merge, dependency)
    }

    fn validated(jobs: Vec<DagJob>, merge: DagJob, dependency: FanIn) -> Result<Self, DagError> {
        let mut declared = BTreeSet::new();

        for job in jobs.iter().chain([&merge]) {
            if !declared.insert(job.id.as_str()) {
                return Err(DagError::DuplicateJob(job.id.clone()));
            }
            if has_whitespace(&job.submission) {
                return Err(DagError::WhitespaceInPath(job.submission.clone()));
            }
        }

        if dependency.child != merge.id {
            return Err(DagError::UndeclaredChild(dependency.child.clone()));
        }

        for parent in dependency.parents.iter() {
            if *parent == dependency.child {
                return Err(DagError::ChildIsParent(parent.clone()));
            }
            if !declared.contains(parent.as_str()) {
                return Err(DagError::UndeclaredParent(parent.clone()));
            }
        }

        Ok(Self {
            jobs,
            merge,
            dependency,
        })
    }

    pub fn jobs(&self) -> &[DagJob] {
        &self.jobs
    }

    pub fn merge(&self) -> &DagJob {
        &self.merge
    }

    pub fn dependency(&self) -> &FanIn {
        &self.dependency
    }
}

/// `JOB` lines are split on whitespace, so neither the scheduler nor `FromStr` can read such a path back
pub fn has_whitespace(path: &Path) -> bool {
    path.to_string_lossy().chars().any(char::is_whitespace)
}

impl fmt::Display for DagDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for job in self.jobs.iter() {
            writeln!(f, "JOB {} {}", job.id, job.submission.display())?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "JOB {} {}",
            self.merge.id,
            self.merge.submission.display()
        )?;
        writeln!(
            f,
            "PARENT {} CHILD {}",
            self.dependency.parents.iter().join(" "),
            self.dependency.child
        )
    }
}

impl FromStr for DagDescriptor {
    type Err = DagError;

    /// Parse a descriptor, the merge job is the child of the single dependency line
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut jobs = Vec::new();
        let mut dependencies = Vec::new();

        for (number, line) in s.lines().enumerate() {
            let malformed = || DagError::Malformed {
                line: number + 1,
                content: line.to_string(),
            };
            let mut words = line.split_whitespace();

            match words.next() {
                None => continue,
                Some("JOB") => match (words.next(), words.next(), words.next()) {
                    (Some(id), Some(path), None) => jobs.push(DagJob::new(id, path)),
                    _ => return Err(malformed()),
                },
                Some("PARENT") => {
                    let rest = words.collect_vec();
                    match rest.iter().position(|word| *word == "CHILD") {
                        Some(split) if split > 0 && rest.len() == split + 2 => {
                            dependencies.push(FanIn {
                                parents: rest[..split].iter().map(|id| id.to_string()).collect(),
                                child: rest[split + 1].to_string(),
                            })
                        }
                        _ => return Err(malformed()),
                    }
                }
                Some(_) => return Err(malformed()),
            }
        }

        let dependency = match <[FanIn; 1]>::try_from(dependencies) {
            Ok([dependency]) => dependency,
            Err(dependencies) => return Err(DagError::DependencyCount(dependencies.len())),
        };

        let merge_position = jobs
            .iter()
            .position(|job| job.id == dependency.child)
            .ok_or_else(|| DagError::UndeclaredChild(dependency.child.clone()))?;
        let merge = jobs.remove(merge_position);

        Self::validated(jobs, merge, dependency)
    }
}
