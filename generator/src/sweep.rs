pub mod layout;
pub mod sampler;


use layout::{JobPaths, SweepLayout};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const MERGE_ID: &str = "job_merge";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Batch size must be at least 1")]
    ZeroBatchSize,
}

/// State of an artifact on disk, used as the idempotence marker of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Missing,
    /// present but empty, e.g., after a job got evicted mid-write
    Partial,
    Complete,
}

impl ArtifactState {
    pub fn inspect(path: &Path) -> io::Result<Self> {
        match fs::metadata(path) {
            Ok(metadata) if metadata.len() > 0 => Ok(Self::Complete),
            Ok(_) => Ok(Self::Partial),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Self::Missing),
            Err(error) => Err(error),
        }
    }
}

/// A single batch of sample points, run as one scheduler job
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    pub index: usize,
    pub samples: Vec<f64>,
    pub artifact: PathBuf,
    pub files: JobPaths,
}

impl WorkUnit {
    pub fn id(&self) -> String {
        format!("job_{}", self.index)
    }

    pub fn state(&self) -> io::Result<ArtifactState> {
        ArtifactState::inspect(&self.artifact)
    }
}

/// Terminal unit merging all batch artifacts into one archive
#[derive(Debug, Clone, PartialEq)]
pub struct MergeUnit {
    pub inputs: Vec<PathBuf>,
    pub archive_base: PathBuf,
    pub archive: PathBuf,
    pub destination: PathBuf,
    pub files: JobPaths,
}

impl MergeUnit {
    pub fn new(units: &[WorkUnit], layout: &SweepLayout) -> Self {
        Self {
            inputs: units.iter().map(|unit| unit.artifact.clone()).collect(),
            archive_base: layout.archive_base(),
            archive: layout.archive(),
            destination: layout.storage().to_path_buf(),
            files: layout.job_files("merge"),
        }
    }

    pub fn id(&self) -> &'static str {
        MERGE_ID
    }
}

/// Split `samples` into contiguous batches of at most `batch_size` points
///
/// Batch `i` covers `samples[i * batch_size..(i + 1) * batch_size]`, only the
/// last batch may be shorter.
pub fn partition(
    samples: &[f64],
    batch_size: usize,
    layout: &SweepLayout,
) -> Result<Vec<WorkUnit>, PartitionError> {
    if batch_size == 0 {
        return Err(PartitionError::ZeroBatchSize);
    }

    Ok(samples
        .chunks(batch_size)
        .enumerate()
        .map(|(index, batch)| WorkUnit {
            index,
            samples: batch.to_vec(),
            artifact: layout.artifact(index),
            files: layout.job_files(&index.to_string()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(len: usize) -> Vec<f64> {
        (0..len).map(|i| i as f64).collect()
    }

    #[test]
    fn single_point_batches() {
        let layout = SweepLayout::new("/storage", "Ar");
        let units = partition(&samples(205), 1, &layout).unwrap();

        assert_eq!(units.len(), 205);
        assert!(units.iter().all(|unit| unit.samples.len() == 1));
        assert_eq!(units[204].samples, vec![204.0]);
        assert_eq!(units[204].id(), "job_204");
        assert_eq!(units[204].artifact, PathBuf::from("/storage/Ar/data/204.gas"));
    }

    #[test]
    fn oversized_batch_takes_everything() {
        let layout = SweepLayout::new("/storage", "Ar");
        let units = partition(&samples(205), 1000, &layout).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].samples, samples(205));
    }

    #[test]
    fn last_batch_is_shorter() {
        let layout = SweepLayout::new("/storage", "Ar");
        let units = partition(&samples(10), 4, &layout).unwrap();

        assert_eq!(units.len(), 3);
        assert_eq!(
            units.iter().map(|unit| unit.samples.len()).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );
        assert_eq!(units[1].samples, vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn empty_and_invalid_input() {
        let layout = SweepLayout::new("/storage", "Ar");

        assert!(partition(&[], 3, &layout).unwrap().is_empty());
        assert_eq!(
            partition(&samples(3), 0, &layout),
            Err(PartitionError::ZeroBatchSize)
        );
    }

    #[test]
    fn merge_unit_collects_artifacts_in_order() {
        let layout = SweepLayout::new("/storage", "Ar");
        let units = partition(&samples(3), 2, &layout).unwrap();
        let merge = MergeUnit::new(&units, &layout);

        assert_eq!(
            merge.inputs,
            vec![
                PathBuf::from("/storage/Ar/data/0.gas"),
                PathBuf::from("/storage/Ar/data/1.gas")
            ]
        );
        assert_eq!(merge.destination, PathBuf::from("/storage"));
        assert_eq!(merge.id(), "job_merge");
    }

    #[test]
    fn artifact_state_tracks_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.gas");

        assert_eq!(ArtifactState::inspect(&path).unwrap(), ArtifactState::Missing);
        fs::write(&path, "").unwrap();
        assert_eq!(ArtifactState::inspect(&path).unwrap(), ArtifactState::Partial);
        fs::write(&path, "gas").unwrap();
        assert_eq!(ArtifactState::inspect(&path).unwrap(), ArtifactState::Complete);
    }
}
