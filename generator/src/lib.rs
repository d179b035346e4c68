//! Job batch and DAG generator for electric field sweeps on an HTCondor pool
//!
//! A sweep samples the field range, splits the points into batches, writes one
//! script and submission description per batch plus a merge job, and ties them
//! together in a DAG that is handed to `condor_submit_dag`.

pub mod config;
pub mod dag;
pub mod executors;
pub mod generator;
pub mod jobs;
pub mod logging;
pub mod mixture;
pub mod sweep;
