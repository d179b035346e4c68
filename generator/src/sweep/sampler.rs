use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub const RELATIVE_TOLERANCE: f64 = 1e-3;
pub const ABSOLUTE_TOLERANCE: f64 = 1e-20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("Sampling domain [{min}, {max}] is invalid, it requires 0 < min < max")]
    InvalidDomain { min: f64, max: f64 },
    #[error("Failed to produce {requested} distinct points after {iterations} growth steps (got {produced})")]
    NonConvergence {
        requested: usize,
        produced: usize,
        iterations: usize,
    },
}

/// Combined log/linear grid sampler for the swept electric field
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Sampler {
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    // upper bound for the growth term, `None` derives it from the requested count
    #[serde(default)]
    pub max_growth: Option<usize>,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            min: default_min(),
            max: default_max(),
            max_growth: None,
        }
    }
}

fn default_min() -> f64 {
    1.0
}

fn default_max() -> f64 {
    10_000.0
}

/// two points are considered the same if they are within a relative or absolute tolerance
pub fn similar(a: f64, b: f64) -> bool {
    (a - b).abs() < (RELATIVE_TOLERANCE * (a.abs() + b.abs())).max(ABSOLUTE_TOLERANCE)
}

/// `points` evenly spaced values in [start, end], both ends included
pub fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (points - 1) as f64;

            (0..points)
                .map(|i| {
                    if i == points - 1 {
                        end
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}

/// `points` logarithmically spaced values in [start, end], both ends included
pub fn logspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    linspace(start.log10(), end.log10(), points)
        .into_iter()
        .map(|exponent| 10f64.powf(exponent))
        .collect()
}

impl Sampler {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            max_growth: None,
        }
    }

    pub fn validate(&self) -> Result<(), SamplingError> {
        if self.min.is_finite() && self.max.is_finite() && 0.0 < self.min && self.min < self.max
        {
            Ok(())
        } else {
            Err(SamplingError::InvalidDomain {
                min: self.min,
                max: self.max,
            })
        }
    }

    /// growth steps allowed before giving up
    ///
    /// Every step adds one point to one of the two grids, so the bound scales with
    /// the request to allow for the points lost to deduplication.
    pub fn growth_limit(&self, requested: usize) -> usize {
        self.max_growth
            .unwrap_or_else(|| requested.saturating_mul(4).saturating_add(64))
    }

    /// Produce at least `requested` strictly ascending, pairwise non-similar points
    pub fn sample(&self, requested: usize) -> Result<Vec<f64>, SamplingError> {
        if requested == 0 {
            return Ok(Vec::new());
        }

        self.validate()?;

        let limit = self.growth_limit(requested);
        let mut produced = 0;

        for growth in 0..=limit {
            let points = self.candidates(requested, growth);
            trace!(growth, points = points.len(), "Sampled candidate grids");

            if points.len() >= requested {
                debug!(
                    requested,
                    produced = points.len(),
                    growth,
                    "Sampler converged"
                );

                return Ok(points);
            }

            produced = points.len();
        }

        Err(SamplingError::NonConvergence {
            requested,
            produced,
            iterations: limit,
        })
    }

    /// regenerate both grids for the given growth term, merge and deduplicate
    fn candidates(&self, requested: usize, growth: usize) -> Vec<f64> {
        let half = requested / 2;
        let mut merged = logspace(self.min, self.max, half + (growth + 1) / 2);
        merged.extend(linspace(self.min, self.max, half + growth / 2));
        merged.sort_by(f64::total_cmp);

        // the input is sorted and strictly positive, so a point that isn't similar to the
        // last kept one can't be similar to any earlier one either
        merged.into_iter().fold(Vec::new(), |mut kept: Vec<f64>, x| {
            if kept.last().map_or(true, |last| !similar(*last, x)) {
                kept.push(x);
            }
            kept
        })
    }
}

/// Sample with the default domain
pub fn sample(requested: usize) -> Result<Vec<f64>, SamplingError> {
    Sampler::default().sample(requested)
}
