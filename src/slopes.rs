use crate::types::{Observation, Series};

/// Per-study slope series aligned to a shared year axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SlopeMatrix {
    /// Year axis (sorted).
    pub years: Vec<i32>,
    /// One slope series per study, each of the same length as `years`.
    pub slopes: Vec<Series>,
}

impl SlopeMatrix {
    pub fn n_years(&self) -> usize {
        self.years.len()
    }
}

/// Derive the piecewise-constant slopes of every study.
///
/// Between consecutive observations `(y0, v0)` and `(y1, v1)` the slope
/// `(v1 - v0) / (y1 - y0)` is assigned to every axis year in `(y0, y1]`.
/// Years outside the observed span stay undefined, as do all years of a
/// study with fewer than two observations. Duplicate years contribute no
/// slope.
pub fn derive_study_slopes(axis: &[i32], studies: &[Vec<Observation>]) -> SlopeMatrix {
    let slopes = studies
        .iter()
        .map(|obs_vec| derive_one(axis, obs_vec))
        .collect();
    SlopeMatrix {
        years: axis.to_vec(),
        slopes,
    }
}

fn derive_one(axis: &[i32], obs_vec: &[Observation]) -> Series {
    let mut series = vec![None; axis.len()];

    let mut sorted = obs_vec.to_vec();
    sorted.sort_by_key(|obs| obs.year);

    for pair in sorted.windows(2) {
        let (y0, v0) = (pair[0].year, pair[0].value);
        let (y1, v1) = (pair[1].year, pair[1].value);
        if y1 <= y0 {
            continue;
        }
        let slope = (v1 - v0) / (y1 - y0) as f64;
        for (slot, &year) in series.iter_mut().zip(axis) {
            if year > y0 && year <= y1 {
                *slot = Some(slope);
            }
        }
    }

    series
}
