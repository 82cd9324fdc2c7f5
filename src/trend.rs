//! MAV aggregation and AMAV integration.

use crate::config::{AccumulationMode, AggregationConfig};
use crate::slopes::SlopeMatrix;
use crate::stats::Accumulator;
use crate::types::Series;

/// Aggregated trend of one phenotype, aligned to its year axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSummary {
    pub years: Vec<i32>,
    /// Number of studies with a defined slope per year.
    pub data_points: Vec<usize>,
    /// Mean annual velocity.
    pub mav: Series,
    /// Accumulated MAV over the last contiguous block.
    pub amav: Series,
    /// Positive limb of AMAV, only present when AMAV dips below zero.
    pub amav_pos: Option<Series>,
}

impl TrendSummary {
    /// Series used downstream: AMAV-POS when it has any defined value,
    /// AMAV otherwise.
    pub fn chosen(&self) -> &Series {
        match &self.amav_pos {
            Some(amav_pos) if amav_pos.iter().any(Option::is_some) => amav_pos,
            _ => &self.amav,
        }
    }

    /// Whether [`TrendSummary::chosen`] returns AMAV-POS.
    pub fn uses_amav_pos(&self) -> bool {
        !std::ptr::eq(self.chosen(), &self.amav)
    }
}

/// Find all maximal runs of consecutive `true` positions.
///
/// Returns inclusive `(start, end)` index pairs in ascending order.
pub fn find_runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (idx, &flag) in mask.iter().enumerate() {
        match (flag, start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                runs.push((s, idx - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, mask.len() - 1));
    }
    runs
}

/// Aggregate per-study slopes into MAV, AMAV and AMAV-POS.
pub fn aggregate_trend(slopes: &SlopeMatrix, cfg: &AggregationConfig) -> TrendSummary {
    let n_years = slopes.n_years();

    let mut data_points = Vec::with_capacity(n_years);
    let mut mav = Vec::with_capacity(n_years);
    for i_year in 0..n_years {
        let mut acc = Accumulator::new();
        for series in &slopes.slopes {
            if let Some(val) = series.get(i_year).copied().flatten() {
                acc.add(val);
            }
        }
        data_points.push(acc.count());
        mav.push(acc.mean());
    }

    let mut summary = TrendSummary {
        years: slopes.years.clone(),
        data_points,
        amav: vec![None; n_years],
        amav_pos: None,
        mav,
    };

    let mask: Vec<bool> = summary.mav.iter().map(Option::is_some).collect();
    let Some(&(last_s, last_e)) = find_runs(&mask).last() else {
        return summary;
    };

    // AMAV is defined one position after each MAV contribution.
    let lo = last_s + 1;
    let hi = (last_e + 1).min(n_years - 1);
    if lo > hi {
        return summary;
    }

    let mut acc = 0.0;
    for i in lo..=hi {
        if let Some(val) = summary.mav[i - 1] {
            acc += val;
        }
        summary.amav[i] = Some(acc);
    }

    summary.amav_pos = positive_limb(&summary.mav, &summary.amav, lo, hi, cfg);
    summary
}

fn positive_limb(
    mav: &[Option<f64>],
    amav: &[Option<f64>],
    lo: usize,
    hi: usize,
    cfg: &AggregationConfig,
) -> Option<Series> {
    // Leftmost minimum of the AMAV window.
    let mut valley: Option<(usize, f64)> = None;
    for (i, val) in amav.iter().enumerate().take(hi + 1).skip(lo) {
        if let Some(val) = *val {
            if valley.is_none_or(|(_, min)| val < min) {
                valley = Some((i, val));
            }
        }
    }
    let (valley, min) = valley?;
    if min >= -cfg.epsilon {
        return None;
    }

    let mut amav_pos = vec![None; amav.len()];
    let start = match cfg.mode {
        AccumulationMode::Prev => (valley + 1).max(lo),
        AccumulationMode::Current => valley.max(lo),
    };

    let mut run = 0.0;
    for i in start..=hi {
        let i_mav = match cfg.mode {
            AccumulationMode::Prev => i - 1,
            AccumulationMode::Current => i,
        };
        if let Some(val) = mav[i_mav] {
            run += if cfg.include_negative {
                val
            } else {
                val.max(0.0)
            };
            amav_pos[i] = Some(run);
        }
    }

    Some(amav_pos)
}
