//! Shared data types.

/// Yearly series aligned to a year axis.
///
/// `None` marks a year where the series is undefined.
pub type Series = Vec<Option<f64>>;

/// Single observed value of a study.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub year: i32,
    pub value: f64,
}

impl Observation {
    pub fn new(year: i32, value: f64) -> Self {
        Self { year, value }
    }
}

/// Count the defined values of a series.
pub fn count_defined(series: &[Option<f64>]) -> usize {
    series.iter().filter(|val| val.is_some()).count()
}
