//! Piecewise-constant signals: hold the most recently reached breakpoint value.

use crate::error::{NefError, NefResult};

#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseSignal {
    times: Vec<f64>,
    values: Vec<Vec<f64>>,
    zero: Vec<f64>,
}

impl PiecewiseSignal {
    /// Build a signal of `dimensions` components from `(time, value)` breakpoints.
    ///
    /// Times must be finite and strictly increasing; every value must have
    /// `dimensions` finite components.
    pub fn new(dimensions: usize, breakpoints: Vec<(f64, Vec<f64>)>) -> NefResult<Self> {
        if dimensions == 0 {
            return Err(NefError::InvalidBreakpoints(
                "signal must have at least one dimension".into(),
            ));
        }

        let mut times = Vec::with_capacity(breakpoints.len());
        let mut values = Vec::with_capacity(breakpoints.len());
        for (t, v) in breakpoints {
            if !t.is_finite() {
                return Err(NefError::InvalidBreakpoints(format!("non-finite time {}", t)));
            }
            if let Some(&prev) = times.last() {
                if t <= prev {
                    return Err(NefError::InvalidBreakpoints(format!(
                        "times must be strictly increasing ({} follows {})",
                        t, prev
                    )));
                }
            }
            if v.len() != dimensions {
                return Err(NefError::InvalidBreakpoints(format!(
                    "value at t={} has {} components, expected {}",
                    t,
                    v.len(),
                    dimensions
                )));
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(NefError::InvalidBreakpoints(format!("non-finite value at t={}", t)));
            }
            times.push(t);
            values.push(v);
        }

        Ok(Self { times, values, zero: vec![0.0; dimensions] })
    }

    /// One-dimensional signal from `(time, value)` pairs.
    pub fn scalar(breakpoints: &[(f64, f64)]) -> NefResult<Self> {
        Self::new(1, breakpoints.iter().map(|&(t, v)| (t, vec![v])).collect())
    }

    pub fn dimensions(&self) -> usize {
        self.zero.len()
    }

    /// Value at the greatest breakpoint <= `t`, or zeros before the first one.
    pub fn value(&self, t: f64) -> &[f64] {
        let idx = self.times.partition_point(|&bt| bt <= t);
        if idx == 0 {
            &self.zero
        } else {
            &self.values[idx - 1]
        }
    }

    /// First component of [`value`](Self::value).
    pub fn scalar_value(&self, t: f64) -> f64 {
        self.value(t)[0]
    }

    /// Re-evaluate the signal on a time grid.
    pub fn sample(&self, times: &[f64]) -> Vec<Vec<f64>> {
        times.iter().map(|&t| self.value(t).to_vec()).collect()
    }

    /// Re-evaluate the first component on a time grid.
    pub fn sample_scalar(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.scalar_value(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn input_schedule() -> PiecewiseSignal {
        PiecewiseSignal::scalar(&[
            (0.2, 5.0),
            (0.3, 0.0),
            (0.44, -10.0),
            (0.54, 0.0),
            (0.8, 5.0),
            (0.9, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn holds_last_reached_value() {
        let s = input_schedule();
        assert_eq!(s.scalar_value(0.0), 0.0);
        assert_eq!(s.scalar_value(0.25), 5.0);
        assert_eq!(s.scalar_value(0.5), -10.0);
        assert_eq!(s.scalar_value(0.85), 5.0);
        assert_eq!(s.scalar_value(1.0), 0.0);
    }

    #[test]
    fn breakpoint_is_inclusive() {
        let s = input_schedule();
        assert_eq!(s.scalar_value(0.2), 5.0);
        assert_eq!(s.scalar_value(0.44), -10.0);
        assert_eq!(s.scalar_value(0.19999), 0.0);
    }

    #[test]
    fn rejects_malformed_breakpoints() {
        assert!(matches!(
            PiecewiseSignal::scalar(&[(0.3, 1.0), (0.2, 2.0)]),
            Err(NefError::InvalidBreakpoints(_))
        ));
        assert!(matches!(
            PiecewiseSignal::scalar(&[(0.3, 1.0), (0.3, 2.0)]),
            Err(NefError::InvalidBreakpoints(_))
        ));
        assert!(PiecewiseSignal::scalar(&[(f64::NAN, 1.0)]).is_err());
        assert!(PiecewiseSignal::scalar(&[(0.1, f64::INFINITY)]).is_err());
        assert!(PiecewiseSignal::new(2, vec![(0.0, vec![1.0])]).is_err());
        assert!(PiecewiseSignal::new(0, vec![]).is_err());
    }

    #[test]
    fn vector_values_and_empty_schedule() {
        let s = PiecewiseSignal::new(2, vec![(0.5, vec![1.0, -1.0])]).unwrap();
        assert_eq!(s.value(0.1), &[0.0, 0.0]);
        assert_eq!(s.value(0.7), &[1.0, -1.0]);

        let empty = PiecewiseSignal::scalar(&[]).unwrap();
        assert_eq!(empty.dimensions(), 1);
        assert_eq!(empty.scalar_value(3.0), 0.0);
    }

    #[test]
    fn sample_matches_pointwise_lookup() {
        let s = input_schedule();
        let grid: Vec<f64> = (1..=1400).map(|k| k as f64 * 0.001).collect();
        let series = s.sample_scalar(&grid);
        assert_eq!(series.len(), grid.len());
        for (t, v) in grid.iter().zip(series.iter()) {
            assert_eq!(*v, s.scalar_value(*t));
        }
    }

    #[test]
    fn vector_sample_matches_pointwise_lookup() {
        let s =
            PiecewiseSignal::new(2, vec![(0.1, vec![1.0, -1.0]), (0.3, vec![0.5, 2.0])]).unwrap();
        let grid = [0.0, 0.1, 0.2, 0.3, 0.4];
        let series = s.sample(&grid);
        assert_eq!(series.len(), grid.len());
        for (t, v) in grid.iter().zip(&series) {
            assert_eq!(v.as_slice(), s.value(*t));
        }
        assert_eq!(series[0], vec![0.0, 0.0]);
        assert_eq!(series[4], vec![0.5, 2.0]);
    }

    proptest! {
        #[test]
        fn value_is_greatest_breakpoint_at_or_before(
            mut raw in proptest::collection::vec((0.0f64..10.0, -50.0f64..50.0), 0..12),
            t in -1.0f64..11.0,
        ) {
            raw.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            raw.dedup_by(|a, b| a.0 == b.0);
            let s = PiecewiseSignal::scalar(&raw).unwrap();

            let expected = raw
                .iter()
                .filter(|(bt, _)| *bt <= t)
                .last()
                .map(|&(_, v)| v)
                .unwrap_or(0.0);
            prop_assert_eq!(s.scalar_value(t), expected);
        }
    }
}
