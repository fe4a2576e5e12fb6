//! Reference integral and comparison of a run against it.

use std::ops::Range;

use crate::error::{IntegratorError, IntegratorResult};
use crate::model::IntegratorRun;

/// Forward-Euler integral: `ref[k] = dt · Σ_{i<=k} input[i]`.
pub fn reference_integral(input: &[f64], dt: f64) -> Vec<f64> {
    input
        .iter()
        .scan(0.0, |acc, &u| {
            *acc += u;
            Some(dt * *acc)
        })
        .collect()
}

/// Behaviour of the integrator under a given control value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    /// control ≈ 0: input is accumulated
    Integrate,
    /// control < 0: the stored value decays toward zero
    Leak,
    /// control > 0: the stored value grows until the radius bounds it
    Saturate,
}

impl Regime {
    pub const TOLERANCE: f64 = 1e-9;

    pub fn of(control: f64) -> Self {
        if control.abs() <= Self::TOLERANCE {
            Regime::Integrate
        } else if control < 0.0 {
            Regime::Leak
        } else {
            Regime::Saturate
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegimeSpan {
    pub regime: Regime,
    pub start: f64,
    pub end: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Drift {
    TowardZero,
    AwayFromZero,
    Flat,
}

/// A stretch with no input in a non-integrating regime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuietWindow {
    pub regime: Regime,
    pub start: f64,
    pub end: f64,
    pub decoded_start: f64,
    pub decoded_end: f64,
}

impl QuietWindow {
    /// `|end| / |start|`; below 1 means the value decayed.
    pub fn magnitude_ratio(&self) -> f64 {
        self.decoded_end.abs() / self.decoded_start.abs().max(f64::EPSILON)
    }

    pub fn drift(&self) -> Drift {
        let delta = self.decoded_end.abs() - self.decoded_start.abs();
        if delta.abs() < 1e-3 {
            Drift::Flat
        } else if delta < 0.0 {
            Drift::TowardZero
        } else {
            Drift::AwayFromZero
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub final_time: f64,
    pub final_decoded: f64,
    pub final_reference: f64,
    /// Mean |decoded − reference| over integrate-regime samples
    pub integrate_mae: Option<f64>,
    /// Longest input-free stretch outside the integrate regime
    pub quiet_window: Option<QuietWindow>,
}

impl Summary {
    pub fn drift(&self) -> Option<Drift> {
        self.quiet_window.map(|w| w.drift())
    }
}

/// Reference and decoded trajectories on a shared time grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub dt: f64,
    pub times: Vec<f64>,
    pub input: Vec<f64>,
    pub control: Vec<f64>,
    pub reference: Vec<f64>,
    pub decoded: Vec<f64>,
    pub decoded_control: Vec<f64>,
}

impl Comparison {
    pub fn from_run(run: &IntegratorRun) -> IntegratorResult<Self> {
        let trace = &run.trace;
        let state = trace.probe(run.probes.state).ok_or(IntegratorError::MissingProbe("state"))?;
        let times = trace.times().to_vec();
        // Re-evaluate the schedules on the trace grid
        let input = run.input.sample_scalar(&times);
        let control = run.control.sample_scalar(&times);
        let reference = reference_integral(&input, trace.dt());

        Ok(Self {
            dt: trace.dt(),
            times,
            input,
            control,
            reference,
            decoded: state.component(0),
            decoded_control: state.component(1),
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Sample indices with `start <= t < end`.
    pub fn window(&self, start: f64, end: f64) -> Range<usize> {
        let lo = self.times.partition_point(|&t| t < start);
        let hi = self.times.partition_point(|&t| t < end);
        lo..hi.max(lo)
    }

    /// Index of the sample nearest to `t`.
    pub fn index_at(&self, t: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let i = self.times.partition_point(|&x| x < t);
        if i == 0 {
            return Some(0);
        }
        if i >= self.len() {
            return Some(self.len() - 1);
        }
        if (self.times[i] - t).abs() < (t - self.times[i - 1]).abs() {
            Some(i)
        } else {
            Some(i - 1)
        }
    }

    pub fn decoded_at(&self, t: f64) -> Option<f64> {
        self.index_at(t).map(|i| self.decoded[i])
    }

    pub fn reference_at(&self, t: f64) -> Option<f64> {
        self.index_at(t).map(|i| self.reference[i])
    }

    pub fn mean_abs_error(&self, start: f64, end: f64) -> Option<f64> {
        let w = self.window(start, end);
        if w.is_empty() {
            return None;
        }
        let n = w.len() as f64;
        Some(w.map(|i| (self.decoded[i] - self.reference[i]).abs()).sum::<f64>() / n)
    }

    pub fn max_abs_error(&self, start: f64, end: f64) -> Option<f64> {
        self.window(start, end)
            .map(|i| (self.decoded[i] - self.reference[i]).abs())
            .reduce(f64::max)
    }

    /// Maximal runs of equal regime, from the scheduled control signal.
    pub fn regime_spans(&self) -> Vec<RegimeSpan> {
        let mut spans: Vec<RegimeSpan> = Vec::new();
        for (&t, &c) in self.times.iter().zip(&self.control) {
            let regime = Regime::of(c);
            match spans.last_mut() {
                Some(span) if span.regime == regime => span.end = t,
                _ => spans.push(RegimeSpan { regime, start: t, end: t }),
            }
        }
        spans
    }

    /// Input-free stretches outside the integrate regime.
    pub fn quiet_windows(&self) -> Vec<QuietWindow> {
        let mut windows = Vec::new();
        let mut open: Option<(usize, Regime)> = None;

        for i in 0..=self.len() {
            let current = if i < self.len() && self.input[i] == 0.0 {
                match Regime::of(self.control[i]) {
                    Regime::Integrate => None,
                    r => Some(r),
                }
            } else {
                None
            };

            let closes = match (open, current) {
                (Some((_, r)), Some(c)) => r != c,
                (Some(_), None) => true,
                _ => false,
            };
            if closes {
                if let Some((start, regime)) = open.take() {
                    let end = i - 1;
                    if end > start {
                        windows.push(QuietWindow {
                            regime,
                            start: self.times[start],
                            end: self.times[end],
                            decoded_start: self.decoded[start],
                            decoded_end: self.decoded[end],
                        });
                    }
                }
            }
            if open.is_none() {
                open = current.map(|r| (i, r));
            }
        }
        windows
    }

    pub fn summary(&self) -> Summary {
        let integrate: Vec<f64> = (0..self.len())
            .filter(|&i| Regime::of(self.control[i]) == Regime::Integrate)
            .map(|i| (self.decoded[i] - self.reference[i]).abs())
            .collect();
        let integrate_mae = if integrate.is_empty() {
            None
        } else {
            Some(integrate.iter().sum::<f64>() / integrate.len() as f64)
        };

        let quiet_window = self
            .quiet_windows()
            .into_iter()
            .max_by(|a, b| (a.end - a.start).total_cmp(&(b.end - b.start)));

        Summary {
            final_time: self.times.last().copied().unwrap_or(0.0),
            final_decoded: self.decoded.last().copied().unwrap_or(0.0),
            final_reference: self.reference.last().copied().unwrap_or(0.0),
            integrate_mae,
            quiet_window,
        }
    }
}
