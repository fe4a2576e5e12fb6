//! Ensembles: populations of LIF neurons representing a bounded vector

use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};
use rand::Rng;

use crate::error::{NefError, NefResult};
use crate::neuron::{LifParams, NeuronKind, NeuronPool};

/// Declaration of a population. Neuron parameters are sampled at build time.
#[derive(Clone, Debug, PartialEq)]
pub struct Ensemble {
    pub label: String,
    pub n_neurons: usize,
    pub dimensions: usize,
    pub radius: f64,
    pub neuron: NeuronKind,
    pub lif: LifParams,
    /// Uniform range of maximum firing rates (Hz)
    pub max_rates: (f64, f64),
    /// Uniform range of normalised firing thresholds
    pub intercepts: (f64, f64),
    pub n_eval_points: Option<usize>,
    pub seed: Option<u64>,
}

impl Ensemble {
    pub fn new(label: impl Into<String>, n_neurons: usize, dimensions: usize) -> Self {
        Self {
            label: label.into(),
            n_neurons,
            dimensions,
            radius: 1.0,
            neuron: NeuronKind::default(),
            lif: LifParams::default(),
            max_rates: (200.0, 400.0),
            intercepts: (-1.0, 1.0),
            n_eval_points: None,
            seed: None,
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_neuron(mut self, neuron: NeuronKind) -> Self {
        self.neuron = neuron;
        self
    }

    pub fn with_lif(mut self, lif: LifParams) -> Self {
        self.lif = lif;
        self
    }

    pub fn with_max_rates(mut self, low: f64, high: f64) -> Self {
        self.max_rates = (low, high);
        self
    }

    pub fn with_intercepts(mut self, low: f64, high: f64) -> Self {
        self.intercepts = (low, high);
        self
    }

    pub fn with_eval_points(mut self, n: usize) -> Self {
        self.n_eval_points = Some(n);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> NefResult<()> {
        let bad = |msg: String| -> NefResult<()> {
            Err(NefError::InvalidParameter(format!("ensemble '{}': {}", self.label, msg)))
        };

        if self.n_neurons == 0 {
            return bad("needs at least one neuron".into());
        }
        if self.dimensions == 0 {
            return bad("needs at least one dimension".into());
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return bad(format!("radius must be > 0, got {}", self.radius));
        }
        self.lif.validate()?;

        let (lo, hi) = self.max_rates;
        if !(lo > 0.0 && lo <= hi && hi * self.lif.tau_ref < 1.0) {
            return bad(format!("max rates [{}, {}) out of range", lo, hi));
        }
        let (lo, hi) = self.intercepts;
        if !(-1.0 <= lo && lo <= hi && hi <= 1.0) {
            return bad(format!("intercepts [{}, {}) must lie within [-1, 1]", lo, hi));
        }
        if self.n_eval_points == Some(0) {
            return bad("needs at least one evaluation point".into());
        }
        Ok(())
    }

    pub fn eval_point_count(&self) -> usize {
        self.n_eval_points.unwrap_or_else(|| {
            (500 * self.dimensions).clamp(750, 2500).max(2 * self.n_neurons)
        })
    }
}

/// Sampled parameters and decoding data of one ensemble.
#[derive(Clone, Debug)]
pub struct BuiltEnsemble {
    pub dimensions: usize,
    pub radius: f64,
    /// `neurons × dimensions`, unit rows
    pub encoders: Array2<f64>,
    pub gain: Array1<f64>,
    pub bias: Array1<f64>,
    /// `eval_points × dimensions`, inside the ball of `radius`
    pub eval_points: Array2<f64>,
    /// Steady-state rates at each evaluation point, `eval_points × neurons`
    pub activities: Array2<f64>,
}

impl BuiltEnsemble {
    pub fn build<R: Rng + ?Sized>(decl: &Ensemble, rng: &mut R) -> NefResult<(Self, NeuronPool)> {
        decl.validate()?;
        let n = decl.n_neurons;
        let d = decl.dimensions;

        let encoders = sample_unit_vectors(rng, n, d);

        let mut gain = Array1::zeros(n);
        let mut bias = Array1::zeros(n);
        for i in 0..n {
            let max_rate = uniform(rng, decl.max_rates);
            let intercept = uniform(rng, decl.intercepts).min(1.0 - 1e-9);
            let (g, b) = decl.lif.gain_bias(max_rate, intercept)?;
            gain[i] = g;
            bias[i] = b;
        }

        let eval_points = sample_ball(rng, decl.eval_point_count(), d, decl.radius);

        let mut built = Self {
            dimensions: d,
            radius: decl.radius,
            encoders,
            gain,
            bias,
            eval_points,
            activities: Array2::zeros((0, n)),
        };

        let m = built.eval_points.nrows();
        let mut activities = Array2::zeros((m, n));
        for (r, x) in built.eval_points.rows().into_iter().enumerate() {
            let j = built.currents(x);
            for (c, &ji) in j.iter().enumerate() {
                activities[[r, c]] = decl.lif.rate(ji);
            }
        }
        built.activities = activities;

        let initial_voltage = match decl.neuron {
            NeuronKind::Lif => (0..n).map(|_| rng.gen::<f64>()).collect(),
            NeuronKind::LifRate => vec![0.0; n],
        };
        let pool = NeuronPool::new(decl.neuron, decl.lif, initial_voltage);
        Ok((built, pool))
    }

    pub fn n_neurons(&self) -> usize {
        self.encoders.nrows()
    }

    /// Input currents for represented value `x`: `J = gain·(e·x / radius) + bias`.
    pub fn currents(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        let projected = self.encoders.dot(&x) / self.radius;
        projected * &self.gain + &self.bias
    }

    /// Allocation-free variant of [`currents`](Self::currents) used while stepping.
    pub fn currents_into(&self, x: &[f64], out: &mut [f64]) {
        let mut out = ArrayViewMut1::from(out);
        general_mat_vec_mul(1.0 / self.radius, &self.encoders, &ArrayView1::from(x), 0.0, &mut out);
        out.zip_mut_with(&self.gain, |o, &g| *o *= g);
        out += &self.bias;
    }

    /// Evaluate `f` on every evaluation point (`eval_points × out_dims`).
    pub fn targets<F>(&self, out_dims: usize, f: F) -> NefResult<Array2<f64>>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let m = self.eval_points.nrows();
        let mut y = Array2::zeros((m, out_dims));
        let mut x = vec![0.0; self.dimensions];
        for r in 0..m {
            for (c, v) in x.iter_mut().enumerate() {
                *v = self.eval_points[[r, c]];
            }
            let fx = f(&x);
            if fx.len() != out_dims {
                return Err(NefError::DimensionMismatch(format!(
                    "function returned {} values, declared {}",
                    fx.len(),
                    out_dims
                )));
            }
            for (c, v) in fx.into_iter().enumerate() {
                y[[r, c]] = v;
            }
        }
        Ok(y)
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// Rejection-sample a point uniformly inside the unit ball.
fn sample_unit_ball<R: Rng + ?Sized>(rng: &mut R, d: usize, out: &mut [f64]) -> f64 {
    loop {
        for v in out.iter_mut() {
            *v = rng.gen_range(-1.0..1.0);
        }
        let norm2: f64 = out.iter().map(|v| v * v).sum();
        if norm2 <= 1.0 && norm2 > 1e-12 {
            return norm2.sqrt();
        }
        if d > 8 {
            // Cube rejection degrades quickly with dimension; fall back to
            // normalising and rescaling by u^(1/d).
            let norm = norm2.sqrt();
            if norm > 1e-12 {
                let r = rng.gen::<f64>().powf(1.0 / d as f64);
                for v in out.iter_mut() {
                    *v *= r / norm;
                }
                return r;
            }
        }
    }
}

fn sample_unit_vectors<R: Rng + ?Sized>(rng: &mut R, n: usize, d: usize) -> Array2<f64> {
    let mut out = Array2::zeros((n, d));
    let mut buf = vec![0.0; d];
    for i in 0..n {
        let norm = sample_unit_ball(rng, d, &mut buf);
        for c in 0..d {
            out[[i, c]] = buf[c] / norm;
        }
    }
    out
}

fn sample_ball<R: Rng + ?Sized>(rng: &mut R, n: usize, d: usize, radius: f64) -> Array2<f64> {
    let mut out = Array2::zeros((n, d));
    let mut buf = vec![0.0; d];
    for i in 0..n {
        sample_unit_ball(rng, d, &mut buf);
        for c in 0..d {
            out[[i, c]] = buf[c] * radius;
        }
    }
    out
}
