//! Leaky integrate-and-fire neurons (spiking and rate)
//!
//! Currents are normalised so that the firing threshold is `J = 1`.

use crate::error::{NefError, NefResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NeuronKind {
    /// Spiking LIF; output is `1/dt` on a spike step, 0 otherwise.
    #[default]
    Lif,
    /// Steady-state LIF firing rate.
    LifRate,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LifParams {
    /// Membrane RC time constant (s)
    pub tau_rc: f64,
    /// Absolute refractory period (s)
    pub tau_ref: f64,
}

impl Default for LifParams {
    fn default() -> Self {
        Self { tau_rc: 0.02, tau_ref: 0.002 }
    }
}

impl LifParams {
    pub fn validate(&self) -> NefResult<()> {
        if !(self.tau_rc.is_finite() && self.tau_rc > 0.0) {
            return Err(NefError::InvalidParameter(format!(
                "tau_rc must be > 0, got {}",
                self.tau_rc
            )));
        }
        if !(self.tau_ref.is_finite() && self.tau_ref >= 0.0) {
            return Err(NefError::InvalidParameter(format!(
                "tau_ref must be >= 0, got {}",
                self.tau_ref
            )));
        }
        Ok(())
    }

    /// Steady-state firing rate (Hz) for input current `j`.
    #[inline]
    pub fn rate(&self, j: f64) -> f64 {
        if j > 1.0 {
            1.0 / (self.tau_ref + self.tau_rc * (1.0 / (j - 1.0)).ln_1p())
        } else {
            0.0
        }
    }

    /// Gain and bias so that the neuron starts firing at `intercept` and
    /// reaches `max_rate` at a normalised input of 1.
    pub fn gain_bias(&self, max_rate: f64, intercept: f64) -> NefResult<(f64, f64)> {
        if !(max_rate > 0.0 && max_rate * self.tau_ref < 1.0) {
            return Err(NefError::InvalidParameter(format!(
                "max rate {} Hz is not reachable with tau_ref {}",
                max_rate, self.tau_ref
            )));
        }
        if !(intercept.is_finite() && intercept < 1.0) {
            return Err(NefError::InvalidParameter(format!("intercept {} must be < 1", intercept)));
        }
        let z = 1.0 / (-((self.tau_ref - 1.0 / max_rate) / self.tau_rc).exp_m1());
        let gain = (z - 1.0) / (1.0 - intercept);
        let bias = 1.0 - gain * intercept;
        Ok((gain, bias))
    }
}

/// Per-neuron dynamic state of one population.
#[derive(Clone, Debug)]
pub struct NeuronPool {
    pub kind: NeuronKind,
    pub params: LifParams,
    pub voltage: Vec<f64>,
    pub refractory: Vec<f64>,
}

impl NeuronPool {
    pub fn new(kind: NeuronKind, params: LifParams, initial_voltage: Vec<f64>) -> Self {
        let n = initial_voltage.len();
        Self { kind, params, voltage: initial_voltage, refractory: vec![0.0; n] }
    }

    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Advance all neurons by `dt` under `current`, writing activities to `out`.
    pub fn step(&mut self, dt: f64, current: &[f64], out: &mut [f64]) {
        debug_assert_eq!(current.len(), self.len());
        debug_assert_eq!(out.len(), self.len());

        match self.kind {
            NeuronKind::LifRate => {
                for (o, &j) in out.iter_mut().zip(current) {
                    *o = self.params.rate(j);
                }
            }
            NeuronKind::Lif => {
                let LifParams { tau_rc, tau_ref } = self.params;
                for i in 0..current.len() {
                    let j = current[i];
                    self.refractory[i] -= dt;
                    // Only the part of the step past the refractory period integrates
                    let delta_t = (dt - self.refractory[i]).clamp(0.0, dt);

                    let v = &mut self.voltage[i];
                    *v -= (j - *v) * (-delta_t / tau_rc).exp_m1();

                    if *v > 1.0 {
                        // Interpolate the threshold crossing inside the step
                        let overshoot = ((*v - 1.0) / (j - 1.0)).min(1.0 - 1e-12);
                        let t_spike = dt + tau_rc * (-overshoot).ln_1p();
                        *v = 0.0;
                        self.refractory[i] = tau_ref + t_spike;
                        out[i] = 1.0 / dt;
                    } else {
                        if *v < 0.0 {
                            *v = 0.0;
                        }
                        out[i] = 0.0;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_zero_below_threshold() {
        let p = LifParams::default();
        assert_eq!(p.rate(0.5), 0.0);
        assert_eq!(p.rate(1.0), 0.0);
        assert!(p.rate(1.5) > 0.0);
        assert!(p.rate(3.0) > p.rate(1.5));
        assert!(p.rate(1e9) <= 1.0 / p.tau_ref);
    }

    #[test]
    fn gain_bias_hits_intercept_and_max_rate() {
        let p = LifParams::default();
        let (gain, bias) = p.gain_bias(300.0, -0.25).unwrap();
        assert!((gain * -0.25 + bias - 1.0).abs() < 1e-12);
        assert!((p.rate(gain + bias) - 300.0).abs() < 1e-6);
    }

    #[test]
    fn gain_bias_rejects_unreachable_rate() {
        let p = LifParams::default();
        assert!(p.gain_bias(600.0, 0.0).is_err());
        assert!(p.gain_bias(200.0, 1.0).is_err());
    }

    #[test]
    fn spiking_rate_matches_steady_state_rate() {
        let params = LifParams::default();
        let mut pool = NeuronPool::new(NeuronKind::Lif, params, vec![0.0]);
        let dt = 0.001;
        let j = 2.0;
        let mut out = [0.0];
        let mut spikes = 0usize;
        let steps = 5000;
        for _ in 0..steps {
            pool.step(dt, &[j], &mut out);
            if out[0] > 0.0 {
                spikes += 1;
            }
        }
        let measured = spikes as f64 / (steps as f64 * dt);
        let expected = params.rate(j);
        assert!((measured - expected).abs() / expected < 0.05, "{} vs {}", measured, expected);
    }

    #[test]
    fn silent_below_threshold_and_voltage_floor() {
        let mut pool = NeuronPool::new(NeuronKind::Lif, LifParams::default(), vec![0.5]);
        let mut out = [0.0];
        for _ in 0..100 {
            pool.step(0.001, &[-3.0], &mut out);
            assert_eq!(out[0], 0.0);
            assert!(pool.voltage[0] >= 0.0);
        }
    }
}
