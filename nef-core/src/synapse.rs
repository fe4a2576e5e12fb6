//! First-order low-pass synapses

use crate::error::{NefError, NefResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Synapse {
    /// Pass the signal through unchanged.
    None,
    /// `tau · dy/dt = x − y`
    Lowpass { tau: f64 },
}

impl Default for Synapse {
    fn default() -> Self {
        Synapse::Lowpass { tau: 0.005 }
    }
}

impl Synapse {
    pub fn lowpass(tau: f64) -> Self {
        Synapse::Lowpass { tau }
    }

    pub fn validate(&self) -> NefResult<()> {
        match *self {
            Synapse::None => Ok(()),
            Synapse::Lowpass { tau } if tau.is_finite() && tau > 0.0 => Ok(()),
            Synapse::Lowpass { tau } => Err(NefError::InvalidParameter(format!(
                "synapse time constant must be > 0, got {}",
                tau
            ))),
        }
    }

    /// Discretised filter state for `dims` channels at step `dt`.
    pub fn filter(&self, dt: f64, dims: usize) -> SynapseFilter {
        let decay = match *self {
            Synapse::None => 0.0,
            // Zero-order hold: exact for inputs held constant over the step
            Synapse::Lowpass { tau } => (-dt / tau).exp(),
        };
        SynapseFilter { decay, state: vec![0.0; dims] }
    }
}

#[derive(Clone, Debug)]
pub struct SynapseFilter {
    decay: f64,
    state: Vec<f64>,
}

impl SynapseFilter {
    /// Push one step of input through the filter and return the filtered output.
    pub fn step(&mut self, input: &[f64]) -> &[f64] {
        debug_assert_eq!(input.len(), self.state.len());
        let a = self.decay;
        for (y, &x) in self.state.iter_mut().zip(input) {
            *y = a * *y + (1.0 - a) * x;
        }
        &self.state
    }
}
