// Backend abstraction so the app can be driven by a real simulation or a stub.

use anyhow::Result;
use nef_integrator::{IntegratorSim, Sample};

/// Anything that produces integrator samples one step at a time.
pub trait IntegratorBackend {
    /// Advance one step; `None` once the run is complete.
    fn step(&mut self) -> Result<Option<Sample>>;
    fn dt(&self) -> f64;
    fn duration(&self) -> f64;
    /// Number of neurons in the ensemble.
    fn neurons(&self) -> usize;
}

/// Backend over a built [`IntegratorSim`].
pub struct CoreBackend {
    sim: IntegratorSim,
    neurons: usize,
}

impl CoreBackend {
    pub fn new(sim: IntegratorSim) -> Self {
        let neurons = sim.inner.network().ensembles().iter().map(|e| e.n_neurons).sum();
        Self { sim, neurons }
    }
}

impl IntegratorBackend for CoreBackend {
    fn step(&mut self) -> Result<Option<Sample>> {
        Ok(self.sim.step()?)
    }

    fn dt(&self) -> f64 {
        self.sim.inner.dt()
    }

    fn duration(&self) -> f64 {
        self.sim.duration
    }

    fn neurons(&self) -> usize {
        self.neurons
    }
}
