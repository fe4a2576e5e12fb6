//! Controlled integrator model.
//!
//! One two-dimensional ensemble `A`:
//! - dimension 0 holds the integrated value,
//! - dimension 1 holds the control signal,
//! - the recurrent connection computes `x0*x1 + x0`, so with integration
//!   time constant `tau` the state obeys `dx0/dt = u + x0*x1/tau`.

use ndarray::arr2;
use nef_core::{
    Connection, Ensemble, EnsembleId, LifParams, Network, PiecewiseSignal, ProbeId, SimulationTrace,
    Simulator, Synapse, Transform,
};
use tracing::info;

use crate::config::IntegratorConfig;
use crate::error::{IntegratorError, IntegratorResult};

/// Recurrent dynamics decoded from `A` into `A[0]`.
pub fn recurrent(x: &[f64]) -> Vec<f64> {
    vec![x[0] * x[1] + x[0]]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegratorProbes {
    /// Decoded `[value, control]` of `A`, low-pass filtered
    pub state: ProbeId,
    pub input: ProbeId,
    pub control: ProbeId,
}

/// Declared (not yet built) controlled integrator.
#[derive(Clone, Debug)]
pub struct ControlledIntegrator {
    pub network: Network,
    pub ensemble: EnsembleId,
    pub probes: IntegratorProbes,
    pub input: PiecewiseSignal,
    pub control: PiecewiseSignal,
    pub dt: f64,
    pub duration: f64,
}

impl ControlledIntegrator {
    pub fn declare(config: &IntegratorConfig) -> IntegratorResult<Self> {
        config.validate()?;
        let input = config.schedule.input_signal()?;
        let control = config.schedule.control_signal()?;
        let tau = config.synapses.integration_tau;

        let mut network = Network::new("controlled integrator");
        if let Some(seed) = config.simulation.seed {
            network = network.with_seed(seed);
        }

        let e = &config.ensemble;
        let ensemble = network.add_ensemble(
            Ensemble::new("A", e.n_neurons, 2)
                .with_radius(e.radius)
                .with_neuron(e.neuron)
                .with_lif(LifParams { tau_rc: e.tau_rc, tau_ref: e.tau_ref })
                .with_max_rates(e.max_rates.0, e.max_rates.1)
                .with_intercepts(e.intercepts.0, e.intercepts.1),
        )?;

        let input_node = network.add_node("input", input.clone());
        let control_node = network.add_node("control", control.clone());

        // Scaling the input by tau makes the recurrent loop integrate u itself
        network.connect(
            Connection::new(input_node, ensemble)
                .with_transform(Transform::Dense(arr2(&[[tau], [0.0]])))
                .with_synapse(Synapse::lowpass(tau)),
        )?;
        network.connect(
            Connection::new(control_node, ensemble.dim(1))
                .with_synapse(Synapse::lowpass(config.synapses.control_tau)),
        )?;
        network.connect(
            Connection::new(ensemble, ensemble.dim(0))
                .with_function(1, recurrent)
                .with_synapse(Synapse::lowpass(tau)),
        )?;

        let probes = IntegratorProbes {
            state: network.probe(ensemble, Synapse::lowpass(config.synapses.probe_tau))?,
            input: network.probe(input_node, Synapse::None)?,
            control: network.probe(control_node, Synapse::None)?,
        };

        Ok(Self {
            network,
            ensemble,
            probes,
            input,
            control,
            dt: config.simulation.dt,
            duration: config.simulation.duration,
        })
    }

    /// Build the network into a steppable simulation.
    pub fn build(self) -> IntegratorResult<IntegratorSim> {
        info!(
            neurons = self.network.ensembles()[0].n_neurons,
            duration = self.duration,
            "building integrator"
        );
        let inner = Simulator::new(self.network, self.dt)?;
        Ok(IntegratorSim {
            inner,
            probes: self.probes,
            input: self.input,
            control: self.control,
            duration: self.duration,
        })
    }

    /// Build and run for the configured duration.
    pub fn run(self) -> IntegratorResult<IntegratorRun> {
        let mut sim = self.build()?;
        sim.run_to_end()?;
        Ok(sim.finish())
    }
}

/// A built integrator that can be stepped incrementally.
pub struct IntegratorSim {
    pub inner: Simulator,
    pub probes: IntegratorProbes,
    pub input: PiecewiseSignal,
    pub control: PiecewiseSignal,
    pub duration: f64,
}

/// One recorded step of the integrator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub input: f64,
    pub control: f64,
    pub decoded: f64,
    pub decoded_control: f64,
}

impl IntegratorSim {
    pub fn total_steps(&self) -> u64 {
        (self.duration / self.inner.dt()).round() as u64
    }

    pub fn finished(&self) -> bool {
        self.inner.steps() >= self.total_steps()
    }

    /// Advance one step unless the run is complete.
    pub fn step(&mut self) -> IntegratorResult<Option<Sample>> {
        if self.finished() {
            return Ok(None);
        }
        let time = self.inner.step_once();
        let state = self
            .inner
            .latest(self.probes.state)
            .ok_or(IntegratorError::MissingProbe("state"))?;
        Ok(Some(Sample {
            time,
            input: self.input.scalar_value(time),
            control: self.control.scalar_value(time),
            decoded: state[0],
            decoded_control: state[1],
        }))
    }

    pub fn run_to_end(&mut self) -> IntegratorResult<()> {
        let remaining = self.total_steps().saturating_sub(self.inner.steps());
        self.inner.run(remaining as f64 * self.inner.dt())?;
        Ok(())
    }

    pub fn finish(self) -> IntegratorRun {
        IntegratorRun {
            trace: self.inner.into_trace(),
            probes: self.probes,
            input: self.input,
            control: self.control,
        }
    }
}

/// Completed run: the trace plus what is needed to analyse it.
#[derive(Clone, Debug)]
pub struct IntegratorRun {
    pub trace: SimulationTrace,
    pub probes: IntegratorProbes,
    pub input: PiecewiseSignal,
    pub control: PiecewiseSignal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recurrent_function() {
        assert_eq!(recurrent(&[0.5, 0.0]), vec![0.5]);
        assert_eq!(recurrent(&[0.5, -0.5]), vec![0.25]);
        assert_eq!(recurrent(&[-1.0, 1.0]), vec![-2.0]);
    }

    #[test]
    fn declares_three_connections_and_probes() {
        let model = ControlledIntegrator::declare(&IntegratorConfig::default()).unwrap();
        assert_eq!(model.network.connections().len(), 3);
        assert_eq!(model.network.probes().len(), 3);
        assert_eq!(model.network.ensembles()[0].dimensions, 2);
        assert_eq!(model.network.ensembles()[0].radius, 1.5);
        assert_eq!(model.input.scalar_value(0.25), 5.0);
        assert_eq!(model.control.scalar_value(0.7), -0.5);
    }

    #[test]
    fn invalid_config_fails_before_building() {
        let mut config = IntegratorConfig::default();
        config.ensemble.max_rates = (200.0, 900.0);
        assert!(matches!(ControlledIntegrator::declare(&config), Err(IntegratorError::Model(_))));

        let mut config = IntegratorConfig::default();
        config.synapses.control_tau = 0.0;
        assert!(matches!(ControlledIntegrator::declare(&config), Err(IntegratorError::Config(_))));
    }

    #[test]
    fn steps_until_duration() {
        let mut config = IntegratorConfig::default();
        config.simulation.duration = 0.05;
        config.simulation.seed = Some(1);
        config.ensemble.n_neurons = 50;
        let mut sim = ControlledIntegrator::declare(&config).unwrap().build().unwrap();
        assert_eq!(sim.total_steps(), 50);

        let first = sim.step().unwrap().unwrap();
        assert!((first.time - 0.001).abs() < 1e-12);
        assert_eq!(first.input, 0.0);

        let mut count = 1;
        while sim.step().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 50);
        assert!(sim.finished());
        sim.run_to_end().unwrap();
        assert_eq!(sim.finish().trace.len(), 50);
    }
}
