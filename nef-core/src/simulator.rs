//! Fixed-step simulator: owns a built network and advances it one `dt` at a time.
//!
//! Semantics of one step at time `t = (k + 1)·dt`:
//! - nodes are evaluated at `t`;
//! - each connection reads its presynaptic value (node output, or decoded
//!   ensemble activity from the previous step), applies its transform and
//!   synapse, and accumulates into the target ensemble's input;
//! - ensembles convert input to currents and advance their neurons;
//! - every probe records one filtered sample.

use std::collections::BTreeMap;

use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array2, ArrayView1, ArrayViewMut1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::ensemble::BuiltEnsemble;
use crate::error::{NefError, NefResult};
use crate::network::{Network, ProbeId, Source, Transform};
use crate::neuron::NeuronPool;
use crate::solver::LstsqL2;
use crate::synapse::SynapseFilter;
use crate::trace::{ProbeData, SimulationTrace};

struct EnsembleState {
    built: BuiltEnsemble,
    pool: NeuronPool,
    /// Decoders for the represented value itself (`neurons × dims`)
    decoders: Array2<f64>,
    input: Vec<f64>,
    current: Vec<f64>,
    activity: Vec<f64>,
}

struct ConnectionState {
    source: Source,
    /// Present for ensemble sources (`neurons × source_dims`)
    decoders: Option<Array2<f64>>,
    transform: Transform,
    filter: SynapseFilter,
    target: usize,
    target_dims: Vec<usize>,
    presyn: Vec<f64>,
    transformed: Vec<f64>,
}

struct ProbeState {
    id: ProbeId,
    source: Source,
    filter: SynapseFilter,
    raw: Vec<f64>,
}

pub struct Simulator {
    network: Network,
    dt: f64,
    steps: u64,
    node_out: Vec<Vec<f64>>,
    ensembles: Vec<EnsembleState>,
    connections: Vec<ConnectionState>,
    probes: Vec<ProbeState>,
    trace: SimulationTrace,
}

impl Simulator {
    pub fn new(network: Network, dt: f64) -> NefResult<Self> {
        Self::with_solver(network, dt, LstsqL2::default())
    }

    /// Build the network: sample neuron parameters and solve all decoders.
    pub fn with_solver(network: Network, dt: f64, solver: LstsqL2) -> NefResult<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(NefError::InvalidParameter(format!("dt must be > 0, got {}", dt)));
        }

        let seed = network.seed.unwrap_or_else(rand::random);
        info!(network = %network.label, seed, dt, "building network");
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut ensembles = Vec::with_capacity(network.ensembles.len());
        let mut factors = Vec::with_capacity(network.ensembles.len());
        for decl in &network.ensembles {
            // Draw even when unused so ensemble seeds don't shift the others
            let derived: u64 = rng.gen();
            let mut ens_rng = ChaCha8Rng::seed_from_u64(decl.seed.unwrap_or(derived));
            let (built, pool) = BuiltEnsemble::build(decl, &mut ens_rng)?;

            let factor = solver.factorize(built.activities.view())?;
            let (decoders, rmse) = factor.solve(built.activities.view(), built.eval_points.view())?;
            debug!(ensemble = %decl.label, rmse, "solved value decoders");

            let n = built.n_neurons();
            let d = built.dimensions;
            ensembles.push(EnsembleState {
                built,
                pool,
                decoders,
                input: vec![0.0; d],
                current: vec![0.0; n],
                activity: vec![0.0; n],
            });
            factors.push(factor);
        }

        let mut connections = Vec::with_capacity(network.connections.len());
        for conn in &network.connections {
            let target = conn.target.ensemble.index();
            let target_dims = match &conn.target.dims {
                Some(dims) => dims.clone(),
                None => (0..ensembles[target].built.dimensions).collect(),
            };

            let (decoders, source_dims) = match (conn.source, &conn.function) {
                (Source::Node(id), _) => (None, network.nodes[id.index()].signal.dimensions()),
                (Source::Ensemble(id), None) => {
                    let ens = &ensembles[id.index()];
                    (Some(ens.decoders.clone()), ens.built.dimensions)
                }
                (Source::Ensemble(id), Some(func)) => {
                    let ens = &ensembles[id.index()];
                    let f = func.f.as_ref();
                    let targets = ens.built.targets(func.output_dims, f)?;
                    let (decoders, rmse) =
                        factors[id.index()].solve(ens.built.activities.view(), targets.view())?;
                    debug!(
                        from = %network.ensembles[id.index()].label,
                        to = %network.ensembles[target].label,
                        rmse,
                        "solved function decoders"
                    );
                    (Some(decoders), func.output_dims)
                }
            };

            let width = target_dims.len();
            connections.push(ConnectionState {
                source: conn.source,
                decoders,
                transform: conn.transform.clone(),
                filter: conn.synapse.filter(dt, width),
                target,
                target_dims,
                presyn: vec![0.0; source_dims],
                transformed: vec![0.0; width],
            });
        }

        let mut probe_data = BTreeMap::new();
        let mut probes = Vec::with_capacity(network.probes.len());
        for (index, probe) in network.probes.iter().enumerate() {
            let id = network.probe_id(index);
            let dims = network.source_dims(probe.source);
            probe_data.insert(id, ProbeData::new(probe.label.clone(), dims, 0));
            probes.push(ProbeState {
                id,
                source: probe.source,
                filter: probe.synapse.filter(dt, dims),
                raw: vec![0.0; dims],
            });
        }

        let node_out = network.nodes.iter().map(|n| vec![0.0; n.signal.dimensions()]).collect();

        Ok(Self {
            network,
            dt,
            steps: 0,
            node_out,
            ensembles,
            connections,
            probes,
            trace: SimulationTrace::new(dt, probe_data),
        })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Time of the most recent step (0 before the first one).
    pub fn time(&self) -> f64 {
        self.steps as f64 * self.dt
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Advance one step; returns the new simulation time.
    pub fn step_once(&mut self) -> f64 {
        let t = (self.steps + 1) as f64 * self.dt;

        for (node, out) in self.network.nodes.iter().zip(self.node_out.iter_mut()) {
            out.copy_from_slice(node.signal.value(t));
        }

        for ens in &mut self.ensembles {
            ens.input.iter_mut().for_each(|v| *v = 0.0);
        }

        for conn in &mut self.connections {
            match conn.source {
                Source::Node(id) => conn.presyn.copy_from_slice(&self.node_out[id.index()]),
                Source::Ensemble(id) => {
                    let decoders = match &conn.decoders {
                        Some(d) => d,
                        None => continue,
                    };
                    decode(decoders, &self.ensembles[id.index()].activity, &mut conn.presyn);
                }
            }
            conn.transform.apply(&conn.presyn, &mut conn.transformed);
            let filtered = conn.filter.step(&conn.transformed);

            let input = &mut self.ensembles[conn.target].input;
            for (&d, &v) in conn.target_dims.iter().zip(filtered) {
                input[d] += v;
            }
        }

        for ens in &mut self.ensembles {
            ens.built.currents_into(&ens.input, &mut ens.current);
            ens.pool.step(self.dt, &ens.current, &mut ens.activity);
        }

        for probe in &mut self.probes {
            match probe.source {
                Source::Node(id) => probe.raw.copy_from_slice(&self.node_out[id.index()]),
                Source::Ensemble(id) => {
                    let ens = &self.ensembles[id.index()];
                    decode(&ens.decoders, &ens.activity, &mut probe.raw);
                }
            }
            let sample = probe.filter.step(&probe.raw);
            if let Some(data) = self.trace.probe_mut(&probe.id) {
                data.push(sample);
            }
        }

        self.trace.push_time(t);
        self.steps += 1;
        t
    }

    pub fn run_steps(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step_once();
        }
    }

    /// Run for `duration` seconds (rounded to whole steps).
    pub fn run(&mut self, duration: f64) -> NefResult<()> {
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(NefError::InvalidParameter(format!(
                "duration must be >= 0, got {}",
                duration
            )));
        }
        let steps = (duration / self.dt).round() as u64;
        info!(network = %self.network.label, steps, duration, "running");
        self.run_steps(steps);
        info!(network = %self.network.label, time = self.time(), "run finished");
        Ok(())
    }

    /// Run until the simulation time reaches `time` (inclusive, to the nearest step).
    pub fn run_until(&mut self, time: f64) -> NefResult<()> {
        let remaining = time - self.time();
        if remaining <= 0.0 {
            return Ok(());
        }
        self.run(remaining)
    }

    /// Latest recorded sample of a probe.
    pub fn latest(&self, probe: ProbeId) -> Option<&[f64]> {
        self.trace.probe(probe).and_then(|p| p.last())
    }

    pub fn trace(&self) -> &SimulationTrace {
        &self.trace
    }

    pub fn into_trace(self) -> SimulationTrace {
        self.trace
    }
}

/// `out = Dᵀ a`
fn decode(decoders: &Array2<f64>, activity: &[f64], out: &mut [f64]) {
    general_mat_vec_mul(
        1.0,
        &decoders.t(),
        &ArrayView1::from(activity),
        0.0,
        &mut ArrayViewMut1::from(out),
    );
}

/// Build `network`, run it for `duration` seconds at `dt`, and return the trace.
pub fn simulate(network: Network, dt: f64, duration: f64) -> NefResult<SimulationTrace> {
    let mut sim = Simulator::new(network, dt)?;
    sim.run(duration)?;
    Ok(sim.into_trace())
}
