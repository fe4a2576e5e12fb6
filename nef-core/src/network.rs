//! Declarative network description: nodes, ensembles, connections, probes.
//!
//! Every declaration is validated as it is added, so a `Network` that
//! exists is always a valid input to the simulator.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array2, ArrayView1, ArrayViewMut1};
use tracing::debug;

use crate::ensemble::Ensemble;
use crate::error::{NefError, NefResult};
use crate::signal::PiecewiseSignal;
use crate::synapse::Synapse;

static NEXT_NETWORK: AtomicU32 = AtomicU32::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    net: u32,
    index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EnsembleId {
    net: u32,
    index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProbeId {
    net: u32,
    index: usize,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl EnsembleId {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Target a single dimension of this ensemble.
    pub fn dim(self, d: usize) -> Target {
        Target { ensemble: self, dims: Some(vec![d]) }
    }

    /// Target a subset of dimensions, in order.
    pub fn dims(self, dims: &[usize]) -> Target {
        Target { ensemble: self, dims: Some(dims.to_vec()) }
    }
}

impl ProbeId {
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Node(NodeId),
    Ensemble(EnsembleId),
}

impl From<NodeId> for Source {
    fn from(id: NodeId) -> Self {
        Source::Node(id)
    }
}

impl From<EnsembleId> for Source {
    fn from(id: EnsembleId) -> Self {
        Source::Ensemble(id)
    }
}

/// Connection destination: an ensemble, optionally restricted to some dimensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub ensemble: EnsembleId,
    pub dims: Option<Vec<usize>>,
}

impl From<EnsembleId> for Target {
    fn from(ensemble: EnsembleId) -> Self {
        Target { ensemble, dims: None }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Transform {
    #[default]
    Identity,
    Scalar(f64),
    /// `target_dims × source_dims`
    Dense(Array2<f64>),
}

impl Transform {
    /// Output width for an input of `source_dims`, or a mismatch error.
    fn output_dims(&self, source_dims: usize, target_dims: usize) -> NefResult<usize> {
        match self {
            Transform::Identity | Transform::Scalar(_) => {
                if source_dims != target_dims {
                    return Err(NefError::DimensionMismatch(format!(
                        "source has {} dimensions but target has {}; use a dense transform",
                        source_dims, target_dims
                    )));
                }
                Ok(target_dims)
            }
            Transform::Dense(m) => {
                if m.ncols() != source_dims || m.nrows() != target_dims {
                    return Err(NefError::DimensionMismatch(format!(
                        "transform is {}x{}, expected {}x{}",
                        m.nrows(),
                        m.ncols(),
                        target_dims,
                        source_dims
                    )));
                }
                Ok(target_dims)
            }
        }
    }

    pub(crate) fn apply(&self, x: &[f64], out: &mut [f64]) {
        match self {
            Transform::Identity => out.copy_from_slice(x),
            Transform::Scalar(s) => {
                for (o, v) in out.iter_mut().zip(x) {
                    *o = s * v;
                }
            }
            Transform::Dense(m) => {
                let mut out = ArrayViewMut1::from(out);
                general_mat_vec_mul(1.0, m, &ArrayView1::from(x), 0.0, &mut out);
            }
        }
    }
}

pub type DecodedFn = Arc<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;

/// A function decoded from an ensemble's activity.
#[derive(Clone)]
pub struct Function {
    pub output_dims: usize,
    pub f: DecodedFn,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("output_dims", &self.output_dims).finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct Connection {
    pub source: Source,
    pub target: Target,
    pub function: Option<Function>,
    pub transform: Transform,
    pub synapse: Synapse,
}

impl Connection {
    pub fn new(source: impl Into<Source>, target: impl Into<Target>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            function: None,
            transform: Transform::Identity,
            synapse: Synapse::default(),
        }
    }

    pub fn with_function<F>(mut self, output_dims: usize, f: F) -> Self
    where
        F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        self.function = Some(Function { output_dims, f: Arc::new(f) });
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_synapse(mut self, synapse: Synapse) -> Self {
        self.synapse = synapse;
        self
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub label: String,
    pub signal: PiecewiseSignal,
}

#[derive(Clone, Debug)]
pub struct Probe {
    pub label: String,
    pub source: Source,
    pub synapse: Synapse,
}

#[derive(Clone, Debug)]
pub struct Network {
    id: u32,
    pub label: String,
    pub seed: Option<u64>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) ensembles: Vec<Ensemble>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) probes: Vec<Probe>,
}

impl Network {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: NEXT_NETWORK.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
            seed: None,
            nodes: Vec::new(),
            ensembles: Vec::new(),
            connections: Vec::new(),
            probes: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn add_node(&mut self, label: impl Into<String>, signal: PiecewiseSignal) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(Node { label: label.into(), signal });
        NodeId { net: self.id, index }
    }

    pub fn add_ensemble(&mut self, ensemble: Ensemble) -> NefResult<EnsembleId> {
        ensemble.validate()?;
        let index = self.ensembles.len();
        debug!(
            label = %ensemble.label,
            neurons = ensemble.n_neurons,
            dims = ensemble.dimensions,
            "declared ensemble"
        );
        self.ensembles.push(ensemble);
        Ok(EnsembleId { net: self.id, index })
    }

    pub fn connect(&mut self, connection: Connection) -> NefResult<()> {
        let source_dims = match (&connection.source, &connection.function) {
            (Source::Node(_), Some(_)) => {
                return Err(NefError::InvalidParameter(
                    "functions can only be decoded from ensembles".into(),
                ))
            }
            (Source::Node(id), None) => self.node(*id)?.signal.dimensions(),
            (Source::Ensemble(id), None) => self.ensemble(*id)?.dimensions,
            (Source::Ensemble(id), Some(func)) => {
                self.ensemble(*id)?;
                if func.output_dims == 0 {
                    return Err(NefError::DimensionMismatch(
                        "function must return at least one value".into(),
                    ));
                }
                func.output_dims
            }
        };

        let target_ens = self.ensemble(connection.target.ensemble)?;
        let target_dims = match &connection.target.dims {
            None => target_ens.dimensions,
            Some(dims) => {
                if dims.is_empty() {
                    return Err(NefError::DimensionMismatch("empty target slice".into()));
                }
                if let Some(&bad) = dims.iter().find(|&&d| d >= target_ens.dimensions) {
                    return Err(NefError::DimensionMismatch(format!(
                        "dimension {} out of range for ensemble '{}' ({} dims)",
                        bad, target_ens.label, target_ens.dimensions
                    )));
                }
                dims.len()
            }
        };

        connection.transform.output_dims(source_dims, target_dims)?;
        connection.synapse.validate()?;

        self.connections.push(connection);
        Ok(())
    }

    /// Record a node's output or an ensemble's decoded value.
    pub fn probe(&mut self, source: impl Into<Source>, synapse: Synapse) -> NefResult<ProbeId> {
        let source = source.into();
        let label = match source {
            Source::Node(id) => self.node(id)?.label.clone(),
            Source::Ensemble(id) => self.ensemble(id)?.label.clone(),
        };
        synapse.validate()?;
        let index = self.probes.len();
        self.probes.push(Probe { label, source, synapse });
        Ok(ProbeId { net: self.id, index })
    }

    pub fn node(&self, id: NodeId) -> NefResult<&Node> {
        if id.net != self.id {
            return Err(NefError::UnknownHandle { kind: "node", index: id.index });
        }
        self.nodes.get(id.index).ok_or(NefError::UnknownHandle { kind: "node", index: id.index })
    }

    pub fn ensemble(&self, id: EnsembleId) -> NefResult<&Ensemble> {
        if id.net != self.id {
            return Err(NefError::UnknownHandle { kind: "ensemble", index: id.index });
        }
        self.ensembles
            .get(id.index)
            .ok_or(NefError::UnknownHandle { kind: "ensemble", index: id.index })
    }

    pub fn probe_info(&self, id: ProbeId) -> NefResult<&Probe> {
        if id.net != self.id {
            return Err(NefError::UnknownHandle { kind: "probe", index: id.index });
        }
        self.probes.get(id.index).ok_or(NefError::UnknownHandle { kind: "probe", index: id.index })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn ensembles(&self) -> &[Ensemble] {
        &self.ensembles
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub(crate) fn probe_id(&self, index: usize) -> ProbeId {
        ProbeId { net: self.id, index }
    }

    /// Output width of a source as seen by a probe.
    pub(crate) fn source_dims(&self, source: Source) -> usize {
        match source {
            Source::Node(id) => self.nodes[id.index].signal.dimensions(),
            Source::Ensemble(id) => self.ensembles[id.index].dimensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn scalar_node(net: &mut Network) -> NodeId {
        net.add_node("u", PiecewiseSignal::scalar(&[(0.0, 1.0)]).unwrap())
    }

    #[test]
    fn builds_controlled_integrator_shape() {
        let mut net = Network::new("net");
        let u = scalar_node(&mut net);
        let c = scalar_node(&mut net);
        let a = net.add_ensemble(Ensemble::new("A", 20, 2).with_radius(1.5)).unwrap();

        net.connect(
            Connection::new(u, a)
                .with_transform(Transform::Dense(arr2(&[[0.1], [0.0]])))
                .with_synapse(Synapse::lowpass(0.1)),
        )
        .unwrap();
        net.connect(Connection::new(c, a.dim(1)).with_synapse(Synapse::lowpass(0.005))).unwrap();
        net.connect(
            Connection::new(a, a.dim(0))
                .with_function(1, |x| vec![x[0] * x[1] + x[0]])
                .with_synapse(Synapse::lowpass(0.1)),
        )
        .unwrap();
        let p = net.probe(a, Synapse::lowpass(0.01)).unwrap();

        assert_eq!(net.connections().len(), 3);
        assert_eq!(net.probe_info(p).unwrap().label, "A");
    }

    #[test]
    fn rejects_shape_mismatches() {
        let mut net = Network::new("net");
        let u = scalar_node(&mut net);
        let a = net.add_ensemble(Ensemble::new("A", 20, 2)).unwrap();

        // 1-d node into a 2-d ensemble needs a dense transform
        assert!(matches!(net.connect(Connection::new(u, a)), Err(NefError::DimensionMismatch(_))));
        // wrong dense shape
        let bad = Connection::new(u, a).with_transform(Transform::Dense(arr2(&[[1.0, 0.0]])));
        assert!(matches!(net.connect(bad), Err(NefError::DimensionMismatch(_))));
        // slice out of range
        assert!(matches!(
            net.connect(Connection::new(u, a.dim(2))),
            Err(NefError::DimensionMismatch(_))
        ));
        // function width must match target slice
        let f = Connection::new(a, a.dim(0)).with_function(2, |x| x.to_vec());
        assert!(matches!(net.connect(f), Err(NefError::DimensionMismatch(_))));
        assert!(net.connections().is_empty());
    }

    #[test]
    fn rejects_functions_on_nodes_and_bad_synapses() {
        let mut net = Network::new("net");
        let u = scalar_node(&mut net);
        let a = net.add_ensemble(Ensemble::new("A", 20, 1)).unwrap();
        let f = Connection::new(u, a).with_function(1, |x| x.to_vec());
        assert!(matches!(net.connect(f), Err(NefError::InvalidParameter(_))));
        let s = Connection::new(u, a).with_synapse(Synapse::lowpass(0.0));
        assert!(matches!(net.connect(s), Err(NefError::InvalidParameter(_))));
        assert!(net.probe(a, Synapse::lowpass(-1.0)).is_err());
    }

    #[test]
    fn rejects_foreign_handles() {
        let mut other = Network::new("other");
        let foreign_node = scalar_node(&mut other);
        let foreign_ens = other.add_ensemble(Ensemble::new("B", 10, 1)).unwrap();

        let mut net = Network::new("net");
        let a = net.add_ensemble(Ensemble::new("A", 10, 1)).unwrap();

        assert_eq!(
            net.connect(Connection::new(foreign_node, a)),
            Err(NefError::UnknownHandle { kind: "node", index: 0 })
        );
        assert!(matches!(
            net.connect(Connection::new(a, foreign_ens)),
            Err(NefError::UnknownHandle { kind: "ensemble", .. })
        ));
        assert!(net.probe(foreign_ens, Synapse::None).is_err());
    }

    #[test]
    fn invalid_ensemble_rejected_at_declaration() {
        let mut net = Network::new("net");
        assert!(net.add_ensemble(Ensemble::new("A", 10, 1).with_radius(-1.0)).is_err());
        assert!(net.ensembles().is_empty());
    }

    #[test]
    fn dimension_slices() {
        let mut net = Network::new("net");
        let a = net.add_ensemble(Ensemble::new("A", 20, 3)).unwrap();
        let v = net.add_node("v", PiecewiseSignal::new(2, vec![(0.0, vec![1.0, 2.0])]).unwrap());

        assert_eq!(a.dims(&[0, 2]).dims, Some(vec![0, 2]));
        net.connect(Connection::new(v, a.dims(&[0, 2]))).unwrap();
        assert!(matches!(
            net.connect(Connection::new(v, a.dims(&[1, 3]))),
            Err(NefError::DimensionMismatch(_))
        ));
        assert_eq!(net.connections().len(), 1);
    }

    #[test]
    fn transform_apply() {
        let mut out = [0.0; 2];
        Transform::Dense(arr2(&[[0.1], [0.0]])).apply(&[5.0], &mut out);
        assert_eq!(out, [0.5, 0.0]);
        Transform::Scalar(-2.0).apply(&[1.0, 3.0], &mut out);
        assert_eq!(out, [-2.0, -6.0]);
        Transform::Identity.apply(&[4.0, 2.0], &mut out);
        assert_eq!(out, [4.0, 2.0]);
        Transform::Dense(arr2(&[[1.0, 2.0], [0.0, -1.0]])).apply(&[3.0, 0.5], &mut out);
        assert_eq!(out, [4.0, -0.5]);
    }
}
