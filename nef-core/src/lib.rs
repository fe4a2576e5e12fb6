//! nef-core: small NEF-style simulator for populations of LIF neurons
//!
//! A network is declared once (nodes, ensembles, connections, probes),
//! handed to a [`Simulator`] by value, stepped at a fixed `dt`, and read
//! back as a [`SimulationTrace`].

pub mod ensemble;
pub mod error;
pub mod network;
pub mod neuron;
pub mod signal;
pub mod simulator;
pub mod solver;
pub mod synapse;
pub mod trace;

// Re-exports
pub use ensemble::Ensemble;
pub use error::{NefError, NefResult};
pub use network::{Connection, EnsembleId, Network, NodeId, ProbeId, Source, Target, Transform};
pub use neuron::{LifParams, NeuronKind};
pub use signal::PiecewiseSignal;
pub use simulator::{simulate, Simulator};
pub use solver::LstsqL2;
pub use synapse::Synapse;
pub use trace::{ProbeData, SimulationTrace};
