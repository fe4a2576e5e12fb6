//! Recorded probe data of a run.

use std::collections::BTreeMap;

use crate::network::ProbeId;

/// Samples of one probe, one row of `dims` values per step.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeData {
    pub label: String,
    dims: usize,
    data: Vec<f64>,
}

impl ProbeData {
    pub(crate) fn new(label: String, dims: usize, capacity: usize) -> Self {
        Self { label, dims, data: Vec::with_capacity(dims * capacity) }
    }

    pub(crate) fn push(&mut self, sample: &[f64]) {
        debug_assert_eq!(sample.len(), self.dims);
        self.data.extend_from_slice(sample);
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sample(&self, step: usize) -> Option<&[f64]> {
        let start = step * self.dims;
        self.data.get(start..start + self.dims)
    }

    pub fn last(&self) -> Option<&[f64]> {
        self.len().checked_sub(1).and_then(|i| self.sample(i))
    }

    pub fn samples(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.dims)
    }

    /// One component across all steps.
    pub fn component(&self, d: usize) -> Vec<f64> {
        assert!(d < self.dims, "component {} out of range ({} dims)", d, self.dims);
        self.samples().map(|s| s[d]).collect()
    }
}

/// Time grid plus per-probe samples.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationTrace {
    dt: f64,
    times: Vec<f64>,
    probes: BTreeMap<ProbeId, ProbeData>,
}

impl SimulationTrace {
    pub(crate) fn new(dt: f64, probes: BTreeMap<ProbeId, ProbeData>) -> Self {
        Self { dt, times: Vec::new(), probes }
    }

    pub(crate) fn push_time(&mut self, t: f64) {
        self.times.push(t);
    }

    pub(crate) fn probe_mut(&mut self, id: &ProbeId) -> Option<&mut ProbeData> {
        self.probes.get_mut(id)
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn probe(&self, id: ProbeId) -> Option<&ProbeData> {
        self.probes.get(&id)
    }

    pub fn probes(&self) -> impl Iterator<Item = (&ProbeId, &ProbeData)> {
        self.probes.iter()
    }
}
