// Application state: chart series accumulated from backend samples.

use anyhow::Result;
use nef_integrator::{Regime, Sample};

use crate::backend::IntegratorBackend;

pub struct App<B: IntegratorBackend> {
    pub backend: B,
    pub steps_per_tick: usize,
    pub running: bool,
    pub finished: bool,
    pub last: Option<Sample>,
    /// `dt · Σ input` over the steps seen so far
    pub integral: f64,
    pub input: Vec<(f64, f64)>,
    pub control: Vec<(f64, f64)>,
    pub reference: Vec<(f64, f64)>,
    pub decoded: Vec<(f64, f64)>,
    pub decoded_control: Vec<(f64, f64)>,
}

impl<B: IntegratorBackend> App<B> {
    pub fn new(backend: B, steps_per_tick: usize) -> Self {
        let capacity = (backend.duration() / backend.dt()).round() as usize;
        Self {
            backend,
            steps_per_tick: steps_per_tick.max(1),
            running: false,
            finished: false,
            last: None,
            integral: 0.0,
            input: Vec::with_capacity(capacity),
            control: Vec::with_capacity(capacity),
            reference: Vec::with_capacity(capacity),
            decoded: Vec::with_capacity(capacity),
            decoded_control: Vec::with_capacity(capacity),
        }
    }

    pub fn toggle_running(&mut self) {
        self.running = !self.running && !self.finished;
    }

    /// Advance `steps_per_tick` simulation steps, stopping at the end of the run.
    pub fn step(&mut self) -> Result<()> {
        for _ in 0..self.steps_per_tick {
            match self.backend.step()? {
                Some(sample) => self.record(sample),
                None => {
                    self.finished = true;
                    self.running = false;
                    break;
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, s: Sample) {
        self.integral += self.backend.dt() * s.input;
        self.input.push((s.time, s.input));
        self.control.push((s.time, s.control));
        self.reference.push((s.time, self.integral));
        self.decoded.push((s.time, s.decoded));
        self.decoded_control.push((s.time, s.decoded_control));
        self.last = Some(s);
    }

    pub fn time(&self) -> f64 {
        self.last.map_or(0.0, |s| s.time)
    }

    pub fn regime(&self) -> Regime {
        Regime::of(self.last.map_or(0.0, |s| s.control))
    }

    /// Y bounds covering the input and control series seen so far.
    pub fn signal_bounds(&self) -> [f64; 2] {
        let (lo, hi) = self
            .input
            .iter()
            .chain(&self.control)
            .fold((-1.0_f64, 1.0_f64), |(lo, hi), &(_, v)| (lo.min(v), hi.max(v)));
        [lo * 1.1, hi * 1.1]
    }
}
