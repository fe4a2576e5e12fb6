use nef_core::NeuronKind;
use nef_integrator::{Comparison, ControlledIntegrator, Drift, IntegratorConfig, Regime};

fn config(neuron: NeuronKind, seed: u64) -> IntegratorConfig {
    let mut config = IntegratorConfig::default();
    config.ensemble.neuron = neuron;
    config.simulation.seed = Some(seed);
    config
}

fn run(config: &IntegratorConfig) -> Comparison {
    let run = ControlledIntegrator::declare(config).unwrap().run().unwrap();
    Comparison::from_run(&run).unwrap()
}

#[test]
fn trace_covers_the_whole_run() {
    let c = run(&config(NeuronKind::LifRate, 7));
    assert_eq!(c.len(), 1400);
    assert!((c.times[0] - 0.001).abs() < 1e-12);
    assert!((c.times[1399] - 1.4).abs() < 1e-9);
    assert_eq!(c.reference.len(), c.decoded.len());
    assert!((c.reference_at(0.3).unwrap() - 0.5).abs() < 0.01);
    assert!((c.reference_at(0.6).unwrap() + 0.5).abs() < 0.01);
}

#[test]
fn tracks_reference_while_control_is_zero() {
    for seed in [1, 2, 3] {
        let c = run(&config(NeuronKind::LifRate, seed));
        let mae = c.mean_abs_error(0.0, 0.6).unwrap();
        let max = c.max_abs_error(0.0, 0.6).unwrap();
        assert!(mae < 0.1, "seed {}: mae {}", seed, mae);
        assert!(max < 0.3, "seed {}: max {}", seed, max);
        assert!(c.decoded_at(0.3).unwrap() > 0.25, "seed {}", seed);
        assert!(c.decoded_at(0.54).unwrap() < -0.25, "seed {}", seed);
    }
}

#[test]
fn negative_control_makes_the_state_leak() {
    for seed in [1, 2, 3] {
        let c = run(&config(NeuronKind::LifRate, seed));

        // Before the second pulse the state has moved well toward zero
        let x = c.decoded_at(0.79).unwrap();
        let r = c.reference_at(0.79).unwrap();
        assert!(x.abs() < 0.6 * r.abs(), "seed {}: x {} ref {}", seed, x, r);

        // The pulse still integrates, and lands above the reference
        let after = c.decoded_at(0.9).unwrap();
        assert!(after - c.decoded_at(0.8).unwrap() > 0.2, "seed {}", seed);
        assert!(after > c.reference_at(0.9).unwrap() + 0.1, "seed {}", seed);

        // Then decays back toward zero
        assert!(c.decoded_at(1.4).unwrap().abs() < 0.15, "seed {}", seed);

        let windows = c.quiet_windows();
        assert_eq!(windows.len(), 2, "seed {}: {:?}", seed, windows);
        for w in &windows {
            assert_eq!(w.regime, Regime::Leak);
            assert!(w.magnitude_ratio() < 0.8, "seed {}: {:?}", seed, w);
        }
    }
}

#[test]
fn decoded_control_follows_schedule() {
    let c = run(&config(NeuronKind::LifRate, 4));
    let at = |t: f64| c.decoded_control[c.index_at(t).unwrap()];
    assert!(at(0.3).abs() < 0.15);
    assert!((at(1.0) + 0.5).abs() < 0.15);
}

#[test]
fn regimes_follow_control_schedule() {
    let c = run(&config(NeuronKind::LifRate, 5));
    let spans = c.regime_spans();
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].regime, Regime::Integrate);
    assert_eq!(spans[1].regime, Regime::Leak);
    assert!((spans[1].start - 0.6).abs() < 0.0015);
}

#[test]
fn without_control_the_value_is_held() {
    let controlled = run(&config(NeuronKind::LifRate, 6));

    let mut held = config(NeuronKind::LifRate, 6);
    held.schedule.control = vec![(0.0, 0.0)];
    let held = run(&held);

    let c = controlled.decoded_at(0.79).unwrap().abs();
    let h = held.decoded_at(0.79).unwrap().abs();
    assert!(c + 0.05 < h, "controlled {} held {}", c, h);
    assert!(held.regime_spans().iter().all(|s| s.regime == Regime::Integrate));
    assert!(held.summary().quiet_window.is_none());
}

#[test]
fn summary_reports_decay() {
    let c = run(&config(NeuronKind::LifRate, 8));
    let s = c.summary();
    assert!((s.final_time - 1.4).abs() < 1e-9);
    assert!(s.final_reference.abs() < 1e-9);
    assert!(s.integrate_mae.unwrap() < 0.1);
    let w = s.quiet_window.unwrap();
    assert!((w.start - 0.9).abs() < 0.0015);
    assert_eq!(s.drift(), Some(Drift::TowardZero));
}

#[test]
fn spiking_neurons_integrate_and_leak() {
    for seed in [11, 12] {
        let c = run(&config(NeuronKind::Lif, seed));
        assert!(c.mean_abs_error(0.0, 0.6).unwrap() < 0.2, "seed {}", seed);
        assert!(c.decoded_at(0.3).unwrap() > 0.15, "seed {}", seed);
        assert!(c.decoded_at(0.54).unwrap() < -0.15, "seed {}", seed);
        assert!(c.decoded_at(1.4).unwrap().abs() < 0.3, "seed {}", seed);
        assert_eq!(c.summary().drift(), Some(Drift::TowardZero), "seed {}", seed);
    }
}

#[test]
fn same_seed_same_trace() {
    let cfg = config(NeuronKind::Lif, 21);
    let a = ControlledIntegrator::declare(&cfg).unwrap().run().unwrap();
    let b = ControlledIntegrator::declare(&cfg).unwrap().run().unwrap();
    assert_eq!(a.trace, b.trace);
}

#[test]
fn stepping_matches_batch_run() {
    let mut cfg = config(NeuronKind::LifRate, 3);
    cfg.simulation.duration = 0.4;
    let batch = ControlledIntegrator::declare(&cfg).unwrap().run().unwrap();

    let mut sim = ControlledIntegrator::declare(&cfg).unwrap().build().unwrap();
    let mut last = None;
    while let Some(sample) = sim.step().unwrap() {
        last = Some(sample);
    }
    let last = last.unwrap();
    let stepped = sim.finish();
    assert_eq!(stepped.trace, batch.trace);

    let state = batch.trace.probe(batch.probes.state).unwrap().last().unwrap();
    assert_eq!(last.decoded, state[0]);
    assert_eq!(last.input, 0.0);
}

#[test]
fn different_seeds_agree_on_outcome() {
    let summaries: Vec<_> = [31, 32, 33]
        .iter()
        .map(|&s| run(&config(NeuronKind::LifRate, s)).summary())
        .collect();
    for s in &summaries {
        assert_eq!(s.drift(), Some(Drift::TowardZero));
    }
    let finals: Vec<f64> = summaries.iter().map(|s| s.final_decoded).collect();
    let max = finals.iter().cloned().fold(f64::MIN, f64::max);
    let min = finals.iter().cloned().fold(f64::MAX, f64::min);
    let spread = max - min;
    assert!(spread < 0.15, "final values {:?}", finals);
}
