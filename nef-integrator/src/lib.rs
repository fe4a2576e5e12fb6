//! nef-integrator: a controlled neural integrator on top of nef-core
//!
//! - [`config`]: TOML scenario (ensemble, synapses, input/control schedules)
//! - [`model`]: network declaration and a steppable simulation wrapper
//! - [`analysis`]: reference integral, regimes and run summaries
//!
//! ```no_run
//! use nef_integrator::{Comparison, ControlledIntegrator, IntegratorConfig};
//!
//! let run = ControlledIntegrator::declare(&IntegratorConfig::default())?.run()?;
//! let summary = Comparison::from_run(&run)?.summary();
//! println!("x(end) = {:.3}", summary.final_decoded);
//! # Ok::<(), nef_integrator::IntegratorError>(())
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod model;

pub use analysis::{reference_integral, Comparison, Drift, QuietWindow, Regime, RegimeSpan, Summary};
pub use config::{load_config, ConfigError, IntegratorConfig, CONFIG_ENV};
pub use error::{IntegratorError, IntegratorResult};
pub use model::{
    recurrent, ControlledIntegrator, IntegratorProbes, IntegratorRun, IntegratorSim, Sample,
};
