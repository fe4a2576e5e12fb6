//! TUI entrypoint: plots the controlled integrator as it runs.
//! Controls: [s] Step, [r] Run/Pause, [q] Quit
//!
//! With `--headless` the whole run is simulated at once and a table plus a
//! summary is printed to stdout instead.

mod app;
mod backend;
mod ui;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use app::App;
use backend::{CoreBackend, IntegratorBackend};
use clap::Parser;
use crossterm::{
    event::{self, Event as CEvent, KeyCode},
    execute, terminal,
};
use nef_integrator::{load_config, Comparison, ControlledIntegrator, IntegratorConfig};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::EnvFilter;
use ui::draw;

/// Controlled neural integrator viewer
#[derive(Parser, Debug)]
#[command(name = "nef-tui", version, long_about = None)]
struct Args {
    /// TOML scenario file (falls back to $NEF_INTEGRATOR_CONFIG, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run to completion and print results instead of opening the TUI
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Simulation steps advanced per UI tick
    #[arg(long, default_value_t = 10)]
    steps_per_tick: usize,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Log to `--log-file` if given, otherwise to stderr in headless mode.
/// The TUI owns the terminal, so without a log file it stays silent.
fn init_logging(args: &Args) -> Result<()> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("creating log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else if args.headless {
        tracing_subscriber::fmt().with_env_filter(filter()).with_writer(io::stderr).init();
    }
    Ok(())
}

fn run_headless(config: &IntegratorConfig) -> Result<()> {
    let run = ControlledIntegrator::declare(config)?.run()?;
    let cmp = Comparison::from_run(&run)?;

    println!(
        "{:>7} {:>8} {:>8} {:>10} {:>9} {:>9}",
        "t", "input", "control", "reference", "decoded", "x[1]"
    );
    let every = ((0.05 / cmp.dt).round() as usize).max(1);
    for i in (every - 1..cmp.len()).step_by(every) {
        println!(
            "{:>7.3} {:>8.2} {:>8.2} {:>10.4} {:>9.4} {:>9.4}",
            cmp.times[i],
            cmp.input[i],
            cmp.control[i],
            cmp.reference[i],
            cmp.decoded[i],
            cmp.decoded_control[i]
        );
    }

    println!();
    for span in cmp.regime_spans() {
        println!("{:?}: {:.3}s .. {:.3}s", span.regime, span.start, span.end);
    }

    let summary = cmp.summary();
    println!();
    println!("final t:          {:.3}s", summary.final_time);
    println!("final decoded:    {:+.4}", summary.final_decoded);
    println!("final reference:  {:+.4}", summary.final_reference);
    if let Some(mae) = summary.integrate_mae {
        println!("integrate MAE:    {:.4}", mae);
    }
    if let Some(w) = summary.quiet_window {
        println!(
            "quiet {:?} window {:.3}s .. {:.3}s: {:+.4} -> {:+.4} ({:?})",
            w.regime,
            w.start,
            w.end,
            w.decoded_start,
            w.decoded_end,
            w.drift()
        );
    }
    Ok(())
}

fn restore_terminal() -> Result<()> {
    terminal::disable_raw_mode()?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen)?;
    Ok(())
}

fn event_loop<B: IntegratorBackend>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<B>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();

    loop {
        draw(terminal, app)?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::from_millis(0));

        if event::poll(timeout)? {
            if let CEvent::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Char('s') => app.step()?,
                    KeyCode::Char('r') => app.toggle_running(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            if app.running {
                app.step()?;
            }
            last_tick = Instant::now();
        }
    }
}

fn run_tui(config: &IntegratorConfig, steps_per_tick: usize) -> Result<()> {
    // Build before touching the terminal so errors print normally
    let sim = ControlledIntegrator::declare(config)?.build()?;
    let mut app = App::new(CoreBackend::new(sim), steps_per_tick);

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;

    // Ensure terminal is restored on panic
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        default_hook(panic_info);
    }));

    let result = event_loop(&mut terminal, &mut app);

    restore_terminal()?;
    info!(time = app.time(), "viewer closed");
    result
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = load_config(args.config.as_deref())?;
    info!(headless = args.headless, seed = ?config.simulation.seed, "starting");

    if args.headless {
        run_headless(&config)
    } else {
        run_tui(&config, args.steps_per_tick)
    }
}
