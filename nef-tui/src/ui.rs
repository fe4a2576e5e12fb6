// TUI rendering: input chart, state chart (reference vs decoded) and a status panel.

use std::io::Stdout;

use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Terminal,
};

use crate::app::App;
use crate::backend::IntegratorBackend;

fn series<'a>(name: &'a str, color: Color, data: &'a [(f64, f64)]) -> Dataset<'a> {
    Dataset::default()
        .name(name)
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(data)
}

fn labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]].iter().map(|v| Span::raw(format!("{:.2}", v))).collect()
}

/// Draws the UI each frame:
/// - Top: input and control schedules against time.
/// - Middle: reference integral, decoded value and decoded control.
/// - Bottom: time, regime, latest values, run state, controls.
pub fn draw<B: IntegratorBackend>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &App<B>,
) -> anyhow::Result<()> {
    terminal.draw(|f| {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints(
                [
                    Constraint::Percentage(30),
                    Constraint::Percentage(55),
                    Constraint::Percentage(15),
                ]
                .as_ref(),
            )
            .split(f.size());

        let x_bounds = [0.0, app.backend.duration()];

        let signal_bounds = app.signal_bounds();
        let signals = Chart::new(vec![
            series("input", Color::Yellow, &app.input),
            series("control", Color::Magenta, &app.control),
        ])
        .block(Block::default().title("Input / control").borders(Borders::ALL))
        .x_axis(Axis::default().title("t (s)").bounds(x_bounds).labels(labels(x_bounds)))
        .y_axis(Axis::default().bounds(signal_bounds).labels(labels(signal_bounds)));
        f.render_widget(signals, chunks[0]);

        let state_bounds = [-1.6, 1.6];
        let state = Chart::new(vec![
            series("reference", Color::Gray, &app.reference),
            series("decoded", Color::Cyan, &app.decoded),
            series("decoded control", Color::Green, &app.decoded_control),
        ])
        .block(Block::default().title("Integrator state").borders(Borders::ALL))
        .x_axis(Axis::default().title("t (s)").bounds(x_bounds).labels(labels(x_bounds)))
        .y_axis(Axis::default().bounds(state_bounds).labels(labels(state_bounds)));
        f.render_widget(state, chunks[1]);

        let (decoded, reference) = match app.last {
            Some(s) => (s.decoded, app.integral),
            None => (0.0, 0.0),
        };
        let status = format!(
            "t: {:.3}s | Regime: {:?} | x: {:+.3} ref: {:+.3} | Neurons: {} | {} | {}",
            app.time(),
            app.regime(),
            decoded,
            reference,
            app.backend.neurons(),
            if app.finished {
                "finished"
            } else if app.running {
                "running"
            } else {
                "paused"
            },
            "Controls: [s] Step  [r] Run/Pause  [q] Quit"
        );
        let status_widget = Paragraph::new(status)
            .style(Style::default().fg(Color::Cyan))
            .block(Block::default().title("Status").borders(Borders::ALL));
        f.render_widget(status_widget, chunks[2]);
    })?;
    Ok(())
}
