use crate::animation::{AnimationLoop, FrameScheduler, SpeedInput, SpeedSlider, TickOutcome, SPEED_MAX};
use crate::body::{BodySpec, System};
use crate::canvas::BrailleCanvas;
use crate::config::{load_settings, load_system_spec, project_paths, Settings};
use crate::logging::init_logging;
use crate::render::Renderer;
use crate::term::{bar, canvas_cells, canvas_to_cells, draw_text, Terminal};
use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    style::Color,
};
use std::{
    cell::Cell,
    path::PathBuf,
    rc::Rc,
    time::{Duration, Instant},
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Nested orbits, animated in braille")]
pub(crate) struct Args {
    /// JSON body tree to show instead of the built-in solar system
    #[arg(long)]
    system: Option<PathBuf>,

    /// initial speed slider value (0 = paused)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=SPEED_MAX as i64))]
    speed: Option<u32>,

    /// frame rate cap
    #[arg(long)]
    fps: Option<u32>,

    /// print the active body tree as JSON and exit
    #[arg(long)]
    dump_system: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Nudge(i64),
    Set(u32),
    Quit,
}

pub(crate) fn map_key(k: KeyEvent) -> Option<Action> {
    if k.kind == KeyEventKind::Release {
        return None;
    }
    if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }
    match k.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Left => Some(Action::Nudge(-1)),
        KeyCode::Right => Some(Action::Nudge(1)),
        KeyCode::Down => Some(Action::Nudge(-10)),
        KeyCode::Up => Some(Action::Nudge(10)),
        KeyCode::PageDown => Some(Action::Nudge(-100)),
        KeyCode::PageUp => Some(Action::Nudge(100)),
        KeyCode::Home => Some(Action::Set(0)),
        KeyCode::End => Some(Action::Set(SPEED_MAX)),
        _ => None,
    }
}

/// Set once; the frame clock stops handing out frames afterwards.
#[derive(Clone, Default)]
pub(crate) struct Teardown(Rc<Cell<bool>>);

impl Teardown {
    pub(crate) fn signal(&self) {
        self.0.set(true);
    }

    pub(crate) fn is_signalled(&self) -> bool {
        self.0.get()
    }
}

/// Frame-capped monotonic clock in milliseconds.
pub(crate) struct FrameClock {
    start: Instant,
    frame_dt: Duration,
    last: Option<Instant>,
    teardown: Teardown,
}

impl FrameClock {
    pub(crate) fn new(fps: u32, teardown: Teardown) -> Self {
        Self {
            start: Instant::now(),
            frame_dt: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            last: None,
            teardown,
        }
    }
}

impl FrameScheduler for FrameClock {
    fn next_frame(&mut self) -> Option<f64> {
        if self.teardown.is_signalled() {
            return None;
        }
        if let Some(last) = self.last {
            spin_sleep(self.frame_dt, last);
        }
        let now = Instant::now();
        self.last = Some(now);
        Some(now.saturating_duration_since(self.start).as_secs_f64() * 1000.0)
    }
}

pub(crate) fn status_line(slider: &SpeedSlider, scale: f64, outcome: TickOutcome) -> String {
    let raw = slider.raw_value();
    let state = match outcome {
        TickOutcome::Drew if raw > 0 => "running",
        _ => "paused",
    };
    format!(
        " speed {} {:>3}/{}  x{:<9.1} scale {:.3}  {:<7}  ←/→ ±1  ↓/↑ ±10  q quit",
        bar(raw as f64 / SPEED_MAX as f64, 12),
        raw,
        SPEED_MAX,
        slider.speed_factor(),
        scale,
        state
    )
}

pub(crate) struct App {
    settings: Settings,
    system: System,
    renderer: Renderer,
    canvas: BrailleCanvas,
    slider: SpeedSlider,
    animation: AnimationLoop,
    term: Terminal,
}

impl App {
    fn init(settings: Settings, system: System) -> Result<Self> {
        let term = Terminal::begin().context("terminal unavailable")?;
        let (cw, ch) = canvas_cells(term.cols, term.rows);
        info!(cols = term.cols, rows = term.rows, bodies = system.len(), "terminal ready");
        Ok(Self {
            renderer: Renderer::new(settings.orbit_overlay_alpha),
            canvas: BrailleCanvas::for_cells(cw, ch),
            slider: SpeedSlider::new(settings.speed()),
            animation: AnimationLoop::default(),
            settings,
            system,
            term,
        })
    }

    fn run(&mut self) -> Result<u64> {
        let teardown = Teardown::default();
        let mut clock = FrameClock::new(self.settings.fps(), teardown.clone());
        let enable_color = self.settings.enable_color;
        let term = &mut self.term;

        self.animation.run(
            &mut clock,
            &mut self.slider,
            &mut self.system,
            &mut self.renderer,
            &mut self.canvas,
            |outcome, slider, system, renderer, canvas| {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(k) => match map_key(k) {
                            Some(Action::Nudge(d)) => slider.nudge(d),
                            Some(Action::Set(v)) => slider.set(v),
                            Some(Action::Quit) => teardown.signal(),
                            None => {}
                        },
                        Event::Resize(cols, rows) => {
                            term.resize(cols, rows);
                            let (cw, ch) = canvas_cells(cols, rows);
                            renderer.resize(system, canvas, cw as f64 * 2.0, ch as f64 * 4.0);
                        }
                        _ => {}
                    }
                }

                term.cur.clear();
                canvas_to_cells(canvas, &mut term.cur, enable_color);
                let status = status_line(slider, renderer.scale(), outcome);
                draw_text(&mut term.cur, 0, term.rows.saturating_sub(1), &status, Color::Grey);
                term.present()
            },
        )
    }
}

pub(crate) fn run() -> Result<()> {
    let args = Args::parse();

    let paths = project_paths()?;
    let mut settings = load_settings(&paths.settings_path);
    if let Some(speed) = args.speed {
        settings.initial_speed = speed;
    }
    if let Some(fps) = args.fps {
        settings.fps_cap = fps;
    }
    if !init_logging(&paths.log_path, &settings.log_level) {
        eprintln!("warning: could not open log file {}", paths.log_path.display());
    }

    let spec = match &args.system {
        Some(path) => load_system_spec(path)?,
        None => crate::body::default_solar_spec(),
    };

    let system = System::from_spec(&spec);
    info!(root = %spec.name, bodies = system.len(), "system built");

    if args.dump_system {
        println!("{}", dump_spec(&system.to_spec())?);
        return Ok(());
    }

    let mut app = App::init(settings, system)?;
    let res = app.run();
    let end = app.term.end();
    match &res {
        Ok(ticks) => info!(ticks, "shut down"),
        Err(e) => warn!(error = %e, "run loop failed"),
    }
    res?;
    end
}

fn dump_spec(spec: &BodySpec) -> Result<String> {
    Ok(serde_json::to_string_pretty(spec)?)
}

fn spin_sleep(target: Duration, since: Instant) {
    let end = since + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
