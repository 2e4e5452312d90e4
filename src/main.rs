mod ui;

use cardspot::{
    app_dirs::AppDirs,
    catalog::ItemSet,
    collaborators::{Collaborators, JsonLinesSink, PointerEvent, QuadrantPicking},
    config::{Config, ConfigStore, FileConfigStore},
    game::{Machine, PointerOutcome},
    history::{HistorySink, HistorySummary, ReportStore},
    layout::Slot,
    logging,
    runtime::{CrosstermEventSource, FixedTicker, Runner, SpotEvent},
    scoring::MetricsReport,
    simulate::{run_playthrough, Learner},
    stage::{SharedStage, StageAudio, StageCelebration, StageCue},
    SpotError,
};
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};

const TICK_RATE_MS: u64 = 100;

/// timed spot-the-matching-card drill for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A timed training drill: watch each card, then pick it out among one or two others across three levels. Every playthrough ends in a metrics report."
)]
pub struct Cli {
    /// item set to drill (see --list-items)
    #[clap(short = 'i', long)]
    items: Option<String>,

    /// seed for reproducible card layouts
    #[clap(long)]
    seed: Option<u64>,

    /// play headless with a scripted learner and print the report message
    #[clap(long, value_enum)]
    simulate: Option<SimulatedLearner>,

    /// append every report message as a JSON line to this file
    #[clap(long)]
    report_file: Option<PathBuf>,

    /// do not store playthroughs in the history database
    #[clap(long)]
    no_history: bool,

    /// print the playthrough history summary and exit
    #[clap(long)]
    history: bool,

    /// list the embedded item sets and exit
    #[clap(long)]
    list_items: bool,

    /// seconds between rounds
    #[clap(long)]
    settle_secs: Option<f64>,

    /// points lost per miss
    #[clap(long)]
    miss_penalty: Option<u32>,

    /// config file to use instead of the default location
    #[clap(long)]
    config: Option<PathBuf>,

    /// write the effective settings back to the config file
    #[clap(long)]
    save_config: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum, strum_macros::Display)]
pub enum SimulatedLearner {
    Perfect,
    Idle,
    Clumsy,
    Hesitant,
}

impl SimulatedLearner {
    fn as_learner(&self) -> Learner {
        match self {
            SimulatedLearner::Perfect => Learner::perfect(),
            SimulatedLearner::Idle => Learner::Idle,
            SimulatedLearner::Clumsy => Learner::clumsy(2),
            SimulatedLearner::Hesitant => Learner::hesitant(1),
        }
    }
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    /// Loaded config with command-line overrides applied
    fn effective_config(&self, store: &impl ConfigStore) -> Config {
        let mut cfg = store.load();
        if let Some(items) = &self.items {
            cfg.item_set = items.clone();
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if let Some(settle) = self.settle_secs {
            cfg.timing.settle_secs = settle;
        }
        if let Some(penalty) = self.miss_penalty {
            cfg.rules.miss_penalty = penalty;
        }
        cfg
    }

    fn report_sink(&self) -> Result<Option<JsonLinesSink<std::fs::File>>, SpotError> {
        let Some(path) = &self.report_file else {
            return Ok(None);
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Some(JsonLinesSink::new(file)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Ready,
    Playing,
    Results,
}

pub struct App {
    pub machine: Machine,
    pub stage: SharedStage,
    pub state: AppState,
    pub summary: Option<HistorySummary>,
    history: Option<ReportStore>,
}

impl App {
    pub fn new(machine: Machine, stage: SharedStage, history: Option<ReportStore>) -> Self {
        let mut app = Self {
            machine,
            stage,
            state: AppState::Ready,
            summary: None,
            history,
        };
        app.refresh_summary();
        app
    }

    pub fn last_report(&self) -> Option<&MetricsReport> {
        self.machine.last_report()
    }

    pub fn start(&mut self) {
        self.stage.borrow_mut().caption = None;
        if self.machine.start() {
            self.state = AppState::Playing;
        }
    }

    pub fn restart(&mut self) {
        self.machine.abort();
        self.start();
    }

    pub fn advance(&mut self, dt: Duration) {
        self.machine.advance(dt);
        self.stage.borrow_mut().confetti.update(dt.as_secs_f64());
        self.sync_state();
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.stage.borrow_mut().resize(width, height);
        let area = ui::stage_area(width, height);
        self.machine.resize(area.width as u32, area.height as u32);
    }

    /// Mouse click at a terminal cell. Cells off the stage land outside
    /// the -1..1 square and count as empty space.
    pub fn click(&mut self, column: u16, row: u16) -> PointerOutcome {
        let (width, height) = self.stage.borrow().size();
        let area = ui::stage_area(width, height);
        let w = area.width.max(1) as f64;
        let h = area.height.max(1) as f64;
        let x = (column as f64 - area.x as f64 + 0.5) / w * 2.0 - 1.0;
        let y = -((row as f64 - area.y as f64 + 0.5) / h * 2.0 - 1.0);
        self.pointer(PointerEvent::new(x, y))
    }

    /// Keys 1-4 click the centre of a slot, in reading order.
    pub fn pick_slot(&mut self, key: char) -> PointerOutcome {
        let slot = match key {
            '1' => Slot::TopLeft,
            '2' => Slot::TopRight,
            '3' => Slot::BottomLeft,
            '4' => Slot::BottomRight,
            _ => return PointerOutcome::Ignored,
        };
        self.pointer(PointerEvent::at_slot(slot))
    }

    fn pointer(&mut self, pointer: PointerEvent) -> PointerOutcome {
        let outcome = self.machine.handle_pointer(pointer);
        self.sync_state();
        outcome
    }

    fn sync_state(&mut self) {
        if self.state == AppState::Playing && !self.machine.is_running() {
            self.state = AppState::Results;
            self.stage.borrow_mut().pulse = None;
            self.refresh_summary();
        }
    }

    fn refresh_summary(&mut self) {
        self.summary = self.history.as_ref().and_then(|store| match store.summary() {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "history summary unavailable");
                None
            }
        });
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.list_items {
        for name in ItemSet::available() {
            let set = ItemSet::load(&name)?;
            println!("{name}: {}", set.items.join(", "));
        }
        return Ok(());
    }

    if cli.history {
        return print_history();
    }

    let store = cli.config_store();
    let config = cli.effective_config(&store);
    config.validate()?;
    if cli.save_config {
        store.save(&config)?;
    }

    if let Some(learner) = cli.simulate {
        return simulate(&cli, config, learner);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Err(e) = logging::init_file(&AppDirs::log_path()) {
        eprintln!("logging disabled: {e}");
    }

    let stage = SharedStage::default();
    let mut collab = Collaborators::headless(&config.timing)
        .with_picking(QuadrantPicking::new(80, 22, 1))
        .with_cue(StageCue::new(
            stage.clone(),
            Duration::from_secs_f64(config.timing.pulse_fade_in_secs),
            Duration::from_secs_f64(config.timing.pulse_half_period_secs),
        ))
        .with_audio(StageAudio(stage.clone()))
        .with_celebration(StageCelebration(stage.clone()));
    if let Some(sink) = cli.report_sink()? {
        collab = collab.with_sink(sink);
    }
    let history = if cli.no_history {
        None
    } else {
        collab = collab.with_sink(HistorySink::new(ReportStore::open_default()?));
        Some(ReportStore::open_default()?)
    };

    let machine = Machine::new(config, collab)?;
    let mut app = App::new(machine, stage, history);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let size = terminal.size()?;
    app.resize(size.width, size.height);

    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let (event, elapsed) = runner.step();
        app.advance(elapsed);

        match event {
            SpotEvent::Tick => {}
            SpotEvent::Resize(w, h) => app.resize(w, h),
            SpotEvent::Pointer { column, row } => {
                app.click(column, row);
            }
            SpotEvent::Key(key) => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Char(' ') | KeyCode::Enter => {
                    if app.state != AppState::Playing {
                        app.start();
                    }
                }
                KeyCode::Char('r') => app.restart(),
                KeyCode::Char(c @ '1'..='4') => {
                    app.pick_slot(c);
                }
                _ => {}
            },
        }
    }

    info!("exiting");
    Ok(())
}

fn simulate(cli: &Cli, config: Config, learner: SimulatedLearner) -> Result<(), Box<dyn Error>> {
    if let Err(e) = logging::init_stderr() {
        eprintln!("logging disabled: {e}");
    }

    let mut collab =
        Collaborators::headless(&config.timing).with_sink(JsonLinesSink::new(io::stdout()));
    if let Some(sink) = cli.report_sink()? {
        collab = collab.with_sink(sink);
    }
    if !cli.no_history {
        collab = collab.with_sink(HistorySink::new(ReportStore::open_default()?));
    }

    let mut machine = Machine::new(config, collab)?;
    info!(%learner, "simulating playthrough");
    match run_playthrough(
        &mut machine,
        learner.as_learner(),
        Duration::from_millis(TICK_RATE_MS),
    ) {
        Some(_) => Ok(()),
        None => Err("simulated playthrough did not finish".into()),
    }
}

fn print_history() -> Result<(), Box<dyn Error>> {
    let store = ReportStore::open_default()?;
    let summary = store.summary()?;
    println!(
        "{} playthroughs, {} successful",
        summary.playthroughs, summary.successes
    );
    if let (Some(best), Some(mean)) = (summary.best_score, summary.mean_score) {
        println!("best score {:.0}%, mean {:.0}%", best * 100.0, mean * 100.0);
    }
    for report in store.recent(5)? {
        println!(
            "{}  {:<8} {:>4.0}%  {}/{} hits  {}s",
            report.completed_at.format("%Y-%m-%d %H:%M"),
            report.reason.to_string(),
            report.aggregate_score * 100.0,
            report.success_interactions,
            report.total_interactions,
            report.duration_secs
        );
    }
    Ok(())
}
