//! Level/round progression for one playthrough.
//!
//! A playthrough is three levels of three rounds. Level 1 shows each item on
//! its own, first as a demonstration and then as a prompt; level 2 shows the
//! target beside one distractor and level 3 beside two. Each round opens up
//! to `auto_pass_limit` response windows; the learner resolves a window by
//! picking the target, or the window expires when its pulse cue runs out.
//!
//! All timing runs through a [`TimerQueue`] on a virtual clock that the host
//! advances. Every round-scoped timer carries the [`RoundToken`] of the round
//! that scheduled it and is cancelled when the machine moves on.

use crate::catalog::ItemSet;
use crate::collaborators::{Collaborators, PointerEvent};
use crate::config::Config;
use crate::error::{Result, SpotError};
use crate::layout::{items_for, ItemIndex, LayoutGenerator, RoundLayout};
use crate::scoring::{CompletionReason, InteractionRecord, MetricsReport, Scorecard};
use crate::timer::{RoundToken, TimerHandle, TimerQueue};
use crate::window::{PickOutcome, ResponseWindow};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub const LEVELS: u8 = 3;
pub const SUB_LEVELS: u8 = 3;
pub const ROUNDS_PER_PLAYTHROUGH: u32 = (LEVELS * SUB_LEVELS) as u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum RoundMode {
    Demonstration,
    AwaitingResponse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameState {
    level: u8,
    sub_level: u8,
    step: u8,
    mode: RoundMode,
    auto_pass_streak: u32,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            level: 1,
            sub_level: 1,
            step: 1,
            mode: RoundMode::Demonstration,
            auto_pass_streak: 0,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn sub_level(&self) -> u8 {
        self.sub_level
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn mode(&self) -> RoundMode {
        self.mode
    }

    pub fn auto_pass_streak(&self) -> u32 {
        self.auto_pass_streak
    }

    pub fn target(&self) -> ItemIndex {
        (self.sub_level - 1) as ItemIndex
    }

    pub fn token(&self, run: u32) -> RoundToken {
        RoundToken {
            run,
            level: self.level,
            sub_level: self.sub_level,
            step: self.step,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |v: u8, max: u8| (1..=max).contains(&v);
        if in_range(self.level, LEVELS) && in_range(self.sub_level, SUB_LEVELS) && in_range(self.step, 3)
        {
            Ok(())
        } else {
            Err(SpotError::InvalidState {
                level: self.level,
                sub_level: self.sub_level,
                step: self.step,
            })
        }
    }

    /// (level, sub_level) of the following round, or None after the last.
    fn next_round(&self) -> Option<(u8, u8)> {
        if self.sub_level < SUB_LEVELS {
            Some((self.level, self.sub_level + 1))
        } else if self.level < LEVELS {
            Some((self.level + 1, 1))
        } else {
            None
        }
    }

    fn enter_round(&mut self, level: u8, sub_level: u8) {
        self.level = level;
        self.sub_level = sub_level;
        self.step = 1;
        self.mode = if level == 1 {
            RoundMode::Demonstration
        } else {
            RoundMode::AwaitingResponse
        };
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    /// Waiting for `start`.
    Idle,
    Demonstrating,
    /// Demonstration hidden, prompt not yet shown.
    DemoGap,
    AwaitingResponse,
    /// A window expired; the prompt re-opens after the retry delay.
    Retrying,
    /// Between rounds.
    Settling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerEvent {
    DemoFinished(RoundToken),
    DemoGapElapsed(RoundToken),
    WindowTick(RoundToken),
    PulseExhausted(RoundToken),
    RetryPrompt(RoundToken),
    NextRound(RoundToken),
}

impl TimerEvent {
    fn token(&self) -> RoundToken {
        match *self {
            TimerEvent::DemoFinished(t)
            | TimerEvent::DemoGapElapsed(t)
            | TimerEvent::WindowTick(t)
            | TimerEvent::PulseExhausted(t)
            | TimerEvent::RetryPrompt(t)
            | TimerEvent::NextRound(t) => t,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Resolution {
    Hit,
    AutoPass,
}

/// What a pointer-down did.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerOutcome {
    /// No playthrough running.
    Ignored,
    /// Counted, but no window was open.
    Noted,
    Miss { score: u32 },
    Hit(InteractionRecord),
}

pub struct Machine {
    config: Config,
    items: ItemSet,
    collab: Collaborators,
    timers: TimerQueue<TimerEvent>,
    layouts: LayoutGenerator,
    state: GameState,
    phase: Phase,
    run: u32,
    layout: Option<RoundLayout>,
    items_visible: bool,
    window: Option<ResponseWindow>,
    round_timers: Vec<TimerHandle>,
    scorecard: Scorecard,
    started_at: Option<Duration>,
    last_report: Option<MetricsReport>,
}

impl Machine {
    pub fn new(config: Config, collab: Collaborators) -> Result<Self> {
        config.validate()?;
        let items = ItemSet::load(&config.item_set)?;
        Ok(Self::with_items(config, items, collab))
    }

    pub fn with_items(config: Config, items: ItemSet, collab: Collaborators) -> Self {
        let scorecard = Scorecard::new(ROUNDS_PER_PLAYTHROUGH, config.rules.miss_penalty);
        let layouts = LayoutGenerator::new(config.seed);
        Self {
            config,
            items,
            collab,
            timers: TimerQueue::new(),
            layouts,
            state: GameState::new(),
            phase: Phase::Idle,
            run: 0,
            layout: None,
            items_visible: false,
            window: None,
            round_timers: Vec::new(),
            scorecard,
            started_at: None,
            last_report: None,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn item_set(&self) -> &ItemSet {
        &self.items
    }

    pub fn item_label(&self, index: ItemIndex) -> &str {
        self.items.label(index)
    }

    pub fn layout(&self) -> Option<&RoundLayout> {
        self.layout.as_ref()
    }

    /// Layout the host should currently display, if any.
    pub fn visible_items(&self) -> Option<&RoundLayout> {
        self.layout.as_ref().filter(|_| self.items_visible)
    }

    pub fn window(&self) -> Option<&ResponseWindow> {
        self.window.as_ref()
    }

    pub fn scorecard(&self) -> &Scorecard {
        &self.scorecard
    }

    pub fn last_report(&self) -> Option<&MetricsReport> {
        self.last_report.as_ref()
    }

    pub fn current_token(&self) -> RoundToken {
        self.state.token(self.run)
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started_at
            .map(|t| self.timers.now().saturating_sub(t).as_secs())
            .unwrap_or(0)
    }

    /// Starts a fresh playthrough. No-op while one is running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = GameState::new();
        self.scorecard.reset();
        self.started_at = Some(self.timers.now());
        info!(run = self.run, items = %self.items.name, "playthrough started");
        self.begin_round();
        true
    }

    /// Drops the current playthrough without producing a report.
    pub fn abort(&mut self) {
        if self.is_running() {
            info!(run = self.run, "playthrough aborted");
            self.collab.cue.stop();
        }
        self.reset_to_idle();
    }

    /// Moves the clock forward, firing every timer that falls due.
    pub fn advance(&mut self, dt: Duration) {
        let until = self.timers.now() + dt;
        while let Some(event) = self.timers.next_due(until) {
            self.dispatch(event);
        }
        self.timers.settle_at(until);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.collab.picking.resize(width, height);
    }

    pub fn handle_pointer(&mut self, pointer: PointerEvent) -> PointerOutcome {
        if !self.is_running() {
            return PointerOutcome::Ignored;
        }
        self.scorecard.record_pointer(pointer.position());

        // Anything outside the round's active items counts as empty space.
        let picked = self.layout.as_ref().and_then(|layout| {
            self.collab
                .picking
                .resolve(pointer, layout)
                .filter(|item| layout.contains(*item))
        });

        let Some(window) = self.window.as_mut() else {
            return PointerOutcome::Noted;
        };
        let outcome = match window.resolve(picked) {
            PickOutcome::Hit { elapsed_ticks } => PointerOutcome::Hit(self.on_hit(elapsed_ticks)),
            PickOutcome::Miss => {
                let score = self.scorecard.record_miss();
                debug!(?picked, score, "miss");
                PointerOutcome::Miss { score }
            }
            PickOutcome::Closed => PointerOutcome::Noted,
        };
        debug_assert!(self.state.validate().is_ok());
        outcome
    }

    /// Escape hatch for hosts whose cue or assets failed: expires the open
    /// window of the round identified by `token`.
    pub fn force_expire(&mut self, token: RoundToken) -> bool {
        if token != self.current_token() || self.phase != Phase::AwaitingResponse {
            return false;
        }
        info!(?token, "window force-expired by host");
        let expired = self.expire_window();
        debug_assert!(self.state.validate().is_ok());
        expired
    }

    fn dispatch(&mut self, event: TimerEvent) {
        if event.token() != self.current_token() {
            trace!(?event, "dropping stale timer");
            return;
        }
        match (event, self.phase) {
            (TimerEvent::DemoFinished(_), Phase::Demonstrating) => {
                self.items_visible = false;
                self.state.mode = RoundMode::AwaitingResponse;
                self.phase = Phase::DemoGap;
                let gap = self.config.timing.demo_gap();
                self.schedule(gap, TimerEvent::DemoGapElapsed);
            }
            (TimerEvent::DemoGapElapsed(_), Phase::DemoGap) => {
                self.items_visible = true;
                self.open_window();
            }
            (TimerEvent::WindowTick(_), Phase::AwaitingResponse) => {
                if let Some(window) = self.window.as_mut() {
                    window.tick();
                }
            }
            (TimerEvent::PulseExhausted(_), Phase::AwaitingResponse) => {
                self.expire_window();
            }
            (TimerEvent::RetryPrompt(_), Phase::Retrying) => self.open_window(),
            (TimerEvent::NextRound(_), Phase::Settling) => self.begin_round(),
            (event, phase) => trace!(?event, %phase, "timer does not apply"),
        }
        debug_assert!(self.state.validate().is_ok());
    }

    fn begin_round(&mut self) {
        debug!(
            level = self.state.level,
            sub_level = self.state.sub_level,
            mode = %self.state.mode,
            "round begins"
        );
        let items = items_for(self.state.level, self.state.sub_level);
        self.layout = Some(self.layouts.generate(&items));
        self.items_visible = true;

        if self.state.mode == RoundMode::Demonstration {
            let tag = self.target_label();
            self.collab.audio.play(&tag);
            self.phase = Phase::Demonstrating;
            let display = self.config.timing.demo_display();
            self.schedule(display, TimerEvent::DemoFinished);
        } else {
            self.open_window();
        }
    }

    fn open_window(&mut self) {
        let target = self.state.target();
        let Some(slot) = self.layout.as_ref().and_then(|l| l.slot_of(target)) else {
            warn!(target, "no layout for response window; regenerating");
            let items = items_for(self.state.level, self.state.sub_level);
            self.layout = Some(self.layouts.generate(&items));
            return self.open_window();
        };

        self.window = Some(ResponseWindow::open(target));
        self.scorecard.note_window_opened();
        self.state.mode = RoundMode::AwaitingResponse;
        self.phase = Phase::AwaitingResponse;

        // Level 1 already sounded the cue during its demonstration.
        if self.state.level != 1 {
            let tag = self.target_label();
            self.collab.audio.play(&tag);
        }

        let repeats = self.config.rules.pulse_repeats_for(self.state.level);
        let run_time = self.collab.cue.pulse(target, slot, repeats);
        let tick = self.config.timing.tick();
        let token = self.current_token();
        self.round_timers
            .push(self.timers.every(tick, TimerEvent::WindowTick(token)));
        self.schedule(run_time, TimerEvent::PulseExhausted);
        debug!(?token, %slot, repeats, ?run_time, "response window open");
    }

    fn on_hit(&mut self, elapsed_ticks: u32) -> InteractionRecord {
        self.cancel_round_timers();
        self.collab.cue.stop();
        self.window = None;

        let tag = self.target_label();
        let record = self.scorecard.record_hit(&tag, elapsed_ticks);
        self.state.auto_pass_streak = 0;
        self.collab.celebration.trigger();
        self.collab.audio.play(&tag);
        info!(
            level = self.state.level,
            sub_level = self.state.sub_level,
            tag = %tag,
            score = record.score,
            responded_at = record.responded_at_ticks,
            "target hit"
        );

        self.advance_round(Resolution::Hit);
        record
    }

    fn expire_window(&mut self) -> bool {
        let Some(window) = self.window.as_mut() else {
            return false;
        };
        if !window.expire() {
            return false;
        }
        let ticks = window.elapsed_ticks();
        self.window = None;
        self.cancel_round_timers();
        self.collab.cue.stop();
        self.scorecard.note_window_expired(ticks);
        self.state.auto_pass_streak += 1;

        let limit = self.config.rules.auto_pass_limit;
        let token = self.current_token();
        if self.state.auto_pass_streak > limit as u32 {
            warn!(?token, "no response after an auto-pass; giving up");
            self.finish(CompletionReason::TimedOut);
        } else if self.state.step >= limit {
            warn!(?token, "round auto-passed");
            self.scorecard.record_auto_pass();
            self.advance_round(Resolution::AutoPass);
        } else {
            debug!(?token, "window expired; prompting again");
            self.state.step += 1;
            self.phase = Phase::Retrying;
            let delay = self.config.timing.retry_delay();
            self.schedule(delay, TimerEvent::RetryPrompt);
        }
        true
    }

    fn advance_round(&mut self, resolution: Resolution) {
        self.items_visible = false;
        self.window = None;

        match self.state.next_round() {
            Some((level, sub_level)) => {
                self.state.enter_round(level, sub_level);
                self.phase = Phase::Settling;
                let settle = self.config.timing.settle();
                self.schedule(settle, TimerEvent::NextRound);
            }
            None => {
                let reason = match resolution {
                    Resolution::Hit => CompletionReason::Success,
                    Resolution::AutoPass => CompletionReason::TimedOut,
                };
                self.finish(reason);
            }
        }
    }

    fn finish(&mut self, reason: CompletionReason) {
        let report = self.scorecard.export(self.elapsed_secs(), reason);
        info!(
            %reason,
            score = report.aggregate_score,
            successes = report.success_interactions,
            interactions = report.total_interactions,
            duration_secs = report.duration_secs,
            "playthrough complete"
        );
        match report.to_message_json() {
            Ok(json) => info!(message = %json, "metrics report"),
            Err(e) => warn!(error = %e, "metrics report could not be serialized"),
        }
        for sink in self.collab.sinks.iter_mut() {
            sink.deliver(&report);
        }
        self.last_report = Some(report);
        self.reset_to_idle();
    }

    fn reset_to_idle(&mut self) {
        self.timers.cancel_all();
        self.round_timers.clear();
        self.run += 1;
        self.state = GameState::new();
        self.phase = Phase::Idle;
        self.layout = None;
        self.items_visible = false;
        self.window = None;
        self.started_at = None;
        self.scorecard.reset();
    }

    fn schedule(&mut self, delay: Duration, event: fn(RoundToken) -> TimerEvent) {
        let token = self.current_token();
        let handle = self.timers.schedule(delay, event(token));
        self.round_timers.push(handle);
    }

    fn cancel_round_timers(&mut self) {
        for handle in self.round_timers.drain(..) {
            self.timers.cancel(handle);
        }
    }

    fn target_label(&self) -> String {
        self.items.label(self.state.target()).to_string()
    }
}
