//! Terminal-side collaborators. The drill core drives these through its
//! traits; the UI reads the shared [`Stage`] back every frame.

use crate::celebration::Confetti;
use crate::collaborators::{AudioCue, CelebrationEffect, CueAnimator, FixedPulse};
use crate::layout::{ItemIndex, Slot};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct PulseCue {
    pub item: ItemIndex,
    pub slot: Slot,
    pub started: Instant,
    pub fade_in: Duration,
    pub half_period: Duration,
}

impl PulseCue {
    /// Whether the cue is drawn highlighted at `now`: dim while fading in,
    /// then alternating every half period.
    pub fn is_bright(&self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.fade_in {
            return false;
        }
        let half = self.half_period.as_millis().max(1);
        ((elapsed - self.fade_in).as_millis() / half) % 2 == 0
    }
}

#[derive(Debug, Default)]
pub struct Stage {
    pub pulse: Option<PulseCue>,
    pub caption: Option<String>,
    pub confetti: Confetti,
    last_slot: Option<Slot>,
    size: (u16, u16),
}

impl Stage {
    pub fn resize(&mut self, width: u16, height: u16) {
        self.size = (width, height);
    }

    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    /// Cell at the centre of a slot's quadrant.
    pub fn slot_center(&self, slot: Slot) -> (f64, f64) {
        let (w, h) = (self.size.0 as f64, self.size.1 as f64);
        let (x, y) = slot.center();
        ((x + 1.0) / 2.0 * w, (1.0 - y) / 2.0 * h)
    }
}

pub type SharedStage = Rc<RefCell<Stage>>;

#[derive(Debug, Clone)]
pub struct StageCue {
    stage: SharedStage,
    pulse: FixedPulse,
    fade_in: Duration,
    half_period: Duration,
}

impl StageCue {
    pub fn new(stage: SharedStage, fade_in: Duration, half_period: Duration) -> Self {
        Self {
            stage,
            pulse: FixedPulse::new(fade_in, half_period),
            fade_in,
            half_period,
        }
    }
}

impl CueAnimator for StageCue {
    fn pulse(&mut self, item: ItemIndex, slot: Slot, repeats: u32) -> Duration {
        let mut stage = self.stage.borrow_mut();
        stage.last_slot = Some(slot);
        stage.pulse = Some(PulseCue {
            item,
            slot,
            started: Instant::now(),
            fade_in: self.fade_in,
            half_period: self.half_period,
        });
        self.pulse.run_time(repeats)
    }

    fn stop(&mut self) {
        self.stage.borrow_mut().pulse = None;
    }
}

/// Terminals have no speaker; the cue is shown as a caption instead.
#[derive(Debug, Clone)]
pub struct StageAudio(pub SharedStage);

impl AudioCue for StageAudio {
    fn play(&mut self, tag: &str) {
        self.0.borrow_mut().caption = Some(format!("♪ {tag}"));
    }
}

#[derive(Debug, Clone)]
pub struct StageCelebration(pub SharedStage);

impl CelebrationEffect for StageCelebration {
    fn trigger(&mut self) {
        let mut stage = self.0.borrow_mut();
        let (w, h) = stage.size;
        let (x, y) = match stage.last_slot {
            Some(slot) => stage.slot_center(slot),
            None => (w as f64 / 2.0, h as f64 / 2.0),
        };
        stage.confetti.burst(x, y, w, h);
    }
}
