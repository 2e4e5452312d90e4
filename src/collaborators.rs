//! Seams between the drill core and whatever hosts it.
//!
//! The core never draws or plays anything itself. It resolves pointers
//! through a [`PickingSurface`], starts and stops pulse cues on a
//! [`CueAnimator`], asks an [`AudioCue`] to play item sounds, fires a
//! [`CelebrationEffect`] on every hit and hands the final report to each
//! [`ReportSink`].

use crate::config::Timing;
use crate::layout::{ItemIndex, RoundLayout, Slot};
use crate::scoring::{MetricsReport, PointerPosition};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;
use tracing::error;

/// Pointer-down in normalized device coordinates (x right, y up, -1..1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn at_slot(slot: Slot) -> Self {
        let (x, y) = slot.center();
        Self { x, y }
    }

    /// Maps a viewport cell/pixel (origin top-left) to normalized coordinates.
    pub fn from_viewport(column: u32, row: u32, width: u32, height: u32) -> Self {
        let w = width.max(1) as f64;
        let h = height.max(1) as f64;
        Self {
            x: ((column as f64 + 0.5) / w) * 2.0 - 1.0,
            y: -(((row as f64 + 0.5) / h) * 2.0 - 1.0),
        }
    }

    pub fn position(&self) -> PointerPosition {
        PointerPosition {
            x: self.x,
            y: self.y,
        }
    }
}

pub trait PickingSurface {
    /// Item under the pointer, or None for empty space.
    fn resolve(&self, pointer: PointerEvent, layout: &RoundLayout) -> Option<ItemIndex>;

    fn resize(&mut self, _width: u32, _height: u32) {}
}

pub trait CueAnimator {
    /// Starts pulsing the cue over `slot`; returns how long the pulse runs.
    fn pulse(&mut self, item: ItemIndex, slot: Slot, repeats: u32) -> Duration;

    fn stop(&mut self);
}

pub trait AudioCue {
    fn play(&mut self, tag: &str);
}

pub trait CelebrationEffect {
    fn trigger(&mut self);
}

pub trait ReportSink {
    fn deliver(&mut self, report: &MetricsReport);
}

/// Hit-tests the four quadrant slots, leaving a gutter along both axes.
#[derive(Debug, Clone)]
pub struct QuadrantPicking {
    width: u32,
    height: u32,
    gutter: u32,
}

impl QuadrantPicking {
    pub fn new(width: u32, height: u32, gutter: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            gutter,
        }
    }

    fn in_gutter(&self, pointer: PointerEvent) -> bool {
        let gx = self.gutter as f64 / (self.width as f64 / 2.0);
        let gy = self.gutter as f64 / (self.height as f64 / 2.0);
        pointer.x.abs() < gx || pointer.y.abs() < gy
    }
}

impl Default for QuadrantPicking {
    fn default() -> Self {
        Self::new(2, 2, 0)
    }
}

impl PickingSurface for QuadrantPicking {
    fn resolve(&self, pointer: PointerEvent, layout: &RoundLayout) -> Option<ItemIndex> {
        if pointer.x.abs() > 1.0 || pointer.y.abs() > 1.0 || self.in_gutter(pointer) {
            return None;
        }
        Slot::at(pointer.x, pointer.y).and_then(|slot| layout.item_at(slot))
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }
}

/// Fade-in followed by a yoyo scale pulse; `repeats` extra half periods
/// after the first.
#[derive(Debug, Clone, Copy)]
pub struct FixedPulse {
    fade_in: Duration,
    half_period: Duration,
}

impl FixedPulse {
    pub fn new(fade_in: Duration, half_period: Duration) -> Self {
        Self {
            fade_in,
            half_period,
        }
    }

    pub fn from_timing(timing: &Timing) -> Self {
        let secs = |v: f64| Duration::from_secs_f64(v.max(0.0));
        Self::new(
            secs(timing.pulse_fade_in_secs),
            secs(timing.pulse_half_period_secs),
        )
    }

    pub fn run_time(&self, repeats: u32) -> Duration {
        self.fade_in + self.half_period * (repeats + 1)
    }
}

impl CueAnimator for FixedPulse {
    fn pulse(&mut self, _item: ItemIndex, _slot: Slot, repeats: u32) -> Duration {
        self.run_time(repeats)
    }

    fn stop(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl AudioCue for Silent {
    fn play(&mut self, _tag: &str) {}
}

impl CelebrationEffect for Silent {
    fn trigger(&mut self) {}
}

/// Keeps delivered reports in memory; clones share the same list.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    reports: Rc<RefCell<Vec<MetricsReport>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<MetricsReport> {
        self.reports.borrow().clone()
    }
}

impl ReportSink for MemorySink {
    fn deliver(&mut self, report: &MetricsReport) {
        self.reports.borrow_mut().push(report.clone());
    }
}

/// Writes each report as one outbound JSON message per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn deliver(&mut self, report: &MetricsReport) {
        let written = report
            .to_message_json()
            .map_err(std::io::Error::from)
            .and_then(|line| writeln!(self.out, "{line}"))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            error!(error = %e, "failed to write report message");
        }
    }
}

/// Calls the core made on its collaborators, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Pulse { item: ItemIndex, slot: Slot, repeats: u32 },
    StopPulse,
    Play(String),
    Celebrate,
}

/// Cue, audio and celebration stand-in that records every call.
#[derive(Debug, Clone)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<HostCall>>>,
    pulse: FixedPulse,
}

impl CallLog {
    pub fn new(pulse: FixedPulse) -> Self {
        Self {
            calls: Rc::default(),
            pulse,
        }
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }
}

impl CueAnimator for CallLog {
    fn pulse(&mut self, item: ItemIndex, slot: Slot, repeats: u32) -> Duration {
        self.calls
            .borrow_mut()
            .push(HostCall::Pulse { item, slot, repeats });
        self.pulse.run_time(repeats)
    }

    fn stop(&mut self) {
        self.calls.borrow_mut().push(HostCall::StopPulse);
    }
}

impl AudioCue for CallLog {
    fn play(&mut self, tag: &str) {
        self.calls.borrow_mut().push(HostCall::Play(tag.to_string()));
    }
}

impl CelebrationEffect for CallLog {
    fn trigger(&mut self) {
        self.calls.borrow_mut().push(HostCall::Celebrate);
    }
}

/// Everything the core talks to.
pub struct Collaborators {
    pub picking: Box<dyn PickingSurface>,
    pub cue: Box<dyn CueAnimator>,
    pub audio: Box<dyn AudioCue>,
    pub celebration: Box<dyn CelebrationEffect>,
    pub sinks: Vec<Box<dyn ReportSink>>,
}

impl Collaborators {
    /// Quadrant picking, fixed-length pulses, no sound, no sinks.
    pub fn headless(timing: &Timing) -> Self {
        Self {
            picking: Box::new(QuadrantPicking::default()),
            cue: Box::new(FixedPulse::from_timing(timing)),
            audio: Box::new(Silent),
            celebration: Box::new(Silent),
            sinks: Vec::new(),
        }
    }

    pub fn with_picking(mut self, picking: impl PickingSurface + 'static) -> Self {
        self.picking = Box::new(picking);
        self
    }

    pub fn with_cue(mut self, cue: impl CueAnimator + 'static) -> Self {
        self.cue = Box::new(cue);
        self
    }

    pub fn with_audio(mut self, audio: impl AudioCue + 'static) -> Self {
        self.audio = Box::new(audio);
        self
    }

    pub fn with_celebration(mut self, celebration: impl CelebrationEffect + 'static) -> Self {
        self.celebration = Box::new(celebration);
        self
    }

    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Routes cue, audio and celebration calls into one log.
    pub fn with_call_log(self, log: &CallLog) -> Self {
        self.with_cue(log.clone())
            .with_audio(log.clone())
            .with_celebration(log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutGenerator;

    #[test]
    fn quadrant_picking_maps_slots_to_items() {
        let mut gen = LayoutGenerator::new(Some(3));
        let layout = gen.generate(&[0, 1, 2]);
        let picking = QuadrantPicking::default();

        for p in layout.placements() {
            assert_eq!(
                picking.resolve(PointerEvent::at_slot(p.slot), &layout),
                Some(p.item)
            );
        }
        let empty = Slot::POOL
            .into_iter()
            .find(|s| layout.item_at(*s).is_none())
            .unwrap();
        assert_eq!(picking.resolve(PointerEvent::at_slot(empty), &layout), None);
    }

    #[test]
    fn gutter_and_out_of_range_pick_nothing() {
        let mut gen = LayoutGenerator::new(Some(3));
        let layout = gen.generate(&[0, 1, 2]);
        let mut picking = QuadrantPicking::new(80, 24, 2);

        assert_eq!(picking.resolve(PointerEvent::new(0.01, 0.5), &layout), None);
        assert_eq!(picking.resolve(PointerEvent::new(1.5, 0.5), &layout), None);

        // A wider viewport narrows the gutter in normalized units.
        picking.resize(800, 240);
        let slot = layout.cue_slot().unwrap();
        let (x, y) = slot.center();
        let near_axis = PointerEvent::new(x.signum() * 0.03, y);
        assert_eq!(picking.resolve(near_axis, &layout), Some(0));
    }

    #[test]
    fn viewport_mapping_is_y_up() {
        let p = PointerEvent::from_viewport(0, 0, 100, 50);
        assert!(p.x < -0.9 && p.y > 0.9);
        let p = PointerEvent::from_viewport(99, 49, 100, 50);
        assert!(p.x > 0.9 && p.y < -0.9);
    }

    #[test]
    fn pulse_run_time_counts_fade_and_half_periods() {
        let pulse = FixedPulse::from_timing(&Timing::default());
        assert_eq!(pulse.run_time(5), Duration::from_secs(4));
        assert_eq!(pulse.run_time(9), Duration::from_secs(6));
    }

    #[test]
    fn json_lines_sink_writes_one_line_per_report() {
        use crate::scoring::{CompletionReason, Scorecard};

        let report = Scorecard::new(9, 20).export(3, CompletionReason::Success);
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.deliver(&report);
        sink.deliver(&report);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().all(|l| l.contains("\"iterationType\"")));
    }

    #[test]
    fn memory_sink_clones_share_reports() {
        use crate::scoring::{CompletionReason, Scorecard};

        let sink = MemorySink::new();
        let mut handle = sink.clone();
        handle.deliver(&Scorecard::new(9, 20).export(1, CompletionReason::TimedOut));
        assert_eq!(sink.reports().len(), 1);
    }
}
