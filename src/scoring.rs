use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Tally every round starts from.
pub const FULL_SCORE: u32 = 100;

pub const ITERATION_TYPE: &str = "ANIMATION_GAME";
pub const SEGMENT_EVENT: &str = "Segment Ended";
pub const SEGMENT_TAG: &str = "Animation_Game";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum CompletionReason {
    Success,
    #[strum(to_string = "TimeOut")]
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundTally {
    score: u32,
    misses: u32,
}

impl RoundTally {
    pub fn fresh() -> Self {
        Self {
            score: FULL_SCORE,
            misses: 0,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn penalize(&mut self, penalty: u32) {
        self.misses += 1;
        self.score = self.score.saturating_sub(penalty);
    }

    /// Share of the round's credit kept after the misses.
    pub fn bonus(&self) -> f64 {
        1.0 / (self.misses as f64 + 1.0)
    }
}

impl Default for RoundTally {
    fn default() -> Self {
        Self::fresh()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub responded_at_ticks: u32,
    pub score: u32,
    pub item_tag: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

/// Final performance summary of one playthrough.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub reason: CompletionReason,
    pub duration_secs: u64,
    pub total_interactions: u32,
    pub success_interactions: u32,
    pub aggregate_score: f64,
    pub responses: Vec<InteractionRecord>,
    pub coordinates: Vec<PointerPosition>,
    pub windows_opened: u32,
    pub completed_at: DateTime<Local>,
}

impl MetricsReport {
    /// Sum of the recorded response times, in seconds.
    pub fn response_time(&self) -> u32 {
        self.responses.iter().map(|r| r.responded_at_ticks).sum()
    }

    pub fn to_message(&self) -> SegmentMessage {
        SegmentMessage {
            iteration_type: ITERATION_TYPE.to_string(),
            input: SegmentInput {
                event: SEGMENT_EVENT.to_string(),
                message: self.reason.to_string(),
            },
            response_time: self.response_time(),
            coordinates: self.coordinates.clone(),
            response: self
                .responses
                .iter()
                .map(|r| ResponseEntry {
                    responded_at: r.responded_at_ticks,
                    score: r.score,
                    tag: r.item_tag.clone(),
                })
                .collect(),
            attempt_count: self.windows_opened,
            tag: SEGMENT_TAG.to_string(),
            duration_in_sec: self.duration_secs,
            score: self.aggregate_score * FULL_SCORE as f64,
            asset_duration: self.duration_secs,
            success_interactions: self.success_interactions,
            total_interactions: self.total_interactions,
        }
    }

    pub fn to_message_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_message())
    }
}

/// Outbound message handed to the hosting environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMessage {
    pub iteration_type: String,
    pub input: SegmentInput,
    pub response_time: u32,
    pub coordinates: Vec<PointerPosition>,
    pub response: Vec<ResponseEntry>,
    pub attempt_count: u32,
    pub tag: String,
    pub duration_in_sec: u64,
    pub score: f64,
    pub asset_duration: u64,
    pub success_interactions: u32,
    pub total_interactions: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentInput {
    pub event: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
    pub responded_at: u32,
    pub score: u32,
    pub tag: String,
}

/// Reduces raw interaction events into per-round scores and the final report.
#[derive(Debug, Clone)]
pub struct Scorecard {
    rounds_per_playthrough: u32,
    miss_penalty: u32,
    tally: RoundTally,
    round_ticks: u32,
    bonuses: Vec<f64>,
    records: Vec<InteractionRecord>,
    coordinates: Vec<PointerPosition>,
    total_interactions: u32,
    success_interactions: u32,
    windows_opened: u32,
}

impl Scorecard {
    pub fn new(rounds_per_playthrough: u32, miss_penalty: u32) -> Self {
        Self {
            rounds_per_playthrough: rounds_per_playthrough.max(1),
            miss_penalty,
            tally: RoundTally::fresh(),
            round_ticks: 0,
            bonuses: Vec::new(),
            records: Vec::new(),
            coordinates: Vec::new(),
            total_interactions: 0,
            success_interactions: 0,
            windows_opened: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.rounds_per_playthrough, self.miss_penalty);
    }

    pub fn tally(&self) -> RoundTally {
        self.tally
    }

    pub fn records(&self) -> &[InteractionRecord] {
        &self.records
    }

    pub fn total_interactions(&self) -> u32 {
        self.total_interactions
    }

    pub fn success_interactions(&self) -> u32 {
        self.success_interactions
    }

    /// A new round starts from a full tally.
    pub fn open_round(&mut self) {
        self.tally = RoundTally::fresh();
        self.round_ticks = 0;
    }

    pub fn note_window_opened(&mut self) {
        self.windows_opened += 1;
    }

    /// Carries an expired window's ticks into the round's response time.
    pub fn note_window_expired(&mut self, elapsed_ticks: u32) {
        self.round_ticks += elapsed_ticks;
    }

    pub fn record_pointer(&mut self, position: PointerPosition) {
        self.total_interactions += 1;
        self.coordinates.push(position);
    }

    /// Returns the round's tally after the penalty.
    pub fn record_miss(&mut self) -> u32 {
        self.tally.penalize(self.miss_penalty);
        self.tally.score()
    }

    pub fn record_hit(&mut self, item_tag: &str, elapsed_ticks: u32) -> InteractionRecord {
        let record = InteractionRecord {
            responded_at_ticks: self.round_ticks + elapsed_ticks,
            score: self.tally.score().min(FULL_SCORE),
            item_tag: item_tag.to_string(),
        };
        self.success_interactions += 1;
        self.bonuses.push(self.tally.bonus());
        self.records.push(record.clone());
        self.open_round();
        record
    }

    /// Auto-passed rounds earn nothing and leave no interaction record.
    pub fn record_auto_pass(&mut self) {
        self.bonuses.push(0.0);
        self.open_round();
    }

    pub fn rounds_resolved(&self) -> usize {
        self.bonuses.len()
    }

    /// 0..1, each round worth an equal share of the playthrough.
    pub fn aggregate_score(&self) -> f64 {
        let earned: f64 = self.bonuses.iter().sum();
        (earned / self.rounds_per_playthrough as f64).clamp(0.0, 1.0)
    }

    pub fn export(&self, duration_secs: u64, reason: CompletionReason) -> MetricsReport {
        MetricsReport {
            reason,
            duration_secs,
            total_interactions: self.total_interactions,
            success_interactions: self.success_interactions,
            aggregate_score: self.aggregate_score(),
            responses: self.records.clone(),
            coordinates: self.coordinates.clone(),
            windows_opened: self.windows_opened,
            completed_at: Local::now(),
        }
    }
}
