//! Scripted learners that play a [`Machine`] on its virtual clock.

use crate::collaborators::PointerEvent;
use crate::game::{Machine, Phase};
use crate::scoring::MetricsReport;
use crate::timer::RoundToken;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Learner {
    /// Picks the target `reaction` after every prompt.
    Perfect { reaction: Duration },
    /// Never touches anything.
    Idle,
    /// Misses `misses` times per prompt before picking the target.
    Clumsy { misses: u32, reaction: Duration },
    /// Lets the first `skip` prompts of each round expire.
    Hesitant { skip: u8, reaction: Duration },
}

impl Learner {
    pub fn perfect() -> Self {
        Learner::Perfect {
            reaction: Duration::from_millis(1500),
        }
    }

    pub fn clumsy(misses: u32) -> Self {
        Learner::Clumsy {
            misses,
            reaction: Duration::from_millis(1500),
        }
    }

    pub fn hesitant(skip: u8) -> Self {
        Learner::Hesitant {
            skip,
            reaction: Duration::from_millis(1500),
        }
    }
}

/// Upper bound on simulated time, far beyond any real playthrough.
pub const MAX_SIMULATED: Duration = Duration::from_secs(60 * 60);

struct Prompt {
    token: RoundToken,
    opened_at: Duration,
    misses: u32,
}

/// Plays one playthrough in `resolution` steps and returns its report.
/// Returns None if the machine was already running or never finished.
pub fn run_playthrough(
    machine: &mut Machine,
    learner: Learner,
    resolution: Duration,
) -> Option<MetricsReport> {
    if !machine.start() {
        return None;
    }
    let resolution = resolution.max(Duration::from_millis(1));
    let started = machine.now();
    let mut prompt: Option<Prompt> = None;

    while machine.is_running() {
        if machine.now().saturating_sub(started) > MAX_SIMULATED {
            return None;
        }
        machine.advance(resolution);
        if machine.phase() != Phase::AwaitingResponse {
            continue;
        }

        let token = machine.current_token();
        if prompt.as_ref().map(|p| p.token) != Some(token) {
            prompt = Some(Prompt {
                token,
                opened_at: machine.now(),
                misses: 0,
            });
        }
        let Some(p) = prompt.as_mut() else {
            continue;
        };
        let waited = machine.now().saturating_sub(p.opened_at);

        let pointer = match learner {
            Learner::Idle => None,
            Learner::Perfect { reaction } if waited >= reaction => target_pointer(machine),
            Learner::Clumsy { misses, reaction } if waited >= reaction => {
                if p.misses < misses {
                    p.misses += 1;
                    Some(PointerEvent::new(0.0, 0.0))
                } else {
                    target_pointer(machine)
                }
            }
            Learner::Hesitant { skip, reaction } if token.step > skip && waited >= reaction => {
                target_pointer(machine)
            }
            _ => None,
        };
        if let Some(pointer) = pointer {
            let outcome = machine.handle_pointer(pointer);
            debug!(?token, ?outcome, "simulated pointer");
        }
    }

    machine.last_report().cloned()
}

fn target_pointer(machine: &Machine) -> Option<PointerEvent> {
    let target = machine.state().target();
    machine
        .visible_items()
        .and_then(|layout| layout.slot_of(target))
        .map(PointerEvent::at_slot)
}
