use std::time::Duration;

/// Generation token carried by every round-scoped timer. A delivery whose
/// token differs from the machine's current one belongs to a round that has
/// already been left and must be dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RoundToken {
    pub run: u32,
    pub level: u8,
    pub sub_level: u8,
    pub step: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Entry<E> {
    handle: TimerHandle,
    due: Duration,
    period: Option<Duration>,
    event: E,
}

/// Single-threaded scheduler on a virtual clock. The host moves the clock
/// forward; nothing fires on its own.
#[derive(Debug)]
pub struct TimerQueue<E> {
    now: Duration,
    next_id: u64,
    entries: Vec<Entry<E>>,
}

impl<E: Clone> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// One-shot event `delay` from now.
    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerHandle {
        self.insert(delay, None, event)
    }

    /// Repeating event, first firing one `period` from now.
    pub fn every(&mut self, period: Duration, event: E) -> TimerHandle {
        // A zero period would fire forever at one instant.
        let period = period.max(Duration::from_millis(1));
        self.insert(period, Some(period), event)
    }

    /// Returns false when the handle already fired (one-shot) or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    /// Pops the earliest event due at or before `until`, moving the clock to
    /// its deadline. Equal deadlines fire in scheduling order.
    pub fn next_due(&mut self, until: Duration) -> Option<E> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= until)
            .min_by_key(|(_, e)| (e.due, e.handle))
            .map(|(i, _)| i)?;

        let due = self.entries[idx].due;
        if due > self.now {
            self.now = due;
        }

        match self.entries[idx].period {
            Some(period) => {
                let entry = &mut self.entries[idx];
                entry.due += period;
                Some(entry.event.clone())
            }
            None => Some(self.entries.remove(idx).event),
        }
    }

    /// Moves the clock to `until` once every due event has been drained.
    pub fn settle_at(&mut self, until: Duration) {
        if until > self.now {
            self.now = until;
        }
    }

    fn insert(&mut self, delay: Duration, period: Option<Duration>, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            handle,
            due: self.now + delay,
            period,
            event,
        });
        handle
    }
}

impl<E: Clone> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}
