use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, MouseButton, MouseEventKind};

#[derive(Clone, Debug, PartialEq)]
pub enum SpotEvent {
    Key(KeyEvent),
    /// Left button down at a terminal cell.
    Pointer { column: u16, row: u16 },
    Resize(u16, u16),
    /// Nothing arrived within the tick interval.
    Tick,
}

pub trait SpotEventSource: Send + 'static {
    fn recv_timeout(&self, timeout: Duration) -> Result<SpotEvent, RecvTimeoutError>;
}

fn translate(event: CtEvent) -> Option<SpotEvent> {
    match event {
        CtEvent::Key(key) => Some(SpotEvent::Key(key)),
        CtEvent::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
            Some(SpotEvent::Pointer {
                column: mouse.column,
                row: mouse.row,
            })
        }
        CtEvent::Resize(w, h) => Some(SpotEvent::Resize(w, h)),
        _ => None,
    }
}

/// Reads crossterm events on a background thread. The thread stops when
/// the terminal read fails or the receiver is dropped.
pub struct CrosstermEventSource {
    rx: Receiver<SpotEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            while let Ok(raw) = event::read() {
                if let Some(ev) = translate(raw) {
                    if tx.send(ev).is_err() {
                        return;
                    }
                }
            }
        });
        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SpotEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SpotEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed source for driving the loop without a terminal.
pub struct TestEventSource {
    rx: Receiver<SpotEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<SpotEvent>) -> Self {
        Self { rx }
    }
}

impl SpotEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SpotEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Wall-clock pacing for the drill: waits at most one tick for input and
/// reports how much real time passed since the previous step, which the
/// host feeds to the machine's virtual clock.
pub struct Runner<E: SpotEventSource, T: Ticker> {
    source: E,
    ticker: T,
    last_step: Instant,
}

impl<E: SpotEventSource, T: Ticker> Runner<E, T> {
    pub fn new(source: E, ticker: T) -> Self {
        Self {
            source,
            ticker,
            last_step: Instant::now(),
        }
    }

    /// Next event (or `Tick`) with the real time elapsed since the last call.
    pub fn step(&mut self) -> (SpotEvent, Duration) {
        let event = self
            .source
            .recv_timeout(self.ticker.interval())
            .unwrap_or(SpotEvent::Tick);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_step);
        self.last_step = now;
        (event, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers, MouseEvent};

    fn runner(rx: Receiver<SpotEvent>, ms: u64) -> Runner<TestEventSource, FixedTicker> {
        Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(ms)),
        )
    }

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let mut runner = runner(rx, 5);
        let (event, elapsed) = runner.step();
        assert_eq!(event, SpotEvent::Tick);
        assert!(elapsed >= Duration::from_millis(5));
    }

    #[test]
    fn step_passes_events_through_in_order() {
        let (tx, rx) = mpsc::channel();
        tx.send(SpotEvent::Pointer { column: 3, row: 4 }).unwrap();
        tx.send(SpotEvent::Resize(100, 30)).unwrap();
        let mut runner = runner(rx, 10);

        assert_eq!(runner.step().0, SpotEvent::Pointer { column: 3, row: 4 });
        assert_eq!(runner.step().0, SpotEvent::Resize(100, 30));
        assert_eq!(runner.step().0, SpotEvent::Tick);
    }

    #[test]
    fn disconnected_source_ticks() {
        let (tx, rx) = mpsc::channel();
        drop(tx);
        let mut runner = runner(rx, 1);
        assert_eq!(runner.step().0, SpotEvent::Tick);
    }

    #[test]
    fn elapsed_is_measured_between_steps() {
        let (_tx, rx) = mpsc::channel();
        let mut runner = runner(rx, 1);
        runner.step();
        std::thread::sleep(Duration::from_millis(20));
        let (_, elapsed) = runner.step();
        assert!(elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn only_left_clicks_become_pointers() {
        let click = |kind| {
            CtEvent::Mouse(MouseEvent {
                kind,
                column: 7,
                row: 2,
                modifiers: KeyModifiers::NONE,
            })
        };
        assert_eq!(
            translate(click(MouseEventKind::Down(MouseButton::Left))),
            Some(SpotEvent::Pointer { column: 7, row: 2 })
        );
        assert_eq!(translate(click(MouseEventKind::Down(MouseButton::Right))), None);
        assert_eq!(translate(click(MouseEventKind::Moved)), None);
        assert_eq!(translate(CtEvent::FocusGained), None);

        let key = KeyEvent::new(KeyCode::Char('1'), KeyModifiers::NONE);
        assert_eq!(translate(CtEvent::Key(key)), Some(SpotEvent::Key(key)));
    }
}
