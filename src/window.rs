use crate::layout::ItemIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowState {
    Open,
    Hit,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickOutcome {
    /// Target picked while open; carries whole seconds since opening.
    Hit { elapsed_ticks: u32 },
    /// Wrong item or empty space; the window stays open.
    Miss,
    /// The window already resolved, nothing changes.
    Closed,
}

/// One "pick the target" episode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseWindow {
    target: ItemIndex,
    elapsed_ticks: u32,
    state: WindowState,
}

impl ResponseWindow {
    pub fn open(target: ItemIndex) -> Self {
        Self {
            target,
            elapsed_ticks: 0,
            state: WindowState::Open,
        }
    }

    pub fn target(&self) -> ItemIndex {
        self.target
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == WindowState::Open
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    pub fn tick(&mut self) {
        if self.is_open() {
            self.elapsed_ticks += 1;
        }
    }

    pub fn resolve(&mut self, picked: Option<ItemIndex>) -> PickOutcome {
        if !self.is_open() {
            return PickOutcome::Closed;
        }
        if picked == Some(self.target) {
            self.state = WindowState::Hit;
            PickOutcome::Hit {
                elapsed_ticks: self.elapsed_ticks,
            }
        } else {
            PickOutcome::Miss
        }
    }

    /// Returns false if a Hit got there first.
    pub fn expire(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.state = WindowState::Expired;
        true
    }
}
