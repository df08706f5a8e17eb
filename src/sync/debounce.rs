use std::time::{Duration, Instant};

/// One gate per watch registration, shared by every file under it.
///
/// An event is accepted when no event was accepted in the preceding
/// `window`. Edits to different files inside one window are coalesced,
/// so a later edit to a second file can be missed until it changes again.
#[derive(Debug, Clone)]
pub struct DebounceGate {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn try_accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted
            && now.saturating_duration_since(last) < self.window
        {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}
