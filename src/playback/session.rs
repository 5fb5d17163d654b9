use std::sync::Arc;
use std::time::Duration;

use crate::profile::{LightCode, SongProfile};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Playing,
    Paused,
    /// Lights are off and the cursor is moving to the next chunk.
    Advancing,
    Stopped,
}

/// One track being played: the shared profile plus a chunk cursor.
#[derive(Debug)]
pub struct PlaybackSession {
    profile: Arc<SongProfile>,
    chunk_index: usize,
    state: SessionState,
    /// Lead-in plus every chunk advanced past.
    played: Duration,
}

impl PlaybackSession {
    pub fn new(profile: Arc<SongProfile>) -> Self {
        Self {
            profile,
            chunk_index: 0,
            state: SessionState::Playing,
            played: Duration::ZERO,
        }
    }

    pub fn profile(&self) -> &SongProfile {
        &self.profile
    }

    pub fn title(&self) -> &str {
        &self.profile.title
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn is_finished(&self) -> bool {
        self.chunk_index >= self.profile.chunk_count()
    }

    /// Silence before the first beat. Counts as played once taken.
    pub fn take_lead_in(&mut self) -> Duration {
        let lead_in = seconds(self.profile.chunk_durations.first().copied().unwrap_or(0.0));
        self.played += lead_in;
        lead_in
    }

    /// Audio left after the chunks played so far.
    pub fn remaining(&self) -> Duration {
        seconds(self.profile.duration).saturating_sub(self.played)
    }

    pub fn current_codes(&self) -> &[LightCode] {
        self.profile
            .light_codes
            .get(self.chunk_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Lights-on and lights-off spans of the current chunk.
    pub fn current_timing(&self, on_fraction: f64) -> (Duration, Duration) {
        let total = self
            .profile
            .chunk_durations
            .get(self.chunk_index)
            .copied()
            .unwrap_or(0.0);
        let on_fraction = on_fraction.clamp(0.0, 1.0);
        (seconds(total * on_fraction), seconds(total * (1.0 - on_fraction)))
    }

    pub fn advance(&mut self) {
        if let Some(&d) = self.profile.chunk_durations.get(self.chunk_index) {
            self.played += seconds(d);
        }
        self.chunk_index += 1;
        self.state = if self.is_finished() {
            SessionState::Stopped
        } else {
            SessionState::Playing
        };
    }
}

fn seconds(s: f64) -> Duration {
    if s.is_finite() && s > 0.0 {
        Duration::from_secs_f64(s)
    } else {
        Duration::ZERO
    }
}
