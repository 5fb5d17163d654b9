use anyhow::Result;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::command::{CommandSlot, TransportCommand};
use super::playlist::Playlist;
use super::session::{PlaybackSession, SessionState};
use super::transport::AudioTransport;
use crate::config::{PlaybackConfig, PreviousPolicy};
use crate::error::PlaybackError;
use crate::hardware::{bank_ids, BankId, OutputDriver};
use crate::profile::{ProfileSource, SongProfile};

/// Time source for the playback loop.
pub trait Clock: Send {
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
}

#[derive(Clone, Copy, Debug)]
pub struct SyncOptions {
    pub on_fraction: f64,
    pub pause_poll: Duration,
    pub previous_policy: PreviousPolicy,
}

impl From<&PlaybackConfig> for SyncOptions {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            on_fraction: config.on_fraction,
            pause_poll: Duration::from_millis(config.pause_poll_ms),
            previous_policy: config.previous_policy,
        }
    }
}

/// How a track's session ended.
#[derive(Debug)]
enum TrackEnd {
    Finished,
    Next,
    Previous,
    Shutdown,
    /// No profile could be produced.
    Unplayable,
    Failed(PlaybackError),
}

/// Plays each track's profile against the audio transport, one chunk at a
/// time, servicing transport commands at chunk boundaries.
pub struct Synchronizer {
    output: Box<dyn OutputDriver>,
    transport: Box<dyn AudioTransport>,
    clock: Box<dyn Clock>,
    banks: Vec<BankId>,
    commands: CommandSlot,
    options: SyncOptions,
    state: SyncState,
    shutdown: Arc<AtomicBool>,
}

impl Synchronizer {
    pub fn new(
        output: Box<dyn OutputDriver>,
        transport: Box<dyn AudioTransport>,
        clock: Box<dyn Clock>,
        bank_count: usize,
        commands: CommandSlot,
        options: SyncOptions,
    ) -> Self {
        Self {
            output,
            transport,
            clock,
            banks: bank_ids(bank_count),
            commands,
            options,
            state: SyncState::Idle,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag stops playback at the next boundary.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    #[cfg(test)]
    pub fn state(&self) -> SyncState {
        self.state
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Play the playlist until shutdown. Returns an error only when every
    /// track in a row has failed to load.
    pub fn run(&mut self, playlist: &mut Playlist, profiles: &mut dyn ProfileSource) -> Result<()> {
        if playlist.is_empty() {
            anyhow::bail!("Playlist is empty");
        }
        let mut failures = 0;

        while !self.shutting_down() {
            let Some(track) = playlist.current().map(Path::to_path_buf) else {
                break;
            };
            self.state = SyncState::Loading;
            log::info!(
                "[{}/{}] Loading {}",
                playlist.index() + 1,
                playlist.len(),
                track.display()
            );

            let end = match profiles.profile_for(&track) {
                Ok(profile) => self.play_track(&track, profile),
                Err(e) => {
                    log::warn!("Skipping {}: {}", track.display(), e);
                    TrackEnd::Unplayable
                }
            };

            match end {
                TrackEnd::Finished | TrackEnd::Next => {
                    failures = 0;
                    playlist.advance();
                }
                TrackEnd::Previous => {
                    failures = 0;
                    match self.options.previous_policy {
                        PreviousPolicy::Retreat => playlist.retreat(),
                        PreviousPolicy::Restart => {}
                    }
                }
                TrackEnd::Failed(e) => {
                    log::error!("Abandoning {}: {}", track.display(), e);
                    failures = 0;
                    playlist.advance();
                }
                TrackEnd::Unplayable => {
                    failures += 1;
                    if failures >= playlist.len() {
                        self.state = SyncState::Idle;
                        anyhow::bail!("None of the {} track(s) could be loaded", playlist.len());
                    }
                    playlist.advance();
                }
                TrackEnd::Shutdown => break,
            }
        }

        self.state = SyncState::Idle;
        log::info!("Playback stopped");
        Ok(())
    }

    fn play_track(&mut self, track: &Path, profile: Arc<SongProfile>) -> TrackEnd {
        if self.shutting_down() {
            return TrackEnd::Shutdown;
        }
        let mut session = PlaybackSession::new(profile);
        if let Err(e) = self.start_transport(track) {
            self.teardown(&mut session);
            return TrackEnd::Failed(e);
        }
        self.state = SyncState::Playing;
        log::info!(
            "Playing '{}': {} chunks, {:.0} BPM",
            session.title(),
            session.profile().chunk_count(),
            session.profile().tempo
        );

        let lead_in = session.take_lead_in();
        self.clock.sleep(lead_in);

        let end = loop {
            if self.shutting_down() {
                break TrackEnd::Shutdown;
            }
            if let Some(cmd) = self.commands.take() {
                if let Some(end) = self.handle_command(cmd, &mut session) {
                    break end;
                }
            }
            if session.is_finished() {
                break self.play_out(&mut session);
            }
            if let Err(e) = self.emit_chunk(&mut session) {
                break TrackEnd::Failed(e);
            }
        };

        self.teardown(&mut session);
        end
    }

    /// Lights stay off while the audio after the last chunk finishes.
    fn play_out(&mut self, session: &mut PlaybackSession) -> TrackEnd {
        let mut left = session.remaining();
        let slice = self.options.pause_poll.max(Duration::from_millis(1));
        while !left.is_zero() {
            if self.shutting_down() {
                return TrackEnd::Shutdown;
            }
            if let Some(cmd) = self.commands.take() {
                if let Some(end) = self.handle_command(cmd, session) {
                    return end;
                }
            }
            let step = left.min(slice);
            self.clock.sleep(step);
            left -= step;
        }
        TrackEnd::Finished
    }

    fn start_transport(&mut self, track: &Path) -> Result<(), PlaybackError> {
        retry_once("load", || self.transport.load(track))
            .and_then(|()| retry_once("play", || self.transport.play()))
            .map_err(|e| PlaybackError::TransportUnavailable(format!("{}: {:#}", track.display(), e)))
    }

    fn handle_command(
        &mut self,
        cmd: TransportCommand,
        session: &mut PlaybackSession,
    ) -> Option<TrackEnd> {
        log::info!("{:?} while {:?} at chunk {}", cmd, self.state, session.chunk_index());
        match cmd {
            TransportCommand::Next => Some(TrackEnd::Next),
            TransportCommand::Previous => Some(TrackEnd::Previous),
            TransportCommand::TogglePause => self.pause(session),
        }
    }

    /// Hold at the current chunk until toggled again. Returns the track's end
    /// if another command or shutdown arrives while paused.
    fn pause(&mut self, session: &mut PlaybackSession) -> Option<TrackEnd> {
        session.set_state(SessionState::Paused);
        self.state = SyncState::Paused;
        if let Err(e) = self.clear_all() {
            return Some(TrackEnd::Failed(e));
        }
        if let Err(e) = retry_once("pause", || self.transport.pause()) {
            log::warn!("Transport did not pause: {:#}", e);
        }

        loop {
            if self.shutting_down() {
                return Some(TrackEnd::Shutdown);
            }
            match self.commands.wait(self.options.pause_poll) {
                Some(TransportCommand::TogglePause) => break,
                Some(TransportCommand::Next) => return Some(TrackEnd::Next),
                Some(TransportCommand::Previous) => return Some(TrackEnd::Previous),
                None => {}
            }
        }

        if let Err(e) = retry_once("resume", || self.transport.resume()) {
            return Some(TrackEnd::Failed(PlaybackError::TransportUnavailable(format!(
                "{:#}",
                e
            ))));
        }
        session.set_state(SessionState::Playing);
        self.state = SyncState::Playing;
        log::info!("Resumed at chunk {}", session.chunk_index());
        None
    }

    fn emit_chunk(&mut self, session: &mut PlaybackSession) -> Result<(), PlaybackError> {
        let (on, off) = session.current_timing(self.options.on_fraction);
        for (&bank, &code) in self.banks.iter().zip(session.current_codes()) {
            retry_once("write", || self.output.write(bank, code))
                .map_err(|e| PlaybackError::OutputDriverUnavailable(format!("{}: {:#}", bank, e)))?;
        }
        self.clock.sleep(on);

        session.set_state(SessionState::Advancing);
        self.clear_all()?;
        self.clock.sleep(off);
        session.advance();
        Ok(())
    }

    fn clear_all(&mut self) -> Result<(), PlaybackError> {
        for &bank in &self.banks {
            retry_once("clear", || self.output.clear(bank))
                .map_err(|e| PlaybackError::OutputDriverUnavailable(format!("{}: {:#}", bank, e)))?;
        }
        Ok(())
    }

    /// Lights off first, then the player.
    fn teardown(&mut self, session: &mut PlaybackSession) {
        log::debug!(
            "Tearing down '{}' ({:?} at chunk {})",
            session.title(),
            session.state(),
            session.chunk_index()
        );
        if let Err(e) = self.clear_all() {
            log::error!("{}", e);
        }
        if let Err(e) = self.transport.stop() {
            log::warn!("Transport did not stop cleanly: {:#}", e);
        }
        session.set_state(SessionState::Stopped);
        self.state = SyncState::Stopped;
    }
}

fn retry_once(what: &str, mut op: impl FnMut() -> Result<()>) -> Result<()> {
    op().or_else(|e| {
        log::warn!("{} failed ({:#}), retrying once", what, e);
        op()
    })
}
