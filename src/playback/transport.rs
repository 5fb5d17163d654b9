use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::PlaybackError;

/// Audio playback backend. No position feedback: the synchronizer keeps
/// time from the profile alone.
pub trait AudioTransport: Send {
    fn load(&mut self, track: &Path) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

/// Keys written to the player's stdin.
#[derive(Clone, Debug)]
pub struct PlayerKeys {
    pub pause: String,
    pub resume: String,
    pub stop: String,
}

/// Plays each track in an external player process (`omxplayer`, `mpv`, ...)
/// controlled through its stdin.
pub struct ProcessTransport {
    program: PathBuf,
    args: Vec<String>,
    keys: PlayerKeys,
    track: Option<PathBuf>,
    child: Option<Child>,
    exit_grace: Duration,
}

impl ProcessTransport {
    pub fn new(command: &str, args: Vec<String>, keys: PlayerKeys) -> Result<Self, PlaybackError> {
        let program = find_program(command).ok_or_else(|| {
            PlaybackError::TransportUnavailable(format!("player '{}' not found on PATH", command))
        })?;
        log::info!("Audio transport: {} {}", program.display(), args.join(" "));
        Ok(Self {
            program,
            args,
            keys,
            track: None,
            child: None,
            exit_grace: Duration::from_secs(1),
        })
    }

    fn send_key(&mut self, key: &str) -> Result<()> {
        let child = self.child.as_mut().context("No player process running")?;
        let stdin = child.stdin.as_mut().context("Player stdin not available")?;
        stdin
            .write_all(key.as_bytes())
            .with_context(|| format!("Failed to send {:?} to player", key))?;
        stdin.flush().context("Failed to flush player stdin")?;
        Ok(())
    }
}

impl AudioTransport for ProcessTransport {
    fn load(&mut self, track: &Path) -> Result<()> {
        if self.child.is_some() {
            self.stop()?;
        }
        if !track.is_file() {
            anyhow::bail!("Track not found: {}", track.display());
        }
        self.track = Some(track.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let track = self.track.as_ref().context("No track loaded")?;
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(track)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program.display()))?;

        log::info!("Player started for {} (pid {})", track.display(), child.id());
        self.child = Some(child);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let key = self.keys.pause.clone();
        self.send_key(&key)
    }

    fn resume(&mut self) -> Result<()> {
        let key = self.keys.resume.clone();
        self.send_key(&key)
    }

    fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        // The player may already have exited at the end of the track.
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(self.keys.stop.as_bytes());
        }

        let deadline = Instant::now() + self.exit_grace;
        loop {
            if let Some(status) = child.try_wait().context("Failed to poll player")? {
                log::debug!("Player exited with {}", status);
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        log::warn!("Player did not quit, killing pid {}", child.id());
        child.kill().context("Failed to kill player")?;
        child.wait().context("Failed to reap player")?;
        Ok(())
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Failed to stop player: {:#}", e);
        }
    }
}

fn find_program(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|p| p.is_file())
}
