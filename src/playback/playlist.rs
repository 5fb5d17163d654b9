use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};

/// Ordered tracks with a cursor.
#[derive(Clone, Debug, Default)]
pub struct Playlist {
    tracks: Vec<PathBuf>,
    index: usize,
}

impl Playlist {
    pub fn new(tracks: Vec<PathBuf>) -> Self {
        Self { tracks, index: 0 }
    }

    /// Files in `dir` with extension `extension` (case-insensitive), sorted
    /// by name and optionally shuffled.
    pub fn discover(dir: &Path, extension: &str, shuffle: bool) -> Result<Self> {
        let wanted = extension.trim_start_matches('.').to_ascii_lowercase();
        let mut tracks = Vec::new();

        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read playlist directory: {}", dir.display()))?
        {
            let path = entry?.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.to_ascii_lowercase() == wanted);
            if matches && path.is_file() {
                tracks.push(path);
            }
        }
        tracks.sort();

        if shuffle {
            tracks.shuffle(&mut rand::rng());
        }

        log::info!("Found {} .{} track(s) in {}", tracks.len(), wanted, dir.display());
        Ok(Self::new(tracks))
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Path> {
        self.tracks.get(self.index).map(PathBuf::as_path)
    }

    /// Wraps to the first track after the last.
    pub fn advance(&mut self) {
        if !self.tracks.is_empty() {
            self.index = (self.index + 1) % self.tracks.len();
        }
    }

    /// Stops at the first track.
    pub fn retreat(&mut self) {
        self.index = self.index.saturating_sub(1);
    }
}
