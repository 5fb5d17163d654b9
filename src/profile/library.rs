use std::path::Path;
use std::sync::Arc;

use super::model::SongProfile;
use super::store::ProfileStore;
use crate::audio::analysis;
use crate::audio::beats::BeatTracker;
use crate::audio::decode::decode_audio;
use crate::error::AnalysisError;

/// Resolves a track to its profile.
pub trait ProfileSource {
    fn profile_for(&mut self, track: &Path) -> Result<Arc<SongProfile>, AnalysisError>;
}

/// Cache key for a track: the file name without extension.
pub fn title_for(track: &Path) -> String {
    track
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| track.display().to_string())
}

/// Serves profiles from the store, analyzing and caching on a miss.
pub struct CachedAnalyzer {
    store: ProfileStore,
    band_edges: Vec<f64>,
    tracker: Box<dyn BeatTracker>,
}

impl CachedAnalyzer {
    pub fn new(store: ProfileStore, band_edges: Vec<f64>, tracker: Box<dyn BeatTracker>) -> Self {
        Self {
            store,
            band_edges,
            tracker,
        }
    }

    pub fn load_or_analyze(&self, track: &Path) -> Result<SongProfile, AnalysisError> {
        let title = title_for(track);

        match self.store.load(&title) {
            Ok(Some(profile)) if profile.band_edges == self.band_edges => {
                log::info!("Cache hit for '{}'", title);
                return Ok(profile);
            }
            Ok(Some(_)) => log::info!("Cached profile for '{}' uses other band edges, re-analyzing", title),
            Ok(None) => log::info!("No cached profile for '{}', analyzing", title),
            Err(e @ AnalysisError::CacheCorrupt { .. }) => log::warn!("{}; re-analyzing", e),
            Err(e) => return Err(e),
        }

        let audio = decode_audio(track).map_err(|e| AnalysisError::Decode {
            path: track.to_path_buf(),
            message: format!("{:#}", e),
        })?;
        let profile = analysis::analyze(&title, &audio, &self.band_edges, self.tracker.as_ref())?;

        if let Err(e) = self.store.save(&profile) {
            log::warn!("Could not cache profile for '{}': {}", title, e);
        }
        Ok(profile)
    }
}

impl ProfileSource for CachedAnalyzer {
    fn profile_for(&mut self, track: &Path) -> Result<Arc<SongProfile>, AnalysisError> {
        self.load_or_analyze(track).map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::beats::tests::FixedBeats;
    use crate::test_util::{temp_dir, write_wav};

    const EDGES: [f64; 5] = [0.0, 110.0, 410.0, 700.0, 20000.0];

    fn analyzer(name: &str) -> (CachedAnalyzer, std::path::PathBuf) {
        let root = temp_dir(name);
        let store = ProfileStore::new(root.join("cache"));
        let tracker = Box::new(FixedBeats(vec![0.0, 0.5, 1.0]));
        (CachedAnalyzer::new(store, EDGES.to_vec(), tracker), root)
    }

    fn tone(path: &Path) {
        let samples: Vec<f32> = (0..16000)
            .map(|i| (2.0 * std::f64::consts::PI * 300.0 * i as f64 / 8000.0).sin() as f32 * 0.8)
            .collect();
        write_wav(path, 8000, &samples);
    }

    #[test]
    fn title_is_file_stem() {
        assert_eq!(title_for(Path::new("/music/Blue Monday.wav")), "Blue Monday");
        assert_eq!(title_for(Path::new("track.tar.wav")), "track.tar");
    }

    #[test]
    fn miss_analyzes_and_caches() {
        let (analyzer, root) = analyzer("library-miss");
        let track = root.join("tone.wav");
        tone(&track);

        let profile = analyzer.load_or_analyze(&track).unwrap();
        assert_eq!(profile.title, "tone");
        assert_eq!(profile.sample_rate, 8000);
        assert_eq!(profile.chunk_durations, vec![0.0, 0.5, 0.5]);
        assert_eq!(profile.light_codes[0][1].level(), 8);
        assert!(analyzer.store.path_for("tone").exists());

        // Second request is served from the cache even without the audio.
        std::fs::remove_file(&track).unwrap();
        assert_eq!(analyzer.load_or_analyze(&track).unwrap(), profile);
    }

    #[test]
    fn corrupt_cache_is_recomputed() {
        let (analyzer, root) = analyzer("library-corrupt");
        let track = root.join("tone.wav");
        tone(&track);
        std::fs::create_dir_all(analyzer.store.dir()).unwrap();
        std::fs::write(analyzer.store.path_for("tone"), b"not json").unwrap();

        let profile = analyzer.load_or_analyze(&track).unwrap();
        assert_eq!(analyzer.store.load("tone").unwrap(), Some(profile));
    }

    #[test]
    fn undecodable_track_is_a_decode_error() {
        let (analyzer, root) = analyzer("library-decode");
        let track = root.join("missing.wav");
        assert!(matches!(
            analyzer.load_or_analyze(&track).unwrap_err(),
            AnalysisError::Decode { .. }
        ));
    }

    #[test]
    fn changed_band_edges_force_reanalysis() {
        let (analyzer, root) = analyzer("library-stale");
        let track = root.join("tone.wav");
        tone(&track);
        let first = analyzer.load_or_analyze(&track).unwrap();

        let narrower = CachedAnalyzer::new(
            analyzer.store.clone(),
            vec![0.0, 200.0, 4000.0],
            Box::new(FixedBeats(vec![0.0, 0.5, 1.0])),
        );
        let second = narrower.load_or_analyze(&track).unwrap();
        assert_ne!(first.band_edges, second.band_edges);
        assert_eq!(second.light_codes[0].len(), 2);
    }
}
