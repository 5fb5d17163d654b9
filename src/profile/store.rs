use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::model::SongProfile;
use crate::error::AnalysisError;

const EXTENSION: &str = "profile";

/// Song profiles cached as JSON, one `<title>.profile` file per track.
#[derive(Clone, Debug)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, title: &str) -> PathBuf {
        let name: String = title
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }

    /// `Ok(None)` on a cache miss. A file that exists but does not hold a
    /// valid profile for `title` is [`AnalysisError::CacheCorrupt`].
    pub fn load(&self, title: &str) -> Result<Option<SongProfile>, AnalysisError> {
        let path = self.path_for(title);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| AnalysisError::CacheCorrupt {
            path: path.clone(),
            reason,
        };

        let profile: SongProfile =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;
        profile.validate().map_err(&corrupt)?;
        if profile.title != title {
            return Err(corrupt(format!("holds profile for '{}'", profile.title)));
        }

        log::debug!("Loaded cached profile {}", path.display());
        Ok(Some(profile))
    }

    /// Write to a sibling temp file, then rename over the entry.
    pub fn save(&self, profile: &SongProfile) -> Result<(), AnalysisError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&profile.title);
        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));

        let result = (|| -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, profile)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            std::fs::rename(&tmp, &path)
        })();

        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::info!("Cached profile for '{}' at {}", profile.title, path.display());
        Ok(())
    }
}
