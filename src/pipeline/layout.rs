//! Filesystem layout for media artifacts.
//!
//! Everything lives under one data root:
//! - `audio/originals/<id>.<ext>` uploaded source files
//! - `audio/<id>.mp3`             transcoded playable output
//! - `peaks/<id>.json`            waveform peak data
//! - `art/<id>.jpg`               square track cover art
//! - `art/collections/<id>.jpg`   collection cover art
//!
//! Paths handed to external tools are derived here, keyed by entity id,
//! never from user input.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct MediaLayout {
    data_root: PathBuf,
}

impl MediaLayout {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    fn audio_dir(&self) -> PathBuf {
        self.data_root.join("audio")
    }

    fn originals_dir(&self) -> PathBuf {
        self.audio_dir().join("originals")
    }

    fn peaks_dir(&self) -> PathBuf {
        self.data_root.join("peaks")
    }

    fn art_dir(&self) -> PathBuf {
        self.data_root.join("art")
    }

    fn collection_art_dir(&self) -> PathBuf {
        self.art_dir().join("collections")
    }

    /// Create all artifact directories. Safe to call repeatedly.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.originals_dir(),
            self.audio_dir(),
            self.peaks_dir(),
            self.art_dir(),
            self.collection_art_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Where an uploaded source file is stored. The extension comes from
    /// the original filename; without one the file is stored bare.
    pub fn original_path(&self, track_id: &str, extension: Option<&str>) -> PathBuf {
        let name = match extension {
            Some(ext) => format!("{}.{}", track_id, ext),
            None => track_id.to_string(),
        };
        self.originals_dir().join(name)
    }

    pub fn mp3_path(&self, track_id: &str) -> PathBuf {
        self.audio_dir().join(format!("{}.mp3", track_id))
    }

    pub fn peaks_path(&self, track_id: &str) -> PathBuf {
        self.peaks_dir().join(format!("{}.json", track_id))
    }

    /// Track cover art location.
    pub fn art_path(&self, track_id: &str) -> PathBuf {
        self.art_dir().join(format!("{}.jpg", track_id))
    }

    /// Collection cover art location, kept apart from track art so the
    /// two id spaces cannot shadow each other.
    pub fn collection_art_path(&self, collection_id: &str) -> PathBuf {
        self.collection_art_dir().join(format!("{}.jpg", collection_id))
    }

    /// Persist an uploaded source file under `audio/originals/`.
    pub fn save_original(
        &self,
        track_id: &str,
        extension: Option<&str>,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(self.originals_dir())?;
        let path = self.original_path(track_id, extension);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Delete the stored originals of a track, whatever their extension.
    /// Used on re-upload so a replacement with a different extension does
    /// not leave the old source behind.
    pub fn remove_originals(&self, track_id: &str) -> std::io::Result<()> {
        for original in self.originals_for(track_id)? {
            remove_file_if_exists(&original)?;
        }
        Ok(())
    }

    /// Delete every artifact of a track: MP3, peaks, art and any stored
    /// originals. Missing files are fine.
    pub fn remove_track_files(&self, track_id: &str) -> std::io::Result<()> {
        remove_file_if_exists(&self.mp3_path(track_id))?;
        remove_file_if_exists(&self.peaks_path(track_id))?;
        remove_file_if_exists(&self.art_path(track_id))?;
        self.remove_originals(track_id)
    }

    /// Lexical containment check: does the path stay inside the data root
    /// after resolving `.` and `..` components? Works for paths that do
    /// not exist yet, which rules out symlink resolution on purpose.
    pub fn contains(&self, path: &Path) -> bool {
        normalize(path).starts_with(normalize(&self.data_root))
    }

    /// Source files stored for a track, matched by `<id>.` filename prefix.
    /// Used when deleting a track to find originals of any extension.
    pub fn originals_for(&self, track_id: &str) -> std::io::Result<Vec<PathBuf>> {
        let prefix = format!("{}.", track_id);
        let mut found = Vec::new();

        let entries = match std::fs::read_dir(self.originals_dir()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(err) => return Err(err),
        };
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                found.push(entry.path());
            }
        }
        Ok(found)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

pub(crate) fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_are_keyed_by_id() {
        let layout = MediaLayout::new("/data");
        assert_eq!(
            layout.original_path("t1", Some("flac")),
            PathBuf::from("/data/audio/originals/t1.flac")
        );
        assert_eq!(
            layout.original_path("t1", None),
            PathBuf::from("/data/audio/originals/t1")
        );
        assert_eq!(layout.mp3_path("t1"), PathBuf::from("/data/audio/t1.mp3"));
        assert_eq!(layout.peaks_path("t1"), PathBuf::from("/data/peaks/t1.json"));
        assert_eq!(layout.art_path("t1"), PathBuf::from("/data/art/t1.jpg"));
        assert_eq!(
            layout.collection_art_path("c1"),
            PathBuf::from("/data/art/collections/c1.jpg")
        );
    }

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let layout = MediaLayout::new(tmp.path());

        layout.ensure_dirs().unwrap();
        layout.ensure_dirs().unwrap();

        assert!(tmp.path().join("audio/originals").is_dir());
        assert!(tmp.path().join("peaks").is_dir());
        assert!(tmp.path().join("art/collections").is_dir());
    }

    #[test]
    fn test_save_and_remove_track_files() {
        let tmp = TempDir::new().unwrap();
        let layout = MediaLayout::new(tmp.path());
        layout.ensure_dirs().unwrap();

        let saved = layout.save_original("t1", Some("flac"), b"flacdata").unwrap();
        assert_eq!(saved, layout.original_path("t1", Some("flac")));
        assert_eq!(std::fs::read(&saved).unwrap(), b"flacdata");

        std::fs::write(layout.mp3_path("t1"), b"mp3").unwrap();
        std::fs::write(layout.art_path("t1"), b"art").unwrap();

        layout.remove_track_files("t1").unwrap();
        assert!(!saved.exists());
        assert!(!layout.mp3_path("t1").exists());
        assert!(!layout.art_path("t1").exists());

        // removing again is harmless
        layout.remove_track_files("t1").unwrap();
    }

    #[test]
    fn test_containment() {
        let layout = MediaLayout::new("/data");

        assert!(layout.contains(Path::new("/data/audio/t1.mp3")));
        assert!(layout.contains(Path::new("/data/audio/./originals/t1.wav")));

        assert!(!layout.contains(Path::new("/etc/passwd")));
        assert!(!layout.contains(Path::new("/data/audio/../../etc/passwd")));
        // sibling directory sharing the prefix string is outside
        assert!(!layout.contains(Path::new("/database/t1.mp3")));
        // relative paths never qualify
        assert!(!layout.contains(Path::new("data/audio/t1.mp3")));
    }

    #[test]
    fn test_originals_for_matches_prefix() {
        let tmp = TempDir::new().unwrap();
        let layout = MediaLayout::new(tmp.path());
        layout.ensure_dirs().unwrap();

        std::fs::write(layout.original_path("t1", Some("wav")), b"a").unwrap();
        std::fs::write(layout.original_path("t1", Some("flac")), b"b").unwrap();
        std::fs::write(layout.original_path("t10", Some("wav")), b"c").unwrap();

        let mut found = layout.originals_for("t1").unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![
                layout.original_path("t1", Some("flac")),
                layout.original_path("t1", Some("wav")),
            ]
        );
    }

    #[test]
    fn test_originals_for_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let layout = MediaLayout::new(tmp.path().join("nope"));
        assert!(layout.originals_for("t1").unwrap().is_empty());
    }
}
