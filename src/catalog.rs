/* ------------ 音樂目錄掃描 ------------ */
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const MEDIA_EXTS: &[&str] = &[
    "mp3", "wav", "flac", "ogg", "m4a", "mp4", "mkv", "avi", "mov", "webm", "wmv",
];

#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub id:       String,
    pub title:    String,
    pub artist:   String,
    pub album:    String,
    pub duration: u32,
    pub is_video: bool,
    #[serde(skip)]
    pub path:     PathBuf,
}

impl Track {
    fn from_path(root: &Path, path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (artist, title) = match stem.split_once(" - ") {
            Some((artist, title)) => (artist.trim().to_owned(), title.trim().to_owned()),
            None => ("Unknown Artist".to_owned(), stem),
        };
        let rel = path.strip_prefix(root).unwrap_or(path);
        let id = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let is_video = mime_guess::from_path(path)
            .first_raw()
            .is_some_and(|m| m.starts_with("video/"));

        Self {
            id,
            title,
            artist,
            album: "Unknown Album".into(),
            duration: 0,
            is_video,
            path: path.to_path_buf(),
        }
    }

    #[cfg(test)]
    pub fn stub(id: &str) -> Self {
        Self {
            id: id.into(),
            title: id.into(),
            artist: "Unknown Artist".into(),
            album: "Unknown Album".into(),
            duration: 0,
            is_video: false,
            path: PathBuf::from(id),
        }
    }
}

fn is_media(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| MEDIA_EXTS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Symlinks are not followed, so a link cycle under `root` cannot repeat entries.
/// Unreadable entries are logged and skipped.
fn walk(root: &Path) -> Vec<Track> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.map_err(|err| warn!("music scan error: {err}")).ok())
        .filter(|e| e.file_type().is_file() && is_media(e.path()))
        .map(|e| Track::from_path(root, e.path()))
        .collect()
}

pub struct Catalog {
    root:   PathBuf,
    tracks: RwLock<Vec<Track>>,
}

impl Catalog {
    pub fn scan(root: PathBuf) -> Self {
        let c = Self { root, tracks: RwLock::new(Vec::new()) };
        c.rescan();
        c
    }

    /// Rebuilds the track list from disk.
    pub fn rescan(&self) {
        info!("scanning music directory: {}", self.root.display());
        let mut found = walk(&self.root);
        found.sort_by(|a, b| a.id.cmp(&b.id));
        info!("found {} tracks", found.len());
        *self.tracks.write() = found;
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Track> {
        self.tracks.read().iter().find(|t| t.id == id).cloned()
    }
}
