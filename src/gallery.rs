//! Destination gallery backed by a JSON manifest.
//!
//! `gallery.json` lives in the data directory next to the downloaded files:
//!
//! ```json
//! {
//!   "version": 1,
//!   "artworks": [ { "token": "79583564", "title": "...", ... } ],
//!   "deleted_ids": [ 123, 456 ]
//! }
//! ```
//!
//! The manifest doubles as the [`DuplicateRegistry`]: an artwork is a
//! duplicate if its token is listed in `artworks`, and was deleted if its id
//! is in `deleted_ids` (filled by `pixiv-fetch forget`).

use crate::registry::DuplicateRegistry;
use crate::types::ArtworkDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILENAME: &str = "gallery.json";
pub const LOCK_FILENAME: &str = ".pixiv-fetch.lock";
const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("gallery manifest {path} is unreadable: {message}")]
    Manifest { path: PathBuf, message: String },
    #[error("another run holds {0}")]
    Locked(PathBuf),
}

/// Where finished artworks are published.
pub trait Gallery {
    /// Drop everything currently shown and show `artworks` instead.
    fn replace_all(&mut self, artworks: Vec<ArtworkDescriptor>) -> Result<(), GalleryError>;
    /// Add `artworks` next to what is already shown.
    fn append(&mut self, artworks: Vec<ArtworkDescriptor>) -> Result<(), GalleryError>;
}

/// Hand a run's results to the gallery.
pub fn publish(
    gallery: &mut dyn Gallery,
    artworks: Vec<ArtworkDescriptor>,
    clear_existing: bool,
) -> Result<(), GalleryError> {
    if clear_existing {
        gallery.replace_all(artworks)
    } else {
        gallery.append(artworks)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    version: u32,
    #[serde(default)]
    artworks: Vec<ArtworkDescriptor>,
    #[serde(default)]
    deleted_ids: BTreeSet<u64>,
}

#[derive(Debug)]
pub struct GalleryManifest {
    path: PathBuf,
    artworks: Vec<ArtworkDescriptor>,
    deleted_ids: BTreeSet<u64>,
    /// Tokens of `artworks`, for registry lookups.
    tokens: HashSet<String>,
}

impl GalleryManifest {
    /// Load from `dir`. A missing manifest is an empty gallery.
    pub fn load(dir: &Path) -> Result<Self, GalleryError> {
        let path = dir.join(MANIFEST_FILENAME);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::from_parts(path, Vec::new(), BTreeSet::new()));
            }
            Err(e) => return Err(e.into()),
        };
        let file: ManifestFile =
            serde_json::from_str(&content).map_err(|e| GalleryError::Manifest {
                path: path.clone(),
                message: e.to_string(),
            })?;
        if file.version != MANIFEST_VERSION {
            return Err(GalleryError::Manifest {
                path,
                message: format!("unsupported version {}", file.version),
            });
        }
        Ok(Self::from_parts(path, file.artworks, file.deleted_ids))
    }

    fn from_parts(
        path: PathBuf,
        artworks: Vec<ArtworkDescriptor>,
        deleted_ids: BTreeSet<u64>,
    ) -> Self {
        let tokens = artworks.iter().map(|a| a.token.clone()).collect();
        Self {
            path,
            artworks,
            deleted_ids,
            tokens,
        }
    }

    pub fn artworks(&self) -> &[ArtworkDescriptor] {
        &self.artworks
    }

    pub fn deleted_ids(&self) -> &BTreeSet<u64> {
        &self.deleted_ids
    }

    /// Write via a temporary file so a crash never truncates the manifest.
    pub fn save(&self) -> Result<(), GalleryError> {
        let file = ManifestFile {
            version: MANIFEST_VERSION,
            artworks: self.artworks.clone(),
            deleted_ids: self.deleted_ids.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(io::Error::from)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Remove an artwork from the gallery and never select it again.
    ///
    /// Returns the removed descriptor, if the gallery held it. Its local file
    /// is deleted.
    pub fn forget(&mut self, id: u64) -> Result<Option<ArtworkDescriptor>, GalleryError> {
        self.deleted_ids.insert(id);
        let token = id.to_string();
        let removed = self
            .artworks
            .iter()
            .position(|a| a.token == token)
            .map(|i| self.artworks.remove(i));
        if let Some(artwork) = &removed {
            self.tokens.remove(&artwork.token);
            remove_local_file(artwork);
        }
        self.save()?;
        Ok(removed)
    }

    fn set_artworks(&mut self, artworks: Vec<ArtworkDescriptor>) {
        self.tokens = artworks.iter().map(|a| a.token.clone()).collect();
        self.artworks = artworks;
    }
}

fn remove_local_file(artwork: &ArtworkDescriptor) {
    let path = Path::new(&artwork.local_uri);
    if let Err(e) = fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        log::warn!("Could not remove {}: {}", path.display(), e);
    }
}

impl Gallery for GalleryManifest {
    fn replace_all(&mut self, artworks: Vec<ArtworkDescriptor>) -> Result<(), GalleryError> {
        let keep: HashSet<&str> = artworks.iter().map(|a| a.local_uri.as_str()).collect();
        for old in &self.artworks {
            if !keep.contains(old.local_uri.as_str()) {
                remove_local_file(old);
            }
        }
        self.set_artworks(artworks);
        self.save()
    }

    fn append(&mut self, artworks: Vec<ArtworkDescriptor>) -> Result<(), GalleryError> {
        let mut merged = std::mem::take(&mut self.artworks);
        for artwork in artworks {
            match merged.iter_mut().find(|a| a.token == artwork.token) {
                Some(existing) => *existing = artwork,
                None => merged.push(artwork),
            }
        }
        self.set_artworks(merged);
        self.save()
    }
}

impl DuplicateRegistry for GalleryManifest {
    fn is_duplicate(&self, id: u64) -> bool {
        self.tokens.contains(&id.to_string())
    }

    fn was_deleted(&self, id: u64) -> bool {
        self.deleted_ids.contains(&id)
    }
}

/// Exclusive claim on a data directory for the duration of a run.
///
/// The lock file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(dir: &Path) -> Result<Self, GalleryError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILENAME);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(GalleryError::Locked(path));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { path })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn descriptor(dir: &Path, token: &str) -> ArtworkDescriptor {
        let local = dir.join(format!("{token}.png"));
        fs::write(&local, b"img").unwrap();
        ArtworkDescriptor {
            token: token.to_string(),
            title: format!("work {token}"),
            byline: "artist".to_string(),
            attribution: String::new(),
            local_uri: local.to_string_lossy().into_owned(),
            web_uri: format!("https://www.pixiv.net/artworks/{token}"),
        }
    }

    #[test]
    fn missing_manifest_is_empty() {
        let tmp = TempDir::new().unwrap();
        let gallery = GalleryManifest::load(tmp.path()).unwrap();
        assert!(gallery.artworks().is_empty());
        assert!(!gallery.is_duplicate(1));
    }

    #[test]
    fn append_persists_and_registers_duplicates() {
        let tmp = TempDir::new().unwrap();
        let mut gallery = GalleryManifest::load(tmp.path()).unwrap();
        gallery
            .append(vec![descriptor(tmp.path(), "1"), descriptor(tmp.path(), "2")])
            .unwrap();

        let reloaded = GalleryManifest::load(tmp.path()).unwrap();
        assert_eq!(reloaded.artworks().len(), 2);
        assert!(reloaded.is_duplicate(2));
        assert!(!reloaded.is_duplicate(3));
    }

    #[test]
    fn append_same_token_replaces_entry() {
        let tmp = TempDir::new().unwrap();
        let mut gallery = GalleryManifest::load(tmp.path()).unwrap();
        gallery.append(vec![descriptor(tmp.path(), "1")]).unwrap();
        let mut updated = descriptor(tmp.path(), "1");
        updated.title = "renamed".into();
        gallery.append(vec![updated]).unwrap();

        assert_eq!(gallery.artworks().len(), 1);
        assert_eq!(gallery.artworks()[0].title, "renamed");
    }

    #[test]
    fn replace_all_removes_old_files() {
        let tmp = TempDir::new().unwrap();
        let mut gallery = GalleryManifest::load(tmp.path()).unwrap();
        let old = descriptor(tmp.path(), "1");
        let old_file = PathBuf::from(&old.local_uri);
        gallery.append(vec![old]).unwrap();

        publish(&mut gallery, vec![descriptor(tmp.path(), "2")], true).unwrap();

        assert!(!old_file.exists());
        assert_eq!(gallery.artworks().len(), 1);
        assert!(!gallery.is_duplicate(1));
        assert!(gallery.is_duplicate(2));
    }

    #[test]
    fn publish_without_clear_appends() {
        let tmp = TempDir::new().unwrap();
        let mut gallery = GalleryManifest::load(tmp.path()).unwrap();
        publish(&mut gallery, vec![descriptor(tmp.path(), "1")], false).unwrap();
        publish(&mut gallery, vec![descriptor(tmp.path(), "2")], false).unwrap();
        assert_eq!(gallery.artworks().len(), 2);
    }

    #[test]
    fn forget_marks_deleted_and_removes_file() {
        let tmp = TempDir::new().unwrap();
        let mut gallery = GalleryManifest::load(tmp.path()).unwrap();
        let d = descriptor(tmp.path(), "5");
        let file = PathBuf::from(&d.local_uri);
        gallery.append(vec![d]).unwrap();

        let removed = gallery.forget(5).unwrap();
        assert_eq!(removed.map(|a| a.token), Some("5".to_string()));
        assert!(!file.exists());

        let reloaded = GalleryManifest::load(tmp.path()).unwrap();
        assert!(reloaded.was_deleted(5));
        assert!(!reloaded.is_duplicate(5));
    }

    #[test]
    fn forget_unknown_id_still_records_it() {
        let tmp = TempDir::new().unwrap();
        let mut gallery = GalleryManifest::load(tmp.path()).unwrap();
        assert!(gallery.forget(99).unwrap().is_none());
        assert!(gallery.was_deleted(99));
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILENAME), "not json").unwrap();
        assert!(matches!(
            GalleryManifest::load(tmp.path()),
            Err(GalleryError::Manifest { .. })
        ));
    }

    #[test]
    fn run_lock_is_exclusive_and_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        let lock = RunLock::acquire(tmp.path()).unwrap();
        assert!(matches!(
            RunLock::acquire(tmp.path()),
            Err(GalleryError::Locked(_))
        ));
        drop(lock);
        assert!(RunLock::acquire(tmp.path()).is_ok());
    }
}
