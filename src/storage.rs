//! Download directory.
//!
//! Bodies are streamed to `<token>.part` and only renamed to their final
//! `<token>.<ext>` name once the container has been verified, so a crash or
//! cancellation never leaves a half-written file under a real name.

use crate::types::CancelToken;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CHUNK_SIZE: usize = 64 * 1024;
const PART_EXTENSION: &str = "part";

#[derive(Error, Debug)]
pub enum StoreError {
    /// Local disk problem.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The body stream broke off, usually a connection reset.
    #[error("download interrupted: {0}")]
    Read(io::Error),
    #[error("download cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct DownloadStore {
    dir: PathBuf,
}

impl DownloadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn part_path(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{token}.{PART_EXTENSION}"))
    }

    pub fn final_path(&self, token: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{token}.{extension}"))
    }

    /// Stream `body` into `<token>.part`, checking `cancel` between chunks.
    ///
    /// On any failure, cancellation included, the partial file is removed.
    pub fn write_part(
        &self,
        token: &str,
        body: &mut dyn Read,
        cancel: &CancelToken,
    ) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.part_path(token);
        match stream_to(&path, body, cancel) {
            Ok(()) => Ok(path),
            Err(e) => {
                let _ = fs::remove_file(&path);
                Err(e)
            }
        }
    }

    /// Move a verified part file to its final name, replacing any older copy.
    pub fn finalize(&self, part: &Path, token: &str, extension: &str) -> io::Result<PathBuf> {
        let target = self.final_path(token, extension);
        fs::rename(part, &target)?;
        Ok(target)
    }
}

fn stream_to(path: &Path, body: &mut dyn Read, cancel: &CancelToken) -> Result<(), StoreError> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::Read(e)),
        };
        out.write_all(&buf[..n])?;
    }
    out.flush()?;
    Ok(())
}

/// String form stored in descriptors.
pub fn local_uri(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
