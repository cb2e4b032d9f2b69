//! The acquisition run: select, resolve, download, verify, crop.
//!
//! ```text
//! SelectionLoop ──► candidate ──► ExtensionResolver ──► response
//!                                                        │
//!       ArtworkDescriptor ◄── crop? ◄── verify ◄── <token>.part
//! ```
//!
//! Per item, failures fall in two classes:
//!
//! | Failure | Effect |
//! |---|---|
//! | no full-resolution image, file over the size limit, truncated or non-image download | item skipped, run continues |
//! | network failure, local disk failure, malformed catalog response | run stops, collected items are kept |
//!
//! Skips are bounded: a run makes at most [`ATTEMPTS_PER_ITEM`] × target
//! attempts so a source full of broken entries cannot keep it busy forever.
//! Retrying a stopped run is the caller's job; [`RunReport::is_retryable`]
//! says whether it is worth it.

use crate::auth::AccessTokenError;
use crate::filter;
use crate::gallery::GalleryError;
use crate::http::{HttpFetch, TransportError};
use crate::imaging::{
    BackendError, BorderDetection, ContainerType, CorruptFile, ImageBackend, InspectError,
    auto_crop, format,
};
use crate::registry::DuplicateRegistry;
use crate::resolver::{ExtensionResolver, ResolveError};
use crate::selection::{SelectionError, SelectionLoop};
use crate::source::{CandidateSource, SourceError};
use crate::storage::{self, DownloadStore, StoreError};
use crate::types::{ArtworkDescriptor, CancelToken, Candidate, FilterCriteria};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Item attempts allowed per requested artwork.
pub const ATTEMPTS_PER_ITEM: u32 = 4;

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("catalog error: {0}")]
    Source(#[from] SourceError),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("image error: {0}")]
    Imaging(#[from] BackendError),
    #[error(transparent)]
    Auth(#[from] AccessTokenError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

impl AcquireError {
    /// Whether running again later could succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquireError::Transport(_) | AcquireError::Auth(_) => true,
            AcquireError::Source(SourceError::Transport(_)) => true,
            AcquireError::Source(e @ SourceError::Status { status, .. }) => {
                // A rejected token may be refreshed before the next run.
                e.is_unauthorized() || *status == 429 || *status >= 500
            }
            AcquireError::Source(SourceError::Payload { .. }) => false,
            AcquireError::Storage(_) | AcquireError::Imaging(_) | AcquireError::Gallery(_) => {
                false
            }
        }
    }
}

/// Why a selected item produced no artwork.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No probed extension answered.
    NotFound,
    /// The thumbnail URL could not be turned into an original URL.
    InvalidUrl,
    /// `Content-Length` above the configured limit.
    FileTooLarge { bytes: u64 },
    /// The download was cut short.
    Corrupt(CorruptFile),
    /// The body is neither PNG nor JPEG.
    UnknownContainer,
}

/// Progress notifications, sent as they happen.
#[derive(Debug, Clone)]
pub enum AcquireEvent {
    Selected {
        index: u32,
        target: u32,
        id: u64,
        title: String,
    },
    Skipped {
        id: u64,
        reason: SkipReason,
    },
    Saved {
        index: u32,
        artwork: ArtworkDescriptor,
        container: ContainerType,
        byte_length: u64,
        cropped: bool,
    },
}

/// How the run ended.
#[derive(Debug)]
pub enum StopReason {
    /// Collected the requested number of artworks.
    Completed,
    /// The catalog ran out of acceptable candidates.
    SourceExhausted,
    /// Too many items were skipped.
    AttemptLimit,
    Cancelled,
    /// A network call failed.
    Transport(TransportError),
    /// Anything else that stopped the run.
    Failed(AcquireError),
}

#[derive(Debug)]
pub struct RunReport {
    pub artworks: Vec<ArtworkDescriptor>,
    /// Requested minus collected.
    pub shortfall: u32,
    pub stop: StopReason,
}

impl RunReport {
    pub fn is_retryable(&self) -> bool {
        match &self.stop {
            StopReason::Transport(_) => true,
            StopReason::Failed(e) => e.is_retryable(),
            _ => false,
        }
    }
}

enum ItemOutcome {
    Saved(SavedItem),
    Skipped(SkipReason),
    Cancelled,
}

struct SavedItem {
    path: PathBuf,
    container: ContainerType,
    byte_length: u64,
    cropped: bool,
}

/// Drives one acquisition run.
pub struct AcquisitionPipeline<'a, S, R, H, B> {
    selection: SelectionLoop<S, R>,
    resolver: ExtensionResolver<H>,
    registry: &'a dyn DuplicateRegistry,
    store: DownloadStore,
    backend: B,
    crop: Option<BorderDetection>,
    events: Option<Sender<AcquireEvent>>,
}

impl<'a, S, R, H, B> AcquisitionPipeline<'a, S, R, H, B>
where
    S: CandidateSource,
    R: Rng,
    H: HttpFetch,
    B: ImageBackend,
{
    pub fn new(
        selection: SelectionLoop<S, R>,
        resolver: ExtensionResolver<H>,
        registry: &'a dyn DuplicateRegistry,
        store: DownloadStore,
        backend: B,
    ) -> Self {
        Self {
            selection,
            resolver,
            registry,
            store,
            backend,
            crop: None,
            events: None,
        }
    }

    /// Crop uniform borders off every saved image.
    pub fn with_auto_crop(mut self, detection: BorderDetection) -> Self {
        self.crop = Some(detection);
        self
    }

    pub fn with_events(mut self, events: Sender<AcquireEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Collect up to `target_count` artworks.
    ///
    /// Only fails when nothing could be attempted at all; every other
    /// problem ends up in [`RunReport::stop`] next to what was collected.
    pub fn run(
        &mut self,
        target_count: u32,
        criteria: &FilterCriteria,
        cancel: &CancelToken,
    ) -> Result<RunReport, AcquireError> {
        std::fs::create_dir_all(self.store.dir())?;

        let max_attempts = target_count.saturating_mul(ATTEMPTS_PER_ITEM);
        let mut artworks: Vec<ArtworkDescriptor> = Vec::new();
        let mut attempts = 0u32;

        let stop = loop {
            let collected = artworks.len() as u32;
            if collected >= target_count {
                break StopReason::Completed;
            }
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if attempts >= max_attempts {
                log::warn!("Giving up after {attempts} attempts");
                break StopReason::AttemptLimit;
            }
            attempts += 1;

            let candidate = match self.selection.next_match(criteria, self.registry) {
                Ok(c) => c,
                Err(SelectionError::SourceExhausted) => break StopReason::SourceExhausted,
                Err(SelectionError::Source(SourceError::Transport(e))) => {
                    break StopReason::Transport(e);
                }
                Err(SelectionError::Source(e)) => break StopReason::Failed(e.into()),
            };
            self.emit(AcquireEvent::Selected {
                index: collected + 1,
                target: target_count,
                id: candidate.id,
                title: candidate.title.clone(),
            });

            match self.acquire_item(&candidate, criteria, cancel) {
                Ok(ItemOutcome::Saved(item)) => {
                    let artwork = self.describe(&candidate, &item.path);
                    log::info!("Saved {} to {}", candidate.id, item.path.display());
                    self.emit(AcquireEvent::Saved {
                        index: collected + 1,
                        artwork: artwork.clone(),
                        container: item.container,
                        byte_length: item.byte_length,
                        cropped: item.cropped,
                    });
                    artworks.push(artwork);
                }
                Ok(ItemOutcome::Skipped(reason)) => {
                    log::warn!("Skipping {}: {:?}", candidate.id, reason);
                    self.emit(AcquireEvent::Skipped {
                        id: candidate.id,
                        reason,
                    });
                }
                Ok(ItemOutcome::Cancelled) => break StopReason::Cancelled,
                Err(AcquireError::Transport(e)) => break StopReason::Transport(e),
                Err(e) => break StopReason::Failed(e),
            }
        };

        let shortfall = target_count.saturating_sub(artworks.len() as u32);
        log::info!(
            "Run finished with {} of {} artworks ({:?})",
            artworks.len(),
            target_count,
            stop
        );
        Ok(RunReport {
            artworks,
            shortfall,
            stop,
        })
    }

    fn acquire_item(
        &self,
        candidate: &Candidate,
        criteria: &FilterCriteria,
        cancel: &CancelToken,
    ) -> Result<ItemOutcome, AcquireError> {
        let token = candidate.token();

        let (url, mut response) = match self.resolver.resolve_candidate(candidate) {
            Ok(found) => found,
            Err(ResolveError::NotFound(_)) => return Ok(ItemOutcome::Skipped(SkipReason::NotFound)),
            Err(ResolveError::InvalidThumbnailUrl(_)) => {
                return Ok(ItemOutcome::Skipped(SkipReason::InvalidUrl));
            }
            Err(ResolveError::Transport(e)) => return Err(e.into()),
        };

        if !filter::file_size_allowed(response.content_length, criteria) {
            return Ok(ItemOutcome::Skipped(SkipReason::FileTooLarge {
                bytes: response.content_length.unwrap_or_default(),
            }));
        }
        if cancel.is_cancelled() {
            return Ok(ItemOutcome::Cancelled);
        }

        let part = match self.store.write_part(&token, &mut response.body, cancel) {
            Ok(p) => p,
            Err(StoreError::Cancelled) => return Ok(ItemOutcome::Cancelled),
            Err(StoreError::Read(e)) => {
                return Err(TransportError {
                    url,
                    message: e.to_string(),
                }
                .into());
            }
            Err(StoreError::Io(e)) => return Err(e.into()),
        };

        let (container, byte_length) = match format::inspect_file(&part) {
            Ok(Some(verified)) => (verified.container(), verified.byte_length()),
            Ok(None) => {
                log::warn!("{url} is neither PNG nor JPEG");
                discard(&part);
                return Ok(ItemOutcome::Skipped(SkipReason::UnknownContainer));
            }
            Err(InspectError::Corrupt(corrupt)) => {
                discard(&part);
                return Ok(ItemOutcome::Skipped(SkipReason::Corrupt(corrupt)));
            }
            Err(InspectError::Io(e)) => {
                discard(&part);
                return Err(e.into());
            }
        };

        if cancel.is_cancelled() {
            discard(&part);
            return Ok(ItemOutcome::Cancelled);
        }
        let mut path = self.store.finalize(&part, &token, container.extension())?;

        let mut cropped = false;
        if let Some(detection) = self.crop {
            match auto_crop(&self.backend, &path, detection) {
                Ok(Some(new_path)) => {
                    cropped = true;
                    path = new_path;
                }
                Ok(None) => {}
                Err(e) => log::warn!("Could not crop {}: {}", path.display(), e),
            }
        }

        Ok(ItemOutcome::Saved(SavedItem {
            path,
            container,
            byte_length,
            cropped,
        }))
    }

    fn describe(&self, candidate: &Candidate, path: &Path) -> ArtworkDescriptor {
        ArtworkDescriptor {
            token: candidate.token(),
            title: candidate.title.clone(),
            byline: candidate.author_name.clone(),
            attribution: self.selection.source().attribution(candidate),
            local_uri: storage::local_uri(path),
            web_uri: candidate.web_uri(),
        }
    }

    fn emit(&self, event: AcquireEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("Could not remove {}: {}", path.display(), e);
    }
}
