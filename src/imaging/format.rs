//! Container identification and truncation detection.
//!
//! Large image bodies are regularly cut short by a connection reset without
//! the transport reporting an error. The header survives, the trailer does
//! not, so checking the terminating bytes is the only reliable way to tell a
//! complete download from a truncated one.
//!
//! | Container | Header | Trailer |
//! |---|---|---|
//! | PNG | `89 50` | `49 45 4E 44` (`IEND`) starting 8 bytes before the end |
//! | JPEG | `FF D8` | `FF D9` as the final two bytes |

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

const PNG_HEADER: [u8; 2] = [0x89, 0x50];
const PNG_IEND: [u8; 4] = [0x49, 0x45, 0x4E, 0x44];
/// IEND type (4 bytes) + CRC (4 bytes).
const PNG_TRAILER_OFFSET: usize = 8;
const JPEG_HEADER: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    Png,
    Jpeg,
}

impl ContainerType {
    pub fn extension(self) -> &'static str {
        match self {
            ContainerType::Png => "png",
            ContainerType::Jpeg => "jpg",
        }
    }

    fn trailer_len(self) -> usize {
        match self {
            ContainerType::Png => PNG_TRAILER_OFFSET,
            ContainerType::Jpeg => JPEG_EOI.len(),
        }
    }
}

/// Result of looking at the first two bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identified {
    Known(ContainerType),
    Unknown,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("corrupt {container:?} file: trailer missing ({byte_length} bytes)")]
pub struct CorruptFile {
    pub container: ContainerType,
    pub byte_length: u64,
}

#[derive(Error, Debug)]
pub enum InspectError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Corrupt(#[from] CorruptFile),
}

/// Bytes known to form a complete PNG or JPEG container.
///
/// Only [`verify_trailer`] and [`inspect_file`] construct this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedImage {
    container: ContainerType,
    byte_length: u64,
}

impl VerifiedImage {
    pub fn container(&self) -> ContainerType {
        self.container
    }

    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }
}

pub fn identify(bytes: &[u8]) -> Identified {
    if bytes.starts_with(&PNG_HEADER) {
        Identified::Known(ContainerType::Png)
    } else if bytes.starts_with(&JPEG_HEADER) {
        Identified::Known(ContainerType::Jpeg)
    } else {
        Identified::Unknown
    }
}

/// Check that the stream ends with the container's end marker.
pub fn verify_trailer(bytes: &[u8], container: ContainerType) -> Result<VerifiedImage, CorruptFile> {
    let byte_length = bytes.len() as u64;
    let corrupt = CorruptFile {
        container,
        byte_length,
    };
    let Some(start) = bytes.len().checked_sub(container.trailer_len()) else {
        return Err(corrupt);
    };
    if trailer_matches(&bytes[start..], container) {
        Ok(VerifiedImage {
            container,
            byte_length,
        })
    } else {
        Err(corrupt)
    }
}

/// Identify and verify a file on disk without reading it whole.
///
/// Returns `Ok(None)` for a container this module does not know; the caller
/// decides what to do with it.
pub fn inspect_file(path: &Path) -> Result<Option<VerifiedImage>, InspectError> {
    let mut file = File::open(path)?;
    let byte_length = file.metadata()?.len();

    let mut header = [0u8; 2];
    let read = read_up_to(&mut file, &mut header)?;
    let container = match identify(&header[..read]) {
        Identified::Known(container) => container,
        Identified::Unknown => return Ok(None),
    };

    let trailer_len = container.trailer_len() as u64;
    if byte_length < trailer_len {
        return Err(CorruptFile {
            container,
            byte_length,
        }
        .into());
    }
    file.seek(SeekFrom::Start(byte_length - trailer_len))?;
    let mut trailer = vec![0u8; trailer_len as usize];
    file.read_exact(&mut trailer)?;

    if trailer_matches(&trailer, container) {
        Ok(Some(VerifiedImage {
            container,
            byte_length,
        }))
    } else {
        Err(CorruptFile {
            container,
            byte_length,
        }
        .into())
    }
}

/// `tail` is exactly the last `trailer_len` bytes of the stream.
fn trailer_matches(tail: &[u8], container: ContainerType) -> bool {
    match container {
        ContainerType::Png => tail.starts_with(&PNG_IEND),
        ContainerType::Jpeg => tail == JPEG_EOI,
    }
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
