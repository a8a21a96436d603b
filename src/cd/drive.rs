//! CD drive access and the disc reading capability

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscReadError {
    #[error("No disc in drive {0}")]
    NoDisc(String),
    #[error("Disc tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },
    #[error("Could not read the TOC: {0}")]
    Toc(String),
    #[error("DiscID error: {0}")]
    DiscId(String),
    #[error("DiscID changed between reads ({first} then {second})")]
    Unstable { first: String, second: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Offsets as reported by the drive, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToc {
    pub track_offsets: Vec<u32>,
    pub leadout: u32,
}

/// Capability to read a disc's layout and ISRCs.
///
/// Implementations are picked by the front end; the reconciliation code only
/// sees this trait.
pub trait DiscReader {
    fn read_toc(&mut self) -> Result<RawToc, DiscReadError>;

    /// ISRC for one track as the drive reports it, unvalidated
    fn read_isrc(&mut self, track: u8) -> Result<Option<String>, DiscReadError>;
}

/// Represents a CD drive
#[derive(Debug, Clone)]
pub struct CdDrive {
    pub device_path: PathBuf,
}

impl CdDrive {
    pub fn new(device_path: impl Into<PathBuf>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }

    /// Default device for the platform
    pub fn default_device() -> CdDrive {
        let device = if cfg!(target_os = "windows") {
            "D:"
        } else if cfg!(target_os = "macos") {
            // drutil numbering
            "1"
        } else {
            "/dev/cdrom"
        };
        CdDrive::new(device)
    }

    pub fn device(&self) -> String {
        self.device_path.to_string_lossy().to_string()
    }
}
