//! Disc reading through libdiscid (the `libdiscid` feature)

use crate::cd::drive::{DiscReadError, DiscReader, RawToc};
use discid::{DiscId, Features};
use tracing::info;

/// Reads TOC and ISRCs with a single libdiscid call per read
pub struct LibdiscidReader {
    device: String,
    disc: Option<DiscId>,
}

impl LibdiscidReader {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            disc: None,
        }
    }

    fn read(&self) -> Result<DiscId, DiscReadError> {
        DiscId::read_features(Some(&self.device), Features::READ | Features::ISRC)
            .map_err(|e| DiscReadError::DiscId(format!("Failed to read disc: {}", e)))
    }
}

impl DiscReader for LibdiscidReader {
    fn read_toc(&mut self) -> Result<RawToc, DiscReadError> {
        let disc = self.read()?;
        info!("💿 libdiscid read DiscID {}", disc.id());

        let track_offsets = disc.tracks().map(|t| t.offset as u32).collect();
        let toc = RawToc {
            track_offsets,
            leadout: disc.sectors() as u32,
        };
        self.disc = Some(disc);
        Ok(toc)
    }

    fn read_isrc(&mut self, track: u8) -> Result<Option<String>, DiscReadError> {
        if self.disc.is_none() {
            self.disc = Some(self.read()?);
        }
        let Some(disc) = self.disc.as_ref() else {
            return Ok(None);
        };
        Ok(disc
            .tracks()
            .find(|t| t.number == i32::from(track))
            .map(|t| t.isrc)
            .filter(|code| !code.trim().is_empty()))
    }
}
