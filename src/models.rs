//! Local and remote views of a disc's tracks

use crate::isrc::{Isrc, MalformedIsrc};
use serde::{Deserialize, Serialize};

/// ISRC as read from the disc, before any reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalIsrc {
    Valid(Isrc),
    Malformed(MalformedIsrc),
}

impl LocalIsrc {
    pub fn from_raw(raw: &str) -> Self {
        match Isrc::parse(raw) {
            Ok(isrc) => LocalIsrc::Valid(isrc),
            Err(malformed) => LocalIsrc::Malformed(malformed),
        }
    }

    pub fn valid(&self) -> Option<&Isrc> {
        match self {
            LocalIsrc::Valid(isrc) => Some(isrc),
            LocalIsrc::Malformed(_) => None,
        }
    }
}

/// A track on the disc in the drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub number: u8,
    pub isrc: Option<LocalIsrc>,
}

impl LocalTrack {
    pub fn new(number: u8, raw_isrc: Option<&str>) -> Self {
        Self {
            number,
            isrc: raw_isrc
                .filter(|raw| !raw.trim().is_empty())
                .map(LocalIsrc::from_raw),
        }
    }
}

/// Represents a MusicBrainz release with its media and known ISRCs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub status: Option<String>,
    pub country: Option<String>,
    pub date: Option<String>,
    pub barcode: Option<String>,
    pub catalog_numbers: Vec<String>,
    pub media: Vec<Medium>,
}

impl Release {
    pub fn medium_count(&self) -> usize {
        self.media.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medium {
    pub position: u32,
    pub format: Option<String>,
    /// DiscIDs attached to this medium
    pub disc_ids: Vec<String>,
    pub tracks: Vec<RemoteTrack>,
}

impl Medium {
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Positions are unique and run 1..=N in order
    pub fn has_contiguous_positions(&self) -> bool {
        self.tracks
            .iter()
            .enumerate()
            .all(|(i, track)| track.position as usize == i + 1)
    }

    pub fn lists_disc_id(&self, disc_id: &str) -> bool {
        self.disc_ids.iter().any(|id| id == disc_id)
    }

    pub fn track_at(&self, position: u32) -> Option<&RemoteTrack> {
        self.tracks.iter().find(|t| t.position == position)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteTrack {
    pub position: u32,
    pub title: String,
    pub recording_id: String,
    /// ISRCs already attached to the recording on the server
    pub isrcs: Vec<Isrc>,
}

/// A release that structurally matches the disc, with the medium it was matched on
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRelease {
    pub release: Release,
    pub medium_index: usize,
}

impl MatchedRelease {
    pub fn medium(&self) -> &Medium {
        &self.release.media[self.medium_index]
    }

    pub fn id(&self) -> &str {
        &self.release.id
    }

    /// "Artist - Title" for display
    pub fn display_title(&self) -> String {
        format!("{} - {}", self.release.artist, self.release.title)
    }
}
