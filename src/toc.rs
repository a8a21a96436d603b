//! Disc table of contents and MusicBrainz DiscID calculation

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha1::{Digest, Sha1};
use std::fmt;
use thiserror::Error;

/// Highest track number a CD can carry
pub const MAX_TRACKS: usize = 99;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTocError {
    #[error("Invalid track count {0} (must be between 1 and 99)")]
    TrackCount(usize),
    #[error("Track {track} offset {offset} is not after the previous track offset {previous}")]
    NotIncreasing { track: u8, offset: u32, previous: u32 },
    #[error("Lead-out offset {leadout} must be greater than the last track offset {last}")]
    Leadout { leadout: u32, last: u32 },
}

/// Normalized table of contents of an audio CD.
///
/// Offsets are absolute sector addresses (including the 150-sector lead-in),
/// which is how libdiscid and MusicBrainz express them. Tracks are always
/// numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Toc {
    track_offsets: Vec<u32>,
    leadout: u32,
}

impl Toc {
    /// Validate raw offsets and build a TOC
    pub fn normalize(track_offsets: &[u32], leadout: u32) -> Result<Toc, InvalidTocError> {
        if track_offsets.is_empty() || track_offsets.len() > MAX_TRACKS {
            return Err(InvalidTocError::TrackCount(track_offsets.len()));
        }

        for (i, pair) in track_offsets.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(InvalidTocError::NotIncreasing {
                    track: (i + 2) as u8,
                    offset: pair[1],
                    previous: pair[0],
                });
            }
        }

        let last = track_offsets[track_offsets.len() - 1];
        if leadout <= last {
            return Err(InvalidTocError::Leadout { leadout, last });
        }

        Ok(Toc {
            track_offsets: track_offsets.to_vec(),
            leadout,
        })
    }

    pub fn track_count(&self) -> u8 {
        self.track_offsets.len() as u8
    }

    pub fn track_offsets(&self) -> &[u32] {
        &self.track_offsets
    }

    pub fn leadout(&self) -> u32 {
        self.leadout
    }

    /// Track numbers present on the disc, in order
    pub fn track_numbers(&self) -> impl Iterator<Item = u8> {
        1..=self.track_count()
    }

    /// Calculate the MusicBrainz DiscID for this TOC
    pub fn identifier(&self) -> DiscIdentifier {
        let mut hasher = Sha1::new();
        hasher.update(format!("{:02X}", 1));
        hasher.update(format!("{:02X}", self.track_count()));
        hasher.update(format!("{:08X}", self.leadout));
        for i in 0..MAX_TRACKS {
            let offset = self.track_offsets.get(i).copied().unwrap_or(0);
            hasher.update(format!("{:08X}", offset));
        }
        let digest = hasher.finalize();

        let encoded: String = STANDARD
            .encode(digest)
            .chars()
            .map(|c| match c {
                '+' => '.',
                '/' => '_',
                '=' => '-',
                other => other,
            })
            .collect();

        DiscIdentifier(encoded)
    }

    /// TOC in MusicBrainz notation: `first last leadout offset1 offset2 ...`
    pub fn toc_string(&self) -> String {
        let mut parts = vec![
            "1".to_string(),
            self.track_count().to_string(),
            self.leadout.to_string(),
        ];
        parts.extend(self.track_offsets.iter().map(|o| o.to_string()));
        parts.join(" ")
    }

    /// URL of the page that attaches this disc to a release on `server`
    pub fn submission_url(&self, server: &str) -> String {
        format!(
            "https://{}/cdtoc/attach?id={}&tracks={}&toc={}",
            server,
            self.identifier(),
            self.track_count(),
            self.toc_string().replace(' ', "+")
        )
    }
}

/// MusicBrainz DiscID: a 28 character digest of a [`Toc`], used as a lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscIdentifier(String);

impl DiscIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiscIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
