//! Turning the operator's decisions into the payload sent to the server

use crate::models::{LocalIsrc, LocalTrack, Medium};
use crate::reconcile::duplicates::{DuplicateReport, Finding};
use crate::toc::{DiscIdentifier, Toc};
use tracing::{debug, info};

/// Operator verdict for one report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the track out of the submission
    Skip,
    /// Submit the disc's code anyway
    Override,
}

/// Report entries paired with the operator's verdicts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decisions {
    entries: Vec<(Finding, Decision)>,
}

impl Decisions {
    /// Pair report entries with decisions, in report order.
    /// Entries without a decision are treated as skipped.
    pub fn new(report: &DuplicateReport, decisions: &[Decision]) -> Self {
        let entries = report
            .iter()
            .enumerate()
            .map(|(i, finding)| {
                (
                    finding.clone(),
                    decisions.get(i).copied().unwrap_or(Decision::Skip),
                )
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(Finding, Decision)] {
        &self.entries
    }

    /// `None` if no finding concerns the track, otherwise the combined verdict:
    /// the track is only submitted when every finding about it was overridden.
    pub fn for_track(&self, track: u8) -> Option<Decision> {
        let mut relevant = self
            .entries
            .iter()
            .filter(|(finding, _)| finding.concerns(track))
            .peekable();
        relevant.peek()?;
        if relevant.all(|(_, decision)| *decision == Decision::Override) {
            Some(Decision::Override)
        } else {
            Some(Decision::Skip)
        }
    }
}

/// What the composed payload is aimed at
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    /// Medium the disc was matched to (or chosen for it), if any
    pub medium: Option<&'a Medium>,
    /// Release the operator picked, if any
    pub release_id: Option<&'a str>,
    /// Whether the DiscID is already attached on the server
    pub disc_known: bool,
}

/// A code to add to one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsrcSubmission {
    pub track: u8,
    /// `None` until the disc is attached to a release
    pub recording_id: Option<String>,
    pub isrc: String,
}

/// Request to attach the DiscID to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscIdRequest {
    pub disc_id: DiscIdentifier,
    pub toc: Toc,
    pub release_id: Option<String>,
}

/// Everything that will be sent to the server. Only ever adds data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub isrcs: Vec<IsrcSubmission>,
    pub disc_id: Option<DiscIdRequest>,
}

impl SubmissionPayload {
    pub fn is_empty(&self) -> bool {
        self.isrcs.is_empty() && self.disc_id.is_none()
    }

    /// Submissions that can be sent right away
    pub fn attachable_isrcs(&self) -> impl Iterator<Item = &IsrcSubmission> {
        self.isrcs.iter().filter(|s| s.recording_id.is_some())
    }
}

/// Merge the disc's codes with server state into the minimal set of additions
pub fn compose(
    local: &[LocalTrack],
    target: Target<'_>,
    decisions: &Decisions,
    toc: &Toc,
) -> SubmissionPayload {
    let mut tracks: Vec<&LocalTrack> = local.iter().collect();
    tracks.sort_by_key(|t| t.number);

    let mut isrcs = Vec::new();
    for track in tracks {
        let Some(reading) = &track.isrc else {
            continue;
        };

        let decision = decisions.for_track(track.number);
        let code = match reading {
            LocalIsrc::Valid(isrc) => {
                if decision == Some(Decision::Skip) {
                    debug!("Skipping track {} ({})", track.number, isrc);
                    continue;
                }
                isrc.as_str().to_string()
            }
            // Only an explicit override lets a malformed code through
            LocalIsrc::Malformed(bad) => {
                if decision != Some(Decision::Override) {
                    debug!("Skipping malformed code on track {}", track.number);
                    continue;
                }
                bad.normalized.clone()
            }
        };

        let remote_track = target
            .medium
            .and_then(|medium| medium.track_at(track.number as u32));
        if let Some(remote_track) = remote_track {
            if remote_track.isrcs.iter().any(|known| known.as_str() == code) {
                debug!("{} is already attached to track {}", code, track.number);
                continue;
            }
        }

        isrcs.push(IsrcSubmission {
            track: track.number,
            recording_id: remote_track.map(|t| t.recording_id.clone()),
            isrc: code,
        });
    }

    let disc_id = (!target.disc_known).then(|| DiscIdRequest {
        disc_id: toc.identifier(),
        toc: toc.clone(),
        release_id: target.release_id.map(str::to_string),
    });

    info!(
        "📦 Composed {} ISRC submission(s){}",
        isrcs.len(),
        if disc_id.is_some() {
            " and a DiscID request"
        } else {
            ""
        }
    );

    SubmissionPayload { isrcs, disc_id }
}
