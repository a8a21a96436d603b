//! Finding ISRC collisions within the disc and against the catalog

use crate::isrc::Isrc;
use crate::models::{LocalIsrc, LocalTrack, Medium};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

/// Something about the disc's ISRCs that needs an operator decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// The same code was read from several tracks of the disc
    LocalDuplicate { isrc: Isrc, tracks: Vec<u8> },
    /// The disc returned a code that is not a valid ISRC
    Malformed { track: u8, code: String },
    /// The recording at this position already carries other codes
    RemoteMismatch {
        track: u8,
        local: Isrc,
        remote: Vec<Isrc>,
    },
    /// The code read for `track` is attached to other positions on the server
    CrossTrack {
        track: u8,
        isrc: Isrc,
        remote_tracks: Vec<u32>,
    },
}

impl Finding {
    /// Local tracks whose submission depends on the decision for this finding
    pub fn tracks(&self) -> Vec<u8> {
        match self {
            Finding::LocalDuplicate { tracks, .. } => tracks.clone(),
            Finding::Malformed { track, .. }
            | Finding::RemoteMismatch { track, .. }
            | Finding::CrossTrack { track, .. } => vec![*track],
        }
    }

    pub fn concerns(&self, track: u8) -> bool {
        self.tracks().contains(&track)
    }

    /// Codes that may already be known to the server
    pub fn known_codes(&self) -> Vec<&Isrc> {
        match self {
            Finding::LocalDuplicate { .. } | Finding::Malformed { .. } => vec![],
            Finding::RemoteMismatch { local, remote, .. } => {
                std::iter::once(local).chain(remote.iter()).collect()
            }
            Finding::CrossTrack { isrc, .. } => vec![isrc],
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Finding::LocalDuplicate { .. } | Finding::Malformed { .. }
        )
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::LocalDuplicate { isrc, tracks } => {
                write!(f, "ISRC {} was read for tracks {}", isrc, join(tracks))
            }
            Finding::Malformed { track, code } => {
                write!(f, "Track {} returned an invalid ISRC '{}'", track, code)
            }
            Finding::RemoteMismatch {
                track,
                local,
                remote,
            } => write!(
                f,
                "Track {}: disc has {}, server already has {}",
                track,
                local,
                join(remote)
            ),
            Finding::CrossTrack {
                track,
                isrc,
                remote_tracks,
            } => write!(
                f,
                "Track {}: {} is attached to track(s) {} on the server",
                track,
                isrc,
                join(remote_tracks)
            ),
        }
    }
}

/// Findings in presentation order: local problems first, then server conflicts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    entries: Vec<Finding>,
}

impl DuplicateReport {
    pub fn entries(&self) -> &[Finding] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.entries.iter()
    }
}

/// Compare the ISRCs read from the disc with each other and with the server's
pub fn detect(local: &[LocalTrack], remote: Option<&Medium>) -> DuplicateReport {
    let mut by_code: BTreeMap<&Isrc, BTreeSet<u8>> = BTreeMap::new();
    let mut malformed = Vec::new();

    let mut tracks: Vec<&LocalTrack> = local.iter().collect();
    tracks.sort_by_key(|t| t.number);

    for track in &tracks {
        match &track.isrc {
            Some(LocalIsrc::Valid(isrc)) => {
                by_code.entry(isrc).or_default().insert(track.number);
            }
            Some(LocalIsrc::Malformed(bad)) => malformed.push(Finding::Malformed {
                track: track.number,
                code: bad.normalized.clone(),
            }),
            None => {}
        }
    }

    let mut local_duplicates: Vec<Finding> = by_code
        .iter()
        .filter(|(_, numbers)| numbers.len() > 1)
        .map(|(isrc, numbers)| Finding::LocalDuplicate {
            isrc: (*isrc).clone(),
            tracks: numbers.iter().copied().collect(),
        })
        .collect();
    local_duplicates.sort_by_key(|f| f.tracks().first().copied());

    let mut entries = local_duplicates;
    entries.extend(malformed);

    if let Some(medium) = remote {
        // code -> remote positions carrying it
        let mut remote_positions: BTreeMap<&Isrc, BTreeSet<u32>> = BTreeMap::new();
        for remote_track in &medium.tracks {
            for isrc in &remote_track.isrcs {
                remote_positions
                    .entry(isrc)
                    .or_default()
                    .insert(remote_track.position);
            }
        }

        for track in &tracks {
            let Some(isrc) = track.isrc.as_ref().and_then(LocalIsrc::valid) else {
                continue;
            };
            let position = track.number as u32;

            if let Some(remote_track) = medium.track_at(position) {
                if remote_track.isrcs.contains(isrc) {
                    debug!("{} is already attached to track {}", isrc, track.number);
                } else if !remote_track.isrcs.is_empty() {
                    entries.push(Finding::RemoteMismatch {
                        track: track.number,
                        local: isrc.clone(),
                        remote: remote_track.isrcs.clone(),
                    });
                }
            }

            let elsewhere: Vec<u32> = remote_positions
                .get(isrc)
                .map(|positions| {
                    positions
                        .iter()
                        .copied()
                        .filter(|p| *p != position)
                        .collect()
                })
                .unwrap_or_default();
            if !elsewhere.is_empty() {
                entries.push(Finding::CrossTrack {
                    track: track.number,
                    isrc: isrc.clone(),
                    remote_tracks: elsewhere,
                });
            }
        }
    }

    if !entries.is_empty() {
        info!("⚠️ {} ISRC problem(s) need a decision", entries.len());
    }

    DuplicateReport { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteTrack;
    use proptest::prelude::*;

    fn isrc(code: &str) -> Isrc {
        Isrc::parse(code).unwrap()
    }

    fn medium(isrcs: &[&[&str]]) -> Medium {
        Medium {
            position: 1,
            format: Some("CD".to_string()),
            disc_ids: vec![],
            tracks: isrcs
                .iter()
                .enumerate()
                .map(|(i, codes)| RemoteTrack {
                    position: i as u32 + 1,
                    title: format!("Track {}", i + 1),
                    recording_id: format!("rec-{}", i + 1),
                    isrcs: codes.iter().map(|c| isrc(c)).collect(),
                })
                .collect(),
        }
    }

    fn local(codes: &[Option<&str>]) -> Vec<LocalTrack> {
        codes
            .iter()
            .enumerate()
            .map(|(i, code)| LocalTrack::new(i as u8 + 1, *code))
            .collect()
    }

    #[test]
    fn test_unique_codes_without_remote_are_clean() {
        let tracks = local(&[Some("USRC17607839"), Some("USRC17607840"), None]);
        assert!(detect(&tracks, None).is_empty());
    }

    #[test]
    fn test_local_duplicate_lists_all_tracks() {
        let mut codes = vec![None; 8];
        codes[2] = Some("USRC17607839");
        codes[6] = Some("USRC17607839");
        let report = detect(&local(&codes), None);

        assert_eq!(
            report.entries(),
            &[Finding::LocalDuplicate {
                isrc: isrc("USRC17607839"),
                tracks: vec![3, 7],
            }]
        );
    }

    #[test]
    fn test_remote_mismatch() {
        let tracks = local(&[None, None, None, None, Some("USRC17607839")]);
        let remote = medium(&[&[], &[], &[], &[], &["USRC17607840"]]);

        let report = detect(&tracks, Some(&remote));
        assert_eq!(
            report.entries(),
            &[Finding::RemoteMismatch {
                track: 5,
                local: isrc("USRC17607839"),
                remote: vec![isrc("USRC17607840")],
            }]
        );
    }

    #[test]
    fn test_already_submitted_code_is_not_a_collision() {
        let tracks = local(&[Some("USRC17607839"), Some("GBAYE0601498")]);
        let remote = medium(&[&["USRC17607839"], &["GBAYE0601498", "GBAYE0601499"]]);

        assert!(detect(&tracks, Some(&remote)).is_empty());
    }

    #[test]
    fn test_cross_track_remote_collision() {
        let tracks = local(&[Some("USRC17607839"), Some("GBAYE0601498")]);
        // server has track 1's code on track 2 instead
        let remote = medium(&[&[], &["USRC17607839"]]);

        let report = detect(&tracks, Some(&remote));
        assert_eq!(
            report.entries(),
            &[
                Finding::CrossTrack {
                    track: 1,
                    isrc: isrc("USRC17607839"),
                    remote_tracks: vec![2],
                },
                Finding::RemoteMismatch {
                    track: 2,
                    local: isrc("GBAYE0601498"),
                    remote: vec![isrc("USRC17607839")],
                },
            ]
        );
    }

    #[test]
    fn test_malformed_codes_are_reported_not_dropped() {
        let tracks = local(&[Some("USRC1760"), Some("USRC17607839")]);
        let report = detect(&tracks, None);

        assert_eq!(
            report.entries(),
            &[Finding::Malformed {
                track: 1,
                code: "USRC1760".to_string(),
            }]
        );
    }

    #[test]
    fn test_local_findings_come_before_remote() {
        let tracks = local(&[
            Some("USRC17607839"),
            Some("JPXX01234567"),
            Some("bad"),
            Some("JPXX01234567"),
        ]);
        let remote = medium(&[&["USRC17607840"], &[], &[], &[]]);

        let report = detect(&tracks, Some(&remote));
        let kinds: Vec<bool> = report.iter().map(Finding::is_local).collect();
        assert_eq!(kinds, vec![true, true, false]);
        assert!(matches!(
            report.entries()[0],
            Finding::LocalDuplicate { .. }
        ));
        assert!(matches!(report.entries()[1], Finding::Malformed { track: 3, .. }));
        assert!(matches!(
            report.entries()[2],
            Finding::RemoteMismatch { track: 1, .. }
        ));
    }

    #[test]
    fn test_local_duplicates_ordered_by_first_track() {
        let tracks = local(&[
            Some("ZZAAA0000001"),
            Some("AAAAA0000001"),
            Some("ZZAAA0000001"),
            Some("AAAAA0000001"),
        ]);
        let report = detect(&tracks, None);
        assert_eq!(report.entries()[0].tracks(), vec![1, 3]);
        assert_eq!(report.entries()[1].tracks(), vec![2, 4]);
    }

    fn code_strategy() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            (0u32..6).prop_map(|n| Some(format!("USRC1760{:04}", n))),
            Just(Some("broken".to_string())),
        ]
    }

    proptest! {
        #[test]
        fn prop_detection_is_idempotent(
            local_codes in prop::collection::vec(code_strategy(), 1..12),
            remote_codes in prop::collection::vec(code_strategy(), 1..12),
        ) {
            let tracks: Vec<LocalTrack> = local_codes
                .iter()
                .enumerate()
                .map(|(i, c)| LocalTrack::new(i as u8 + 1, c.as_deref()))
                .collect();
            let remote = Medium {
                position: 1,
                format: None,
                disc_ids: vec![],
                tracks: remote_codes
                    .iter()
                    .enumerate()
                    .map(|(i, c)| RemoteTrack {
                        position: i as u32 + 1,
                        title: String::new(),
                        recording_id: format!("rec-{}", i),
                        isrcs: c.as_deref().and_then(|c| Isrc::parse(c).ok()).into_iter().collect(),
                    })
                    .collect(),
            };

            let first = detect(&tracks, Some(&remote));
            let second = detect(&tracks, Some(&remote));
            prop_assert_eq!(format!("{:?}", first), format!("{:?}", second));
            prop_assert_eq!(first, second);
        }
    }
}
