use crate::models::{MatchedRelease, Medium, Release};
use crate::toc::{DiscIdentifier, Toc};
use tracing::{debug, info, warn};

/// Pick the medium of `release` that corresponds to the disc.
///
/// Only media with the disc's track count and contiguous positions qualify.
/// A qualifying medium that lists the DiscID wins; otherwise the first
/// qualifying medium is used, as long as no medium lists the DiscID at all.
fn select_medium(toc: &Toc, disc_id: &DiscIdentifier, release: &Release) -> Option<usize> {
    let track_count = toc.track_count() as usize;

    let fits = |medium: &Medium| {
        medium.track_count() == track_count && medium.has_contiguous_positions()
    };
    let lists_disc = |medium: &Medium| medium.lists_disc_id(disc_id.as_str());

    let with_disc: Vec<usize> = release
        .media
        .iter()
        .enumerate()
        .filter(|(_, m)| lists_disc(*m))
        .map(|(i, _)| i)
        .collect();

    match with_disc.as_slice() {
        [] => release.media.iter().position(fits),
        [index] => {
            if fits(&release.media[*index]) {
                Some(*index)
            } else {
                warn!(
                    "Release {} medium {} carries DiscID {} but has {} track(s), disc has {}",
                    release.id,
                    release.media[*index].position,
                    disc_id,
                    release.media[*index].track_count(),
                    track_count
                );
                None
            }
        }
        _ => {
            warn!(
                "Release {} has {} media with DiscID {}, skipping",
                release.id,
                with_disc.len(),
                disc_id
            );
            None
        }
    }
}

/// Check a single release (for example one chosen by the operator) against the disc
pub fn check_release(toc: &Toc, disc_id: &DiscIdentifier, release: Release) -> Option<MatchedRelease> {
    select_medium(toc, disc_id, &release).map(|medium_index| MatchedRelease {
        release,
        medium_index,
    })
}

/// Filter catalog results down to releases whose layout fits the disc.
///
/// Catalog order is kept.
pub fn find_candidates(
    toc: &Toc,
    disc_id: &DiscIdentifier,
    releases: Vec<Release>,
) -> Vec<MatchedRelease> {
    info!(
        "🎯 Matching {} release(s) against {} track(s) of DiscID {}",
        releases.len(),
        toc.track_count(),
        disc_id
    );

    let candidates: Vec<MatchedRelease> = releases
        .into_iter()
        .filter_map(|release| {
            debug!(
                "Evaluating release {} '{}' with {} medium/media",
                release.id,
                release.title,
                release.medium_count()
            );
            let id = release.id.clone();
            let matched = check_release(toc, disc_id, release);
            if matched.is_none() {
                warn!("Rejected release {}: no medium matches the disc layout", id);
            }
            matched
        })
        .collect();

    info!("✓ {} candidate release(s)", candidates.len());
    candidates
}
