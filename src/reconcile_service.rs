// # Reconcile Service
//
// ## Overview
// One run takes the disc in the drive from a raw TOC to an operator-confirmed
// submission. Everything happens in sequence; the only awaits are catalog calls.
//
// ## Run Flow
//
// 1. **Disc read**
//    - Read the TOC and validate it (fails before any network call)
//    - Read every track's ISRC; bad codes are kept as malformed readings
//
// 2. **Catalog lookup & matching**
//    - Look the DiscID up and keep releases with a structurally matching medium
//    - Several candidates: the operator picks one (or aborts)
//    - No candidate: the disc is read again to make sure the DiscID is stable,
//      then the disc ID has to be attached. This includes lookup hits whose
//      medium has another layout. A release given on the command
//      line is fetched and checked so codes can still be compared.
//
// 3. **Review**
//    - The duplicate report is loaded into the controller
//    - Every entry is put to the operator; an empty report needs no prompt
//
// 4. **Submission**
//    - The composed payload is shown and confirmed
//    - The attach URL is produced for unknown discs, and ISRCs with a known
//      recording are posted
//
// Any catalog error aborts the run; decisions are dropped with the controller.

use crate::cd::{DiscReadError, DiscReader};
use crate::error::ReconcileError;
use crate::models::{LocalTrack, MatchedRelease};
use crate::musicbrainz::{Catalog, CatalogError};
use crate::operator::{Confirmation, Operator};
use crate::reconcile::{
    check_release, detect, find_candidates, ConflictController, SubmissionPayload, Target,
};
use crate::toc::{DiscIdentifier, Toc};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Release to use when the disc is unknown to the catalog
    pub release_id: Option<String>,
    /// Stop after composing the payload
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Submitted {
        disc_id: DiscIdentifier,
        /// Page that attaches the disc ID, for discs the catalog does not know
        attach_url: Option<String>,
        /// ISRCs posted to recordings
        submitted: usize,
        /// ISRCs that can only be sent once the disc ID is attached
        pending: usize,
    },
    NothingToSubmit,
    /// The operator aborted candidate selection or review
    Cancelled,
    /// The operator answered no to the final confirmation
    Declined,
    DryRun(SubmissionPayload),
}

/// The disc as read from the drive
#[derive(Debug, Clone)]
pub struct DiscReading {
    pub toc: Toc,
    pub disc_id: DiscIdentifier,
    pub tracks: Vec<LocalTrack>,
}

pub fn read_toc(reader: &mut dyn DiscReader) -> Result<Toc, ReconcileError> {
    let raw = reader.read_toc()?;
    let toc = Toc::normalize(&raw.track_offsets, raw.leadout)?;
    debug!("TOC: {}", toc.toc_string());
    Ok(toc)
}

/// Read the TOC and every track's ISRC
pub fn read_disc(reader: &mut dyn DiscReader) -> Result<DiscReading, ReconcileError> {
    let toc = read_toc(reader)?;
    let disc_id = toc.identifier();
    info!("💿 DiscID {} ({} tracks)", disc_id, toc.track_count());

    let mut tracks = Vec::with_capacity(toc.track_count() as usize);
    for number in toc.track_numbers() {
        let raw = reader.read_isrc(number)?;
        let track = LocalTrack::new(number, raw.as_deref());
        match &track.isrc {
            Some(reading) => debug!("Track {}: {:?}", number, reading),
            None => debug!("Track {}: no ISRC", number),
        }
        tracks.push(track);
    }

    let with_codes = tracks.iter().filter(|t| t.isrc.is_some()).count();
    info!("Read {} ISRC(s) from the disc", with_codes);

    Ok(DiscReading {
        toc,
        disc_id,
        tracks,
    })
}

/// Read the TOC again; the DiscID must not change
fn verify_disc_id(reader: &mut dyn DiscReader, expected: &DiscIdentifier) -> Result<(), ReconcileError> {
    let again = read_toc(reader)?.identifier();
    if &again != expected {
        return Err(DiscReadError::Unstable {
            first: expected.to_string(),
            second: again.to_string(),
        }
        .into());
    }
    debug!("DiscID {} confirmed by a second read", again);
    Ok(())
}

pub async fn run(
    reader: &mut dyn DiscReader,
    catalog: &dyn Catalog,
    operator: &mut dyn Operator,
    options: &RunOptions,
) -> Result<RunOutcome, ReconcileError> {
    let disc = read_disc(reader)?;
    let mut controller = ConflictController::new();

    let releases = catalog.lookup_by_disc_id(&disc.disc_id).await?;
    let mut candidates = find_candidates(&disc.toc, &disc.disc_id, releases);

    let selected: Option<MatchedRelease> = match candidates.len() {
        0 => {
            // lookup hits on a medium of another layout leave the disc unknown too
            verify_disc_id(reader, &disc.disc_id)?;
            match &options.release_id {
                Some(release_id) => chosen_release(catalog, &disc, release_id).await?,
                None => None,
            }
        }
        1 => candidates.pop(),
        _ => match operator.present_candidates(&candidates) {
            Some(index) if index < candidates.len() => Some(candidates.swap_remove(index)),
            _ => {
                info!("No release selected, aborting");
                controller.cancel()?;
                return Ok(RunOutcome::Cancelled);
            }
        },
    };

    if let Some(matched) = &selected {
        info!(
            "🎯 Using {} ({}), medium {}",
            matched.display_title(),
            matched.id(),
            matched.medium().position
        );
    }

    let medium = selected.as_ref().map(MatchedRelease::medium);
    let disc_known = medium.is_some_and(|m| m.lists_disc_id(disc.disc_id.as_str()));
    if !disc_known {
        info!("DiscID {} is not attached to the selected medium", disc.disc_id);
    }
    controller.load(detect(&disc.tracks, medium))?;
    if !controller.review(operator)? {
        return Ok(RunOutcome::Cancelled);
    }

    let target = Target {
        medium,
        release_id: selected
            .as_ref()
            .map(MatchedRelease::id)
            .or(options.release_id.as_deref()),
        disc_known,
    };
    let payload = controller.compose(&disc.tracks, target, &disc.toc)?;

    if payload.is_empty() {
        info!("Nothing to submit");
        return Ok(RunOutcome::NothingToSubmit);
    }
    if options.dry_run {
        info!("Dry run, not submitting");
        return Ok(RunOutcome::DryRun(payload));
    }
    if operator.confirm(&payload) == Confirmation::Cancel {
        info!("Submission declined");
        return Ok(RunOutcome::Declined);
    }

    submit(catalog, disc.disc_id, &payload).await
}

/// Fetch a release picked outside the tool and check it against the disc
async fn chosen_release(
    catalog: &dyn Catalog,
    disc: &DiscReading,
    release_id: &str,
) -> Result<Option<MatchedRelease>, ReconcileError> {
    let release = catalog
        .get_release(release_id)
        .await
        .map_err(|e| match e {
            CatalogError::NotFound(_) => ReconcileError::ReleaseNotFound(release_id.to_string()),
            other => other.into(),
        })?;

    let matched = check_release(&disc.toc, &disc.disc_id, release);
    if matched.is_none() {
        warn!(
            "Release {} has no medium with {} tracks, ISRCs cannot be compared",
            release_id,
            disc.toc.track_count()
        );
    }
    Ok(matched)
}

async fn submit(
    catalog: &dyn Catalog,
    disc_id: DiscIdentifier,
    payload: &SubmissionPayload,
) -> Result<RunOutcome, ReconcileError> {
    let attach_url = match &payload.disc_id {
        Some(request) => Some(
            catalog
                .submit_disc_id(request.release_id.as_deref(), &request.toc)
                .await?,
        ),
        None => None,
    };

    let attachable: Vec<_> = payload.attachable_isrcs().cloned().collect();
    if !attachable.is_empty() {
        catalog.submit_isrcs(&attachable).await?;
    }

    let pending = payload.isrcs.len() - attachable.len();
    if pending > 0 {
        info!(
            "{} ISRC(s) can be submitted after the DiscID is attached",
            pending
        );
    }

    Ok(RunOutcome::Submitted {
        disc_id,
        attach_url,
        submitted: attachable.len(),
        pending,
    })
}
