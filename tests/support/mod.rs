//! Fake collaborators for driving whole runs without a drive or network

#![allow(dead_code)]

use async_trait::async_trait;
use isrcsync::cd::{DiscReadError, DiscReader, RawToc};
use isrcsync::isrc::Isrc;
use isrcsync::models::{MatchedRelease, Medium, Release, RemoteTrack};
use isrcsync::musicbrainz::{Catalog, CatalogError};
use isrcsync::operator::{Confirmation, Operator};
use isrcsync::reconcile::{Decision, Finding, IsrcSubmission, SubmissionPayload};
use isrcsync::toc::{DiscIdentifier, Toc};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Evenly spaced offsets for an `n` track disc
pub fn offsets(n: u32) -> (Vec<u32>, u32) {
    let offsets = (0..n).map(|i| 150 + i * 15_000).collect();
    (offsets, 150 + n * 15_000)
}

pub fn disc_id(n: u32) -> DiscIdentifier {
    let (offsets, leadout) = offsets(n);
    Toc::normalize(&offsets, leadout).unwrap().identifier()
}

/// Valid, distinct code for a track number
pub fn code(n: u32) -> String {
    format!("USRC176{:05}", 7800 + n)
}

pub struct FakeDisc {
    pub toc: RawToc,
    pub isrcs: Vec<Option<String>>,
    pub toc_reads: usize,
}

impl FakeDisc {
    pub fn new(isrcs: Vec<Option<String>>) -> Self {
        let (track_offsets, leadout) = offsets(isrcs.len() as u32);
        Self {
            toc: RawToc {
                track_offsets,
                leadout,
            },
            isrcs,
            toc_reads: 0,
        }
    }

    pub fn without_isrcs(tracks: usize) -> Self {
        Self::new(vec![None; tracks])
    }
}

impl DiscReader for FakeDisc {
    fn read_toc(&mut self) -> Result<RawToc, DiscReadError> {
        self.toc_reads += 1;
        Ok(self.toc.clone())
    }

    fn read_isrc(&mut self, track: u8) -> Result<Option<String>, DiscReadError> {
        Ok(self.isrcs.get(track as usize - 1).cloned().flatten())
    }
}

/// Release with one CD medium; `remote[i]` are the codes known for track i+1
pub fn release(id: &str, disc_id: &DiscIdentifier, remote: &[&[&str]]) -> Release {
    Release {
        id: id.to_string(),
        title: "Test Album".to_string(),
        artist: "Test Artist".to_string(),
        status: Some("Official".to_string()),
        country: Some("XW".to_string()),
        date: Some("2001".to_string()),
        barcode: None,
        catalog_numbers: vec![],
        media: vec![Medium {
            position: 1,
            format: Some("CD".to_string()),
            disc_ids: vec![disc_id.to_string()],
            tracks: remote
                .iter()
                .enumerate()
                .map(|(i, codes)| RemoteTrack {
                    position: i as u32 + 1,
                    title: format!("Track {}", i + 1),
                    recording_id: format!("{}-rec-{}", id, i + 1),
                    isrcs: codes.iter().map(|c| Isrc::parse(c).unwrap()).collect(),
                })
                .collect(),
        }],
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub releases: Vec<Release>,
    pub lookup_error: Option<fn() -> CatalogError>,
    pub submit_error: Option<fn() -> CatalogError>,
    pub submitted: Mutex<Vec<IsrcSubmission>>,
    pub disc_requests: Mutex<Vec<Option<String>>>,
}

impl FakeCatalog {
    pub fn with(releases: Vec<Release>) -> Self {
        Self {
            releases,
            ..Default::default()
        }
    }

    pub fn submitted(&self) -> Vec<IsrcSubmission> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn disc_requests(&self) -> Vec<Option<String>> {
        self.disc_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn lookup_by_disc_id(
        &self,
        disc_id: &DiscIdentifier,
    ) -> Result<Vec<Release>, CatalogError> {
        if let Some(error) = self.lookup_error {
            return Err(error());
        }
        Ok(self
            .releases
            .iter()
            .filter(|r| {
                r.media
                    .iter()
                    .any(|m| m.disc_ids.iter().any(|id| id == disc_id.as_str()))
            })
            .cloned()
            .collect())
    }

    async fn get_release(&self, release_id: &str) -> Result<Release, CatalogError> {
        self.releases
            .iter()
            .find(|r| r.id == release_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(release_id.to_string()))
    }

    async fn submit_isrcs(&self, submissions: &[IsrcSubmission]) -> Result<(), CatalogError> {
        if let Some(error) = self.submit_error {
            return Err(error());
        }
        self.submitted
            .lock()
            .unwrap()
            .extend(submissions.iter().cloned());
        Ok(())
    }

    async fn submit_disc_id(
        &self,
        release_id: Option<&str>,
        toc: &Toc,
    ) -> Result<String, CatalogError> {
        self.disc_requests
            .lock()
            .unwrap()
            .push(release_id.map(str::to_string));
        Ok(toc.submission_url("test.musicbrainz.org"))
    }
}

pub struct ScriptedOperator {
    pub choice: Option<usize>,
    pub decisions: VecDeque<Option<Decision>>,
    pub confirmation: Confirmation,
    pub findings: Vec<Finding>,
    pub candidates_shown: usize,
    pub confirmed: Vec<SubmissionPayload>,
}

impl ScriptedOperator {
    pub fn accepting(decisions: Vec<Decision>) -> Self {
        Self {
            choice: Some(0),
            decisions: decisions.into_iter().map(Some).collect(),
            confirmation: Confirmation::Accept,
            findings: vec![],
            candidates_shown: 0,
            confirmed: vec![],
        }
    }
}

impl Operator for ScriptedOperator {
    fn present_candidates(&mut self, candidates: &[MatchedRelease]) -> Option<usize> {
        self.candidates_shown = candidates.len();
        self.choice
    }

    fn present_finding(
        &mut self,
        _index: usize,
        _total: usize,
        finding: &Finding,
    ) -> Option<Decision> {
        self.findings.push(finding.clone());
        self.decisions.pop_front().unwrap_or(Some(Decision::Skip))
    }

    fn confirm(&mut self, payload: &SubmissionPayload) -> Confirmation {
        self.confirmed.push(payload.clone());
        self.confirmation
    }
}
