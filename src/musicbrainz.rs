//! MusicBrainz web service client
//!
//! Lookups use the JSON API. ISRC submission still requires the XML
//! endpoint, and disc IDs can only be attached through the website, so
//! [`Catalog::submit_disc_id`] hands back the attach URL.

use crate::isrc::Isrc;
use crate::models::{Medium, Release, RemoteTrack};
use crate::reconcile::IsrcSubmission;
use crate::toc::{DiscIdentifier, Toc};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("isrcsync/", env!("CARGO_PKG_VERSION"));

const INCLUDES: &str = "recordings+isrcs+artist-credits+labels+discids";

const MMD_NAMESPACE: &str = "http://musicbrainz.org/ns/mmd-2.0#";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("MusicBrainz is unavailable: {0}")]
    Unavailable(String),
    #[error("MusicBrainz rejected the credentials: {0}")]
    Auth(String),
    #[error("Not found on MusicBrainz: {0}")]
    NotFound(String),
}

/// The metadata catalog the disc is reconciled against
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Releases carrying this disc ID. Unknown discs give an empty list.
    async fn lookup_by_disc_id(&self, disc_id: &DiscIdentifier)
        -> Result<Vec<Release>, CatalogError>;

    async fn get_release(&self, release_id: &str) -> Result<Release, CatalogError>;

    /// Add ISRCs to recordings. Submissions without a recording are ignored.
    async fn submit_isrcs(&self, submissions: &[IsrcSubmission]) -> Result<(), CatalogError>;

    /// Start attaching the disc to a release; returns the page that completes it
    async fn submit_disc_id(
        &self,
        release_id: Option<&str>,
        toc: &Toc,
    ) -> Result<String, CatalogError>;
}

// Wire types. Only the fields the reconciliation needs are read.

#[derive(Debug, Deserialize)]
struct DiscResponse {
    #[serde(default)]
    releases: Option<Vec<ReleaseJson>>,
    /// Present on CD stubs only
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseJson {
    id: String,
    #[serde(default)]
    title: String,
    status: Option<String>,
    country: Option<String>,
    date: Option<String>,
    barcode: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<ArtistCreditJson>,
    #[serde(rename = "label-info", default)]
    label_info: Vec<LabelInfoJson>,
    #[serde(default)]
    media: Vec<MediumJson>,
}

#[derive(Debug, Deserialize)]
struct ArtistCreditJson {
    name: String,
    #[serde(default)]
    joinphrase: String,
}

#[derive(Debug, Deserialize)]
struct LabelInfoJson {
    #[serde(rename = "catalog-number")]
    catalog_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediumJson {
    #[serde(default)]
    position: u32,
    format: Option<String>,
    #[serde(default)]
    discs: Vec<DiscJson>,
    #[serde(default)]
    tracks: Vec<TrackJson>,
}

#[derive(Debug, Deserialize)]
struct DiscJson {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TrackJson {
    position: u32,
    #[serde(default)]
    title: String,
    recording: RecordingJson,
}

#[derive(Debug, Deserialize)]
struct RecordingJson {
    id: String,
    #[serde(default)]
    isrcs: Vec<String>,
}

impl From<ReleaseJson> for Release {
    fn from(json: ReleaseJson) -> Self {
        let artist = if json.artist_credit.is_empty() {
            "Unknown Artist".to_string()
        } else {
            json.artist_credit
                .iter()
                .map(|credit| format!("{}{}", credit.name, credit.joinphrase))
                .collect()
        };

        Release {
            id: json.id,
            title: json.title,
            artist,
            status: json.status,
            country: json.country,
            date: json.date.filter(|s| !s.is_empty()),
            barcode: json.barcode.filter(|s| !s.is_empty()),
            catalog_numbers: json
                .label_info
                .into_iter()
                .filter_map(|li| li.catalog_number)
                .filter(|c| !c.is_empty())
                .collect(),
            media: json.media.into_iter().map(Medium::from).collect(),
        }
    }
}

impl From<MediumJson> for Medium {
    fn from(json: MediumJson) -> Self {
        Medium {
            position: json.position,
            format: json.format,
            disc_ids: json.discs.into_iter().map(|d| d.id).collect(),
            tracks: json
                .tracks
                .into_iter()
                .map(|track| RemoteTrack {
                    position: track.position,
                    title: track.title,
                    isrcs: track
                        .recording
                        .isrcs
                        .iter()
                        .filter_map(|code| match Isrc::parse(code) {
                            Ok(isrc) => Some(isrc),
                            Err(e) => {
                                warn!("Ignoring ISRC from MusicBrainz: {}", e);
                                None
                            }
                        })
                        .collect(),
                    recording_id: track.recording.id,
                })
                .collect(),
        }
    }
}

/// Releases from a `/discid` response. A CD stub is not a release.
fn parse_disc_response(body: &str) -> Result<Vec<Release>, CatalogError> {
    let response: DiscResponse = serde_json::from_str(body)
        .map_err(|e| CatalogError::Unavailable(format!("Failed to parse JSON: {}", e)))?;

    match response.releases {
        Some(releases) => Ok(releases.into_iter().map(Release::from).collect()),
        None => {
            if let Some(title) = response.title {
                info!("Disc is only known as a CD stub ('{}'), ignoring it", title);
            }
            Ok(Vec::new())
        }
    }
}

fn parse_release(body: &str) -> Result<Release, CatalogError> {
    let json: ReleaseJson = serde_json::from_str(body)
        .map_err(|e| CatalogError::Unavailable(format!("Failed to parse JSON: {}", e)))?;
    Ok(json.into())
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Request body for `POST /ws/2/recording`
fn isrc_submission_xml(submissions: &[IsrcSubmission]) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><metadata xmlns=\"{}\"><recording-list>",
        MMD_NAMESPACE
    );
    for submission in submissions {
        let Some(recording_id) = &submission.recording_id else {
            continue;
        };
        xml.push_str(&format!(
            "<recording id=\"{}\"><isrc-list count=\"1\"><isrc id=\"{}\"/></isrc-list></recording>",
            escape_attr(recording_id),
            escape_attr(&submission.isrc)
        ));
    }
    xml.push_str("</recording-list></metadata>");
    xml
}

pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    server: String,
    token: Option<String>,
}

impl MusicBrainzClient {
    pub fn new(server: &str, token: Option<String>) -> Result<Self, CatalogError> {
        let mut client = Self::with_base_url(format!("https://{}/ws/2", server), token)?;
        client.server = server.to_string();
        Ok(client)
    }

    /// Client against an arbitrary web service root, e.g. a local mirror
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                CatalogError::Unavailable(format!("Failed to create HTTP client: {}", e))
            })?;
        let base_url = base_url.into();
        let server = reqwest::Url::parse(&base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "musicbrainz.org".to_string());

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            server,
            token,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    async fn get_json(&self, url: &str, what: &str) -> Result<String, CatalogError> {
        debug!("MusicBrainz API request: {}", url);

        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("MusicBrainz API error response ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }

        response
            .text()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("Failed to read response: {}", e)))
    }
}

fn status_error(status: StatusCode, body: String) -> CatalogError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CatalogError::Auth(body),
        _ => CatalogError::Unavailable(format!(
            "MusicBrainz API returned status {}: {}",
            status, body
        )),
    }
}

#[async_trait]
impl Catalog for MusicBrainzClient {
    async fn lookup_by_disc_id(
        &self,
        disc_id: &DiscIdentifier,
    ) -> Result<Vec<Release>, CatalogError> {
        info!("🎵 MusicBrainz: Looking up DiscID '{}'", disc_id);
        let url = format!("{}/discid/{}?inc={}", self.base_url, disc_id, INCLUDES);

        let body = match self.get_json(&url, disc_id.as_str()).await {
            Ok(body) => body,
            Err(CatalogError::NotFound(_)) => {
                info!("DiscID '{}' is not known to MusicBrainz", disc_id);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let releases = parse_disc_response(&body)?;
        info!("✅ MusicBrainz: {} release(s) for DiscID", releases.len());
        Ok(releases)
    }

    async fn get_release(&self, release_id: &str) -> Result<Release, CatalogError> {
        info!("🎵 MusicBrainz: Fetching release {}", release_id);
        let url = format!("{}/release/{}?inc={}", self.base_url, release_id, INCLUDES);
        let body = self.get_json(&url, release_id).await?;
        parse_release(&body)
    }

    async fn submit_isrcs(&self, submissions: &[IsrcSubmission]) -> Result<(), CatalogError> {
        let count = submissions
            .iter()
            .filter(|s| s.recording_id.is_some())
            .count();
        if count == 0 {
            debug!("No ISRCs to submit");
            return Ok(());
        }
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| CatalogError::Auth("no API token configured".to_string()))?;

        let url = format!(
            "{}/recording?client=isrcsync-{}",
            self.base_url,
            env!("CARGO_PKG_VERSION")
        );
        debug!("MusicBrainz API submission: {}", url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(isrc_submission_xml(submissions))
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("ISRC submission failed ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }

        info!("✅ Submitted {} ISRC(s) to MusicBrainz", count);
        Ok(())
    }

    async fn submit_disc_id(
        &self,
        release_id: Option<&str>,
        toc: &Toc,
    ) -> Result<String, CatalogError> {
        let url = toc.submission_url(&self.server);
        match release_id {
            Some(release_id) => info!("💿 Attach the DiscID to release {} at {}", release_id, url),
            None => info!("💿 Attach the DiscID at {}", url),
        }
        Ok(url)
    }
}
