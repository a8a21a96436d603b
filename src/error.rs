//! Errors that end a run, and the exit code each maps to

use crate::cd::DiscReadError;
use crate::musicbrainz::CatalogError;
use crate::reconcile::ControllerError;
use crate::toc::InvalidTocError;
use thiserror::Error;

/// Why a reconciliation run stopped.
///
/// Collisions and malformed codes are not errors; they end up in the
/// duplicate report.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Invalid TOC: {0}")]
    InvalidToc(#[from] InvalidTocError),
    #[error(transparent)]
    DiscRead(#[from] DiscReadError),
    #[error("MusicBrainz is unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Release not found: {0}")]
    ReleaseNotFound(String),
    #[error("Internal error: {0}")]
    Controller(#[from] ControllerError),
}

impl From<CatalogError> for ReconcileError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unavailable(message) => ReconcileError::CatalogUnavailable(message),
            CatalogError::Auth(message) => ReconcileError::Auth(message),
            CatalogError::NotFound(what) => ReconcileError::ReleaseNotFound(what),
        }
    }
}

impl ReconcileError {
    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            ReconcileError::InvalidToc(_) | ReconcileError::DiscRead(_) => 2,
            ReconcileError::CatalogUnavailable(_) => 3,
            ReconcileError::Auth(_) => 4,
            ReconcileError::ReleaseNotFound(_) => 5,
            ReconcileError::Controller(_) => 70,
        }
    }
}
