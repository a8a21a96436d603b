// Library exports for the CLI and integration tests

pub mod cd;
pub mod config;
pub mod credentials;
pub mod error;
pub mod isrc;
pub mod models;
pub mod musicbrainz;
pub mod operator;
pub mod reconcile;
pub mod reconcile_service;
pub mod toc;

pub use error::ReconcileError;
