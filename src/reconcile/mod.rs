//! Matching the disc to releases and deciding what gets submitted

pub mod composer;
pub mod controller;
pub mod duplicates;
pub mod matcher;

pub use composer::{
    compose, Decision, Decisions, DiscIdRequest, IsrcSubmission, SubmissionPayload, Target,
};
pub use controller::{ConflictController, ControllerError, ControllerState};
pub use duplicates::{detect, DuplicateReport, Finding};
pub use matcher::{check_release, find_candidates};
