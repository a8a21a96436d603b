//! Conflict resolution state machine
//!
//! One controller lives for the duration of a run. It holds the report being
//! reviewed and the decisions collected so far, and is the only way to get
//! from a report to a [`SubmissionPayload`].

use crate::models::LocalTrack;
use crate::operator::Operator;
use crate::reconcile::composer::{compose, Decision, Decisions, SubmissionPayload, Target};
use crate::reconcile::duplicates::{DuplicateReport, Finding};
use crate::toc::Toc;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Matched,
    Reviewing,
    Decided,
    Composed,
    Cancelled,
}

impl ControllerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ControllerState::Composed | ControllerState::Cancelled)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Idle => "idle",
            ControllerState::Matched => "matched",
            ControllerState::Reviewing => "reviewing",
            ControllerState::Decided => "decided",
            ControllerState::Composed => "composed",
            ControllerState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: ControllerState,
        action: &'static str,
    },
}

#[derive(Debug)]
pub struct ConflictController {
    state: ControllerState,
    report: DuplicateReport,
    decisions: Vec<Decision>,
}

impl Default for ConflictController {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictController {
    pub fn new() -> Self {
        Self {
            state: ControllerState::Idle,
            report: DuplicateReport::default(),
            decisions: Vec::new(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn report(&self) -> &DuplicateReport {
        &self.report
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    fn expect(&self, state: ControllerState, action: &'static str) -> Result<(), ControllerError> {
        if self.state == state {
            Ok(())
        } else {
            Err(ControllerError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    fn transition(&mut self, next: ControllerState) {
        debug!("Conflict controller: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Idle -> Matched
    pub fn load(&mut self, report: DuplicateReport) -> Result<(), ControllerError> {
        self.expect(ControllerState::Idle, "load a report")?;
        self.report = report;
        self.decisions.clear();
        self.transition(ControllerState::Matched);
        Ok(())
    }

    /// Matched -> Reviewing, or straight to Decided when there is nothing to review
    pub fn begin_review(&mut self) -> Result<(), ControllerError> {
        self.expect(ControllerState::Matched, "begin review")?;
        if self.report.is_empty() {
            info!("No ISRC conflicts, nothing to review");
            self.transition(ControllerState::Decided);
        } else {
            self.transition(ControllerState::Reviewing);
        }
        Ok(())
    }

    /// The entry awaiting a decision, with its index
    pub fn current(&self) -> Option<(usize, &Finding)> {
        if self.state != ControllerState::Reviewing {
            return None;
        }
        let index = self.decisions.len();
        self.report.entries().get(index).map(|f| (index, f))
    }

    /// Record the decision for the current entry
    pub fn record(&mut self, decision: Decision) -> Result<(), ControllerError> {
        self.expect(ControllerState::Reviewing, "record a decision")?;
        self.decisions.push(decision);
        if self.decisions.len() == self.report.len() {
            self.transition(ControllerState::Decided);
        }
        Ok(())
    }

    /// Abandon the run. Discards every decision collected so far.
    pub fn cancel(&mut self) -> Result<(), ControllerError> {
        if self.state.is_terminal() {
            return Err(ControllerError::InvalidTransition {
                state: self.state,
                action: "cancel",
            });
        }
        self.decisions.clear();
        self.transition(ControllerState::Cancelled);
        Ok(())
    }

    /// Walk the operator through every entry in report order.
    ///
    /// Returns `false` if the operator cancelled.
    pub fn review(&mut self, operator: &mut dyn Operator) -> Result<bool, ControllerError> {
        if self.state == ControllerState::Matched {
            self.begin_review()?;
        }

        let total = self.report.len();
        while let Some((index, finding)) = self.current() {
            match operator.present_finding(index, total, finding) {
                Some(decision) => self.record(decision)?,
                None => {
                    info!("Review cancelled at entry {} of {}", index + 1, total);
                    self.cancel()?;
                    return Ok(false);
                }
            }
        }

        self.expect(ControllerState::Decided, "finish review")?;
        Ok(true)
    }

    /// Decided -> Composed
    pub fn compose(
        &mut self,
        local: &[LocalTrack],
        target: Target<'_>,
        toc: &Toc,
    ) -> Result<SubmissionPayload, ControllerError> {
        self.expect(ControllerState::Decided, "compose a payload")?;
        let decisions = Decisions::new(&self.report, &self.decisions);
        let payload = compose(local, target, &decisions, toc);
        self.transition(ControllerState::Composed);
        Ok(payload)
    }
}
