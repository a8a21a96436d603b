//! Operator interaction: choosing a release, adjudicating findings, confirming

use crate::models::MatchedRelease;
use crate::reconcile::{Decision, Finding, SubmissionPayload};
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accept,
    Cancel,
}

/// The person running the tool
pub trait Operator {
    /// Pick one of several candidate releases. `None` aborts the run.
    fn present_candidates(&mut self, candidates: &[MatchedRelease]) -> Option<usize>;

    /// Decide on one report entry. `None` cancels the review.
    fn present_finding(&mut self, index: usize, total: usize, finding: &Finding)
        -> Option<Decision>;

    /// Final go/no-go before anything is sent
    fn confirm(&mut self, payload: &SubmissionPayload) -> Confirmation;
}

/// Prompts on a terminal (or any reader/writer pair)
pub struct TerminalOperator<R, W> {
    input: R,
    output: W,
    server: String,
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    pub fn new(input: R, output: W, server: impl Into<String>) -> Self {
        Self {
            input,
            output,
            server: server.into(),
        }
    }

    /// Read one trimmed line; `None` on EOF or read failure
    fn ask(&mut self, prompt: &str) -> Option<String> {
        let _ = write!(self.output, "{}", prompt);
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn isrc_url(&self, code: &str) -> String {
        format!("https://{}/isrc/{}", self.server, code)
    }
}

impl TerminalOperator<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio(server: impl Into<String>) -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout(), server)
    }
}

impl<R: BufRead, W: Write> Operator for TerminalOperator<R, W> {
    fn present_candidates(&mut self, candidates: &[MatchedRelease]) -> Option<usize> {
        let _ = writeln!(self.output, "This Disc ID is ambiguous:");
        for (i, candidate) in candidates.iter().enumerate() {
            let release = &candidate.release;
            let _ = writeln!(
                self.output,
                "{}: {}{}",
                i + 1,
                candidate.display_title(),
                release
                    .status
                    .as_ref()
                    .map(|s| format!(" ({})", s))
                    .unwrap_or_default()
            );
            let _ = writeln!(
                self.output,
                "\t{:<2}\t{:<10}\t{:>13}\t{}",
                release.country.as_deref().unwrap_or(""),
                release.date.as_deref().unwrap_or(""),
                release.barcode.as_deref().unwrap_or(""),
                release.catalog_numbers.join(", ")
            );
        }

        let answer = self.ask(&format!("Which one do you want? [1-{}] ", candidates.len()))?;
        match answer.parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => Some(n - 1),
            _ => {
                let _ = writeln!(self.output, "Invalid choice");
                None
            }
        }
    }

    fn present_finding(
        &mut self,
        index: usize,
        total: usize,
        finding: &Finding,
    ) -> Option<Decision> {
        let _ = writeln!(self.output, "\n[{}/{}] {}", index + 1, total, finding);
        for code in finding.known_codes() {
            let url = self.isrc_url(code.as_str());
            let _ = writeln!(self.output, "\t{}", url);
        }

        loop {
            let answer = self.ask("[s]kip, [o]verride or [c]ancel? [S/o/c] ")?;
            match answer.to_lowercase().as_str() {
                "" | "s" | "skip" => return Some(Decision::Skip),
                "o" | "override" => return Some(Decision::Override),
                "c" | "cancel" => return None,
                _ => {
                    let _ = writeln!(self.output, "Please answer s, o or c");
                }
            }
        }
    }

    fn confirm(&mut self, payload: &SubmissionPayload) -> Confirmation {
        let _ = writeln!(self.output);
        if let Some(request) = &payload.disc_id {
            let _ = writeln!(
                self.output,
                "DiscID {} will be attached to {}",
                request.disc_id,
                request
                    .release_id
                    .as_deref()
                    .unwrap_or("a release of your choice")
            );
        }
        for submission in &payload.isrcs {
            let _ = writeln!(
                self.output,
                "Track {:>2}: {}{}",
                submission.track,
                submission.isrc,
                if submission.recording_id.is_none() {
                    " (after the DiscID is attached)"
                } else {
                    ""
                }
            );
        }

        match self.ask("Do you want to submit? [y/N] ") {
            Some(answer) if answer.eq_ignore_ascii_case("y") => Confirmation::Accept,
            _ => Confirmation::Cancel,
        }
    }
}
