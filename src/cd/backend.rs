//! External disc tools and the parsing of their output
//!
//! Every tool prints ISRCs in its own format. The patterns capture whatever
//! token follows the ISRC label so that garbage codes reach the duplicate
//! detector as malformed readings instead of disappearing here.

use crate::cd::drive::{DiscReadError, DiscReader, RawToc};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::OnceLock;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Lead-in every absolute offset includes
const LEAD_IN: u32 = 150;

/// Gap between the last audio session and a trailing data session on enhanced CDs
const DATA_SESSION_GAP: u32 = 11_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Mediatools,
    MediaInfo,
    Discisrc,
    Cdrdao,
    CdInfo,
    Cdda2wav,
    Icedax,
    Drutil,
}

impl Backend {
    /// Highest priority first
    pub const PRIORITY: [Backend; 8] = [
        Backend::Mediatools,
        Backend::MediaInfo,
        Backend::Discisrc,
        Backend::Cdrdao,
        Backend::CdInfo,
        Backend::Cdda2wav,
        Backend::Icedax,
        Backend::Drutil,
    ];

    pub fn program(self) -> &'static str {
        match self {
            Backend::Mediatools => "mediatools",
            Backend::MediaInfo => "media_info",
            Backend::Discisrc => "discisrc",
            Backend::Cdrdao => "cdrdao",
            Backend::CdInfo => "cd-info",
            Backend::Cdda2wav => "cdda2wav",
            Backend::Icedax => "icedax",
            Backend::Drutil => "drutil",
        }
    }

    /// Package that ships the program, where it differs from the program name
    pub fn package(self) -> Option<&'static str> {
        match self {
            Backend::CdInfo => Some("libcdio"),
            Backend::Cdda2wav => Some("cdrtools"),
            Backend::Icedax => Some("cdrkit"),
            _ => None,
        }
    }

    fn args(self, device: &str) -> Vec<String> {
        let args: Vec<&str> = match self {
            Backend::Mediatools => vec!["drive", device, "isrc"],
            Backend::MediaInfo => vec![device],
            Backend::Discisrc => vec![device],
            Backend::CdInfo => vec!["-T", "-A", "--no-device-info", "--no-cddb", "-C", device],
            Backend::Cdda2wav | Backend::Icedax => vec!["-J", "-H", "-D", device],
            Backend::Drutil => vec!["subchannel", "-drive", device],
            // cdrdao writes to a file, see read_cdrdao
            Backend::Cdrdao => vec![],
        };
        args.into_iter().map(str::to_string).collect()
    }

    /// cdda2wav and icedax report on stderr
    fn reports_on_stderr(self) -> bool {
        matches!(self, Backend::Cdda2wav | Backend::Icedax)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::PRIORITY
            .into_iter()
            .find(|b| b.program() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Backend::PRIORITY.iter().map(|b| b.program()).collect();
                format!("unknown backend '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Look for `program` on PATH
fn on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = dir.join(format!("{}.exe", program));
        exe.is_file().then_some(exe)
    })
}

/// First installed backend in priority order
pub fn find_available() -> Option<Backend> {
    let found = Backend::PRIORITY
        .into_iter()
        .find(|backend| on_path(backend.program()).is_some());
    match found {
        Some(backend) => info!("Using {} to read ISRCs", backend),
        None => warn!("No ISRC backend found on PATH"),
    }
    found
}

/// Describe the supported backends for error messages
pub fn describe_backends() -> String {
    Backend::PRIORITY
        .iter()
        .map(|b| match b.package() {
            Some(package) => format!("{} ({})", b.program(), package),
            None => b.program().to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn line_pattern(backend: Backend) -> &'static Regex {
    static DISCISRC: OnceLock<Regex> = OnceLock::new();
    static CDDA2WAV: OnceLock<Regex> = OnceLock::new();
    static CD_INFO: OnceLock<Regex> = OnceLock::new();
    static MEDIATOOLS: OnceLock<Regex> = OnceLock::new();
    static DRUTIL: OnceLock<Regex> = OnceLock::new();

    match backend {
        Backend::Discisrc => DISCISRC
            .get_or_init(|| Regex::new(r"^Track\s+([0-9]+)\s+:\s+(\S+)").unwrap()),
        Backend::Cdda2wav | Backend::Icedax => CDDA2WAV
            .get_or_init(|| Regex::new(r"^T:\s+([0-9]+)\s+ISRC:\s+(\S+)").unwrap()),
        Backend::CdInfo => CD_INFO
            .get_or_init(|| Regex::new(r"^TRACK\s+([0-9]+)\s+ISRC:\s+(\S+)").unwrap()),
        Backend::Mediatools | Backend::MediaInfo | Backend::Cdrdao => MEDIATOOLS
            .get_or_init(|| Regex::new(r"^ISRC\s+([0-9]+)\s+(\S+)").unwrap()),
        Backend::Drutil => DRUTIL
            .get_or_init(|| Regex::new(r"^Track\s+([0-9]+)\s+ISRC:\s+(\S+)").unwrap()),
    }
}

/// Whether a line is one the backend uses for ISRC reports
fn is_isrc_line(backend: Backend, line: &str) -> bool {
    match backend {
        Backend::Discisrc => line.starts_with("Track") && line.len() > 12,
        Backend::Cdda2wav | Backend::Icedax => line.starts_with("T:"),
        Backend::CdInfo => line.starts_with("TRACK") && line.contains("ISRC"),
        Backend::Mediatools | Backend::MediaInfo | Backend::Cdrdao => {
            line.starts_with("ISRC") && !line.starts_with("ISRCS")
        }
        Backend::Drutil => line.starts_with("Track") && line.contains("block"),
    }
}

/// Extract (track, code) pairs from a tool's output.
///
/// The first code reported for a track wins.
pub fn parse_isrc_output(backend: Backend, output: &str) -> BTreeMap<u8, String> {
    let mut found = BTreeMap::new();

    // some tools mix \r and \n
    for line in output.split(['\n', '\r']) {
        let line = line.trim_end();
        if !is_isrc_line(backend, line) {
            continue;
        }
        let Some(caps) = line_pattern(backend).captures(line) else {
            debug!("Can't find ISRC in: {}", line);
            continue;
        };
        let Ok(track) = caps[1].parse::<u8>() else {
            warn!("Ignoring ISRC line with bad track number: {}", line);
            continue;
        };
        found.entry(track).or_insert_with(|| caps[2].to_string());
    }

    found
}

/// Extract (track, code) pairs from a TOC file written by `cdrdao read-toc`
pub fn parse_cdrdao_toc(content: &str) -> BTreeMap<u8, String> {
    let mut found = BTreeMap::new();
    let mut track: Option<u8> = None;

    for line in content.lines() {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["//", _, number, ..] => track = number.parse().ok(),
            ["ISRC", rest @ ..] => {
                // guard against repeated tags (CD-Text) or missing track comments
                let Some(number) = track.take() else {
                    continue;
                };
                let code = rest.join("");
                let code = code.trim_matches(|c| c == '"' || c == '-' || c == ' ');
                if !code.is_empty() {
                    found.entry(number).or_insert_with(|| code.to_string());
                }
            }
            _ => {}
        }
    }

    found
}

/// Read a TOC from `cd-info -T` output: audio tracks plus the lead-out.
///
/// A data track after the audio tracks (enhanced CD) is not part of the
/// audio TOC; the lead-out is then placed before the data session.
pub fn parse_cd_info_toc(output: &str) -> Result<RawToc, DiscReadError> {
    static TRACK_LINE: OnceLock<Regex> = OnceLock::new();
    let pattern = TRACK_LINE.get_or_init(|| {
        Regex::new(r"^\s*([0-9]+):\s+[0-9]+:[0-9]+:[0-9]+\s+([0-9]+)\s+(\S+)").unwrap()
    });

    let mut track_offsets = Vec::new();
    let mut leadout = None;

    for line in output.lines() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        let bad_sector = || DiscReadError::Toc(format!("bad sector in: {}", line.trim()));
        let lsn: u32 = caps[2].parse().map_err(|_| bad_sector())?;
        let offset = lsn.checked_add(LEAD_IN).ok_or_else(bad_sector)?;
        match &caps[3] {
            "leadout" => {
                leadout = Some(offset);
                break;
            }
            "data" if !track_offsets.is_empty() => {
                let start = offset.saturating_sub(DATA_SESSION_GAP);
                debug!("Data track at {}, audio lead-out at {}", lsn, start);
                leadout = Some(start);
                break;
            }
            _ => track_offsets.push(offset),
        }
    }

    let leadout = leadout.ok_or_else(|| DiscReadError::Toc("no lead-out in cd-info output".into()))?;
    if track_offsets.is_empty() {
        return Err(DiscReadError::Toc("no tracks in cd-info output".into()));
    }

    Ok(RawToc {
        track_offsets,
        leadout,
    })
}

fn run_tool(program: &str, args: &[String], stderr: bool) -> Result<String, DiscReadError> {
    debug!("Running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| DiscReadError::Tool {
            tool: program.to_string(),
            message: e.to_string(),
        })?;

    let stream = if stderr { &output.stderr } else { &output.stdout };
    let text = String::from_utf8_lossy(stream).to_string();

    if !output.status.success() && text.trim().is_empty() {
        return Err(DiscReadError::Tool {
            tool: program.to_string(),
            message: format!("exited with {}", output.status),
        });
    }
    Ok(text)
}

/// Fresh directory for cdrdao's TOC file; cdrdao will not overwrite an existing file.
/// The directory is removed when the returned guard drops.
fn cdrdao_scratch() -> Result<(TempDir, PathBuf), DiscReadError> {
    let dir = tempfile::Builder::new().prefix("isrcsync-cdrdao").tempdir()?;
    let toc_path = dir.path().join("disc.toc");
    Ok((dir, toc_path))
}

fn read_cdrdao(device: &str) -> Result<BTreeMap<u8, String>, DiscReadError> {
    let (_scratch, toc_path) = cdrdao_scratch()?;
    let mut args = vec!["read-toc".to_string(), "--fast-toc".to_string()];
    // on Windows cdrdao picks its default device
    if !cfg!(target_os = "windows") {
        args.push("--device".to_string());
        args.push(device.to_string());
    }
    args.extend(["-v".to_string(), "0".to_string()]);
    args.push(toc_path.to_string_lossy().to_string());

    let status = Command::new("cdrdao")
        .args(&args)
        .output()
        .map_err(|e| DiscReadError::Tool {
            tool: "cdrdao".to_string(),
            message: e.to_string(),
        })?
        .status;

    if !status.success() {
        return Err(DiscReadError::Tool {
            tool: "cdrdao".to_string(),
            message: format!("exited with {}", status),
        });
    }
    read_cdrdao_toc_file(&toc_path)
}

pub fn read_cdrdao_toc_file(path: &Path) -> Result<BTreeMap<u8, String>, DiscReadError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_cdrdao_toc(&content))
}

/// Run `backend` against `device` and collect its ISRC readings
pub fn read_isrcs(backend: Backend, device: &str) -> Result<BTreeMap<u8, String>, DiscReadError> {
    let readings = match backend {
        Backend::Cdrdao => read_cdrdao(device)?,
        _ => {
            let output = run_tool(
                backend.program(),
                &backend.args(device),
                backend.reports_on_stderr(),
            )?;
            parse_isrc_output(backend, &output)
        }
    };
    info!("{} reported {} ISRC(s)", backend, readings.len());
    Ok(readings)
}

/// Reads TOC and ISRCs with libcdio's `cd-info`
pub struct CdInfoReader {
    device: String,
    output: Option<String>,
}

impl CdInfoReader {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            output: None,
        }
    }

    fn output(&mut self) -> Result<&str, DiscReadError> {
        if self.output.is_none() {
            let backend = Backend::CdInfo;
            let text = run_tool(backend.program(), &backend.args(&self.device), false)?;
            self.output = Some(text);
        }
        Ok(self.output.as_deref().unwrap_or_default())
    }
}

impl DiscReader for CdInfoReader {
    fn read_toc(&mut self) -> Result<RawToc, DiscReadError> {
        // a fresh read each time, so re-reads really hit the drive
        self.output = None;
        let output = self.output()?;
        parse_cd_info_toc(output)
    }

    fn read_isrc(&mut self, track: u8) -> Result<Option<String>, DiscReadError> {
        let output = self.output()?;
        Ok(parse_isrc_output(Backend::CdInfo, output).remove(&track))
    }
}

/// Takes the TOC from another reader and the ISRCs from a disc tool
pub struct IsrcToolReader<T> {
    toc_reader: T,
    backend: Backend,
    device: String,
    readings: Option<BTreeMap<u8, String>>,
}

impl<T: DiscReader> IsrcToolReader<T> {
    pub fn new(toc_reader: T, backend: Backend, device: impl Into<String>) -> Self {
        Self {
            toc_reader,
            backend,
            device: device.into(),
            readings: None,
        }
    }
}

impl<T: DiscReader> DiscReader for IsrcToolReader<T> {
    fn read_toc(&mut self) -> Result<RawToc, DiscReadError> {
        self.toc_reader.read_toc()
    }

    fn read_isrc(&mut self, track: u8) -> Result<Option<String>, DiscReadError> {
        if self.readings.is_none() {
            self.readings = Some(read_isrcs(self.backend, &self.device)?);
        }
        Ok(self
            .readings
            .as_ref()
            .and_then(|readings| readings.get(&track).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_backend_names_round_trip_through_from_str() {
        assert_eq!("cd-info".parse::<Backend>(), Ok(Backend::CdInfo));
        assert_eq!("media_info".parse::<Backend>(), Ok(Backend::MediaInfo));
        assert!("wodim".parse::<Backend>().is_err());
        assert!(describe_backends().contains("icedax (cdrkit)"));
    }

    #[test]
    fn test_parse_discisrc() {
        let output = "discisrc 1.0\nTrack  1 : US-RC1-76-07839\nTrack  2 : USRC17607840\n";
        let found = parse_isrc_output(Backend::Discisrc, output);
        assert_eq!(found.get(&1).map(String::as_str), Some("US-RC1-76-07839"));
        assert_eq!(found.get(&2).map(String::as_str), Some("USRC17607840"));
    }

    #[test]
    fn test_parse_icedax_with_carriage_returns() {
        let output = "\rT: 1 ISRC: USRC17607839\r\nT: 2 ISRC: GBAYE0601498\n";
        let found = parse_isrc_output(Backend::Icedax, output);
        assert_eq!(found.len(), 2);
        assert_eq!(found[&2], "GBAYE0601498");
    }

    #[test]
    fn test_parse_cd_info_isrcs() {
        let output = "\
CD-ROM Track List (1 - 2)
TRACK  1 ISRC: USRC17607839
TRACK  2 ISRC: USRC1760784
";
        let found = parse_isrc_output(Backend::CdInfo, output);
        assert_eq!(found[&1], "USRC17607839");
        // malformed codes are passed on, not dropped
        assert_eq!(found[&2], "USRC1760784");
    }

    #[test]
    fn test_parse_mediatools_skips_summary_line() {
        let output = "ISRCS 2\nISRC 1 USRC17607839\nISRC 2 GBAYE0601498\n";
        let found = parse_isrc_output(Backend::Mediatools, output);
        assert_eq!(found.len(), 2);
        assert_eq!(found[&1], "USRC17607839");
    }

    #[test]
    fn test_parse_drutil_needs_block_lines() {
        let output = "\
Track 1 ISRC: USRC17607839 block 150
Track 2 ISRC: USRC17607840
";
        let found = parse_isrc_output(Backend::Drutil, output);
        assert_eq!(found.len(), 1);
        assert_eq!(found[&1], "USRC17607839");
    }

    #[test]
    fn test_first_reading_per_track_wins() {
        let output = "TRACK  1 ISRC: USRC17607839\nTRACK  1 ISRC: USRC17607840\n";
        let found = parse_isrc_output(Backend::CdInfo, output);
        assert_eq!(found[&1], "USRC17607839");
    }

    #[test]
    fn test_parse_cdrdao_toc() {
        let content = r#"CD_DA

// Track 1
TRACK AUDIO
ISRC "USRC17607839"
ISRC "USRC99999999"

// Track 2
TRACK AUDIO
NO COPY

// Track 3
TRACK AUDIO
ISRC "GB-AYE-06-01498"
"#;
        let found = parse_cdrdao_toc(content);
        assert_eq!(found.len(), 2);
        assert_eq!(found[&1], "USRC17607839");
        assert_eq!(found[&3], "GB-AYE-06-01498");
    }

    #[test]
    fn test_read_cdrdao_toc_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "// Track 4\nTRACK AUDIO\nISRC \"USRC17607839\"").unwrap();

        let found = read_cdrdao_toc_file(file.path()).unwrap();
        assert_eq!(found[&4], "USRC17607839");
    }

    #[test]
    fn test_cdrdao_scratch_is_fresh_and_removed() {
        let (first, first_path) = cdrdao_scratch().unwrap();
        let (_second, second_path) = cdrdao_scratch().unwrap();
        assert_ne!(first_path, second_path);
        assert!(!first_path.exists());

        std::fs::write(&first_path, "TRACK AUDIO\n").unwrap();
        let dir = first.path().to_path_buf();
        drop(first);
        assert!(!dir.exists());
    }

    #[test]
    fn test_parse_cd_info_toc() {
        let output = "\
CD-ROM Track List (1 - 3)
  #: MSF       LSN    Type   Green? Copy? Channels Premphasis?
  1: 00:02:00  000000 audio  false  no    2        no
  2: 04:25:60  019785 audio  false  no    2        no
  3: 09:02:12  040512 audio  false  no    2        no
170: 13:41:32  061457 leadout (138 MB raw, 138 MB formatted)
";
        let toc = parse_cd_info_toc(output).unwrap();
        assert_eq!(toc.track_offsets, vec![150, 19935, 40662]);
        assert_eq!(toc.leadout, 61607);
    }

    #[test]
    fn test_parse_cd_info_toc_enhanced_cd() {
        let output = "\
  1: 00:02:00  000000 audio  false  no    2        no
  2: 04:25:60  019785 audio  false  no    2        no
  3: 20:00:00  089850 data   false  no
170: 40:00:00  179850 leadout (400 MB raw, 400 MB formatted)
";
        let toc = parse_cd_info_toc(output).unwrap();
        assert_eq!(toc.track_offsets, vec![150, 19935]);
        assert_eq!(toc.leadout, 89850 + 150 - 11400);
    }

    #[test]
    fn test_parse_cd_info_toc_without_leadout() {
        let output = "  1: 00:02:00  000000 audio  false  no    2        no\n";
        assert!(matches!(
            parse_cd_info_toc(output),
            Err(DiscReadError::Toc(_))
        ));
    }

    #[test]
    fn test_parse_cd_info_toc_rejects_out_of_range_sector() {
        let output = "\
  1: 00:02:00  4294967295 audio  false  no    2        no
170: 13:41:32  4294967295 leadout (138 MB raw, 138 MB formatted)
";
        assert!(matches!(
            parse_cd_info_toc(output),
            Err(DiscReadError::Toc(_))
        ));
    }
}
