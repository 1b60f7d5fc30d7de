//! Parser for `sdm status` output
//!
//! The tool prints whitespace-aligned tables, one per resource kind:
//!
//! ```text
//!  SERVER      STATUS         PORT   TYPE
//!  web-1       connected      22     ssh
//!  db-admin    not connected  22     ssh
//!  WEBSITE     URL
//!  Wiki        https://wiki.example.com   team:docs
//! ```
//!
//! [`normalize_status`] squeezes runs of spaces and rewrites the status
//! column of server and datasource lines to `1`/`0`; [`parse_status`]
//! turns the normalized text into a [`ResourceModel`]. Lines that do not fit their section are reported as
//! [`LineError`]s and skipped.

use crate::model::{Entry, ResourceModel, Section, SectionKind};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::{debug, warn};

static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());
// Status column right after the name token
static NOT_CONNECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( ?[^ ]+ )not connected(\s|$)").unwrap());
static CONNECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( ?[^ ]+ )connected(\s|$)").unwrap());

/// A status line that could not be turned into an entry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    #[error("line {line_no}: expected name and status in {kind} section: {line:?}")]
    MissingFields {
        line_no: usize,
        kind: SectionKind,
        line: String,
    },

    #[error("line {line_no}: no url in website line: {line:?}")]
    MissingUrl { line_no: usize, line: String },
}

/// Result of parsing one status text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStatus {
    pub model: ResourceModel,
    pub issues: Vec<LineError>,
}

/// Squeeze repeated spaces and rewrite connection states to `1`/`0`.
///
/// Only the column following the name of a server or datasource line is
/// rewritten. Names, website lines and text before the first header are
/// left alone.
pub fn normalize_status(raw: &str) -> String {
    let squeezed = SPACE_RUNS.replace_all(raw, " ");
    let mut out = String::with_capacity(squeezed.len());
    let mut kind: Option<SectionKind> = None;

    for line in squeezed.split_inclusive('\n') {
        if let Some(header) = SectionKind::from_header(line) {
            kind = Some(header);
            out.push_str(line);
            continue;
        }
        match kind {
            Some(k) if k.is_connectable() => out.push_str(&flag_status(line)),
            _ => out.push_str(line),
        }
    }
    out
}

fn flag_status(line: &str) -> Cow<'_, str> {
    if NOT_CONNECTED.is_match(line) {
        NOT_CONNECTED.replace(line, "${1}0${2}")
    } else {
        CONNECTED.replace(line, "${1}1${2}")
    }
}

/// Parse normalized status text into sections.
///
/// Lines before the first header are ignored.
pub fn parse_status(text: &str) -> ParsedStatus {
    let mut parsed = ParsedStatus::default();
    let mut current: Option<Section> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        if let Some(kind) = SectionKind::from_header(line) {
            if let Some(done) = current.replace(Section::new(kind)) {
                parsed.model.sections.push(done);
            }
            continue;
        }

        let Some(section) = current.as_mut() else {
            debug!("Skipping line {} before any section header", line_no);
            continue;
        };

        let entry = match section.kind {
            SectionKind::Website => parse_website_line(line_no, line),
            kind => parse_resource_line(line_no, kind, line),
        };
        match entry {
            Ok(entry) => section.entries.push(entry),
            Err(e) => parsed.issues.push(e),
        }
    }

    if let Some(done) = current {
        parsed.model.sections.push(done);
    }
    parsed
}

/// ` <name> <flag> ...` where flag `1` means connected
fn parse_resource_line(line_no: usize, kind: SectionKind, line: &str) -> Result<Entry, LineError> {
    let tokens: Vec<&str> = line.split(' ').collect();
    match tokens.as_slice() {
        [_, name, flag, ..] if !name.is_empty() && !flag.is_empty() => {
            Ok(Entry::resource(*name, *flag == "1"))
        }
        _ => Err(LineError::MissingFields {
            line_no,
            kind,
            line: line.to_string(),
        }),
    }
}

/// `<name> http<rest> [labels]`
fn parse_website_line(line_no: usize, line: &str) -> Result<Entry, LineError> {
    let missing = || LineError::MissingUrl {
        line_no,
        line: line.to_string(),
    };
    let (name, rest) = line.split_once("http").ok_or_else(missing)?;
    let url = rest.trim_start().split(' ').next().unwrap_or_default();
    if url.is_empty() {
        return Err(missing());
    }
    Ok(Entry::website(name.trim(), url))
}

/// Stateful parser that skips work when the tool output did not change.
#[derive(Debug, Default)]
pub struct StatusParser {
    previous: String,
}

impl StatusParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh model, or `None` when `raw` equals the last input.
    pub fn parse(&mut self, raw: &str) -> Option<ResourceModel> {
        if self.previous == raw {
            return None;
        }
        self.previous = raw.to_string();

        let parsed = parse_status(&normalize_status(raw));
        for issue in &parsed.issues {
            warn!("Malformed status line skipped: {}", issue);
        }
        debug!(
            "Parsed {} sections, {} active",
            parsed.model.sections.len(),
            parsed.model.active_count()
        );
        Some(parsed.model)
    }

    /// Forget the last input so the next parse always yields a model.
    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RAW: &str = concat!(
        " SERVER      STATUS         PORT   TYPE\n",
        " web-1       connected      22     ssh\n",
        " db-admin    not connected  22     ssh\n",
        " DATASOURCE  STATUS         PORT   TYPE\n",
        " pg-prod     not connected  15432  postgres\n",
        " WEBSITE     URL\n",
        " Wiki        https://wiki.example.com   team:docs\n",
    );

    #[test]
    fn test_normalize_status() {
        assert_eq!(
            normalize_status(" SERVER  STATUS\n web-1    connected   22\n db   not connected  22"),
            " SERVER STATUS\n web-1 1 22\n db 0 22"
        );
    }

    #[test]
    fn test_normalize_keeps_names_containing_connected() {
        assert_eq!(
            normalize_status(" SERVER STATUS\n disconnected-db   connected\r\n"),
            " SERVER STATUS\n disconnected-db 1\r\n"
        );

        let model = parse_status(&normalize_status(
            " SERVER   STATUS\n connected-vm   not connected   22\n vm-connected  connected  22\n",
        ))
        .model;
        assert_eq!(
            model.sections[0].entries,
            vec![
                Entry::resource("connected-vm", false),
                Entry::resource("vm-connected", true),
            ]
        );
    }

    #[test]
    fn test_normalize_leaves_website_lines_alone() {
        let text = " WEBSITE URL\n Portal https://connected.example.com   not connected\n";
        assert_eq!(
            normalize_status(text),
            " WEBSITE URL\n Portal https://connected.example.com not connected\n"
        );

        let model = parse_status(&normalize_status(text)).model;
        assert_eq!(
            model.sections[0].entries,
            vec![Entry::website("Portal", "s://connected.example.com")]
        );
    }

    #[test]
    fn test_normalize_skips_lines_before_header() {
        assert_eq!(
            normalize_status("you are connected\n"),
            "you are connected\n"
        );
    }

    #[test]
    fn test_parse_full_status() {
        let parsed = parse_status(&normalize_status(RAW));
        assert!(parsed.issues.is_empty());

        let model = parsed.model;
        assert_eq!(model.sections.len(), 3);
        assert_eq!(model.sections[0].kind, SectionKind::Server);
        assert_eq!(
            model.sections[0].entries,
            vec![Entry::resource("web-1", true), Entry::resource("db-admin", false)]
        );
        assert_eq!(model.sections[1].kind, SectionKind::Datasource);
        assert_eq!(model.sections[1].display_name, "Datasources");
        assert_eq!(
            model.sections[2].entries,
            vec![Entry::website("Wiki", "s://wiki.example.com")]
        );
    }

    #[test]
    fn test_parse_server_flags() {
        let model = parse_status(" SERVER STATUS\n up 1 22\n down 0 22\n").model;
        assert_eq!(
            model.sections[0].entries,
            vec![Entry::resource("up", true), Entry::resource("down", false)]
        );
    }

    #[test]
    fn test_parse_website_line() {
        let model = parse_status(" WEBSITE URL\nExample http example.com/path label\n").model;
        assert_eq!(
            model.sections[0].entries,
            vec![Entry::website("Example", "example.com/path")]
        );
    }

    #[test]
    fn test_lines_before_header_ignored() {
        let parsed = parse_status("garbage line here\n SERVER STATUS\n web 1 22\n");
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.model.sections.len(), 1);
        assert_eq!(parsed.model.sections[0].entries.len(), 1);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let parsed = parse_status(" SERVER STATUS\n lonely\n ok 1 22\n WEBSITE URL\n no-url here\n");
        assert_eq!(parsed.model.sections[0].entries, vec![Entry::resource("ok", true)]);
        assert!(parsed.model.sections[1].entries.is_empty());
        assert_eq!(parsed.issues.len(), 2);
        assert!(matches!(parsed.issues[0], LineError::MissingFields { line_no: 2, .. }));
        assert!(matches!(parsed.issues[1], LineError::MissingUrl { line_no: 5, .. }));
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let parsed = parse_status(" SERVER STATUS\r\n \r\n\r\n web 1 22\r\n");
        assert_eq!(parsed.model.sections[0].entries, vec![Entry::resource("web", true)]);
    }

    #[test]
    fn test_identical_input_is_unchanged() {
        let mut parser = StatusParser::new();
        assert!(parser.parse(RAW).is_some());
        assert!(parser.parse(RAW).is_none());

        parser.reset();
        assert!(parser.parse(RAW).is_some());
    }

    #[test]
    fn test_empty_output_before_first_poll_is_unchanged() {
        let mut parser = StatusParser::new();
        assert!(parser.parse("").is_none());
    }
}
