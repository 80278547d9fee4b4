// Filtered log search strategies
//
// A filtered read walks every line of a file and keeps the ones that satisfy a
// `LineFilter`. Two strategies exist:
//
// - `GrepSearcher` pipes the file through the system `grep` as a literal,
//   case-insensitive pre-filter and re-checks every hit with `LineFilter`
// - `ScanSearcher` reads the file line by line in-process
//
// Both feed the same `MatchWindow`, so they produce identical pages. The grep
// path is only a throughput optimization; any failure there makes the reader
// rerun the scan.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use regex::bytes::{Regex, RegexBuilder};

use super::reader::LogEntry;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Longest accepted search or level term, in bytes
pub const MAX_FILTER_TERM: usize = 1024;

/// Errors raised by a search strategy
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The strategy cannot run on this host (e.g. grep is not installed)
    #[error("Search tool unavailable: {0}")]
    Unavailable(#[source] io::Error),

    /// The strategy ran but did not complete normally
    #[error("Search failed: {0}")]
    Failed(String),

    #[error("Failed to read log file: {0}")]
    Io(#[from] io::Error),

    /// A search or level term that cannot be used as a filter
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
}

/// Line predicate for filtered reads.
///
/// Matching is done on raw bytes with ASCII case folding:
/// - `search` matches as a substring
/// - `level` matches as a whole word (`\b` boundaries over `[A-Za-z0-9_]`)
///
/// Blank lines never match.
#[derive(Debug, Clone, Default)]
pub struct LineFilter {
    search: Option<Regex>,
    level: Option<Regex>,
    prefilter: Option<String>,
}

impl LineFilter {
    /// Compile the filter once per read
    pub fn new(search: Option<String>, level: Option<String>) -> Result<Self, SearchError> {
        for term in search.iter().chain(level.iter()) {
            if term.len() > MAX_FILTER_TERM {
                return Err(SearchError::InvalidFilter(format!(
                    "term exceeds {} bytes",
                    MAX_FILTER_TERM
                )));
            }
        }

        let search_re = search
            .as_deref()
            .map(|term| compile(&literal_pattern(term)))
            .transpose()?;
        let level_re = level
            .as_deref()
            .map(|term| compile(&format!(r"\b{}\b", literal_pattern(term))))
            .transpose()?;

        Ok(Self {
            search: search_re,
            level: level_re,
            prefilter: search.or(level),
        })
    }

    /// Whether any filter is set
    pub fn is_active(&self) -> bool {
        self.search.is_some() || self.level.is_some()
    }

    /// Literal term every matching line must contain (ignoring ASCII case)
    pub fn prefilter_term(&self) -> Option<&str> {
        self.prefilter.as_deref()
    }

    /// Test a line with its terminator already removed
    pub fn matches(&self, content: &[u8]) -> bool {
        if content.is_empty() {
            return false;
        }
        let search = self.search.as_ref().map_or(true, |re| re.is_match(content));
        search && self.level.as_ref().map_or(true, |re| re.is_match(content))
    }
}

/// ASCII-only case folding; `\b` is an ASCII word boundary
fn compile(pattern: &str) -> Result<Regex, SearchError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .unicode(false)
        .build()
        .map_err(|e| SearchError::InvalidFilter(e.to_string()))
}

/// Escape `term` as a byte literal. Non-ASCII bytes are written as `\xNN` so
/// they match exactly and are never case folded.
fn literal_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len());
    for &byte in term.as_bytes() {
        if byte.is_ascii() {
            let mut utf8 = [0u8; 4];
            pattern.push_str(&regex::escape(char::from(byte).encode_utf8(&mut utf8)));
        } else {
            pattern.push_str(&format!(r"\x{:02X}", byte));
        }
    }
    pattern
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retain {
    /// The newest `n` matches
    Newest(usize),
    /// Matches whose 0-based ordinal, in file order, lies in `start..end`
    Range { start: usize, end: usize },
}

/// Collects the matches a page needs plus a running total
#[derive(Debug)]
pub struct MatchWindow {
    retain: Retain,
    matches: VecDeque<(usize, Vec<u8>)>,
    total: usize,
}

impl MatchWindow {
    /// Keep the most recent `capacity` matches
    pub fn new(capacity: usize) -> Self {
        Self::with_retain(Retain::Newest(capacity))
    }

    /// Keep only the matches with ordinals `start..end`
    pub fn range(start: usize, end: usize) -> Self {
        Self::with_retain(Retain::Range { start, end })
    }

    fn with_retain(retain: Retain) -> Self {
        Self {
            retain,
            matches: VecDeque::new(),
            total: 0,
        }
    }

    /// An empty window with the same retention
    pub fn reset(&self) -> Self {
        Self::with_retain(self.retain)
    }

    /// Record a match; `line` is the 1-based line number
    pub fn push(&mut self, line: usize, content: Vec<u8>) {
        let ordinal = self.total;
        self.total += 1;

        match self.retain {
            Retain::Newest(0) => {}
            Retain::Newest(capacity) => {
                if self.matches.len() == capacity {
                    self.matches.pop_front();
                }
                self.matches.push_back((line, content));
            }
            Retain::Range { start, end } => {
                if (start..end).contains(&ordinal) {
                    self.matches.push_back((line, content));
                }
            }
        }
    }

    /// Number of matches seen
    pub fn total(&self) -> usize {
        self.total
    }

    /// Page of matches, most recent first, skipping the newest `offset`.
    ///
    /// A range window already holds exactly one page, so `offset` is not
    /// applied again.
    pub fn into_page(self, offset: usize, lines: usize) -> (Vec<LogEntry>, usize) {
        let total = self.total;
        let skip = match self.retain {
            Retain::Newest(_) => offset,
            Retain::Range { .. } => 0,
        };
        let entries = self
            .matches
            .into_iter()
            .rev()
            .skip(skip)
            .take(lines)
            .map(|(line, content)| LogEntry {
                line,
                content: String::from_utf8_lossy(&content).into_owned(),
            })
            .collect();
        (entries, total)
    }
}

/// A strategy for finding the lines of a file that satisfy a filter
pub trait LineSearcher: std::fmt::Debug + Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Push every matching line of `path`, in file order, into `window`
    fn search(
        &self,
        path: &Path,
        filter: &LineFilter,
        window: &mut MatchWindow,
    ) -> Result<(), SearchError>;
}

/// In-process line-by-line scan
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSearcher;

impl LineSearcher for ScanSearcher {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn search(
        &self,
        path: &Path,
        filter: &LineFilter,
        window: &mut MatchWindow,
    ) -> Result<(), SearchError> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        let mut buf = Vec::new();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_no += 1;

            let content = trim_line_end(&buf);
            if filter.matches(content) {
                window.push(line_no, content.to_vec());
            }
        }

        Ok(())
    }
}

/// System grep used as a literal pre-filter
#[derive(Debug, Clone)]
pub struct GrepSearcher {
    program: PathBuf,
}

impl Default for GrepSearcher {
    fn default() -> Self {
        Self::new("grep")
    }
}

impl GrepSearcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl LineSearcher for GrepSearcher {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn search(
        &self,
        path: &Path,
        filter: &LineFilter,
        window: &mut MatchWindow,
    ) -> Result<(), SearchError> {
        let term = filter.prefilter_term().unwrap_or("");

        // Arguments are passed discretely; nothing goes through a shell.
        // The C locale keeps grep's case folding to ASCII, matching LineFilter.
        let mut child = Command::new(&self.program)
            .env("LC_ALL", "C")
            .args(["-a", "-n", "-i", "-F", "-e"])
            .arg(term)
            .arg("--")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(SearchError::Unavailable)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SearchError::Failed("grep stdout not captured".to_string()))?;

        let parsed = read_grep_output(stdout, filter, window);
        let status = child.wait()?;
        parsed?;

        match status.code() {
            // 0: matches found, 1: no matches
            Some(0) | Some(1) => Ok(()),
            Some(code) => Err(SearchError::Failed(format!("grep exited with status {}", code))),
            None => Err(SearchError::Failed("grep terminated by signal".to_string())),
        }
    }
}

fn read_grep_output<R: io::Read>(
    stdout: R,
    filter: &LineFilter,
    window: &mut MatchWindow,
) -> Result<(), SearchError> {
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }

        // Output format: <line number>:<line>
        let colon = memchr::memchr(b':', &buf)
            .ok_or_else(|| SearchError::Failed("malformed grep output".to_string()))?;
        let line_no = std::str::from_utf8(&buf[..colon])
            .ok()
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| SearchError::Failed("malformed grep line number".to_string()))?;

        let content = trim_line_end(&buf[colon + 1..]);
        if filter.matches(content) {
            window.push(line_no, content.to_vec());
        }
    }
}

/// Strip every trailing `\r` and `\n`
pub(crate) fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}
