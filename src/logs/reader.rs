// Log Reader
//
// Bounded, read-only view over a directory of log files.
//
// Unfiltered reads are tail-style: one pass counts lines, a second pass
// collects only the requested window, so memory stays proportional to the
// page size. Filtered reads go through a `LineSearcher` (grep first, in-process
// scan as fallback) and keep only the most recent `offset + lines` matches.
// Deep pages past MAX_RETAINED_MATCHES search twice: once to count matches,
// once to collect just the page.
//
// Only the returned entries are scrubbed.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use super::search::{
    trim_line_end, GrepSearcher, LineFilter, LineSearcher, MatchWindow, ScanSearcher,
};
use super::LogError;
use crate::config::LogsConfig;
use crate::scrubber::PiiScrubber;

/// Largest file an unfiltered read will open (50 MiB)
pub const MAX_UNFILTERED_SIZE: u64 = 50 * 1024 * 1024;

/// Matches a single filtered pass may hold in memory
const MAX_RETAINED_MATCHES: usize = 10_000;

/// Longest file name accepted (one path component on common filesystems)
const MAX_FILENAME_LEN: usize = 255;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A log file available for reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFile {
    pub name: String,
    pub size: u64,
    /// Modification time, seconds since the Unix epoch
    pub modified: i64,
}

/// One line of a log file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 1-based position in the file
    pub line: usize,
    pub content: String,
}

/// Parameters of a read
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReadRequest {
    pub lines: usize,
    pub offset: usize,
    pub search: Option<String>,
    pub level: Option<String>,
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self {
            lines: 100,
            offset: 0,
            search: None,
            level: None,
        }
    }
}

impl ReadRequest {
    /// Unfiltered read of the newest `lines` lines after skipping `offset`
    pub fn new(lines: usize, offset: usize) -> Self {
        Self {
            lines,
            offset,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }
}

/// A page of log entries, most recent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    pub entries: Vec<LogEntry>,
    /// Lines in the file (unfiltered) or matching lines (filtered)
    pub total_lines: usize,
    pub has_more: bool,
}

impl ReadResult {
    fn empty() -> Self {
        Self {
            entries: Vec::new(),
            total_lines: 0,
            has_more: false,
        }
    }
}

/// Stateless reader over the configured log directory
#[derive(Debug, Clone)]
pub struct LogReader {
    base_path: PathBuf,
    allowed_extensions: Vec<String>,
    max_lines: usize,
    scrubber: Arc<PiiScrubber>,
    searcher: Arc<dyn LineSearcher>,
}

impl LogReader {
    pub fn new(config: &LogsConfig, scrubber: Arc<PiiScrubber>) -> Self {
        Self {
            base_path: config.path.clone(),
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            max_lines: config.max_lines,
            scrubber,
            searcher: Arc::new(GrepSearcher::default()),
        }
    }

    /// Replace the primary search strategy used for filtered reads
    pub fn with_searcher(mut self, searcher: Arc<dyn LineSearcher>) -> Self {
        self.searcher = searcher;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// List readable log files, most recently modified first.
    ///
    /// A missing directory yields an empty list.
    pub fn list_files(&self) -> Result<Vec<LogFile>, LogError> {
        if !self.base_path.is_dir() {
            debug!("Log directory {:?} does not exist", self.base_path);
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.is_allowed_file(&name) {
                continue;
            }

            // Follows symlinks; a file rotated away mid-listing is skipped
            let metadata = match fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("Log file {:?} vanished while listing", name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            files.push(LogFile {
                name,
                size: metadata.len(),
                modified,
            });
        }

        files.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(files)
    }

    /// Read a page of entries from `filename`.
    ///
    /// # Errors
    ///
    /// - [`LogError::InvalidFilename`] / [`LogError::ExtensionNotAllowed`] before any I/O
    /// - [`LogError::NotFound`] if the file does not exist
    /// - [`LogError::InvalidFilter`] for a search or level term that cannot be compiled
    /// - [`LogError::TooLarge`] for unfiltered reads over [`MAX_UNFILTERED_SIZE`]
    pub fn read(&self, filename: &str, request: &ReadRequest) -> Result<ReadResult, LogError> {
        self.validate_filename(filename)?;

        let path = self.base_path.join(filename);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(LogError::NotFound(filename.to_string())),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::InvalidInput) => {
                return Err(LogError::NotFound(filename.to_string()))
            }
            Err(e) => return Err(LogError::Io(e)),
        };

        let lines = request.lines.min(self.max_lines);
        let filter = LineFilter::new(request.search.clone(), request.level.clone())?;
        let size = metadata.len();

        if !filter.is_active() && size > MAX_UNFILTERED_SIZE {
            return Err(LogError::TooLarge {
                size_mb: size as f64 / (1024.0 * 1024.0),
            });
        }

        if size == 0 {
            return Ok(ReadResult::empty());
        }

        let (mut entries, total_lines) = if filter.is_active() {
            self.read_filtered(&path, &filter, lines, request.offset)?
        } else {
            read_window(&path, lines, request.offset)?
        };

        for entry in &mut entries {
            entry.content = self.scrubber.scrub(&entry.content);
        }

        Ok(ReadResult {
            entries,
            total_lines,
            has_more: request.offset.saturating_add(lines) < total_lines,
        })
    }

    /// Newest `lines` entries of `filename`
    pub fn tail(&self, filename: &str, lines: usize) -> Result<Vec<LogEntry>, LogError> {
        Ok(self.read(filename, &ReadRequest::new(lines, 0))?.entries)
    }

    fn read_filtered(
        &self,
        path: &Path,
        filter: &LineFilter,
        lines: usize,
        offset: usize,
    ) -> Result<(Vec<LogEntry>, usize), LogError> {
        let retained = offset.saturating_add(lines);
        if retained <= MAX_RETAINED_MATCHES {
            let window = self.search(path, filter, MatchWindow::new(retained))?;
            return Ok(window.into_page(offset, lines));
        }

        let total = self.search(path, filter, MatchWindow::new(0))?.total();
        let end = total.saturating_sub(offset);
        let start = end.saturating_sub(lines);
        let (entries, _) = self
            .search(path, filter, MatchWindow::range(start, end))?
            .into_page(offset, lines);
        Ok((entries, total))
    }

    /// Run the configured searcher, rerunning as a scan if it fails
    fn search(
        &self,
        path: &Path,
        filter: &LineFilter,
        mut window: MatchWindow,
    ) -> Result<MatchWindow, LogError> {
        let fresh = window.reset();
        match self.searcher.search(path, filter, &mut window) {
            Ok(()) => return Ok(window),
            Err(e) => {
                warn!(
                    strategy = self.searcher.name(),
                    "Log search failed, falling back to scan: {}", e
                );
            }
        }

        let mut window = fresh;
        ScanSearcher.search(path, filter, &mut window)?;
        Ok(window)
    }

    fn validate_filename(&self, filename: &str) -> Result<(), LogError> {
        if filename.contains("..")
            || filename.contains(['/', '\\', '\0'])
            || filename.len() > MAX_FILENAME_LEN
        {
            return Err(LogError::InvalidFilename);
        }
        if !self.is_allowed_file(filename) {
            return Err(LogError::ExtensionNotAllowed);
        }
        Ok(())
    }

    fn is_allowed_file(&self, filename: &str) -> bool {
        if filename.is_empty() || filename == "." || filename == ".." {
            return false;
        }
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        self.allowed_extensions.iter().any(|allowed| *allowed == extension)
    }
}

/// Count the lines of a file without holding it in memory.
///
/// A trailing newline does not start a new line.
fn count_lines(path: &Path) -> Result<usize, LogError> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut count = 0usize;
    let mut last = None;

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        count += memchr::memchr_iter(b'\n', &buf[..n]).count();
        last = Some(buf[n - 1]);
    }

    match last {
        Some(b'\n') | None => Ok(count),
        Some(_) => Ok(count + 1),
    }
}

/// Lines `[total - offset - lines, total - offset)` in reverse file order
fn read_window(path: &Path, lines: usize, offset: usize) -> Result<(Vec<LogEntry>, usize), LogError> {
    let total = count_lines(path)?;
    let end = total.saturating_sub(offset);
    let start = end.saturating_sub(lines);

    if start >= end {
        return Ok((Vec::new(), total));
    }

    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(path)?);
    let mut buf = Vec::new();
    let mut entries = Vec::with_capacity(end - start);
    let mut index = 0usize;

    while index < end {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            // File shrank between passes
            break;
        }
        if index >= start {
            entries.push(LogEntry {
                line: index + 1,
                content: String::from_utf8_lossy(trim_line_end(&buf)).into_owned(),
            });
        }
        index += 1;
    }

    entries.reverse();
    Ok((entries, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn setup(files: &[(&str, &str)]) -> (TempDir, LogReader) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let config = LogsConfig {
            path: dir.path().to_path_buf(),
            ..Default::default()
        };
        let reader = LogReader::new(&config, Arc::new(PiiScrubber::with_defaults().unwrap()));
        (dir, reader)
    }

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {}\n", i)).collect()
    }

    fn line_numbers(entries: &[LogEntry]) -> Vec<usize> {
        entries.iter().map(|e| e.line).collect()
    }

    #[test]
    fn test_list_files_filters_and_sorts() {
        let (dir, reader) = setup(&[("a.log", "x"), ("notes.txt", "y"), ("B.LOG", "z")]);
        fs::create_dir(dir.path().join("dir.log")).unwrap();

        let old = File::options().write(true).open(dir.path().join("a.log")).unwrap();
        old.set_modified(std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1000))
            .unwrap();

        let files = reader.list_files().unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["B.LOG", "a.log"]);
        assert_eq!(files[1].modified, 1000);
        assert_eq!(files[1].size, 1);
    }

    #[test]
    fn test_list_files_missing_directory_is_empty() {
        let config = LogsConfig {
            path: PathBuf::from("/nonexistent/kick/logs"),
            ..Default::default()
        };
        let reader = LogReader::new(&config, Arc::new(PiiScrubber::disabled()));
        assert!(reader.list_files().unwrap().is_empty());
    }

    #[test]
    fn test_path_traversal_rejected_before_io() {
        let (_dir, reader) = setup(&[]);
        for name in ["../../etc/passwd", "../app.log", "sub/app.log", "sub\\app.log", "..log"] {
            assert!(
                matches!(reader.read(name, &ReadRequest::default()), Err(LogError::InvalidFilename)),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_nul_and_overlong_names_rejected() {
        let (_dir, reader) = setup(&[]);
        let overlong = format!("{}.log", "a".repeat(300));
        for name in ["a\0.log", overlong.as_str()] {
            assert!(matches!(
                reader.read(name, &ReadRequest::default()),
                Err(LogError::InvalidFilename)
            ));
        }

        let longest = format!("{}.log", "a".repeat(MAX_FILENAME_LEN - 4));
        assert!(matches!(
            reader.read(&longest, &ReadRequest::default()),
            Err(LogError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_list_files_skips_vanished_entries() {
        let (dir, reader) = setup(&[("app.log", "x\n")]);
        // Same state as a file rotated away between readdir and stat
        std::os::unix::fs::symlink(dir.path().join("gone.log"), dir.path().join("rotated.log"))
            .unwrap();

        let files = reader.list_files().unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["app.log"]);
    }

    #[test]
    fn test_disallowed_extension_rejected() {
        let (_dir, reader) = setup(&[("secrets.env", "KEY=1")]);
        assert!(matches!(
            reader.read("secrets.env", &ReadRequest::default()),
            Err(LogError::ExtensionNotAllowed)
        ));
        assert!(matches!(
            reader.read("noextension", &ReadRequest::default()),
            Err(LogError::ExtensionNotAllowed)
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let (_dir, reader) = setup(&[]);
        let err = reader.read("missing.log", &ReadRequest::default()).unwrap_err();
        assert!(matches!(err, LogError::NotFound(ref f) if f == "missing.log"));
        assert_eq!(err.to_string(), "Log file not found: missing.log");
    }

    #[test]
    fn test_empty_file() {
        let (_dir, reader) = setup(&[("empty.log", "")]);
        let result = reader.read("empty.log", &ReadRequest::new(10, 0)).unwrap();
        assert_eq!(result, ReadResult::empty());

        let filtered = reader
            .read("empty.log", &ReadRequest::new(10, 3).with_level("ERROR"))
            .unwrap();
        assert_eq!(filtered, ReadResult::empty());
    }

    #[test]
    fn test_unfiltered_read_is_most_recent_first() {
        let (_dir, reader) = setup(&[("app.log", &numbered(10))]);
        let result = reader.read("app.log", &ReadRequest::new(3, 0)).unwrap();

        assert_eq!(line_numbers(&result.entries), vec![10, 9, 8]);
        assert_eq!(result.entries[0].content, "line 10");
        assert_eq!(result.total_lines, 10);
        assert!(result.has_more);
    }

    #[test]
    fn test_unfiltered_pagination() {
        let (_dir, reader) = setup(&[("app.log", &numbered(10))]);

        let page = reader.read("app.log", &ReadRequest::new(4, 8)).unwrap();
        assert_eq!(line_numbers(&page.entries), vec![2, 1]);
        assert!(!page.has_more);

        let past_end = reader.read("app.log", &ReadRequest::new(4, 20)).unwrap();
        assert!(past_end.entries.is_empty());
        assert_eq!(past_end.total_lines, 10);
        assert!(!past_end.has_more);
    }

    #[test]
    fn test_unterminated_last_line_counts() {
        let (_dir, reader) = setup(&[("app.log", "one\ntwo\nthree")]);
        let result = reader.read("app.log", &ReadRequest::new(10, 0)).unwrap();
        assert_eq!(result.total_lines, 3);
        assert_eq!(result.entries[0].content, "three");
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let (_dir, reader) = setup(&[("app.log", "one\r\n\r\nthree\r\n")]);
        let result = reader.read("app.log", &ReadRequest::new(10, 0)).unwrap();
        assert_eq!(result.total_lines, 3);
        let contents: Vec<&str> = result.entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "", "one"]);
    }

    #[test]
    fn test_line_cap_applies() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.log"), numbered(50)).unwrap();
        let config = LogsConfig {
            path: dir.path().to_path_buf(),
            max_lines: 5,
            ..Default::default()
        };
        let reader = LogReader::new(&config, Arc::new(PiiScrubber::disabled()));

        let result = reader.read("app.log", &ReadRequest::new(100, 0)).unwrap();
        assert_eq!(result.entries.len(), 5);
        assert!(result.has_more);

        let filtered = reader
            .read("app.log", &ReadRequest::new(100, 0).with_search("line"))
            .unwrap();
        assert_eq!(filtered.entries.len(), 5);
        assert_eq!(filtered.total_lines, 50);
    }

    #[test]
    fn test_level_filter_single_match() {
        let (_dir, reader) = setup(&[(
            "app.log",
            "local.INFO: started\nlocal.ERROR: failed\nlocal.DEBUG: detail\n",
        )]);
        let result = reader
            .read("app.log", &ReadRequest::new(100, 0).with_level("ERROR"))
            .unwrap();

        assert_eq!(result.total_lines, 1);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].line, 2);
        assert!(!result.has_more);
    }

    #[test]
    fn test_deep_filtered_page_collects_only_window() {
        let total = MAX_RETAINED_MATCHES + 500;
        let content: String = (1..=total)
            .map(|i| format!("local.ERROR: failure {}\nlocal.INFO: ok {}\n", i, i))
            .collect();
        let (_dir, reader) = setup(&[("app.log", &content)]);
        let reader = reader.with_searcher(Arc::new(ScanSearcher));

        let request = ReadRequest::new(3, MAX_RETAINED_MATCHES + 100).with_level("ERROR");
        let result = reader.read("app.log", &request).unwrap();

        assert_eq!(result.total_lines, total);
        assert!(result.has_more);
        // Match k (1-based, file order) sits on line 2k - 1
        let expected: Vec<usize> = (0..3).map(|i| 2 * (total - request.offset - i) - 1).collect();
        assert_eq!(line_numbers(&result.entries), expected);
        assert_eq!(
            result.entries[0].content,
            format!("local.ERROR: failure {}", total - request.offset)
        );

        let past_end = reader
            .read("app.log", &ReadRequest::new(3, total + 1).with_level("ERROR"))
            .unwrap();
        assert!(past_end.entries.is_empty());
        assert_eq!(past_end.total_lines, total);
    }

    #[test]
    fn test_oversized_filter_term_rejected() {
        let (_dir, reader) = setup(&[("app.log", "x\n")]);
        let request = ReadRequest::new(10, 0).with_search("x".repeat(2048));
        assert!(matches!(
            reader.read("app.log", &request),
            Err(LogError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_filtered_read_scrubs_entries() {
        let (_dir, reader) = setup(&[(
            "app.log",
            "local.ERROR: mail to john@example.com bounced\nlocal.INFO: ok\n",
        )]);
        let result = reader
            .read("app.log", &ReadRequest::new(10, 0).with_level("error"))
            .unwrap();
        assert_eq!(result.entries[0].content, "local.ERROR: mail to [EMAIL] bounced");
    }

    #[test]
    fn test_unfiltered_read_scrubs_entries() {
        let (_dir, reader) = setup(&[("app.log", "login from 10.0.0.1\n")]);
        let entries = reader.tail("app.log", 5).unwrap();
        assert_eq!(entries[0].content, "login from [IP]");
    }

    #[test]
    fn test_size_guard_only_applies_unfiltered() {
        let (dir, reader) = setup(&[]);
        let path = dir.path().join("huge.log");
        let file = File::create(&path).unwrap();
        file.set_len(MAX_UNFILTERED_SIZE + 1).unwrap();

        let err = reader.read("huge.log", &ReadRequest::new(10, 0)).unwrap_err();
        assert!(matches!(err, LogError::TooLarge { .. }));
        assert!(err.to_string().contains("Use search or level filter"));
    }

    #[test]
    fn test_falls_back_when_grep_is_missing() {
        let (_dir, reader) = setup(&[("app.log", "a ERROR\nb INFO\nc ERROR\n")]);
        let reader = reader.with_searcher(Arc::new(GrepSearcher::new("/nonexistent/grep")));

        let result = reader
            .read("app.log", &ReadRequest::new(10, 0).with_level("ERROR"))
            .unwrap();
        assert_eq!(line_numbers(&result.entries), vec![3, 1]);
    }

    #[test]
    fn test_tail() {
        let (dir, reader) = setup(&[("app.log", &numbered(4))]);
        let mut file = File::options()
            .append(true)
            .open(dir.path().join("app.log"))
            .unwrap();
        writeln!(file, "line 5").unwrap();

        let entries = reader.tail("app.log", 2).unwrap();
        assert_eq!(line_numbers(&entries), vec![5, 4]);
    }

    #[test]
    fn test_count_lines() {
        let (dir, _reader) = setup(&[("a.log", "x\ny\n"), ("b.log", "x\ny"), ("c.log", "\n")]);
        assert_eq!(count_lines(&dir.path().join("a.log")).unwrap(), 2);
        assert_eq!(count_lines(&dir.path().join("b.log")).unwrap(), 2);
        assert_eq!(count_lines(&dir.path().join("c.log")).unwrap(), 1);
    }
}
