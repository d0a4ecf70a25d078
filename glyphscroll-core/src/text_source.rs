use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::error::Error;

/// Byte offsets of line starts discovered so far.
///
/// Entry `n` is the offset of the first byte of line `n`. Entry 0 always
/// exists and is 0; offsets are strictly increasing and only ever cover a
/// contiguous prefix of the file, since they are recorded as lines are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    offsets: Vec<u64>,
}

impl Default for LineIndex {
    fn default() -> Self {
        Self { offsets: vec![0] }
    }
}

impl LineIndex {
    /// Number of lines whose start offset is known.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Always false, as line 0 is always known.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Start offset of `line`, if it has been discovered.
    pub fn get(&self, line: usize) -> Option<u64> {
        self.offsets.get(line).copied()
    }

    /// Every known line start, in line order.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// The highest indexed line and its offset.
    fn last(&self) -> (usize, u64) {
        let line = self.offsets.len() - 1;
        (line, self.offsets[line])
    }

    fn record(&mut self, line: usize, offset: u64) {
        debug_assert!(line <= self.offsets.len(), "line {line} skips the indexed prefix");

        if line == self.offsets.len() {
            self.offsets.push(offset);
        } else if let Some(slot) = self.offsets.get_mut(line) {
            *slot = offset;
        }
    }

    /// Forgets every line starting after `offset`. Returns how many were dropped.
    fn truncate_after(&mut self, offset: u64) -> usize {
        let keep = self
            .offsets
            .partition_point(|&start| start <= offset)
            .max(1);
        let dropped = self.offsets.len() - keep;
        self.offsets.truncate(keep);
        dropped
    }
}

#[derive(Debug)]
enum Backing {
    /// Opened directly; writes are refused
    ReadOnly,
    /// A private copy of the original that is removed when the source closes
    Swap { path: PathBuf },
}

/// A text file read line by line through a lazily grown [`LineIndex`].
///
/// Seeking to a line that has been seen before is a single seek; seeking
/// further down reads forward from the last known line start, recording
/// every line boundary on the way.
#[derive(Debug)]
pub struct TextSource {
    stream: Option<BufReader<File>>,
    backing: Backing,
    index: LineIndex,
    current_line: usize,
}

impl Default for TextSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSource {
    /// Creates a source with no file; every read yields `None`.
    pub fn new() -> Self {
        Self {
            stream: None,
            backing: Backing::ReadOnly,
            index: LineIndex::default(),
            current_line: 0,
        }
    }

    /// Opens `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut source = Self::new();
        source.load(path)?;
        Ok(source)
    }

    /// Copies `path` to a swap file next to it and opens the copy for editing.
    pub fn open_swap(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut source = Self::new();
        source.load_swap(path)?;
        Ok(source)
    }

    /// Location of the editable copy made for `path`.
    pub fn swap_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".swap");
        PathBuf::from(name)
    }

    /// Replaces the current file with `path`, opened read-only.
    ///
    /// On failure the previous file stays open and untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let file = File::open(path)?;

        self.replace(file, Backing::ReadOnly);
        debug!(path = %path.display(), "Opened text source");
        Ok(())
    }

    /// Replaces the current file with an editable swap copy of `path`.
    pub fn load_swap(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let swap = Self::swap_path(path);

        // reopening the same file: the old swap would be removed after the copy
        if matches!(&self.backing, Backing::Swap { path: current } if *current == swap) {
            self.close();
        }

        fs::copy(path, &swap)?;
        let file = match OpenOptions::new().read(true).write(true).open(&swap) {
            Ok(file) => file,
            Err(e) => {
                let _ = fs::remove_file(&swap);
                return Err(e.into());
            },
        };

        self.replace(file, Backing::Swap { path: swap.clone() });
        debug!(path = %path.display(), swap = %swap.display(), "Opened swap copy of text source");
        Ok(())
    }

    fn replace(&mut self, file: File, backing: Backing) {
        self.close();
        self.stream = Some(BufReader::new(file));
        self.backing = backing;
    }

    /// Closes the file, removing the swap copy if there is one.
    pub fn close(&mut self) {
        self.stream = None;
        if let Backing::Swap { path } = std::mem::replace(&mut self.backing, Backing::ReadOnly)
            && let Err(e) = fs::remove_file(&path)
        {
            warn!(path = %path.display(), error = %e, "Failed to remove swap file");
        }

        self.index = LineIndex::default();
        self.current_line = 0;
    }

    /// Whether a file is open.
    pub fn is_loaded(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the open file is a swap copy that accepts edits.
    pub fn is_writable(&self) -> bool {
        self.is_loaded() && matches!(self.backing, Backing::Swap { .. })
    }

    /// The line the next [`read_next_line`](Self::read_next_line) returns.
    pub fn current_line(&self) -> usize {
        self.current_line
    }

    /// The line starts discovered so far.
    pub fn line_index(&self) -> &LineIndex {
        &self.index
    }

    /// Number of lines whose start offset has been discovered.
    pub fn known_lines(&self) -> usize {
        self.index.len()
    }

    /// Byte offset of the stream, or `None` without a file.
    pub fn position(&mut self) -> Option<u64> {
        let stream = self.stream.as_mut()?;
        match stream.stream_position() {
            Ok(position) => Some(position),
            Err(e) => {
                warn!(error = %e, "Failed to query stream position");
                None
            },
        }
    }

    /// Positions the stream at the start of `line`.
    ///
    /// Lines past the end of the file leave the stream at end of file, where
    /// reads return `None`.
    pub fn seek_line(&mut self, line: usize) {
        if self.stream.is_none() {
            return;
        }

        if let Some(offset) = self.index.get(line) {
            self.reposition(line, offset);
            return;
        }

        let (known, offset) = self.index.last();
        self.reposition(known, offset);
        while self.current_line < line {
            if self.read_next_line().is_none() {
                debug!(line, last_line = self.current_line, "Seek past end of text source");
                break;
            }
        }
    }

    fn reposition(&mut self, line: usize, offset: u64) {
        if let Some(stream) = self.stream.as_mut()
            && let Err(e) = stream.seek(SeekFrom::Start(offset))
        {
            warn!(line, offset, error = %e, "Failed to seek text source");
        }
        self.current_line = line;
    }

    /// Reads the line at the stream position and records where the next one starts.
    ///
    /// The trailing `\n` is stripped; a `\r` before it is kept. Invalid UTF-8
    /// is replaced rather than rejected.
    pub fn read_next_line(&mut self) -> Option<String> {
        let stream = self.stream.as_mut()?;

        let mut buf = Vec::new();
        match stream.read_until(b'\n', &mut buf) {
            Ok(0) => return None,
            Ok(_) => {},
            Err(e) => {
                warn!(line = self.current_line, error = %e, "Failed to read line");
                return None;
            },
        }

        let next_start = match stream.stream_position() {
            Ok(position) => position,
            Err(e) => {
                warn!(line = self.current_line, error = %e, "Failed to query stream position");
                return None;
            },
        };

        self.current_line += 1;
        self.index.record(self.current_line, next_start);

        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        Some(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Reads the line before the current one, leaving the stream at its start.
    ///
    /// Repeated calls walk backwards through the file.
    pub fn read_prev_line(&mut self) -> Option<String> {
        let line = self.current_line.checked_sub(1)?;
        self.seek_line(line);
        let text = self.read_next_line();
        self.seek_line(line);
        text
    }

    /// Appends `text` to the end of the file.
    ///
    /// When the file does not end in a newline, `text` continues its last line,
    /// so that line's cached end is discarded along with everything after it.
    pub fn append_text(&mut self, text: &str) -> Result<(), Error> {
        let stream = self.writable_stream()?;
        let resume = stream.stream_position()?;

        let outcome = append_to(stream.get_mut(), text.as_bytes());
        // a failed append may have left a partial write anywhere past line 0
        let boundary = outcome.as_ref().map_or(0, |&boundary| boundary);
        self.after_write(boundary, resume);

        outcome?;
        debug!(bytes = text.len(), boundary, "Appended text");
        Ok(())
    }

    /// Inserts `text` at the current stream position, shifting the rest of
    /// the file back.
    pub fn insert_text(&mut self, text: &str) -> Result<(), Error> {
        let at = self.writable_stream()?.stream_position()?;
        self.splice(at, at, text)
    }

    /// Inserts `text` at byte `column` of `line`, leaving the stream at the
    /// start of `line`.
    ///
    /// `column` is clamped to the length of the line. A `line` past the end
    /// of the file appends instead. Returns the column actually used.
    pub fn insert_at(&mut self, line: usize, column: usize, text: &str) -> Result<usize, Error> {
        self.writable_stream()?;
        self.seek_line(line);
        let start = self.writable_stream()?.stream_position()?;

        let Some(existing) = self.read_next_line().filter(|_| self.current_line == line + 1) else {
            self.append_text(text)?;
            return Ok(0);
        };

        let mut column = column.min(existing.len());
        while !existing.is_char_boundary(column) {
            column -= 1;
        }

        self.reposition(line, start);
        self.splice(start + column as u64, start, text)?;
        Ok(column)
    }

    /// Writes `text` at `at` and restores the stream to `resume`, on success
    /// or failure alike.
    fn splice(&mut self, at: u64, resume: u64, text: &str) -> Result<(), Error> {
        let stream = self.writable_stream()?;
        let outcome = splice_into(stream.get_mut(), at, text.as_bytes());
        self.after_write(at, resume);

        outcome?;
        debug!(bytes = text.len(), at, "Inserted text");
        Ok(())
    }

    fn writable_stream(&mut self) -> Result<&mut BufReader<File>, Error> {
        match (&mut self.stream, &self.backing) {
            (None, _) => Err(Error::source_not_loaded()),
            (Some(_), Backing::ReadOnly) => Err(Error::source_read_only()),
            (Some(stream), Backing::Swap { .. }) => Ok(stream),
        }
    }

    /// Drops index entries a write at `boundary` may have moved, then restores
    /// the stream to `resume` or to the last line that is still known.
    fn after_write(&mut self, boundary: u64, resume: u64) {
        let dropped = self.index.truncate_after(boundary);
        let (known, offset) = self.index.last();

        if self.current_line > known {
            self.reposition(known, offset);
        } else {
            let line = self.current_line;
            self.reposition(line, resume);
        }

        if dropped > 0 {
            debug!(dropped, known_lines = self.index.len(), "Invalidated line index after write");
        }
    }
}

/// Appends `bytes` at the end of `file`. Returns the offset after which line
/// starts may have moved.
fn append_to(file: &mut File, bytes: &[u8]) -> io::Result<u64> {
    let end = file.seek(SeekFrom::End(0))?;
    let ends_with_newline = if end == 0 {
        true
    } else {
        let mut last = [0u8];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        last[0] == b'\n'
    };

    file.seek(SeekFrom::End(0))?;
    file.write_all(bytes)?;
    file.flush()?;

    Ok(if ends_with_newline { end } else { end - 1 })
}

/// Inserts `bytes` at `at`, moving everything after it back.
fn splice_into(file: &mut File, at: u64, bytes: &[u8]) -> io::Result<()> {
    let mut tail = Vec::new();
    file.seek(SeekFrom::Start(at))?;
    file.read_to_end(&mut tail)?;

    file.seek(SeekFrom::Start(at))?;
    file.write_all(bytes)?;
    file.write_all(&tail)?;
    file.flush()
}

impl Drop for TextSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::write_lines;

    #[test]
    fn reads_lines_and_records_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "ab\ncde\n\nf");
        let mut source = TextSource::open(&path).unwrap();

        assert_eq!(source.read_next_line().as_deref(), Some("ab"));
        assert_eq!(source.read_next_line().as_deref(), Some("cde"));
        assert_eq!(source.read_next_line().as_deref(), Some(""));
        assert_eq!(source.read_next_line().as_deref(), Some("f"));
        assert_eq!(source.read_next_line(), None);

        assert_eq!(source.line_index().offsets(), &[0, 3, 7, 8, 9]);
        assert_eq!(source.current_line(), 4);
    }

    #[test]
    fn index_is_strictly_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let text: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let path = write_lines(dir.path(), "a.txt", &text);
        let mut source = TextSource::open(&path).unwrap();

        source.seek_line(30);
        source.seek_line(10);
        source.seek_line(45);

        let offsets = source.line_index().offsets();
        assert_eq!(offsets[0], 0);
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn seek_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let text: String = (0..20).map(|i| format!("row {i}\n")).collect();
        let path = write_lines(dir.path(), "a.txt", &text);
        let mut source = TextSource::open(&path).unwrap();

        source.seek_line(7);
        let first = source.read_next_line();
        source.seek_line(7);
        source.seek_line(7);
        let second = source.read_next_line();

        assert_eq!(first.as_deref(), Some("row 7"));
        assert_eq!(first, second);
    }

    #[test]
    fn seek_past_end_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "one\ntwo\n");
        let mut source = TextSource::open(&path).unwrap();

        source.seek_line(100);
        assert_eq!(source.read_next_line(), None);
        assert_eq!(source.current_line(), 2);

        source.seek_line(1);
        assert_eq!(source.read_next_line().as_deref(), Some("two"));
    }

    #[test]
    fn keeps_carriage_return_and_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.txt");
        fs::write(&path, b"dos\r\n\xffok\n").unwrap();
        let mut source = TextSource::open(&path).unwrap();

        assert_eq!(source.read_next_line().as_deref(), Some("dos\r"));
        assert_eq!(source.read_next_line().as_deref(), Some("\u{fffd}ok"));
    }

    #[test]
    fn read_prev_line_walks_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "a\nb\nc\n");
        let mut source = TextSource::open(&path).unwrap();

        source.seek_line(3);
        assert_eq!(source.read_prev_line().as_deref(), Some("c"));
        assert_eq!(source.read_prev_line().as_deref(), Some("b"));
        assert_eq!(source.read_prev_line().as_deref(), Some("a"));
        assert_eq!(source.read_prev_line(), None);
        assert_eq!(source.current_line(), 0);
    }

    #[test]
    fn unloaded_source_yields_nothing() {
        let mut source = TextSource::new();
        source.seek_line(5);

        assert!(!source.is_loaded());
        assert_eq!(source.read_next_line(), None);
        assert_eq!(source.position(), None);
        assert!(matches!(source.append_text("x"), Err(Error::Io(_))));
    }

    #[test]
    fn missing_file_keeps_previous_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "kept\n");
        let mut source = TextSource::open(&path).unwrap();

        assert!(source.load(dir.path().join("missing.txt")).is_err());
        assert_eq!(source.read_next_line().as_deref(), Some("kept"));
    }

    #[test]
    fn read_only_source_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "a\n");
        let mut source = TextSource::open(&path).unwrap();

        let err = source.append_text("b\n").unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn swap_copy_is_edited_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "a\nb\n");
        let swap = TextSource::swap_path(&path);

        {
            let mut source = TextSource::open_swap(&path).unwrap();
            assert!(source.is_writable());
            source.append_text("c\n").unwrap();

            assert_eq!(fs::read_to_string(&swap).unwrap(), "a\nb\nc\n");
            assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
        }

        assert!(!swap.exists());
    }

    #[test]
    fn append_keeps_index_of_terminated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "a\nb\n");
        let mut source = TextSource::open_swap(&path).unwrap();

        source.seek_line(2);
        assert_eq!(source.line_index().offsets(), &[0, 2, 4]);

        source.append_text("c\n").unwrap();
        assert_eq!(source.line_index().offsets(), &[0, 2, 4]);
        assert_eq!(source.current_line(), 2);
        assert_eq!(source.read_next_line().as_deref(), Some("c"));
    }

    #[test]
    fn append_to_unterminated_line_extends_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "a\nb");
        let mut source = TextSource::open_swap(&path).unwrap();

        source.seek_line(5);
        assert_eq!(source.line_index().offsets(), &[0, 2, 3]);
        assert_eq!(source.current_line(), 2);

        source.append_text("c\n").unwrap();
        assert_eq!(source.line_index().offsets(), &[0, 2]);
        assert_eq!(source.current_line(), 1);
        assert_eq!(source.read_next_line().as_deref(), Some("bc"));
    }

    #[test]
    fn insert_shifts_following_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "one\ntwo\nthree\n");
        let mut source = TextSource::open_swap(&path).unwrap();

        source.seek_line(3);
        source.seek_line(1);
        source.insert_text("new\n").unwrap();

        assert_eq!(source.line_index().offsets(), &[0, 4]);
        assert_eq!(source.current_line(), 1);
        assert_eq!(source.read_next_line().as_deref(), Some("new"));
        assert_eq!(source.read_next_line().as_deref(), Some("two"));
        assert_eq!(source.read_next_line().as_deref(), Some("three"));
        assert_eq!(source.read_next_line(), None);
    }

    #[test]
    fn failed_insert_keeps_reads_consistent() {
        let dir = tempfile::tempdir().unwrap();
        // larger than the read buffer, so later lines still come from the file
        let contents: String = (0..2000).map(|i| format!("line {i}\n")).collect();
        let path = write_lines(dir.path(), "a.txt", &contents);
        let mut source = TextSource::open_swap(&path).unwrap();

        // the tail is read before the write fails on this handle
        let read_only = File::open(TextSource::swap_path(&path)).unwrap();
        source.stream = Some(BufReader::new(read_only));

        assert_eq!(source.read_next_line().as_deref(), Some("line 0"));
        assert!(source.insert_text("new\n").is_err());

        assert_eq!(source.current_line(), 1);
        for i in 1..2000 {
            assert_eq!(source.read_next_line(), Some(format!("line {i}")));
        }
        assert_eq!(source.read_next_line(), None);
        assert_eq!(source.line_index().len(), 2001);
        assert_eq!(source.line_index().get(1), Some(7));
    }

    #[test]
    fn insert_at_column_of_a_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "one\ntwo\n");
        let mut source = TextSource::open_swap(&path).unwrap();
        let swap = TextSource::swap_path(&path);

        assert_eq!(source.insert_at(1, 1, "a").unwrap(), 1);
        assert_eq!(source.insert_at(1, 2, "b").unwrap(), 2);
        assert_eq!(fs::read_to_string(&swap).unwrap(), "one\ntabwo\n");

        // columns past the end of the line clamp to it
        assert_eq!(source.insert_at(0, 99, "!").unwrap(), 3);
        assert_eq!(source.current_line(), 0);
        assert_eq!(source.read_next_line().as_deref(), Some("one!"));
        assert_eq!(source.read_next_line().as_deref(), Some("tabwo"));

        // lines past the end append
        assert_eq!(source.insert_at(7, 4, "end").unwrap(), 0);
        assert_eq!(fs::read_to_string(&swap).unwrap(), "one!\ntabwo\nend");
    }

    #[test]
    fn read_only_source_refuses_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "a.txt", "a\n");
        let mut source = TextSource::open(&path).unwrap();

        assert!(source.insert_at(0, 0, "b").is_err());
        assert_eq!(source.read_next_line().as_deref(), Some("a"));
    }
}

