use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::HistoryError;

/// First line of every history file, shared with libedit.
pub const HISTORY_COOKIE: &str = "_HiStOrY_V2_";
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded(usize),
    Missing,
    /// The file exists but does not start with [`HISTORY_COOKIE`].
    Unrecognized,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: Vec<String>,
    limit: usize,
}

impl HistoryStore {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn with_entries<I>(entries: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut store = Self::new(limit);
        for entry in entries {
            store.push(&entry);
        }
        store
    }

    /// Appends `entry` unless it is blank or repeats the newest entry.
    /// Returns whether the store changed.
    pub fn push(&mut self, entry: &str) -> bool {
        if entry.trim().is_empty() {
            return false;
        }
        if self.entries.last().is_some_and(|last| last == entry) {
            return false;
        }
        self.entries.push(entry.to_string());
        self.evict_overflow();
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Appends the entries stored at `path` after the current ones, with the
    /// same blank and repeat filtering as [`HistoryStore::push`].
    pub fn load_file(&mut self, path: &Path) -> Result<LoadStatus, HistoryError> {
        if path.as_os_str().is_empty() {
            return Err(HistoryError::EmptyPath);
        }

        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LoadStatus::Missing),
            Err(source) => {
                return Err(HistoryError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if raw.is_empty() {
            return Ok(LoadStatus::Loaded(0));
        }

        let mut lines = raw.split(|byte| *byte == b'\n');
        let cookie = lines.next().unwrap_or_default();
        if cookie.strip_suffix(b"\r").unwrap_or(cookie) != HISTORY_COOKIE.as_bytes() {
            warn!(path = %path.display(), "history file has an unrecognized header, ignoring it");
            return Ok(LoadStatus::Unrecognized);
        }

        let mut count = 0usize;
        for line in lines.filter(|line| !line.is_empty()) {
            let decoded = unescape_entry(line);
            if self.push(&String::from_utf8_lossy(&decoded)) {
                count += 1;
            }
        }
        debug!(path = %path.display(), count, "loaded history");
        Ok(LoadStatus::Loaded(count))
    }

    pub fn save_file(&self, path: &Path) -> Result<(), HistoryError> {
        if path.as_os_str().is_empty() {
            return Err(HistoryError::EmptyPath);
        }
        let write_err = |source| HistoryError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent).map_err(write_err)?;
        }

        let mut contents = String::with_capacity(HISTORY_COOKIE.len() + 1);
        contents.push_str(HISTORY_COOKIE);
        contents.push('\n');
        for entry in &self.entries {
            contents.push_str(&escape_entry(entry));
            contents.push('\n');
        }

        let mut file = open_private_file(path).map_err(write_err)?;
        file.write_all(contents.as_bytes()).map_err(write_err)?;
        file.flush().map_err(write_err)?;
        debug!(path = %path.display(), count = self.entries.len(), "saved history");
        Ok(())
    }

    fn evict_overflow(&mut self) {
        if self.entries.len() > self.limit {
            let drain_count = self.entries.len() - self.limit;
            self.entries.drain(..drain_count);
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

/// Escapes one entry byte-wise: backslash, space, tab, newline and anything
/// outside printable ASCII become `\NNN` octal.
pub fn escape_entry(entry: &str) -> String {
    let mut out = String::with_capacity(entry.len());
    for &byte in entry.as_bytes() {
        let needs_escape =
            matches!(byte, b'\\' | b' ' | b'\t' | b'\n') || !(b' '..=b'~').contains(&byte);
        if needs_escape {
            out.push_str(&format!("\\{byte:03o}"));
        } else {
            out.push(char::from(byte));
        }
    }
    out
}

/// Reverses [`escape_entry`]. A backslash not followed by a valid three digit
/// octal byte is kept literally.
pub fn unescape_entry(line: &[u8]) -> Vec<u8> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let mut out = Vec::with_capacity(line.len());
    let mut i = 0usize;
    while i < line.len() {
        if line[i] == b'\\' && i + 4 <= line.len() {
            if let Some(byte) = decode_octal(&line[i + 1..i + 4]) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(line[i]);
        i += 1;
    }
    out
}

fn decode_octal(digits: &[u8]) -> Option<u8> {
    let mut value: u16 = 0;
    for &digit in digits {
        if !(b'0'..=b'7').contains(&digit) {
            return None;
        }
        value = value * 8 + u16::from(digit - b'0');
    }
    u8::try_from(value).ok()
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn open_private_file(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private_file(path: &Path) -> io::Result<fs::File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
