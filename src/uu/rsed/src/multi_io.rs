// Line input from multiple input files
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::error_handling::RUNTIME_EXIT_CODE;
use crate::fast_io::{Line, LineReader};

use std::collections::VecDeque;
use std::path::PathBuf;

use uucore::display::Quotable;
use uucore::error::{UResult, set_exit_code};
use uucore::show_error;

/// A pull-based source of input lines with one-line lookahead
pub trait LineSource {
    /// Return the next line, or None when input is exhausted.
    fn read_line(&mut self) -> UResult<Option<Line>>;

    /// Return true if a line follows the one last read within the
    /// current stream; false means that line was the last one.
    fn has_next(&mut self) -> UResult<bool>;

    /// Name of the file the last line came from; "-" for stdin.
    fn file_name(&self) -> &str;

    /// Ordinal of the file the last line came from.
    fn file_index(&self) -> usize;
}

/// The lines of all input files, as one stream or (with `separate`)
/// as one stream per file
pub struct Input {
    pending: VecDeque<PathBuf>, // Files not yet opened
    reader: Option<LineReader>, // Reader of the current file
    reader_name: String,        // Name of the file `reader` reads
    reader_index: usize,        // Files opened so far
    line_name: String,          // Name of the file of the last line read
    line_index: usize,          // File index of the last line read
    separator: u8,
    separate: bool,
}

impl Input {
    /// Read the specified files in order. No files means stdin.
    pub fn new(files: Vec<PathBuf>, separator: u8, separate: bool) -> Self {
        let pending = if files.is_empty() {
            VecDeque::from([PathBuf::from("-")])
        } else {
            VecDeque::from(files)
        };

        Self {
            pending,
            reader: None,
            reader_name: String::new(),
            reader_index: 0,
            line_name: String::new(),
            line_index: 0,
            separator,
            separate,
        }
    }

    /// Read from an in-memory text.
    #[cfg(test)]
    pub fn from_text(text: &str, separator: u8) -> Self {
        let mut input = Self::new(Vec::new(), separator, false);
        input.pending.clear();
        input.reader = Some(LineReader::from_reader(
            std::io::Cursor::new(text.to_string()),
            separator,
        ));
        input.reader_name = "-".to_string();
        input.reader_index = 1;
        input
    }

    /// Open the next readable file. Report unreadable ones and
    /// continue. Return false when no files remain.
    fn open_next(&mut self) -> bool {
        while let Some(path) = self.pending.pop_front() {
            match LineReader::open(&path, self.separator) {
                Ok(reader) => {
                    self.reader = Some(reader);
                    self.reader_name = path.to_string_lossy().into_owned();
                    self.reader_index += 1;
                    return true;
                }
                Err(e) => {
                    show_error!("can't read {}: {}", path.maybe_quote(), strip_os_error(&e));
                    set_exit_code(RUNTIME_EXIT_CODE);
                }
            }
        }
        self.reader = None;
        false
    }

    /// Report a read error on the current file and abandon it.
    fn abandon_current(&mut self, e: &std::io::Error) {
        show_error!("read error on {}: {}", self.reader_name, strip_os_error(e));
        set_exit_code(RUNTIME_EXIT_CODE);
        self.reader = None;
    }
}

/// Render an I/O error without the "(os error N)" suffix.
fn strip_os_error(e: &std::io::Error) -> String {
    let message = e.to_string();
    match message.find(" (os error") {
        Some(i) => message[..i].to_string(),
        None => message,
    }
}

impl LineSource for Input {
    fn read_line(&mut self) -> UResult<Option<Line>> {
        loop {
            if self.reader.is_none() && !self.open_next() {
                return Ok(None);
            }
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            match reader.read_line() {
                Ok(Some(line)) => {
                    self.line_name.clone_from(&self.reader_name);
                    self.line_index = self.reader_index;
                    return Ok(Some(line));
                }
                Ok(None) => self.reader = None,
                Err(e) => self.abandon_current(&e),
            }
        }
    }

    fn has_next(&mut self) -> UResult<bool> {
        loop {
            if let Some(reader) = self.reader.as_mut() {
                match reader.has_next() {
                    Ok(true) => return Ok(true),
                    Ok(false) => self.reader = None,
                    Err(e) => self.abandon_current(&e),
                }
            }
            if self.separate || !self.open_next() {
                return Ok(false);
            }
        }
    }

    fn file_name(&self) -> &str {
        &self.line_name
    }

    fn file_index(&self) -> usize {
        self.line_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file.flush().unwrap();
        file
    }

    fn contents(input: &mut Input) -> Vec<(String, bool)> {
        let mut result = Vec::new();
        while let Some(line) = input.read_line().unwrap() {
            let last = !input.has_next().unwrap();
            result.push((line.content, last));
        }
        result
    }

    #[test]
    fn test_files_are_concatenated() {
        let first = temp_with("a\nb\n");
        let empty = temp_with("");
        let last = temp_with("c\n");
        let mut input = Input::new(
            vec![
                first.path().to_path_buf(),
                empty.path().to_path_buf(),
                last.path().to_path_buf(),
            ],
            b'\n',
            false,
        );

        assert_eq!(
            contents(&mut input),
            vec![
                ("a".to_string(), false),
                ("b".to_string(), false),
                ("c".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_separate_files() {
        let first = temp_with("a\nb\n");
        let last = temp_with("c\n");
        let mut input = Input::new(
            vec![first.path().to_path_buf(), last.path().to_path_buf()],
            b'\n',
            true,
        );

        assert_eq!(input.read_line().unwrap().unwrap().content, "a");
        assert_eq!(input.file_index(), 1);
        assert!(input.has_next().unwrap());
        assert_eq!(input.read_line().unwrap().unwrap().content, "b");
        assert!(!input.has_next().unwrap());
        assert_eq!(input.read_line().unwrap().unwrap().content, "c");
        assert_eq!(input.file_index(), 2);
        assert_eq!(input.file_name(), last.path().to_string_lossy());
        assert!(!input.has_next().unwrap());
        assert!(input.read_line().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let last = temp_with("x\n");
        let mut input = Input::new(
            vec![PathBuf::from("/no/such/file"), last.path().to_path_buf()],
            b'\n',
            false,
        );
        assert_eq!(contents(&mut input), vec![("x".to_string(), true)]);
    }

    #[test]
    fn test_file_name_follows_lines() {
        let first = temp_with("a\n");
        let last = temp_with("b\n");
        let mut input = Input::new(
            vec![first.path().to_path_buf(), last.path().to_path_buf()],
            b'\n',
            false,
        );

        input.read_line().unwrap();
        // Looking ahead opens the second file
        assert!(input.has_next().unwrap());
        assert_eq!(input.file_name(), first.path().to_string_lossy());
    }

    #[test]
    fn test_from_text() {
        let mut input = Input::from_text("one\ntwo", b'\n');
        assert_eq!(
            contents(&mut input),
            vec![("one".to_string(), false), ("two".to_string(), true)]
        );
        assert_eq!(input.file_name(), "-");
    }

    #[test]
    fn test_strip_os_error() {
        let e = std::io::Error::from_raw_os_error(2);
        assert!(!strip_os_error(&e).contains("os error"));
    }
}
