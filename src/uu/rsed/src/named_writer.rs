// Output files created on entry and flushed on exit
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::command::OutputFile;
use crate::error_handling::{ScriptLocation, runtime_error};
use crate::fast_io::OutputBuffer;

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use uucore::display::Quotable;
use uucore::error::UResult;

/// Writer that tracks its file name for better error messages
pub struct NamedWriter {
    pub path: PathBuf,
    output: OutputBuffer<File>,
    location: ScriptLocation,
}

impl NamedWriter {
    /// Create a new writer, truncating the file.
    pub fn new(path: PathBuf, location: ScriptLocation, separator: u8) -> UResult<Self> {
        let file = match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) => {
                return runtime_error(
                    &location,
                    'w',
                    format!("couldn't open file {}: {e}", path.quote()),
                );
            }
        };

        Ok(Self {
            path,
            output: OutputBuffer::new(file, separator, false),
            location,
        })
    }

    /// Write a record, terminated unless it was read unterminated.
    pub fn write_line(&mut self, line: &str, terminated: bool) -> UResult<()> {
        match self.output.write_line(line, terminated) {
            Ok(()) => Ok(()),
            Err(e) => runtime_error(
                &self.location,
                'w',
                format!("couldn't write to {}: {e}", self.path.quote()),
            ),
        }
    }

    /// Flush the writer, returning a descriptive error.
    pub fn flush(&mut self) -> UResult<()> {
        match self.output.flush() {
            Ok(()) => Ok(()),
            Err(e) => runtime_error(
                &self.location,
                'w',
                format!("couldn't flush {}: {e}", self.path.quote()),
            ),
        }
    }
}

/// Open a writer for each output file of a program, in order.
pub fn open_all(files: &[OutputFile], separator: u8) -> UResult<Vec<NamedWriter>> {
    files
        .iter()
        .map(|f| NamedWriter::new(f.path.clone(), f.location.clone(), separator))
        .collect()
}

/// Flush all writers, returning the first error.
pub fn flush_all(writers: &mut [NamedWriter]) -> UResult<()> {
    for writer in writers {
        writer.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_files_are_truncated_and_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old contents\n").unwrap();

        let files = vec![OutputFile {
            path: path.clone(),
            location: ScriptLocation::default(),
        }];
        let mut writers = open_all(&files, b'\n').unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        writers[0].write_line("one", true).unwrap();
        writers[0].write_line("two", false).unwrap();
        flush_all(&mut writers).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo");
    }

    #[test]
    fn test_unwritable_file() {
        let location = ScriptLocation::new("w /x", 1, 1);
        let err = NamedWriter::new(PathBuf::from("/no/such/dir/out"), location, b'\n')
            .err()
            .unwrap();
        assert_eq!(err.code(), 2);
        assert!(err.to_string().contains("couldn't open file"));
    }
}
