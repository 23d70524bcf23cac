// Line-oriented input with lookahead and newline-tracking output
//
// Regular files are read through mmap(2); other inputs through a
// buffered reader.
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use memchr::memchr;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
/// An input record without its separator
pub struct Line {
    pub content: String,
    pub has_newline: bool, // False for a final unterminated record
}

/// Build a line from the bytes of a record, which may end in `separator`.
fn make_line(bytes: &[u8], separator: u8) -> Line {
    let (content, has_newline) = match bytes.split_last() {
        Some((last, rest)) if *last == separator => (rest, true),
        _ => (bytes, false),
    };
    Line {
        content: String::from_utf8_lossy(content).into_owned(),
        has_newline,
    }
}

/// Reader of separator-terminated records
pub enum LineReader {
    Mapped {
        mapped_file: Mmap, // The mapped file's contents
        pos: usize,        // Start of the next record
        separator: u8,
    },
    Buffered {
        reader: Box<dyn BufRead>,
        separator: u8,
    },
}

impl LineReader {
    /// Read records from any `Read` implementation.
    pub fn from_reader(r: impl Read + 'static, separator: u8) -> Self {
        LineReader::Buffered {
            reader: Box::new(BufReader::new(r)),
            separator,
        }
    }

    /// Open the specified file for record input.
    /// Use "-" to read from the standard input.
    pub fn open(path: &Path, separator: u8) -> io::Result<Self> {
        if path.as_os_str() == "-" {
            return Ok(Self::from_reader(io::stdin(), separator));
        }

        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_file() && metadata.len() > 0 {
            // SAFETY: the mapping is only read; concurrent modification of
            // the file by another process is outside our control, as with
            // any other reader.
            if let Ok(mapped_file) = unsafe { Mmap::map(&file) } {
                return Ok(LineReader::Mapped {
                    mapped_file,
                    pos: 0,
                    separator,
                });
            }
        }
        Ok(Self::from_reader(file, separator))
    }

    /// Return the next record, if available, or None.
    pub fn read_line(&mut self) -> io::Result<Option<Line>> {
        match self {
            LineReader::Mapped {
                mapped_file,
                pos,
                separator,
            } => {
                let data = &mapped_file[*pos..];
                if data.is_empty() {
                    return Ok(None);
                }
                let len = memchr(*separator, data).map_or(data.len(), |i| i + 1);
                *pos += len;
                Ok(Some(make_line(&data[..len], *separator)))
            }
            LineReader::Buffered { reader, separator } => {
                let mut buffer = Vec::new();
                if reader.read_until(*separator, &mut buffer)? == 0 {
                    return Ok(None);
                }
                Ok(Some(make_line(&buffer, *separator)))
            }
        }
    }

    /// Return true if another record can be read.
    pub fn has_next(&mut self) -> io::Result<bool> {
        match self {
            LineReader::Mapped {
                mapped_file, pos, ..
            } => Ok(*pos < mapped_file.len()),
            LineReader::Buffered { reader, .. } => Ok(!reader.fill_buf()?.is_empty()),
        }
    }
}

/// Record output that reproduces a missing final separator
pub struct OutputBuffer<W: Write> {
    writer: BufWriter<W>,
    separator: u8,
    unbuffered: bool,      // Flush after every record
    missing_newline: bool, // The last record written lacked its separator
}

impl<W: Write> OutputBuffer<W> {
    pub fn new(w: W, separator: u8, unbuffered: bool) -> Self {
        Self {
            writer: BufWriter::new(w),
            separator,
            unbuffered,
            missing_newline: false,
        }
    }

    /// Terminate a preceding unterminated record before more output.
    fn restore_newline(&mut self) -> io::Result<()> {
        if self.missing_newline {
            self.writer.write_all(&[self.separator])?;
            self.missing_newline = false;
        }
        Ok(())
    }

    /// Write a record, followed by the separator if `terminated`.
    pub fn write_line(&mut self, text: &str, terminated: bool) -> io::Result<()> {
        self.restore_newline()?;
        self.writer.write_all(text.as_bytes())?;
        if terminated {
            self.writer.write_all(&[self.separator])?;
        } else {
            self.missing_newline = true;
        }
        if self.unbuffered {
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Write text terminated by a newline, as used for
    /// inserted text, line numbers and listings.
    pub fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.restore_newline()?;
        self.writer.write_all(text.as_bytes())?;
        self.writer.write_all(b"\n")?;
        if self.unbuffered {
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Write bytes verbatim, as read from an `r` file.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.restore_newline()?;
        self.writer.write_all(bytes)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}
