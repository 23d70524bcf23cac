// Process the input lines with the compiled program
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::command::{
    Address, BranchKind, Command, CommandKind, OutputTarget, ProcessingOptions, Program,
    RangeEnd, Selection, Substitution,
};
use crate::error_handling::{output_error, runtime_error};
use crate::fast_io::{Line, LineReader, OutputBuffer};
use crate::fast_regex::Regex;
use crate::multi_io::LineSource;
use crate::named_writer::{self, NamedWriter};

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use uucore::error::UResult;

#[derive(Debug, Clone, Copy, Default)]
/// Activation state of a range address
struct RangeState {
    active: bool,
    end_line: Option<usize>, // Last line of a numerically ended range
    cached: Option<(u64, bool)>, // Result for the given input record
}

/// Output queued for the end of the cycle
enum Appended<'p> {
    Text(&'p str),    // a
    Line(String),     // R
    File(&'p Path),   // r
}

/// How command execution ended
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    EndCycle { autoprint: bool },
    Restart, // D with a newline in pattern space
    Quit { autoprint: bool, exit_code: i32 },
}

/// The execution engine: runs a program over a line source
pub struct Processor<'p, S: LineSource, W: Write> {
    program: &'p Program,
    options: &'p ProcessingOptions,
    input: S,
    output: OutputBuffer<W>,
    writers: Vec<NamedWriter>,
    line_readers: HashMap<&'p Path, Option<LineReader>>, // R files
    quiet: bool,
    line_number: usize,
    records_read: u64, // Never reset, unlike line_number with -s
    file_index: usize,
    pattern: String,
    pattern_newline: bool, // The pattern space's line was terminated
    hold: String,
    ranges: Vec<RangeState>,
    substituted: bool, // A substitution succeeded since the last read or t/T
    appended: Vec<Appended<'p>>,
    last_regex: Option<&'p Regex>,
}

/// Return the unambiguous `l` representation of text, wrapped so that
/// output lines (including the continuation backslash) fit in `width`.
fn list_line(text: &str, width: usize) -> String {
    let mut result = String::with_capacity(text.len() + 2);
    let mut column = 0;

    for b in text.bytes() {
        let piece = match b {
            b'\\' => r"\\".to_string(),
            0x07 => r"\a".to_string(),
            0x08 => r"\b".to_string(),
            0x0c => r"\f".to_string(),
            b'\n' => r"\n".to_string(),
            b'\r' => r"\r".to_string(),
            b'\t' => r"\t".to_string(),
            0x0b => r"\v".to_string(),
            0x20..=0x7e => char::from(b).to_string(),
            _ => format!("\\{b:03o}"),
        };
        if width > 1 && column + piece.len() > width - 1 {
            result.push_str("\\\n");
            column = 0;
        }
        column += piece.len();
        result.push_str(&piece);
    }

    result.push('$');
    result
}

/// Write text and, if terminated, the record separator.
fn write_record(w: &mut impl Write, text: &str, separator: u8, terminated: bool) -> io::Result<()> {
    w.write_all(text.as_bytes())?;
    if terminated {
        w.write_all(&[separator])?;
    }
    Ok(())
}

/// Attribute a regex engine failure to the command that ran the regex.
fn located<T>(result: UResult<T>, command: &Command) -> UResult<T> {
    result.or_else(|e| runtime_error(&command.location, command.code, e))
}

impl<'p, S: LineSource, W: Write> Processor<'p, S, W> {
    /// Prepare to run the program; create the `w` files.
    pub fn new(
        program: &'p Program,
        options: &'p ProcessingOptions,
        input: S,
        output: W,
    ) -> UResult<Self> {
        let separator = options.record_separator();
        let writers = named_writer::open_all(&program.output_files, separator)?;

        // A 0,/re/ range is active before the first line
        let mut ranges = vec![RangeState::default(); program.range_count];
        for command in &program.commands {
            if let Selection::Range {
                start: Address::Zero,
                slot,
                ..
            } = &command.selection
                && let Some(state) = ranges.get_mut(*slot)
            {
                state.active = true;
            }
        }

        Ok(Self {
            program,
            options,
            input,
            output: OutputBuffer::new(output, separator, options.unbuffered),
            writers,
            line_readers: HashMap::new(),
            quiet: options.quiet || program.quiet,
            line_number: 0,
            records_read: 0,
            file_index: 0,
            pattern: String::new(),
            pattern_newline: true,
            hold: String::new(),
            ranges,
            substituted: false,
            appended: Vec::new(),
            last_regex: None,
        })
    }

    /// Process all input and flush all output, even after an error.
    /// Return the exit code requested by `q` or `Q`.
    pub fn run(&mut self) -> UResult<i32> {
        debug!(
            commands = self.program.commands.len(),
            quiet = self.quiet,
            "processing input"
        );
        let result = self.process_all();
        let flushed = self.flush();
        let exit_code = result?;
        flushed?;
        Ok(exit_code)
    }

    /// Flush and return the output writer.
    pub fn into_output(self) -> UResult<W> {
        self.output.into_inner().map_err(output_error)
    }

    fn flush(&mut self) -> UResult<()> {
        named_writer::flush_all(&mut self.writers)?;
        self.output.flush().map_err(output_error)
    }

    fn process_all(&mut self) -> UResult<i32> {
        while let Some(line) = self.input.read_line()? {
            self.load(line);
            loop {
                trace!(line = self.line_number, pattern = %self.pattern, "cycle");
                match self.execute()? {
                    Flow::EndCycle { autoprint } => {
                        self.end_cycle(autoprint)?;
                        break;
                    }
                    Flow::Restart => self.end_cycle(false)?,
                    Flow::Quit {
                        autoprint,
                        exit_code,
                    } => {
                        debug!(line = self.line_number, exit_code, "quit");
                        if autoprint {
                            self.end_cycle(true)?;
                        }
                        return Ok(exit_code);
                    }
                }
            }
        }
        Ok(0)
    }

    /// Make a line read the pattern space.
    fn load(&mut self, line: Line) {
        let file_index = self.input.file_index();
        if self.options.separate && file_index != self.file_index {
            self.line_number = 0;
        }
        self.file_index = file_index;
        self.line_number += 1;
        self.records_read += 1;
        self.pattern = line.content;
        self.pattern_newline = line.has_newline;
        self.substituted = false;
    }

    /// Print the pattern space if requested and the queued output.
    fn end_cycle(&mut self, autoprint: bool) -> UResult<()> {
        if autoprint && !self.quiet {
            self.output
                .write_line(&self.pattern, self.pattern_newline)
                .map_err(output_error)?;
        }
        self.flush_appended()
    }

    fn flush_appended(&mut self) -> UResult<()> {
        for appended in std::mem::take(&mut self.appended) {
            let written = match appended {
                Appended::Text(text) => self.output.write_text(text),
                Appended::Line(line) => self.output.write_text(&line),
                // Unreadable files are silently ignored
                Appended::File(path) => match fs::read(path) {
                    Ok(contents) => self.output.write_raw(&contents),
                    Err(_) => Ok(()),
                },
            };
            written.map_err(output_error)?;
        }
        Ok(())
    }

    /// Return true if the current line is the last one.
    fn is_last_line(&mut self) -> UResult<bool> {
        Ok(!self.input.has_next()?)
    }

    /// Return the regex to use, recording it as the last one used.
    fn resolve_regex(&mut self, re: Option<&'p Regex>, command: &Command) -> UResult<&'p Regex> {
        match re.or(self.last_regex) {
            Some(re) => {
                self.last_regex = Some(re);
                Ok(re)
            }
            None => runtime_error(
                &command.location,
                command.code,
                "no previous regular expression",
            ),
        }
    }

    /// Return true if the address matches the current line.
    fn matches(&mut self, address: &'p Address, command: &Command) -> UResult<bool> {
        let line = self.line_number;
        Ok(match address {
            Address::Line(n) => line == *n,
            Address::Last => self.is_last_line()?,
            Address::Regex(re) => {
                let re = self.resolve_regex(re.as_ref(), command)?;
                located(re.is_match(&self.pattern), command)?
            }
            Address::Step { first, step: 0 } => line == *first,
            Address::Step { first, step } => line >= *first && (line - first) % step == 0,
            Address::Zero => false,
        })
    }

    /// Return true if the range applies to the current line,
    /// updating its activation state once per input line.
    fn matches_range(
        &mut self,
        start: &'p Address,
        end: &'p RangeEnd,
        slot: usize,
        command: &Command,
    ) -> UResult<bool> {
        let Some(&state) = self.ranges.get(slot) else {
            return Ok(false);
        };
        if let Some((record, result)) = state.cached
            && record == self.records_read
        {
            return Ok(result);
        }

        let line = self.line_number;
        let mut state = state;
        let result = if state.active {
            match (state.end_line, end) {
                (Some(last), _) => {
                    if line >= last {
                        state.active = false;
                    }
                    line <= last
                }
                (None, RangeEnd::Address(address)) => {
                    if self.matches(address, command)? {
                        state.active = false;
                    }
                    true
                }
                (None, _) => {
                    state.active = false;
                    true
                }
            }
        } else if self.matches(start, command)? {
            // The end line, if any; None if the end is checked per line.
            let end_line = match end {
                RangeEnd::Address(Address::Line(n)) => Some(*n),
                RangeEnd::Address(Address::Last) => self.is_last_line()?.then_some(line),
                RangeEnd::Address(_) => None,
                RangeEnd::Relative(n) => Some(line + n),
                RangeEnd::Multiple(0) => Some(line),
                RangeEnd::Multiple(n) => Some(line.div_ceil(*n) * n),
            };
            state.end_line = end_line;
            state.active = end_line.is_none_or(|last| last > line);
            true
        } else {
            false
        };

        state.cached = Some((self.records_read, result));
        self.ranges[slot] = state;
        Ok(result)
    }

    /// Return true if the command applies to the current line.
    fn applies(&mut self, command: &'p Command) -> UResult<bool> {
        let selected = match &command.selection {
            Selection::All => true,
            Selection::Single(address) => self.matches(address, command)?,
            Selection::Range { start, end, slot } => {
                self.matches_range(start, end, *slot, command)?
            }
        };
        Ok(selected != command.negated)
    }

    /// True if a range command is on its range's last line.
    fn range_ended(&self, command: &Command) -> bool {
        match command.selection {
            Selection::Range { slot, .. } => self.ranges.get(slot).is_none_or(|s| !s.active),
            _ => true,
        }
    }

    fn write_to(&mut self, target: OutputTarget, text: &str, terminated: bool) -> UResult<()> {
        match target {
            OutputTarget::Stdout => self
                .output
                .write_line(text, terminated)
                .map_err(output_error),
            OutputTarget::Stderr => write_record(
                &mut io::stderr().lock(),
                text,
                self.options.record_separator(),
                terminated,
            )
            .map_err(output_error),
            OutputTarget::File(i) => match self.writers.get_mut(i) {
                Some(writer) => writer.write_line(text, terminated),
                None => Ok(()),
            },
        }
    }

    /// Read the next input line into the pattern space, replacing or
    /// appending to it. Return false at the end of input.
    fn read_next(&mut self, append: bool) -> UResult<bool> {
        let Some(line) = self.input.read_line()? else {
            return Ok(false);
        };
        if append {
            let mut pattern = std::mem::take(&mut self.pattern);
            pattern.push('\n');
            pattern.push_str(&line.content);
            self.load(line);
            self.pattern = pattern;
        } else {
            self.load(line);
        }
        Ok(true)
    }

    /// Return the next line of an `R` file, if any.
    fn read_file_line(&mut self, path: &'p Path) -> Option<String> {
        let separator = self.options.record_separator();
        let reader = self
            .line_readers
            .entry(path)
            .or_insert_with(|| LineReader::open(path, separator).ok());
        match reader.as_mut()?.read_line() {
            Ok(Some(line)) => Some(line.content),
            _ => None,
        }
    }

    fn substitute(&mut self, sub: &'p Substitution, command: &Command) -> UResult<()> {
        let re = self.resolve_regex(sub.regex.as_ref(), command)?;
        if sub.replacement.max_group_number >= re.captures_len() {
            return runtime_error(
                &command.location,
                command.code,
                format!(
                    "invalid reference \\{} on `s' command's RHS",
                    sub.replacement.max_group_number
                ),
            );
        }

        let (result, count) = located(
            re.replace(&self.pattern, &sub.replacement, sub.occurrence, sub.global),
            command,
        )?;
        if count == 0 {
            return Ok(());
        }
        trace!(count, "substituted");
        self.pattern = result;
        self.substituted = true;

        if sub.print {
            self.output
                .write_line(&self.pattern, self.pattern_newline)
                .map_err(output_error)?;
        }
        if let Some(target) = sub.write {
            let pattern = std::mem::take(&mut self.pattern);
            let written = self.write_to(target, &pattern, self.pattern_newline);
            self.pattern = pattern;
            written?;
        }
        Ok(())
    }

    /// Run the program's commands on the pattern space.
    fn execute(&mut self) -> UResult<Flow> {
        let program = self.program;
        let mut pc = 0;

        while let Some(command) = program.commands.get(pc) {
            pc += 1;
            if !self.applies(command)? {
                if let CommandKind::Block { end } = command.kind {
                    pc = end;
                }
                continue;
            }

            match &command.kind {
                CommandKind::Block { .. } | CommandKind::BlockEnd | CommandKind::Label(_) => (),
                CommandKind::Branch { kind, target, .. } => {
                    let jump = match kind {
                        BranchKind::Always => true,
                        BranchKind::IfSubstituted => std::mem::take(&mut self.substituted),
                        BranchKind::IfNotSubstituted => !std::mem::take(&mut self.substituted),
                    };
                    if jump {
                        trace!(target = ?target, "branch");
                        match target {
                            Some(i) => pc = *i,
                            None => return Ok(Flow::EndCycle { autoprint: true }),
                        }
                    }
                }
                CommandKind::Substitute(sub) => self.substitute(sub, command)?,
                CommandKind::Transliterate(y) => self.pattern = y.apply(&self.pattern),
                CommandKind::Insert(text) => self.output.write_text(text).map_err(output_error)?,
                CommandKind::Append(text) => self.appended.push(Appended::Text(text)),
                CommandKind::Change(text) => {
                    if command.negated || self.range_ended(command) {
                        self.output.write_text(text).map_err(output_error)?;
                    }
                    return Ok(Flow::EndCycle { autoprint: false });
                }
                CommandKind::Delete => return Ok(Flow::EndCycle { autoprint: false }),
                CommandKind::DeleteFirstLine => match self.pattern.find('\n') {
                    Some(i) => {
                        self.pattern.drain(..=i);
                        return Ok(Flow::Restart);
                    }
                    None => return Ok(Flow::EndCycle { autoprint: false }),
                },
                CommandKind::Print => self
                    .output
                    .write_line(&self.pattern, self.pattern_newline)
                    .map_err(output_error)?,
                CommandKind::PrintFirstLine => {
                    let written = match self.pattern.split_once('\n') {
                        Some((first, _)) => self.output.write_line(first, true),
                        None => self.output.write_line(&self.pattern, self.pattern_newline),
                    };
                    written.map_err(output_error)?;
                }
                CommandKind::Next => {
                    if !self.input.has_next()? && !self.options.separate {
                        return Ok(Flow::Quit {
                            autoprint: true,
                            exit_code: 0,
                        });
                    }
                    self.end_cycle(true)?;
                    if !self.read_next(false)? {
                        return Ok(Flow::Quit {
                            autoprint: false,
                            exit_code: 0,
                        });
                    }
                }
                CommandKind::AppendNext => {
                    // At the end of input the pattern space precedes queued text
                    let at_end = !self.input.has_next()? && !self.options.separate;
                    if at_end || !self.flush_appended().and_then(|()| self.read_next(true))? {
                        return Ok(Flow::Quit {
                            autoprint: true,
                            exit_code: 0,
                        });
                    }
                }
                CommandKind::Hold => self.hold.clone_from(&self.pattern),
                CommandKind::HoldAppend => {
                    self.hold.push('\n');
                    self.hold.push_str(&self.pattern);
                }
                CommandKind::Get => self.pattern.clone_from(&self.hold),
                CommandKind::GetAppend => {
                    self.pattern.push('\n');
                    self.pattern.push_str(&self.hold);
                }
                CommandKind::Exchange => std::mem::swap(&mut self.pattern, &mut self.hold),
                CommandKind::Quit {
                    exit_code,
                    autoprint,
                } => {
                    return Ok(Flow::Quit {
                        autoprint: *autoprint,
                        exit_code: *exit_code,
                    });
                }
                CommandKind::ReadFile(path) => self.appended.push(Appended::File(path)),
                CommandKind::ReadLine(path) => {
                    if let Some(line) = self.read_file_line(path) {
                        self.appended.push(Appended::Line(line));
                    }
                }
                CommandKind::WriteFile(target) => {
                    let pattern = std::mem::take(&mut self.pattern);
                    let written = self.write_to(*target, &pattern, self.pattern_newline);
                    self.pattern = pattern;
                    written?;
                }
                CommandKind::WriteFirstLine(target) => {
                    let first = match self.pattern.split_once('\n') {
                        Some((first, _)) => first.to_string(),
                        None => self.pattern.clone(),
                    };
                    self.write_to(*target, &first, true)?;
                }
                CommandKind::LineNumber => self
                    .output
                    .write_text(&self.line_number.to_string())
                    .map_err(output_error)?,
                CommandKind::List(width) => {
                    let listing = list_line(&self.pattern, width.unwrap_or(self.options.line_wrap));
                    self.output.write_text(&listing).map_err(output_error)?;
                }
                CommandKind::Zap => self.pattern.clear(),
                CommandKind::FileName => {
                    let name = self.input.file_name().to_string();
                    self.output.write_text(&name).map_err(output_error)?;
                }
            }
        }

        Ok(Flow::EndCycle { autoprint: true })
    }
}

/// Process the specified files with the program, writing to stdout.
pub fn process_all_files(
    program: &Program,
    options: &ProcessingOptions,
    files: Vec<PathBuf>,
) -> UResult<i32> {
    let input = crate::multi_io::Input::new(files, options.record_separator(), options.separate);
    let mut processor = Processor::new(program, options, input, io::stdout().lock())?;
    processor.run()
}
