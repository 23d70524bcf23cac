// Compiled program data structures
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::error_handling::ScriptLocation;
use crate::fast_regex::{Captures, Regex};

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
/// Options that affect compilation and processing
pub struct ProcessingOptions {
    pub debug: bool,          // --debug: dump program, trace execution
    pub regex_extended: bool, // -E, -r: EREs rather than BREs
    pub posix: bool,          // --posix: disable GNU extensions
    pub quiet: bool,          // -n, or #n at the script's top
    pub separate: bool,       // -s: files are separate streams
    pub sandbox: bool,        // --sandbox: no external file access
    pub unbuffered: bool,     // -u: flush output after every line
    pub null_data: bool,      // -z: records separated by NUL
    pub line_wrap: usize,     // -l: wrap width of `l`; 0 disables
}

impl ProcessingOptions {
    /// The character separating input and output records.
    pub fn record_separator(&self) -> u8 {
        if self.null_data { b'\0' } else { b'\n' }
    }
}

#[derive(Debug, Clone)]
/// A predicate on the current line
pub enum Address {
    Line(usize),                       // N
    Last,                              // $
    Regex(Option<Regex>),              // /re/; None reuses the last regex
    Step { first: usize, step: usize }, // first~step
    Zero,                              // 0, only as 0,/re/
}

#[derive(Debug, Clone)]
/// The end of an address range
pub enum RangeEnd {
    Address(Address), // addr1,addr2
    Relative(usize),  // addr1,+N
    Multiple(usize),  // addr1,~N
}

#[derive(Debug, Clone, Default)]
/// The lines a command applies to
pub enum Selection {
    #[default]
    All,
    Single(Address),
    Range {
        start: Address,
        end: RangeEnd,
        slot: usize, // Index of the range's state in the engine
    },
}

impl Selection {
    /// Number of addresses given.
    pub fn address_count(&self) -> usize {
        match self {
            Selection::All => 0,
            Selection::Single(_) => 1,
            Selection::Range { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A part of an `s` command's replacement
pub enum ReplacementPart {
    Literal(String),
    WholeMatch,   // & or \0
    Group(usize), // \1 to \9
}

#[derive(Debug, Clone, Default)]
/// The replacement of an `s` command, split into its parts
pub struct ReplacementTemplate {
    pub parts: Vec<ReplacementPart>,
    pub max_group_number: usize, // Highest \N used; 0 if none
}

impl ReplacementTemplate {
    pub fn new(parts: Vec<ReplacementPart>) -> Self {
        let max_group_number = parts
            .iter()
            .filter_map(|part| match part {
                ReplacementPart::Group(n) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0);

        Self {
            parts,
            max_group_number,
        }
    }

    /// Append to `out` the replacement of the match `caps` in `text`.
    pub fn apply(&self, text: &str, caps: &Captures, out: &mut String) {
        for part in &self.parts {
            match part {
                ReplacementPart::Literal(s) => out.push_str(s),
                ReplacementPart::WholeMatch => out.push_str(caps.get(text, 0)),
                ReplacementPart::Group(n) => out.push_str(caps.get(text, *n)),
            }
        }
    }
}

impl fmt::Display for ReplacementTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                ReplacementPart::Literal(s) => {
                    for c in s.chars() {
                        match c {
                            '\\' | '&' | '/' => write!(f, "\\{c}")?,
                            '\n' => f.write_str("\\n")?,
                            _ => f.write_char(c)?,
                        }
                    }
                }
                ReplacementPart::WholeMatch => f.write_char('&')?,
                ReplacementPart::Group(n) => write!(f, "\\{n}")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Where `w` output goes
pub enum OutputTarget {
    Stdout,
    Stderr,
    File(usize), // Index into Program::output_files
}

#[derive(Debug, Clone)]
/// The data of an `s` command
pub struct Substitution {
    pub regex: Option<Regex>, // None reuses the last regex
    pub replacement: ReplacementTemplate,
    pub occurrence: usize, // Replace starting from this match (1-based)
    pub global: bool,      // g: also replace all following matches
    pub print: bool,       // p: print if replaced
    pub write: Option<OutputTarget>, // w: write if replaced
}

/// Code points below this limit are mapped through a table.
const TABLE_SIZE: usize = 256;

#[derive(Debug, Clone)]
/// The data of a `y` command: a character mapping
pub struct Transliteration {
    table: [char; TABLE_SIZE],
    others: HashMap<char, char>,
    source: String,
    target: String,
}

impl Transliteration {
    /// Map each character of `source` to the one at the same position
    /// in `target`. The caller guarantees equal lengths.
    pub fn new(source: &str, target: &str) -> Self {
        let mut table = ['\0'; TABLE_SIZE];
        for (i, slot) in (0u8..=255).zip(table.iter_mut()) {
            *slot = char::from(i);
        }

        let mut others = HashMap::new();
        for (from, to) in source.chars().zip(target.chars()) {
            match table.get_mut(from as usize) {
                Some(slot) => *slot = to,
                None => {
                    others.insert(from, to);
                }
            }
        }

        Self {
            table,
            others,
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    /// Look up a character's transliteration.
    pub fn lookup(&self, c: char) -> char {
        match self.table.get(c as usize) {
            Some(mapped) => *mapped,
            None => self.others.get(&c).copied().unwrap_or(c),
        }
    }

    /// Transliterate all characters of text.
    pub fn apply(&self, text: &str) -> String {
        text.chars().map(|c| self.lookup(c)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The condition of a branch
pub enum BranchKind {
    Always,           // b
    IfSubstituted,    // t
    IfNotSubstituted, // T
}

#[derive(Debug, Clone)]
/// What a command does, with its payload
pub enum CommandKind {
    Block { end: usize }, // {: skip to end when not selected
    BlockEnd,             // }
    Label(String),        // :label
    Branch {
        kind: BranchKind,
        label: Option<String>, // None branches to the script's end
        target: Option<usize>, // Resolved command index
    },
    Substitute(Box<Substitution>),       // s
    Transliterate(Box<Transliteration>), // y
    Insert(String),                      // i
    Append(String),                      // a
    Change(String),                      // c
    Delete,                              // d
    DeleteFirstLine,                     // D
    Print,                               // p
    PrintFirstLine,                      // P
    Next,                                // n
    AppendNext,                          // N
    Hold,                                // h
    HoldAppend,                          // H
    Get,                                 // g
    GetAppend,                           // G
    Exchange,                            // x
    Quit { exit_code: i32, autoprint: bool }, // q, Q
    ReadFile(PathBuf),                   // r
    ReadLine(PathBuf),                   // R
    WriteFile(OutputTarget),             // w
    WriteFirstLine(OutputTarget),        // W
    LineNumber,                          // =
    List(Option<usize>),                 // l
    Zap,                                 // z
    FileName,                            // F
}

#[derive(Debug, Clone)]
/// A compiled command
pub struct Command {
    pub code: char,                 // Command letter
    pub selection: Selection,       // Addresses
    pub negated: bool,              // True if '!'
    pub kind: CommandKind,          // Command-specific data
    pub location: ScriptLocation,   // Command's definition location
}

#[derive(Debug, Clone)]
/// A file written by `w` commands or flags
pub struct OutputFile {
    pub path: PathBuf,
    pub location: ScriptLocation, // First reference, for error reporting
}

#[derive(Debug, Clone, Default)]
/// A compiled script: commands in a flat arena, blocks as jumps
pub struct Program {
    pub commands: Vec<Command>,
    pub labels: HashMap<String, usize>, // Label name to command index
    pub output_files: Vec<OutputFile>,
    pub range_count: usize, // Number of range state slots needed
    pub quiet: bool,        // #n on the script's first line
}

fn fmt_address(f: &mut fmt::Formatter<'_>, address: &Address) -> fmt::Result {
    match address {
        Address::Line(n) => write!(f, "{n}"),
        Address::Last => f.write_char('$'),
        Address::Regex(Some(re)) => write!(f, "/{}/", re.as_str()),
        Address::Regex(None) => f.write_str("//"),
        Address::Step { first, step } => write!(f, "{first}~{step}"),
        Address::Zero => f.write_char('0'),
    }
}

impl Program {
    fn target_name(&self, target: &OutputTarget) -> String {
        match target {
            OutputTarget::Stdout => "/dev/stdout".to_string(),
            OutputTarget::Stderr => "/dev/stderr".to_string(),
            OutputTarget::File(i) => self.output_files[*i].path.display().to_string(),
        }
    }

    /// Write a command's canonical script form.
    fn fmt_command(&self, f: &mut fmt::Formatter<'_>, command: &Command) -> fmt::Result {
        match &command.selection {
            Selection::All => (),
            Selection::Single(a) => fmt_address(f, a)?,
            Selection::Range { start, end, .. } => {
                fmt_address(f, start)?;
                f.write_char(',')?;
                match end {
                    RangeEnd::Address(a) => fmt_address(f, a)?,
                    RangeEnd::Relative(n) => write!(f, "+{n}")?,
                    RangeEnd::Multiple(n) => write!(f, "~{n}")?,
                }
            }
        }
        if command.negated {
            f.write_char('!')?;
        }

        match &command.kind {
            CommandKind::Label(label) => write!(f, ":{label}"),
            CommandKind::Branch { label, .. } => match label {
                Some(label) => write!(f, "{} {label}", command.code),
                None => f.write_char(command.code),
            },
            CommandKind::Substitute(sub) => {
                let pattern = sub.regex.as_ref().map_or("", |re| re.as_str());
                write!(f, "s/{pattern}/{}/", sub.replacement)?;
                if sub.occurrence > 1 {
                    write!(f, "{}", sub.occurrence)?;
                }
                if sub.global {
                    f.write_char('g')?;
                }
                if sub.print {
                    f.write_char('p')?;
                }
                if let Some(target) = &sub.write {
                    write!(f, "w {}", self.target_name(target))?;
                }
                Ok(())
            }
            CommandKind::Transliterate(y) => {
                write!(f, "y/{}/{}/", y.source.escape_debug(), y.target.escape_debug())
            }
            CommandKind::Insert(text) | CommandKind::Append(text) | CommandKind::Change(text) => {
                write!(f, "{}\\", command.code)?;
                for line in text.split('\n') {
                    write!(f, "\n{line}")?;
                }
                Ok(())
            }
            CommandKind::Quit { exit_code, .. } if *exit_code != 0 => {
                write!(f, "{} {exit_code}", command.code)
            }
            CommandKind::ReadFile(path) | CommandKind::ReadLine(path) => {
                write!(f, "{} {}", command.code, path.display())
            }
            CommandKind::WriteFile(target) | CommandKind::WriteFirstLine(target) => {
                write!(f, "{} {}", command.code, self.target_name(target))
            }
            CommandKind::List(Some(width)) => write!(f, "l {width}"),
            _ => f.write_char(command.code),
        }
    }
}

impl fmt::Display for Program {
    /// Write the program's commands, one per line, indented by depth.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SED PROGRAM:")?;
        let mut depth = 1;
        for command in &self.commands {
            if matches!(command.kind, CommandKind::BlockEnd) {
                depth -= 1;
            }
            write!(f, "{:width$}", "", width = depth * 2)?;
            self.fmt_command(f, command)?;
            writeln!(f)?;
            if matches!(command.kind, CommandKind::Block { .. }) {
                depth += 1;
            }
        }
        Ok(())
    }
}
