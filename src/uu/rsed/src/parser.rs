// Build an executable program from the script's tokens
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::command::{
    Address, BranchKind, Command, CommandKind, OutputFile, OutputTarget, ProcessingOptions,
    Program, RangeEnd, Selection, Substitution, Transliteration,
};
use crate::error_handling::{
    COMPILE_EXIT_CODE, ScriptLocation, compilation_error, compilation_message, semantic_error,
};
use crate::escape_compiler::{
    compile_replacement, compile_text, compile_translit_set, translate_regex_escapes,
};
use crate::fast_regex::{Regex, RegexFlags};
use crate::scanner::{ScanMode, Scanner};
use crate::script_loader::ScriptText;
use crate::token::{Token, TokenKind};

use std::path::PathBuf;

use tracing::debug;
use uucore::error::{UResult, USimpleError};

// The implementation of each command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandHandler {
    Branch,       // b t T
    NoArguments,  // d D g G h H n N p P x z F =
    Number,       // q Q l
    ReadFile,     // r R
    Substitute,   // s
    Text,         // a i c
    Transliterate, // y
    WriteFile,    // w W
}

#[derive(Debug)]
// Specification of a command's arguments
struct CommandSpec {
    n_addr: usize,
    handler: CommandHandler,
}

/// Return the specification of the command with the specified letter.
fn get_cmd_spec(code: char, posix: bool) -> Option<CommandSpec> {
    // Commands taking one address only in POSIX mode
    let gnu_two = if posix { 1 } else { 2 };
    let (n_addr, handler) = match code {
        'a' | 'i' => (gnu_two, CommandHandler::Text),
        'c' => (2, CommandHandler::Text),
        'b' | 't' | 'T' => (2, CommandHandler::Branch),
        'd' | 'D' | 'g' | 'G' | 'h' | 'H' | 'n' | 'N' | 'p' | 'P' | 'x' | 'z' | 'F' => {
            (2, CommandHandler::NoArguments)
        }
        '=' => (gnu_two, CommandHandler::NoArguments),
        'l' => (2, CommandHandler::Number),
        'q' | 'Q' => (1, CommandHandler::Number),
        'r' => (gnu_two, CommandHandler::ReadFile),
        'R' => (2, CommandHandler::ReadFile),
        's' => (2, CommandHandler::Substitute),
        'y' => (2, CommandHandler::Transliterate),
        'w' | 'W' => (2, CommandHandler::WriteFile),
        _ => return None,
    };
    Some(CommandSpec { n_addr, handler })
}

/// Recursive-descent parser driving the scanner's modes
struct Parser<'a> {
    scanner: Scanner,
    script: &'a ScriptText,
    options: &'a ProcessingOptions,
    cur: Token,                     // Current token
    cur_location: ScriptLocation,   // Where the current token starts
    program: Program,
    open_blocks: Vec<usize>,        // Indices of unclosed `{` commands
}

impl<'a> Parser<'a> {
    fn new(script: &'a ScriptText, options: &'a ProcessingOptions) -> Self {
        let mut parser = Self {
            scanner: Scanner::new(script.text()),
            script,
            options,
            cur: Token::eof(),
            cur_location: ScriptLocation::default(),
            program: Program::default(),
            open_blocks: Vec::new(),
        };
        parser.advance();
        parser
    }

    /// Move to the next token.
    fn advance(&mut self) {
        self.cur = self.scanner.next_token();
        let (line, column) = self.scanner.location();
        self.cur_location = self.script.location(line, column);
    }

    /// Move past the current token, scanning the next one in `mode`.
    fn advance_in(&mut self, mode: ScanMode) {
        self.scanner.set_mode(mode);
        self.advance();
    }

    /// Fail with a compile error at the current token.
    fn error<T>(&self, msg: impl ToString) -> UResult<T> {
        compilation_error(&self.cur_location, msg)
    }

    fn is_kind(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    /// Parse the whole script.
    fn parse_program(&mut self) -> UResult<()> {
        loop {
            while matches!(self.cur.kind, TokenKind::Newline | TokenKind::Semicolon) {
                self.advance();
            }

            match self.cur.kind {
                TokenKind::Eof => break,
                TokenKind::RBrace => self.close_block()?,
                _ => self.parse_statement()?,
            }
        }

        if let Some(&open) = self.open_blocks.last() {
            let location = &self.program.commands[open].location;
            return compilation_error(location, "unmatched `{'");
        }
        Ok(())
    }

    /// Close the innermost block at a `}`.
    fn close_block(&mut self) -> UResult<()> {
        let Some(open) = self.open_blocks.pop() else {
            return self.error("unexpected `}'");
        };

        let end = self.program.commands.len();
        if let CommandKind::Block { end: block_end } = &mut self.program.commands[open].kind {
            *block_end = end;
        }
        self.push(
            '}',
            Selection::All,
            false,
            CommandKind::BlockEnd,
            self.cur_location.clone(),
        );
        self.advance();
        self.expect_separator()
    }

    fn push(
        &mut self,
        code: char,
        selection: Selection,
        negated: bool,
        kind: CommandKind,
        location: ScriptLocation,
    ) {
        self.program.commands.push(Command {
            code,
            selection,
            negated,
            kind,
            location,
        });
    }

    /// Require the end of a command.
    fn expect_separator(&mut self) -> UResult<()> {
        if self.cur.is_separator() || self.is_kind(TokenKind::RBrace) {
            Ok(())
        } else {
            self.error("extra characters after command")
        }
    }

    /// Parse `address? !? command`.
    fn parse_statement(&mut self) -> UResult<()> {
        let selection = self.parse_selection()?;

        let mut negated = false;
        while self.is_kind(TokenKind::ExplMark) {
            if negated {
                return self.error("multiple `!'s");
            }
            negated = true;
            self.advance();
        }

        let location = self.cur_location.clone();
        match self.cur.kind {
            TokenKind::LBrace => {
                self.open_blocks.push(self.program.commands.len());
                self.push('{', selection, negated, CommandKind::Block { end: 0 }, location);
                self.advance();
                Ok(())
            }
            TokenKind::Colon => {
                if selection.address_count() > 0 {
                    return self.error(": doesn't want any addresses");
                }
                self.advance();
                if !self.is_kind(TokenKind::Ident) {
                    return self.error("\":\" lacks a label");
                }
                let label = std::mem::take(&mut self.cur.literal);
                self.push(':', selection, false, CommandKind::Label(label), location);
                self.advance();
                self.expect_separator()
            }
            TokenKind::Cmd => {
                self.parse_command(selection, negated, location)?;
                self.expect_separator()
            }
            TokenKind::RBrace => self.error("unexpected `}'"),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof => {
                self.error("missing command")
            }
            _ => self.error(format!(
                "unknown command: `{}'",
                self.cur.first_char().unwrap_or(' ')
            )),
        }
    }

    /// Parse the optional addresses of a command.
    fn parse_selection(&mut self) -> UResult<Selection> {
        if !matches!(
            self.cur.kind,
            TokenKind::Int | TokenKind::Dollar | TokenKind::Slash
        ) {
            return Ok(Selection::All);
        }

        let start = self.parse_address()?;
        if !self.is_kind(TokenKind::Comma) {
            if matches!(start, Address::Zero) {
                return self.error("invalid usage of line address 0");
            }
            return Ok(Selection::Single(start));
        }
        self.advance();

        let end = match self.cur.kind {
            TokenKind::Plus => RangeEnd::Relative(self.parse_range_count()?),
            TokenKind::Tilde => RangeEnd::Multiple(self.parse_range_count()?),
            TokenKind::Int | TokenKind::Dollar | TokenKind::Slash => {
                RangeEnd::Address(self.parse_address()?)
            }
            _ => return self.error("unexpected `,'"),
        };

        let zero_ok = matches!(&end, RangeEnd::Address(Address::Regex(_)));
        if matches!(end, RangeEnd::Address(Address::Zero))
            || (matches!(start, Address::Zero) && !zero_ok)
        {
            return self.error("invalid usage of line address 0");
        }

        let slot = self.program.range_count;
        self.program.range_count += 1;
        Ok(Selection::Range { start, end, slot })
    }

    /// Parse the N of `+N` or `~N`.
    fn parse_range_count(&mut self) -> UResult<usize> {
        self.advance();
        if !self.is_kind(TokenKind::Int) {
            return self.error("expected a number");
        }
        let n = self.parse_number()?;
        self.advance();
        Ok(n)
    }

    fn parse_number(&self) -> UResult<usize> {
        match self.cur.literal.parse::<usize>() {
            Ok(n) => Ok(n),
            Err(_) => self.error(format!("invalid number: {}", self.cur.literal)),
        }
    }

    /// Parse a single address.
    fn parse_address(&mut self) -> UResult<Address> {
        match self.cur.kind {
            TokenKind::Dollar => {
                self.advance();
                Ok(Address::Last)
            }
            TokenKind::Int => {
                let first = self.parse_number()?;
                self.advance();
                if !self.is_kind(TokenKind::Tilde) {
                    return Ok(if first == 0 {
                        Address::Zero
                    } else {
                        Address::Line(first)
                    });
                }
                self.advance();
                if !self.is_kind(TokenKind::Int) {
                    return self.error("expected a number");
                }
                let step = self.parse_number()?;
                self.advance();
                Ok(Address::Step { first, step })
            }
            _ => self.parse_address_regex(),
        }
    }

    /// Parse `/re/` with its optional I and M flags.
    fn parse_address_regex(&mut self) -> UResult<Address> {
        self.advance();
        let mut pattern = String::new();
        if self.is_kind(TokenKind::Lit) {
            pattern = std::mem::take(&mut self.cur.literal);
            self.advance();
        }
        if !self.is_kind(TokenKind::Slash) {
            return self.error("unterminated address regex");
        }
        self.advance();

        let mut flags = RegexFlags {
            extended: self.options.regex_extended,
            ..Default::default()
        };
        while self.is_kind(TokenKind::Ident) {
            match self.cur.first_char() {
                Some('I') => flags.icase = true,
                _ => flags.multiline = true,
            }
            self.advance();
        }

        Ok(Address::Regex(self.compile_regex(&pattern, flags)?))
    }

    /// Compile a pattern; an empty one stands for the last regex used.
    fn compile_regex(&self, pattern: &str, flags: RegexFlags) -> UResult<Option<Regex>> {
        if pattern.is_empty() {
            if flags.icase || flags.multiline {
                return self.error("cannot specify modifiers on an empty regular expression");
            }
            return Ok(None);
        }

        match Regex::new(&translate_regex_escapes(pattern), flags) {
            Ok(re) => Ok(Some(re)),
            Err(e) => self.error(format!("invalid regular expression {pattern:?}: {e}")),
        }
    }

    /// Parse a command from its letter onward.
    fn parse_command(
        &mut self,
        selection: Selection,
        negated: bool,
        location: ScriptLocation,
    ) -> UResult<()> {
        let code = self.cur.first_char().unwrap_or(' ');
        let Some(spec) = get_cmd_spec(code, self.options.posix) else {
            return self.error(format!("unknown command: `{code}'"));
        };
        if selection.address_count() > spec.n_addr {
            return self.error("command only uses one address");
        }

        let kind = match spec.handler {
            CommandHandler::NoArguments => {
                self.advance_in(ScanMode::End);
                match code {
                    'd' => CommandKind::Delete,
                    'D' => CommandKind::DeleteFirstLine,
                    'g' => CommandKind::Get,
                    'G' => CommandKind::GetAppend,
                    'h' => CommandKind::Hold,
                    'H' => CommandKind::HoldAppend,
                    'n' => CommandKind::Next,
                    'N' => CommandKind::AppendNext,
                    'p' => CommandKind::Print,
                    'P' => CommandKind::PrintFirstLine,
                    'x' => CommandKind::Exchange,
                    'z' => CommandKind::Zap,
                    'F' => CommandKind::FileName,
                    _ => CommandKind::LineNumber,
                }
            }
            CommandHandler::Branch => {
                self.advance();
                let label = if self.is_kind(TokenKind::Ident) {
                    let label = std::mem::take(&mut self.cur.literal);
                    self.advance();
                    Some(label)
                } else {
                    None
                };
                let kind = match code {
                    't' => BranchKind::IfSubstituted,
                    'T' => BranchKind::IfNotSubstituted,
                    _ => BranchKind::Always,
                };
                CommandKind::Branch {
                    kind,
                    label,
                    target: None,
                }
            }
            CommandHandler::Number => {
                self.advance();
                let number = if self.is_kind(TokenKind::Int) {
                    let n = self.parse_number()?;
                    self.advance();
                    Some(n)
                } else {
                    None
                };
                match code {
                    'l' => CommandKind::List(number),
                    _ => {
                        let exit_code = match i32::try_from(number.unwrap_or(0)) {
                            Ok(n) => n,
                            Err(_) => return self.error("invalid exit code"),
                        };
                        CommandKind::Quit {
                            exit_code,
                            autoprint: code == 'q',
                        }
                    }
                }
            }
            CommandHandler::ReadFile => {
                let path = self.parse_file_name()?;
                match code {
                    'R' => CommandKind::ReadLine(path),
                    _ => CommandKind::ReadFile(path),
                }
            }
            CommandHandler::WriteFile => {
                let path = self.parse_file_name()?;
                let target = self.output_target(path, &location);
                match code {
                    'W' => CommandKind::WriteFirstLine(target),
                    _ => CommandKind::WriteFile(target),
                }
            }
            CommandHandler::Text => self.parse_text(code)?,
            CommandHandler::Substitute => self.parse_substitute(&location)?,
            CommandHandler::Transliterate => self.parse_transliterate()?,
        };

        self.push(code, selection, negated, kind, location);
        Ok(())
    }

    /// Parse the file name following a command or the `w` flag.
    fn parse_file_name(&mut self) -> UResult<PathBuf> {
        if self.options.sandbox {
            return self.error("e/r/w commands disabled in sandbox mode");
        }
        self.advance();
        if !self.is_kind(TokenKind::Ident) {
            return self.error("missing filename in r/R/w/W commands");
        }
        let path = PathBuf::from(std::mem::take(&mut self.cur.literal));
        self.advance();
        Ok(path)
    }

    /// Return the output target of a `w` path, sharing one per file.
    fn output_target(&mut self, path: PathBuf, location: &ScriptLocation) -> OutputTarget {
        if path.as_os_str() == "/dev/stdout" {
            return OutputTarget::Stdout;
        }
        if path.as_os_str() == "/dev/stderr" {
            return OutputTarget::Stderr;
        }

        let files = &mut self.program.output_files;
        match files.iter().position(|f| f.path == path) {
            Some(i) => OutputTarget::File(i),
            None => {
                files.push(OutputFile {
                    path,
                    location: location.clone(),
                });
                OutputTarget::File(files.len() - 1)
            }
        }
    }

    /// Parse the text of `a`, `i`, or `c`.
    fn parse_text(&mut self, code: char) -> UResult<CommandKind> {
        self.advance();
        let one_liner = !self.is_kind(TokenKind::Backslash);
        if !one_liner {
            self.advance();
        }

        if !self.is_kind(TokenKind::Lit) || (one_liner && self.cur.literal.is_empty()) {
            return self.error("expected \\ after `a', `c' or `i'");
        }
        if one_liner && self.options.posix {
            return self.error(format!("command `{code}' expects \\ followed by text"));
        }

        let empty = self.cur.literal.is_empty();
        let text = compile_text(&self.cur.literal, self.options.posix);
        self.advance();
        // `a\` must be followed by text
        if empty && self.is_kind(TokenKind::Eof) {
            return self.error("expected \\ after `a', `c' or `i'");
        }
        Ok(match code {
            'a' => CommandKind::Append(text),
            'i' => CommandKind::Insert(text),
            _ => CommandKind::Change(text),
        })
    }

    /// Parse the delimiter-separated fields of `s` or `y`,
    /// returning the two fields' text.
    fn parse_fields(&mut self, code: char) -> UResult<(String, String)> {
        self.advance();
        if self.is_kind(TokenKind::Illegal) {
            return self.error(match code {
                's' => "substitute pattern cannot be delimited by newline or backslash",
                _ => "transliteration strings cannot be delimited by newline or backslash",
            });
        }

        let mut fields = [String::new(), String::new()];
        for field in &mut fields {
            if !self.is_kind(TokenKind::Div) {
                return self.error(format!("unterminated `{code}' command"));
            }
            self.advance();
            if self.is_kind(TokenKind::Lit) {
                *field = std::mem::take(&mut self.cur.literal);
                self.advance();
            }
        }
        if !self.is_kind(TokenKind::Div) {
            return self.error(format!("unterminated `{code}' command"));
        }
        let [first, second] = fields;
        Ok((first, second))
    }

    fn parse_substitute(&mut self, location: &ScriptLocation) -> UResult<CommandKind> {
        let (pattern, replacement) = self.parse_fields('s')?;
        self.advance();

        let mut flags = RegexFlags {
            extended: self.options.regex_extended,
            ..Default::default()
        };
        let mut occurrence = None;
        let mut global = false;
        let mut print = false;
        let mut write = None;

        while matches!(self.cur.kind, TokenKind::Ident | TokenKind::Int) {
            if self.is_kind(TokenKind::Int) {
                if occurrence.is_some() {
                    return self.error("multiple 'g' or numeric flags in substitute command");
                }
                match self.parse_number()? {
                    0 => return self.error("number option to `s' command may not be zero"),
                    n => occurrence = Some(n),
                }
                self.advance();
                continue;
            }

            match self.cur.first_char() {
                Some('g') if global => {
                    return self.error("multiple 'g' or numeric flags in substitute command");
                }
                Some('g') => global = true,
                Some('p') if print => {
                    return self.error("multiple 'p' options to 's' command");
                }
                Some('p') => print = true,
                Some('i' | 'I') => flags.icase = true,
                Some('m' | 'M') => flags.multiline = true,
                Some('w') => {
                    let path = self.parse_file_name()?;
                    write = Some(self.output_target(path, location));
                    break;
                }
                other => {
                    return self.error(format!(
                        "invalid substitute flag: '{}'",
                        other.unwrap_or(' ')
                    ));
                }
            }
            self.advance();
        }

        if self.is_kind(TokenKind::Illegal) {
            return self.error(format!(
                "invalid substitute flag: '{}'",
                self.cur.first_char().unwrap_or(' ')
            ));
        }

        let regex = self.compile_regex(&pattern, flags)?;
        let replacement = compile_replacement(&replacement);
        if let Some(re) = &regex {
            let groups = re.captures_len() - 1;
            if replacement.max_group_number > groups {
                return semantic_error(
                    location,
                    's',
                    format!(
                        "invalid reference \\{} on `s' command's RHS",
                        replacement.max_group_number
                    ),
                );
            }
        }

        Ok(CommandKind::Substitute(Box::new(Substitution {
            regex,
            replacement,
            occurrence: occurrence.unwrap_or(1),
            global,
            print,
            write,
        })))
    }

    fn parse_transliterate(&mut self) -> UResult<CommandKind> {
        let (source, target) = self.parse_fields('y')?;
        let source = compile_translit_set(&source);
        let target = compile_translit_set(&target);
        if source.chars().count() != target.chars().count() {
            return self.error("transliteration strings are not the same length");
        }
        self.advance_in(ScanMode::End);
        Ok(CommandKind::Transliterate(Box::new(Transliteration::new(
            &source, &target,
        ))))
    }
}

/// Map each label to the index of its definition.
fn populate_label_map(program: &mut Program) -> UResult<()> {
    for (i, command) in program.commands.iter().enumerate() {
        if let CommandKind::Label(label) = &command.kind
            && program.labels.insert(label.clone(), i).is_some()
        {
            return semantic_error(&command.location, ':', format!("duplicate label `{label}'"));
        }
    }
    Ok(())
}

/// Point each branch to its label, reporting all undefined labels at once.
fn resolve_branch_targets(program: &mut Program) -> UResult<()> {
    let mut errors = Vec::new();
    for command in &mut program.commands {
        if let CommandKind::Branch {
            label: Some(label),
            target,
            ..
        } = &mut command.kind
        {
            match program.labels.get(label.as_str()) {
                Some(&i) => *target = Some(i),
                None => errors.push(compilation_message(
                    &command.location,
                    format!("can't find label for jump to `{label}'"),
                )),
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(USimpleError::new(COMPILE_EXIT_CODE, errors.join("\n")))
    }
}

/// Compile the script into an executable program.
pub fn parse(script: &ScriptText, options: &ProcessingOptions) -> UResult<Program> {
    let mut parser = Parser::new(script, options);
    parser.parse_program()?;

    let mut program = parser.program;
    program.quiet = script.has_quiet_directive();
    populate_label_map(&mut program)?;
    resolve_branch_targets(&mut program)?;

    debug!(
        commands = program.commands.len(),
        labels = program.labels.len(),
        ranges = program.range_count,
        output_files = program.output_files.len(),
        "parsed program"
    );
    Ok(program)
}
