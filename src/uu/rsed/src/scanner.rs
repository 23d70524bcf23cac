// Turn script text into tokens
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::script_char_provider::ScriptCharProvider;
use crate::token::{Token, TokenKind};

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How the next token is to be interpreted
pub enum ScanMode {
    /// Start of a command: addresses, command letters and structure.
    Command,
    /// After `s`: the delimiter, the pattern and the replacement.
    SubstFields,
    /// After `y`: the delimiter and the two character sets.
    TranslitFields,
    /// After the last `s` delimiter: flag letters and numbers.
    SubstFlags,
    /// After `r`, `w` or the `w` flag: the rest of the line.
    FileName,
    /// After `b`, `t`, `T` or `:`.
    Label,
    /// After `a`, `i`, `c`: an optional backslash, then text.
    Text,
    /// After the backslash of `a\`, `i\`, `c\`.
    TextBody,
    /// After `q`, `Q`, `l`, `L`: an optional number.
    Number,
    /// After a complete command: only separators may follow.
    End,
}

/// A context-sensitive tokenizer over a complete script.
pub struct Scanner {
    chars: ScriptCharProvider,
    mode: ScanMode,
    /// Tokens already scanned as part of a multi-token construct
    pending: VecDeque<Token>,
    /// Address terms seen in the current command
    address_terms: usize,
    /// Kind of the most recently returned token
    prev: Option<TokenKind>,
    /// True right after the closing delimiter of an address regex
    after_address_regex: bool,
    /// Position where the most recent token started
    token_start: usize,
}

impl Scanner {
    pub fn new(script: &str) -> Self {
        Self {
            chars: ScriptCharProvider::new(script),
            mode: ScanMode::Command,
            pending: VecDeque::new(),
            address_terms: 0,
            prev: None,
            after_address_regex: false,
            token_start: 0,
        }
    }

    /// Set the interpretation of the next token scanned.
    pub fn set_mode(&mut self, mode: ScanMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Return the zero-based line and one-based column where the most
    /// recent token started.
    pub fn location(&self) -> (usize, usize) {
        self.chars.line_col(self.token_start)
    }

    /// Return the next token; at the end of the script this is always EOF.
    pub fn next_token(&mut self) -> Token {
        let token = match self.pending.pop_front() {
            Some(token) => token,
            None => match self.mode {
                ScanMode::Command => self.scan_command(),
                ScanMode::SubstFields => self.scan_fields(true),
                ScanMode::TranslitFields => self.scan_fields(false),
                ScanMode::SubstFlags => self.scan_subst_flags(),
                ScanMode::FileName => self.scan_file_name(),
                ScanMode::Label => self.scan_label(),
                ScanMode::Text => self.scan_text(),
                ScanMode::TextBody => self.scan_text_body(),
                ScanMode::Number => self.scan_number(),
                ScanMode::End => self.scan_end(),
            },
        };
        self.prev = Some(token.kind);
        token
    }

    /// Read characters until one satisfying `is_terminator` is found.
    ///
    /// A backslash followed by a terminator yields the terminator alone and
    /// scanning continues. A backslash followed by a newline yields the
    /// newline. Any other backslash pair is kept verbatim. Return the text
    /// read and whether the terminator was found; if `consume` the
    /// terminator is skipped, otherwise it stays current.
    pub fn read_until_unescaped(
        &mut self,
        is_terminator: impl Fn(char) -> bool,
        consume: bool,
    ) -> (String, bool) {
        let mut text = String::new();

        while let Some(c) = self.chars.peek() {
            if c == '\\' {
                match self.chars.peek_next() {
                    Some(next) if is_terminator(next) || next == '\n' => {
                        text.push(next);
                        self.chars.advance();
                        self.chars.advance();
                    }
                    Some(next) => {
                        text.push('\\');
                        text.push(next);
                        self.chars.advance();
                        self.chars.advance();
                    }
                    None => {
                        // Trailing backslash at end of script
                        text.push('\\');
                        self.chars.advance();
                    }
                }
                continue;
            }

            if is_terminator(c) {
                if consume {
                    self.chars.advance();
                }
                return (text, true);
            }

            text.push(c);
            self.chars.advance();
        }

        (text, false)
    }

    /// Start a new token at the first non-blank character.
    fn start_token(&mut self) -> Option<char> {
        self.chars.eat_spaces();
        self.token_start = self.chars.get_pos();
        self.chars.peek()
    }

    /// Return a single-character token of the specified kind.
    fn single(&mut self, kind: TokenKind, c: char) -> Token {
        self.chars.advance();
        Token::new(kind, c)
    }

    fn reset_address(&mut self) {
        self.address_terms = 0;
        self.after_address_regex = false;
    }

    /// Skip a comment, including its terminating newline.
    fn skip_comment(&mut self) -> Token {
        while let Some(c) = self.chars.peek() {
            self.chars.advance();
            if c == '\n' {
                break;
            }
        }
        self.reset_address();
        self.mode = ScanMode::Command;
        Token::new(TokenKind::Newline, "#")
    }

    fn read_digits(&mut self) -> String {
        let mut digits = String::new();
        while let Some(c) = self.chars.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            self.chars.advance();
        }
        digits
    }

    fn scan_command(&mut self) -> Token {
        let after_regex = std::mem::take(&mut self.after_address_regex);
        let Some(c) = self.start_token() else {
            return Token::eof();
        };

        match c {
            '\n' => {
                self.reset_address();
                self.single(TokenKind::Newline, c)
            }
            ';' => {
                self.reset_address();
                self.single(TokenKind::Semicolon, c)
            }
            '#' => self.skip_comment(),
            '{' => {
                self.reset_address();
                self.single(TokenKind::LBrace, c)
            }
            '}' => {
                self.reset_address();
                self.mode = ScanMode::End;
                self.single(TokenKind::RBrace, c)
            }
            '!' => self.single(TokenKind::ExplMark, c),
            ':' => {
                self.reset_address();
                self.mode = ScanMode::Label;
                self.single(TokenKind::Colon, c)
            }
            ',' => {
                let follows_term = matches!(
                    self.prev,
                    Some(TokenKind::Int | TokenKind::Dollar | TokenKind::Slash | TokenKind::Ident)
                );
                if self.address_terms == 1 && follows_term {
                    self.single(TokenKind::Comma, c)
                } else {
                    self.single(TokenKind::Illegal, c)
                }
            }
            '$' => {
                self.address_terms += 1;
                self.single(TokenKind::Dollar, c)
            }
            '0'..='9' => {
                if !matches!(self.prev, Some(TokenKind::Tilde | TokenKind::Plus)) {
                    self.address_terms += 1;
                }
                let digits = self.read_digits();
                Token::new(TokenKind::Int, digits)
            }
            '+' if self.prev == Some(TokenKind::Comma) => self.single(TokenKind::Plus, c),
            '~' if matches!(self.prev, Some(TokenKind::Int | TokenKind::Comma)) => {
                self.single(TokenKind::Tilde, c)
            }
            '/' => self.scan_address_regex(),
            '\\' => match self.chars.peek_next() {
                Some(delim) if delim != '\n' && delim != '\\' => {
                    self.chars.advance();
                    self.scan_address_regex()
                }
                _ => self.single(TokenKind::Illegal, c),
            },
            'I' | 'M' if after_regex => {
                self.after_address_regex = true;
                self.single(TokenKind::Ident, c)
            }
            c if c.is_ascii_alphabetic() || c == '=' => {
                self.reset_address();
                self.mode = match c {
                    's' => ScanMode::SubstFields,
                    'y' => ScanMode::TranslitFields,
                    'a' | 'i' | 'c' => ScanMode::Text,
                    'b' | 't' | 'T' => ScanMode::Label,
                    'r' | 'R' | 'w' | 'W' => ScanMode::FileName,
                    'q' | 'Q' | 'l' | 'L' => ScanMode::Number,
                    _ => ScanMode::Command,
                };
                self.single(TokenKind::Cmd, c)
            }
            _ => self.single(TokenKind::Illegal, c),
        }
    }

    /// Scan a context address delimited by the current character.
    fn scan_address_regex(&mut self) -> Token {
        let delim = self.chars.current();
        self.chars.advance();
        self.address_terms += 1;

        let (text, found) = self.read_until_unescaped(|c| c == delim, true);
        if !text.is_empty() {
            self.pending.push_back(Token::new(TokenKind::Lit, text));
        }
        if found {
            self.pending.push_back(Token::new(TokenKind::Slash, delim));
            self.after_address_regex = true;
        }
        Token::new(TokenKind::Slash, delim)
    }

    /// Scan the delimited fields of `s` (with flags to follow) or `y`.
    fn scan_fields(&mut self, subst: bool) -> Token {
        self.token_start = self.chars.get_pos();
        let Some(delim) = self.chars.peek() else {
            self.mode = ScanMode::End;
            return Token::eof();
        };
        if delim == '\n' || delim == '\\' {
            self.mode = ScanMode::End;
            return self.single(TokenKind::Illegal, delim);
        }
        self.chars.advance();

        self.mode = ScanMode::End;
        for _ in 0..2 {
            let (text, found) = self.read_until_unescaped(|c| c == delim, true);
            if !text.is_empty() {
                self.pending.push_back(Token::new(TokenKind::Lit, text));
            }
            if !found {
                return Token::new(TokenKind::Div, delim);
            }
            self.pending.push_back(Token::new(TokenKind::Div, delim));
        }

        if subst {
            self.mode = ScanMode::SubstFlags;
        }
        Token::new(TokenKind::Div, delim)
    }

    fn scan_subst_flags(&mut self) -> Token {
        let Some(c) = self.start_token() else {
            return Token::eof();
        };

        match c {
            'g' | 'p' | 'i' | 'I' | 'm' | 'M' | 'e' => self.single(TokenKind::Ident, c),
            '0'..='9' => {
                let digits = self.read_digits();
                Token::new(TokenKind::Int, digits)
            }
            'w' => {
                self.mode = ScanMode::FileName;
                self.single(TokenKind::Ident, c)
            }
            ';' | '\n' | '}' | '#' => {
                self.mode = ScanMode::End;
                self.scan_end()
            }
            _ => self.single(TokenKind::Illegal, c),
        }
    }

    fn scan_file_name(&mut self) -> Token {
        self.start_token();
        let mut name = String::new();
        while let Some(c) = self.chars.peek().filter(|c| *c != '\n') {
            name.push(c);
            self.chars.advance();
        }

        self.mode = ScanMode::End;
        if name.is_empty() {
            self.scan_end()
        } else {
            Token::new(TokenKind::Ident, name)
        }
    }

    fn scan_label(&mut self) -> Token {
        self.start_token();
        let mut label = String::new();
        while let Some(c) = self
            .chars
            .peek()
            .filter(|c| !c.is_whitespace() && *c != ';' && *c != '}')
        {
            label.push(c);
            self.chars.advance();
        }

        self.mode = ScanMode::End;
        if label.is_empty() {
            self.scan_end()
        } else {
            Token::new(TokenKind::Ident, label)
        }
    }

    fn scan_text(&mut self) -> Token {
        match self.start_token() {
            Some('\\') => {
                self.mode = ScanMode::TextBody;
                self.single(TokenKind::Backslash, '\\')
            }
            _ => self.scan_text_body(),
        }
    }

    /// Scan a/i/c text up to the first newline not preceded by a backslash.
    fn scan_text_body(&mut self) -> Token {
        if self.chars.previous() == Some('\\') && self.chars.peek() == Some('\n') {
            self.chars.advance();
        }
        self.token_start = self.chars.get_pos();

        self.mode = ScanMode::End;
        let (text, _) = self.read_until_unescaped(|c| c == '\n', false);
        Token::new(TokenKind::Lit, text)
    }

    fn scan_number(&mut self) -> Token {
        self.mode = ScanMode::End;
        match self.start_token() {
            Some(c) if c.is_ascii_digit() => {
                let digits = self.read_digits();
                Token::new(TokenKind::Int, digits)
            }
            _ => self.scan_end(),
        }
    }

    fn scan_end(&mut self) -> Token {
        let Some(c) = self.start_token() else {
            return Token::eof();
        };

        match c {
            ';' => {
                self.reset_address();
                self.mode = ScanMode::Command;
                self.single(TokenKind::Semicolon, c)
            }
            '\n' => {
                self.reset_address();
                self.mode = ScanMode::Command;
                self.single(TokenKind::Newline, c)
            }
            '}' => self.single(TokenKind::RBrace, c),
            '#' => self.skip_comment(),
            _ => self.single(TokenKind::Illegal, c),
        }
    }
}

impl Iterator for Scanner {
    type Item = Token;

    /// Yield tokens up to, but excluding, EOF.
    fn next(&mut self) -> Option<Token> {
        let token = self.next_token();
        (token.kind != TokenKind::Eof).then_some(token)
    }
}
