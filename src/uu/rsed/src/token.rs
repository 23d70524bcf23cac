// Lexical tokens of the script language
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Kinds of tokens produced by the scanner
pub enum TokenKind {
    Cmd,       // Single-letter command name
    Int,       // Decimal number
    Dollar,    // Last-line address
    Comma,     // Address range separator
    Semicolon, // Command separator
    Newline,   // Command separator; also blank and comment lines
    Colon,     // Label definition
    ExplMark,  // Address negation
    LBrace,    // Block start
    RBrace,    // Block end
    Backslash, // Introduces a/i/c text
    Plus,      // addr,+N
    Tilde,     // first~step and addr,~N
    Ident,     // Flags, file names and labels
    Slash,     // Address regex delimiter
    Div,       // s/y field delimiter
    Lit,       // Delimited or text content
    Illegal,   // Character not valid in the current context
    Eof,       // End of script
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Cmd => "CMD",
            TokenKind::Int => "INT",
            TokenKind::Dollar => "DOLLAR",
            TokenKind::Comma => "COMMA",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Colon => "COLON",
            TokenKind::ExplMark => "EXPLMARK",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::Backslash => "BACKSLASH",
            TokenKind::Plus => "PLUS",
            TokenKind::Tilde => "TILDE",
            TokenKind::Ident => "IDENT",
            TokenKind::Slash => "SLASH",
            TokenKind::Div => "DIV",
            TokenKind::Lit => "LIT",
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::Eof => "EOF",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A token and the script text it stands for
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>) -> Self {
        Self {
            kind,
            literal: literal.into(),
        }
    }

    /// The end-of-script token.
    pub fn eof() -> Self {
        Self::new(TokenKind::Eof, "")
    }

    /// Return true if the token ends a command.
    pub fn is_separator(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        )
    }

    /// Return the first character of the literal, if any.
    pub fn first_char(&self) -> Option<char> {
        self.literal.chars().next()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind, self.literal)
    }
}
