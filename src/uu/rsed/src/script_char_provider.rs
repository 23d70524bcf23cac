// Provide the script contents character by character
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

/// A cursor over the script characters with one character of lookback.
pub struct ScriptCharProvider {
    text: Vec<char>,
    pos: usize,
}

impl ScriptCharProvider {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.chars().collect(),
            pos: 0,
        }
    }

    /// Advances to the next character, if not at end of input.
    pub fn advance(&mut self) {
        if self.pos < self.text.len() {
            self.pos += 1;
        }
    }

    /// Retreats current position by specified number or to beginning.
    pub fn retreat(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    /// Returns the current character. Panics if out of bounds.
    pub fn current(&self) -> char {
        self.text[self.pos]
    }

    /// Returns the current character, or None at end of input.
    pub fn peek(&self) -> Option<char> {
        self.text.get(self.pos).copied()
    }

    /// Returns the character after the current one, if any.
    pub fn peek_next(&self) -> Option<char> {
        self.text.get(self.pos + 1).copied()
    }

    /// Returns the most recently consumed character, if any.
    pub fn previous(&self) -> Option<char> {
        self.pos.checked_sub(1).and_then(|i| self.text.get(i).copied())
    }

    /// Advances the position past blanks; newlines are significant.
    pub fn eat_spaces(&mut self) {
        while self.pos < self.text.len() && matches!(self.text[self.pos], ' ' | '\t') {
            self.pos += 1;
        }
    }

    /// Return current position
    pub fn get_pos(&self) -> usize {
        self.pos
    }

    /// Return the zero-based line and one-based column of `pos`.
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        let pos = pos.min(self.text.len());
        let mut line = 0;
        let mut line_start = 0;
        for (i, c) in self.text[..pos].iter().enumerate() {
            if *c == '\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        (line, pos - line_start + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_navigation() {
        let mut provider = ScriptCharProvider::new("abc");
        assert_eq!(provider.get_pos(), 0);
        assert_eq!(provider.current(), 'a');
        assert_eq!(provider.previous(), None);
        provider.advance();
        assert_eq!(provider.current(), 'b');
        assert_eq!(provider.previous(), Some('a'));
        provider.advance();
        provider.advance();
        assert_eq!(provider.get_pos(), 3);
        assert_eq!(provider.peek(), None);
        assert_eq!(provider.previous(), Some('c'));
    }

    #[test]
    #[should_panic]
    fn test_current_panics_out_of_bounds() {
        let mut provider = ScriptCharProvider::new("x");
        provider.advance();
        provider.current();
    }

    #[test]
    fn test_eat_spaces_stops_at_newline() {
        let mut provider = ScriptCharProvider::new(" \t\nabc");
        provider.eat_spaces();
        assert_eq!(provider.current(), '\n');
    }

    #[test]
    fn test_peek_next() {
        let provider = ScriptCharProvider::new("\\/");
        assert_eq!(provider.peek(), Some('\\'));
        assert_eq!(provider.peek_next(), Some('/'));
    }

    #[test]
    fn test_retreat_to_start() {
        let mut chars = ScriptCharProvider::new("abcdef");
        chars.pos = 3;
        chars.retreat(5);
        assert_eq!(chars.get_pos(), 0);
        assert_eq!(chars.current(), 'a');
    }

    #[test]
    fn test_line_col() {
        let chars = ScriptCharProvider::new("p\ns/a/b/\nq");
        assert_eq!(chars.line_col(0), (0, 1));
        assert_eq!(chars.line_col(2), (1, 1));
        assert_eq!(chars.line_col(5), (1, 4));
        assert_eq!(chars.line_col(9), (2, 1));
        assert_eq!(chars.line_col(99), (2, 2));
    }
}
