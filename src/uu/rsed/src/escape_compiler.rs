// Compile escaped character sequences
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::command::{ReplacementPart, ReplacementTemplate};
use crate::script_char_provider::ScriptCharProvider;

/// Decode up to `max_digits` digits of the specified radix into a char.
/// Advance past the digits consumed. Return `None` and leave the
/// position unchanged if no digit or no valid character is found.
fn compile_numeric_escape(
    chars: &mut ScriptCharProvider,
    radix: u32,
    max_digits: usize,
) -> Option<char> {
    let start = chars.get_pos();
    let mut value: u32 = 0;
    let mut ndigits = 0;

    while ndigits < max_digits {
        match chars.peek().and_then(|c| c.to_digit(radix)) {
            Some(digit) => {
                value = value * radix + digit;
                ndigits += 1;
                chars.advance();
            }
            None => break,
        }
    }

    match (ndigits, char::from_u32(value)) {
        (0, _) | (_, None) => {
            chars.retreat(chars.get_pos() - start);
            None
        }
        (_, Some(decoded)) => Some(decoded),
    }
}

/// Map `x` to the control character produced by `\cx`.
fn create_control_char(x: char) -> Option<char> {
    x.is_ascii()
        .then(|| char::from(x.to_ascii_uppercase() as u8 ^ 0x40))
}

/// Compile the character escape whose letter is at the current position,
/// i.e. after the backslash, and advance past it.
/// Return `None`, without advancing, if this is not a character escape.
pub fn parse_char_escape(chars: &mut ScriptCharProvider) -> Option<char> {
    let simple = match chars.peek()? {
        'a' => Some('\x07'),
        'f' => Some('\x0c'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'v' => Some('\x0b'),
        _ => None,
    };
    if simple.is_some() {
        chars.advance();
        return simple;
    }

    let (radix, max_digits) = match chars.peek()? {
        'c' => {
            chars.advance();
            return match chars.peek().and_then(create_control_char) {
                Some(decoded) => {
                    chars.advance();
                    Some(decoded)
                }
                None => Some('c'),
            };
        }
        'd' => (10, 3),
        'o' => (8, 3),
        'x' => (16, 2),
        _ => return None,
    };

    let letter = chars.current();
    chars.advance();
    compile_numeric_escape(chars, radix, max_digits).or(Some(letter))
}

/// Compile `a`, `i`, `c` text: `\` followed by a character escape yields
/// the character, any other `\x` yields `x`. In POSIX mode only the
/// backslash removal applies.
pub fn compile_text(text: &str, posix: bool) -> String {
    let mut chars = ScriptCharProvider::new(text);
    let mut result = String::with_capacity(text.len());

    while let Some(c) = chars.peek() {
        chars.advance();
        if c != '\\' {
            result.push(c);
            continue;
        }

        if !posix && let Some(decoded) = parse_char_escape(&mut chars) {
            result.push(decoded);
        } else if let Some(next) = chars.peek() {
            result.push(next);
            chars.advance();
        }
    }

    result
}

/// Compile a `y` command character set: `\\` is a backslash and `\n`
/// a newline; other escapes are character escapes or stay verbatim.
pub fn compile_translit_set(text: &str) -> String {
    let mut chars = ScriptCharProvider::new(text);
    let mut result = String::with_capacity(text.len());

    while let Some(c) = chars.peek() {
        chars.advance();
        if c != '\\' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            Some('\\') => {
                result.push('\\');
                chars.advance();
            }
            Some(_) => match parse_char_escape(&mut chars) {
                Some(decoded) => result.push(decoded),
                None => result.push('\\'),
            },
            None => result.push('\\'),
        }
    }

    result
}

/// Replace character escapes in a regular expression with the characters
/// they stand for, keeping all other escapes for the regex engine.
pub fn translate_regex_escapes(pattern: &str) -> String {
    let mut chars = ScriptCharProvider::new(pattern);
    let mut result = String::with_capacity(pattern.len());

    while let Some(c) = chars.peek() {
        chars.advance();
        if c != '\\' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            Some('n') => {
                chars.advance();
                result.push('\n');
            }
            Some('t') => {
                chars.advance();
                result.push('\t');
            }
            Some(next) => {
                chars.advance();
                result.push('\\');
                result.push(next);
            }
            None => result.push('\\'),
        }
    }

    result
}

/// Compile the replacement of an `s` command into its parts.
pub fn compile_replacement(text: &str) -> ReplacementTemplate {
    let mut chars = ScriptCharProvider::new(text);
    let mut parts = Vec::new();
    let mut literal = String::new();

    fn flush(literal: &mut String, parts: &mut Vec<ReplacementPart>) {
        if !literal.is_empty() {
            parts.push(ReplacementPart::Literal(std::mem::take(literal)));
        }
    }

    while let Some(c) = chars.peek() {
        chars.advance();
        match c {
            '&' => {
                flush(&mut literal, &mut parts);
                parts.push(ReplacementPart::WholeMatch);
            }
            '\\' => match chars.peek() {
                Some(d @ '0'..='9') => {
                    chars.advance();
                    flush(&mut literal, &mut parts);
                    match d.to_digit(10) {
                        Some(0) | None => parts.push(ReplacementPart::WholeMatch),
                        Some(n) => parts.push(ReplacementPart::Group(n as usize)),
                    }
                }
                Some(escaped @ ('\\' | '&' | '\n')) => {
                    chars.advance();
                    literal.push(escaped);
                }
                Some(_) => match parse_char_escape(&mut chars) {
                    Some(decoded) => literal.push(decoded),
                    None => {
                        literal.push(chars.current());
                        chars.advance();
                    }
                },
                None => literal.push('\\'),
            },
            _ => literal.push(c),
        }
    }

    flush(&mut literal, &mut parts);
    ReplacementTemplate::new(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    // compile_numeric_escape
    #[test]
    fn test_compile_octal_escape() {
        let mut provider = ScriptCharProvider::new("141rest");
        assert_eq!(compile_numeric_escape(&mut provider, 8, 3), Some('a'));
        assert_eq!(provider.current(), 'r');
    }

    #[test]
    fn test_compile_decimal_escape_stops_at_max_digits() {
        let mut provider = ScriptCharProvider::new("0659");
        assert_eq!(compile_numeric_escape(&mut provider, 10, 3), Some('A'));
        assert_eq!(provider.current(), '9');
    }

    #[test]
    fn test_compile_hex_escape_truncated() {
        let mut provider = ScriptCharProvider::new("4G");
        assert_eq!(compile_numeric_escape(&mut provider, 16, 2), Some('\u{4}'));
        assert_eq!(provider.current(), 'G');
    }

    #[test]
    fn test_no_valid_digits() {
        let mut provider = ScriptCharProvider::new("xyz");
        assert_eq!(compile_numeric_escape(&mut provider, 10, 3), None);
        assert_eq!(provider.get_pos(), 0);
    }

    // create_control_char
    #[test]
    fn test_control_chars() {
        assert_eq!(create_control_char('a'), Some('\u{01}'));
        assert_eq!(create_control_char('Z'), Some('\u{1a}'));
        assert_eq!(create_control_char('@'), Some('\0'));
        assert_eq!(create_control_char('{'), Some(';'));
        assert_eq!(create_control_char('é'), None);
    }

    // parse_char_escape
    fn escape_result_with_current(input: &str) -> (Option<char>, Option<char>) {
        let mut provider = ScriptCharProvider::new(input);
        let result = parse_char_escape(&mut provider);
        (result, provider.peek())
    }

    #[test]
    fn test_standard_escapes() {
        assert_eq!(escape_result_with_current("a"), (Some('\x07'), None));
        assert_eq!(escape_result_with_current("f"), (Some('\x0c'), None));
        assert_eq!(escape_result_with_current("n"), (Some('\n'), None));
        assert_eq!(escape_result_with_current("r"), (Some('\r'), None));
        assert_eq!(escape_result_with_current("tx"), (Some('\t'), Some('x')));
        assert_eq!(escape_result_with_current("v"), (Some('\x0b'), None));
    }

    #[test]
    fn test_numeric_escapes() {
        assert_eq!(escape_result_with_current("d065r"), (Some('A'), Some('r')));
        assert_eq!(escape_result_with_current("o141x"), (Some('a'), Some('x')));
        assert_eq!(escape_result_with_current("x41;"), (Some('A'), Some(';')));
    }

    #[test]
    fn test_numeric_escape_fallback() {
        assert_eq!(escape_result_with_current("d;."), (Some('d'), Some(';')));
        assert_eq!(escape_result_with_current("o9x"), (Some('o'), Some('9')));
        assert_eq!(escape_result_with_current("xyz"), (Some('x'), Some('y')));
    }

    #[test]
    fn test_control_escape() {
        assert_eq!(escape_result_with_current("cZ"), (Some('\x1A'), None));
        assert_eq!(escape_result_with_current("cé"), (Some('c'), Some('é')));
    }

    #[test]
    fn test_unknown_escape() {
        assert_eq!(escape_result_with_current("q"), (None, Some('q')));
    }

    // compile_text
    #[test]
    fn test_text_escapes() {
        assert_eq!(compile_text(r"a\tb\\c\qd", false), "a\tb\\cqd");
        assert_eq!(compile_text(r"a\tb", true), "atb");
        assert_eq!(compile_text("one\ntwo", false), "one\ntwo");
    }

    // compile_translit_set
    #[test]
    fn test_translit_escapes() {
        assert_eq!(compile_translit_set(r"a\nb"), "a\nb");
        assert_eq!(compile_translit_set(r"\\x"), "\\x");
        assert_eq!(compile_translit_set(r"\t"), "\t");
        assert_eq!(compile_translit_set(r"\q"), "\\q");
    }

    // translate_regex_escapes
    #[test]
    fn test_regex_escapes() {
        assert_eq!(translate_regex_escapes(r"a\nb"), "a\nb");
        assert_eq!(translate_regex_escapes(r"\(a\)\1\."), r"\(a\)\1\.");
        assert_eq!(translate_regex_escapes(r"\\n"), r"\\n");
    }

    // compile_replacement
    #[test]
    fn test_replacement_literal() {
        let template = compile_replacement("hello");
        assert_eq!(
            template.parts,
            vec![ReplacementPart::Literal("hello".to_string())]
        );
    }

    #[test]
    fn test_replacement_groups() {
        let template = compile_replacement(r"<\1-&-\0\2>");
        assert_eq!(
            template.parts,
            vec![
                ReplacementPart::Literal("<".to_string()),
                ReplacementPart::Group(1),
                ReplacementPart::Literal("-".to_string()),
                ReplacementPart::WholeMatch,
                ReplacementPart::Literal("-".to_string()),
                ReplacementPart::WholeMatch,
                ReplacementPart::Group(2),
                ReplacementPart::Literal(">".to_string()),
            ]
        );
        assert_eq!(template.max_group_number, 2);
    }

    #[test]
    fn test_replacement_escapes() {
        let template = compile_replacement(r"a\&b\\c\nd\qe");
        assert_eq!(
            template.parts,
            vec![ReplacementPart::Literal("a&b\\c\ndqe".to_string())]
        );
    }

    #[test]
    fn test_replacement_empty() {
        assert!(compile_replacement("").parts.is_empty());
    }
}
