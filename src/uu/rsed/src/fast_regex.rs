// A unified interface to literal, standard and fancy regular expressions
//
// Plain strings are matched with memchr, most expressions with the regex
// crate, and only those requiring back-references with fancy_regex.
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::command::ReplacementTemplate;

use fancy_regex::Regex as FancyRegex;
use memchr::memmem;
use once_cell::sync::Lazy;
use regex::Regex as RustRegex;
use std::fmt;
use uucore::error::{UResult, USimpleError};

/// REs requiring the fancy_regex capabilities: back-references.
static NEEDS_FANCY_RE: Lazy<RustRegex> = Lazy::new(|| {
    RustRegex::new(
        r"(?x)
          ( ^                 # At the beginning
            | [^\\]           # or after a non \
            | \\\\            # or after an escaped \
          )
          \\[1-9]             # A back-reference
        ",
    )
    .expect("valid fancy detection RE")
});

/// All constructs signifying that the match must be handled by an RE
/// rather than by plain string matching. Leading ^ and trailing $ are
/// handled by the literal matcher.
static NEEDS_RE: Lazy<RustRegex> = Lazy::new(|| {
    RustRegex::new(
        r"(?x)
          ( ^                 # At the beginning
            | [^\\]           # or after a non \
            | \\\\            # or after an escaped \
          )
          ( [.?|+()\[\]{}*]   # Any magic RE character
            | \\[[:alnum:]<>`'] # Classes, assertions, references
            | .\^             # ^ other than at the beginning
            | \$.             # $ other than at the end
          )
        ",
    )
    .expect("valid RE detection RE")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Options affecting how a pattern is compiled
pub struct RegexFlags {
    pub extended: bool,   // -E: the pattern is an ERE
    pub icase: bool,      // I: case-insensitive matching
    pub multiline: bool,  // M: ^ and $ match at embedded newlines
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Types of literal string anchored matches
enum AnchoredMatch {
    Begin, // ^...
    End,   // ...$
    Both,  // ^...$
    Free,  // ...
}

#[derive(Clone, Debug)]
/// A fast Regex-like matcher for literal strings using memchr::memmem
pub struct LiteralMatcher {
    needle: String,
    match_type: AnchoredMatch,
}

/// Return true if `s` ends with an odd number of backslashes.
fn ends_with_escape(s: &str) -> bool {
    s.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Return the passed pattern without any backslash escapes.
fn remove_escapes(pattern: &str) -> String {
    let mut chars = pattern.chars();
    let mut result = String::with_capacity(pattern.len());

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }

    result
}

impl LiteralMatcher {
    /// Construct a matcher from a pattern with no RE magic but
    /// possibly anchors and escapes.
    pub fn new(pattern: &str) -> Self {
        let (begin, rest) = match pattern.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        let (end, rest) = match rest.strip_suffix('$') {
            Some(inner) if !ends_with_escape(inner) => (true, inner),
            _ => (false, rest),
        };

        let match_type = match (begin, end) {
            (true, true) => AnchoredMatch::Both,
            (true, false) => AnchoredMatch::Begin,
            (false, true) => AnchoredMatch::End,
            (false, false) => AnchoredMatch::Free,
        };

        Self {
            needle: remove_escapes(rest),
            match_type,
        }
    }

    /// Returns the start index of the first match, if any
    fn anchored_find(&self, haystack: &str) -> Option<usize> {
        let needle = self.needle.as_str();
        match self.match_type {
            AnchoredMatch::Both => (haystack == needle).then_some(0),
            AnchoredMatch::Begin => haystack.starts_with(needle).then_some(0),
            AnchoredMatch::End => haystack
                .ends_with(needle)
                .then(|| haystack.len() - needle.len()),
            AnchoredMatch::Free => memmem::find(haystack.as_bytes(), needle.as_bytes()),
        }
    }

    /// Return true if the needle occurs in the haystack.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.anchored_find(haystack).is_some()
    }

    /// Return the start offsets of all non-overlapping matches.
    fn find_starts(&self, haystack: &str) -> Vec<usize> {
        match self.match_type {
            AnchoredMatch::Free if !self.needle.is_empty() => {
                memmem::find_iter(haystack.as_bytes(), self.needle.as_bytes()).collect()
            }
            _ => self.anchored_find(haystack).into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug)]
enum Engine {
    Literal(LiteralMatcher), // Fastest: literal text
    Standard(RustRegex),     // The regex crate
    Fancy(FancyRegex),       // Slowest: RE supporting back-references
}

#[derive(Clone, Debug)]
/// A compiled regular expression and the text it was compiled from
pub struct Regex {
    source: String,
    engine: Engine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Byte offsets of a match and its groups; group 0 is the whole match
pub struct Captures {
    spans: Vec<Option<(usize, usize)>>,
}

impl Captures {
    pub fn start(&self) -> usize {
        self.spans[0].map_or(0, |(start, _)| start)
    }

    pub fn end(&self) -> usize {
        self.spans[0].map_or(0, |(_, end)| end)
    }

    /// Return the text of group i; unmatched groups are empty.
    pub fn get<'t>(&self, text: &'t str, i: usize) -> &'t str {
        match self.spans.get(i).copied().flatten() {
            Some((start, end)) => &text[start..end],
            None => "",
        }
    }
}

fn engine_error(e: impl fmt::Display) -> Box<dyn uucore::error::UError> {
    USimpleError::new(2, format!("error matching RE: {e}"))
}

impl Regex {
    /// Construct the most efficient engine able to match the
    /// (already translated to ERE) pattern.
    fn with_engine(source: &str, pattern: &str, flags: RegexFlags) -> Result<Self, String> {
        let is_literal = !flags.icase
            && !flags.multiline
            && !NEEDS_RE.is_match(pattern)
            && !NEEDS_FANCY_RE.is_match(pattern);

        let engine = if is_literal {
            Engine::Literal(LiteralMatcher::new(pattern))
        } else {
            let mut full = String::from("(?s)");
            if flags.icase {
                full.push_str("(?i)");
            }
            if flags.multiline {
                full.push_str("(?m)");
            }
            full.push_str(pattern);

            if NEEDS_FANCY_RE.is_match(pattern) {
                Engine::Fancy(FancyRegex::new(&full).map_err(|e| e.to_string())?)
            } else {
                Engine::Standard(RustRegex::new(&full).map_err(|e| e.to_string())?)
            }
        };

        Ok(Self {
            source: source.to_string(),
            engine,
        })
    }

    /// Compile a script pattern: a BRE unless `flags.extended`.
    pub fn new(pattern: &str, flags: RegexFlags) -> Result<Self, String> {
        if flags.extended {
            Self::with_engine(pattern, pattern, flags)
        } else {
            Self::with_engine(pattern, &bre_to_ere(pattern), flags)
        }
    }

    /// The pattern as written in the script.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check if the regex matches the text.
    pub fn is_match(&self, text: &str) -> UResult<bool> {
        match &self.engine {
            Engine::Literal(m) => Ok(m.is_match(text)),
            Engine::Standard(re) => Ok(re.is_match(text)),
            Engine::Fancy(re) => re.is_match(text).map_err(engine_error),
        }
    }

    /// Return the number of capture groups, including group 0.
    pub fn captures_len(&self) -> usize {
        match &self.engine {
            Engine::Literal(_) => 1,
            Engine::Standard(re) => re.captures_len(),
            Engine::Fancy(re) => re.captures_len(),
        }
    }

    /// Call `f` with successive non-overlapping matches until it
    /// returns false or no more matches exist.
    pub fn for_each_match(
        &self,
        text: &str,
        mut f: impl FnMut(&Captures) -> bool,
    ) -> UResult<()> {
        match &self.engine {
            Engine::Literal(m) => {
                let len = m.needle.len();
                for start in m.find_starts(text) {
                    let caps = Captures {
                        spans: vec![Some((start, start + len))],
                    };
                    if !f(&caps) {
                        break;
                    }
                }
            }
            Engine::Standard(re) => {
                for found in re.captures_iter(text) {
                    let caps = Captures {
                        spans: found
                            .iter()
                            .map(|m| m.map(|m| (m.start(), m.end())))
                            .collect(),
                    };
                    if !f(&caps) {
                        break;
                    }
                }
            }
            Engine::Fancy(re) => {
                for found in re.captures_iter(text) {
                    let found = found.map_err(engine_error)?;
                    let caps = Captures {
                        spans: found
                            .iter()
                            .map(|m| m.map(|m| (m.start(), m.end())))
                            .collect(),
                    };
                    if !f(&caps) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Replace the `occurrence`-th match (1-based) of text with the
    /// template, and, if `global`, all the following ones too.
    /// Return the resulting text and the number of replacements made.
    pub fn replace(
        &self,
        text: &str,
        template: &ReplacementTemplate,
        occurrence: usize,
        global: bool,
    ) -> UResult<(String, usize)> {
        let mut result = String::with_capacity(text.len());
        let mut last = 0;
        let mut seen = 0;
        let mut count = 0;

        self.for_each_match(text, |caps| {
            seen += 1;
            if seen < occurrence {
                return true;
            }
            result.push_str(&text[last..caps.start()]);
            template.apply(text, caps, &mut result);
            last = caps.end();
            count += 1;
            global
        })?;

        if count == 0 {
            return Ok((text.to_string(), 0));
        }
        result.push_str(&text[last..]);
        Ok((result, count))
    }
}

/// Copy a bracket expression starting after its `[` to `result`,
/// escaping the characters that are literal in POSIX brackets but
/// special in the regex crate.
fn copy_bracket(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, result: &mut String) {
    result.push('[');
    if chars.peek() == Some(&'^') {
        chars.next();
        result.push('^');
    }
    // A leading ] is literal
    if chars.peek() == Some(&']') {
        chars.next();
        result.push_str(r"\]");
    }

    while let Some(c) = chars.next() {
        match c {
            ']' => {
                result.push(']');
                return;
            }
            '[' if matches!(chars.peek(), Some(':' | '.' | '=')) => {
                // Character class such as [:alpha:]
                result.push('[');
                for inner in chars.by_ref() {
                    result.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
            }
            '\\' | '[' | '&' | '~' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
}

/// True if the remaining pattern ends the (sub)expression.
fn at_expression_end(chars: &std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    let mut ahead = chars.clone();
    match ahead.next() {
        None => true,
        Some('\\') => matches!(ahead.next(), Some(')' | '|')),
        Some(_) => false,
    }
}

/// Convert a BRE pattern to an equivalent ERE pattern string.
/// - `\(` `\)` `\{` `\}` `\+` `\?` `\|` become operators.
/// - `( ) { } + ? |` become literals, as does a leading `*`.
/// - Back-references are put in non-capturing groups, so that `\11`
///   is group 1 followed by `1`.
/// - `^` and `$` are anchors at the ends of the pattern or of a
///   subexpression, and literal elsewhere.
pub fn bre_to_ere(pattern: &str) -> String {
    let mut result = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    // True at the start of a (sub)expression, where * is literal
    // and ^ is an anchor.
    let mut expression_start = true;

    while let Some(c) = chars.next() {
        let mut next_is_start = false;
        match c {
            '\\' => match chars.next() {
                Some('(') => {
                    result.push('(');
                    next_is_start = true;
                }
                Some('|') => {
                    result.push('|');
                    next_is_start = true;
                }
                Some(op @ (')' | '{' | '}' | '+' | '?')) => result.push(op),
                Some(d @ '1'..='9') => {
                    result.push_str(r"(?:\");
                    result.push(d);
                    result.push(')');
                }
                Some('`') => result.push_str(r"\A"),
                Some('\'') => result.push_str(r"\z"),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push_str(r"\\"),
            },
            '[' => copy_bracket(&mut chars, &mut result),
            '+' | '?' | '{' | '}' | '|' | '(' | ')' => {
                result.push('\\');
                result.push(c);
            }
            '*' if expression_start => result.push_str(r"\*"),
            // An anchor right after an anchor is literal
            '^' if expression_start && !result.ends_with('^') => {
                result.push('^');
                next_is_start = true;
            }
            '^' => result.push_str(r"\^"),
            '$' if !at_expression_end(&chars) => result.push_str(r"\$"),
            _ => result.push(c),
        }
        expression_start = next_is_start;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ReplacementPart;

    fn bre(pattern: &str) -> Regex {
        Regex::new(pattern, RegexFlags::default()).unwrap()
    }

    fn ere(pattern: &str) -> Regex {
        let flags = RegexFlags {
            extended: true,
            ..Default::default()
        };
        Regex::new(pattern, flags).unwrap()
    }

    fn template(parts: Vec<ReplacementPart>) -> ReplacementTemplate {
        ReplacementTemplate::new(parts)
    }

    fn literal(s: &str) -> ReplacementTemplate {
        template(vec![ReplacementPart::Literal(s.to_string())])
    }

    // bre_to_ere
    #[test]
    fn test_groups_and_operators() {
        assert_eq!(bre_to_ere(r"\(ab\)\{2\}"), "(ab){2}");
        assert_eq!(bre_to_ere(r"a\+b\?c\|d"), "a+b?c|d");
    }

    #[test]
    fn test_ere_metacharacters_become_literal() {
        assert_eq!(bre_to_ere("a+b?(c){d}|e"), r"a\+b\?\(c\)\{d\}\|e");
    }

    #[test]
    fn test_back_references() {
        assert_eq!(bre_to_ere(r"\(a\)\11"), r"(a)(?:\1)1");
    }

    #[test]
    fn test_anchors() {
        assert_eq!(bre_to_ere("^a^b$c$"), r"^a\^b\$c$");
    }

    #[test]
    fn test_anchors_in_subexpressions() {
        assert_eq!(bre_to_ere(r"\(^a\)"), "(^a)");
        assert_eq!(bre_to_ere(r"x\|^a"), "x|^a");
        assert_eq!(bre_to_ere(r"\(a$\)"), "(a$)");
        assert_eq!(bre_to_ere(r"a$\|b"), "a$|b");
        assert_eq!(bre_to_ere(r"\(a^b$c\)"), r"(a\^b\$c)");
        assert_eq!(bre_to_ere(r"\(^*a\)"), r"(^\*a)");
        assert_eq!(bre_to_ere("^^a"), r"^\^a");
    }

    #[test]
    fn test_leading_star_is_literal() {
        assert_eq!(bre_to_ere("*a*"), r"\*a*");
        assert_eq!(bre_to_ere(r"^*a"), r"^\*a");
        assert_eq!(bre_to_ere(r"\(*a\)"), r"(\*a)");
    }

    #[test]
    fn test_brackets() {
        assert_eq!(bre_to_ere("[^]a]"), r"[^\]a]");
        assert_eq!(bre_to_ere(r"[\.]"), r"[\\.]");
        assert_eq!(bre_to_ere("[[:digit:]+]x+"), r"[[:digit:]+]x\+");
    }

    #[test]
    fn test_trailing_backslash() {
        assert_eq!(bre_to_ere("a\\"), r"a\\");
    }

    // Engine selection
    #[test]
    fn test_literal_engine() {
        assert!(matches!(bre("hello").engine, Engine::Literal(_)));
        assert!(matches!(bre("^hello$").engine, Engine::Literal(_)));
        assert!(matches!(bre(r"a\/b").engine, Engine::Literal(_)));
    }

    #[test]
    fn test_standard_engine() {
        assert!(matches!(bre("a.c").engine, Engine::Standard(_)));
        assert!(matches!(bre("[abc]").engine, Engine::Standard(_)));
        assert!(matches!(bre(r"\w").engine, Engine::Standard(_)));
        assert!(matches!(ere("a|b").engine, Engine::Standard(_)));
    }

    #[test]
    fn test_fancy_engine() {
        assert!(matches!(bre(r"\(a\)\1").engine, Engine::Fancy(_)));
        assert!(matches!(ere(r"(a)\1").engine, Engine::Fancy(_)));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(Regex::new("a\\{1", RegexFlags::default()).is_err());
        assert!(Regex::new("(", RegexFlags { extended: true, ..Default::default() }).is_err());
    }

    // LiteralMatcher
    #[test]
    fn test_literal_anchors() {
        let m = LiteralMatcher::new("^abc$");
        assert!(m.is_match("abc"));
        assert!(!m.is_match("abcd"));

        let m = LiteralMatcher::new("^ab");
        assert!(m.is_match("abc"));
        assert!(!m.is_match("cab"));

        let m = LiteralMatcher::new("bc$");
        assert!(m.is_match("abc"));
        assert!(!m.is_match("bca"));
    }

    #[test]
    fn test_literal_escaped_dollar() {
        let m = LiteralMatcher::new(r"a\$");
        assert!(m.is_match("xa$y"));
        assert!(!m.is_match("xa"));
    }

    // Matching
    #[test]
    fn test_is_match() {
        assert!(bre("b.d").is_match("abcde").unwrap());
        assert!(!bre("x").is_match("abcde").unwrap());
        assert!(bre(r"\(b\)\1").is_match("abbc").unwrap());
    }

    #[test]
    fn test_dot_matches_newline() {
        assert!(bre("a.b").is_match("a\nb").unwrap());
    }

    #[test]
    fn test_case_insensitive() {
        let flags = RegexFlags {
            icase: true,
            ..Default::default()
        };
        assert!(Regex::new("hello", flags).unwrap().is_match("HeLLo").unwrap());
    }

    #[test]
    fn test_multiline() {
        let flags = RegexFlags {
            multiline: true,
            ..Default::default()
        };
        assert!(Regex::new("^b$", flags).unwrap().is_match("a\nb\nc").unwrap());
        assert!(!bre("^b$").is_match("a\nb\nc").unwrap());
    }

    // replace
    #[test]
    fn test_replace_first() {
        let (result, count) = bre("one").replace("one two one", &literal("two"), 1, false).unwrap();
        assert_eq!(result, "two two one");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_replace_global() {
        let (result, count) = bre("one").replace("one two one", &literal("two"), 1, true).unwrap();
        assert_eq!(result, "two two two");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_replace_occurrence() {
        let (result, count) = bre("a").replace("aaaa", &literal("b"), 3, false).unwrap();
        assert_eq!(result, "aaba");
        assert_eq!(count, 1);

        let (result, count) = bre("a").replace("aaaa", &literal("b"), 2, true).unwrap();
        assert_eq!(result, "abbb");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_replace_no_match() {
        let (result, count) = bre("x").replace("abc", &literal("y"), 1, true).unwrap();
        assert_eq!(result, "abc");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_replace_groups() {
        let swap = template(vec![
            ReplacementPart::Group(2),
            ReplacementPart::Literal(":".to_string()),
            ReplacementPart::Group(1),
        ]);
        let (result, _) = bre(r"\([a-z]*\)=\([0-9]*\)")
            .replace("key=42", &swap, 1, false)
            .unwrap();
        assert_eq!(result, "42:key");
    }

    #[test]
    fn test_replace_empty_matches() {
        let (result, count) = bre("x*").replace("abc", &literal("-"), 1, true).unwrap();
        assert_eq!(result, "-a-b-c-");
        assert_eq!(count, 4);
    }

    #[test]
    fn test_replace_anchored_literal() {
        let (result, _) = bre("^").replace("abc", &literal("> "), 1, true).unwrap();
        assert_eq!(result, "> abc");
    }

    #[test]
    fn test_replace_fancy() {
        let (result, count) = bre(r"\(.\)\1")
            .replace("aabbcd", &template(vec![ReplacementPart::Group(1)]), 1, true)
            .unwrap();
        assert_eq!(result, "abcd");
        assert_eq!(count, 2);
    }
}
