// Gather script sources into a single script text
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::error_handling::ScriptLocation;

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use uucore::display::Quotable;
use uucore::error::{UResult, USimpleError};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A script specified on the command line
pub enum ScriptValue {
    StringVal(String), // -e or positional script
    PathVal(PathBuf),  // -f script file; "-" is stdin
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Lines of the joined text that came from one source
struct ScriptSegment {
    input_name: String,
    first_line: usize,
}

#[derive(Debug, Clone, Default)]
/// The script text of all sources, joined by newlines, with their origins
pub struct ScriptText {
    text: String,
    segments: Vec<ScriptSegment>,
}

/// Return a short name for a script given as a string: its first
/// line, truncated.
fn truncate_with_ellipsis(input: &str) -> String {
    const MAX_LEN: usize = 20;
    let first_line = input.split('\n').next().unwrap_or_default();
    let name: String = first_line.chars().take(MAX_LEN).collect();
    if name.len() < input.trim_end_matches('\n').len() {
        name + "..."
    } else {
        name
    }
}

impl ScriptText {
    /// Construct from a single script string.
    pub fn from_script(script: &str) -> Self {
        let mut result = Self::default();
        result.push_source(truncate_with_ellipsis(script), script);
        result
    }

    /// Append the contents of a source, terminating its last line.
    fn push_source(&mut self, input_name: String, contents: &str) {
        let first_line = self.text.matches('\n').count();
        self.segments.push(ScriptSegment {
            input_name,
            first_line,
        });
        self.text.push_str(contents);
        if !contents.ends_with('\n') {
            self.text.push('\n');
        }
    }

    /// The joined script text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True if the script starts with the `#n` quiet directive line.
    pub fn has_quiet_directive(&self) -> bool {
        self.text.lines().next() == Some("#n")
    }

    /// Map a zero-based line and one-based column of the joined text
    /// to the location within its source.
    pub fn location(&self, line: usize, column: usize) -> ScriptLocation {
        match self
            .segments
            .iter()
            .rev()
            .find(|segment| segment.first_line <= line)
        {
            Some(segment) => ScriptLocation::new(
                segment.input_name.clone(),
                line - segment.first_line + 1,
                column,
            ),
            None => ScriptLocation::new("", line + 1, column),
        }
    }
}

/// Read the specified script sources in order and join them.
pub fn load_scripts(sources: &[ScriptValue]) -> UResult<ScriptText> {
    let mut script = ScriptText::default();

    for source in sources {
        match source {
            ScriptValue::StringVal(s) => {
                script.push_source(truncate_with_ellipsis(s), s);
            }
            ScriptValue::PathVal(p) => {
                let (name, contents) = if p.to_string_lossy() == "-" {
                    let mut contents = String::new();
                    io::stdin().read_to_string(&mut contents).map_err(|e| {
                        USimpleError::new(1, format!("couldn't read script from stdin: {e}"))
                    })?;
                    ("<stdin>".to_string(), contents)
                } else {
                    let contents = fs::read_to_string(p).map_err(|e| {
                        USimpleError::new(1, format!("couldn't open file {}: {e}", p.quote()))
                    })?;
                    (p.to_string_lossy().to_string(), contents)
                };
                script.push_source(name, &contents);
            }
        }
    }

    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_string_sources_are_joined() {
        let input = vec![
            ScriptValue::StringVal("p\nd".to_string()),
            ScriptValue::StringVal("q\n".to_string()),
        ];
        let script = load_scripts(&input).unwrap();
        assert_eq!(script.text(), "p\nd\nq\n");
    }

    #[test]
    fn test_file_source() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "s/a/b/").unwrap();
        write!(temp_file, "p").unwrap();

        let input = vec![
            ScriptValue::StringVal("1d".to_string()),
            ScriptValue::PathVal(temp_file.path().to_path_buf()),
        ];
        let script = load_scripts(&input).unwrap();
        assert_eq!(script.text(), "1d\ns/a/b/\np\n");

        let location = script.location(2, 1);
        assert_eq!(location.input_name, temp_file.path().to_string_lossy());
        assert_eq!(location.line_number, 2);
    }

    #[test]
    fn test_missing_file() {
        let input = vec![ScriptValue::PathVal(PathBuf::from("/no/such/script.sed"))];
        let err = load_scripts(&input).unwrap_err();
        assert!(err.to_string().contains("couldn't open file"));
    }

    #[test]
    fn test_locations_per_source() {
        let input = vec![
            ScriptValue::StringVal("p\np".to_string()),
            ScriptValue::StringVal("a very long script that gets truncated".to_string()),
        ];
        let script = load_scripts(&input).unwrap();

        assert_eq!(script.location(1, 2), ScriptLocation::new("p...", 2, 2));
        assert_eq!(
            script.location(2, 5),
            ScriptLocation::new("a very long script t...", 1, 5)
        );
    }

    #[test]
    fn test_quiet_directive() {
        assert!(ScriptText::from_script("#n\np").has_quiet_directive());
        assert!(ScriptText::from_script("#n").has_quiet_directive());
        assert!(!ScriptText::from_script("#no\np").has_quiet_directive());
        assert!(!ScriptText::from_script(" #n\np").has_quiet_directive());
        assert!(!ScriptText::from_script("p\n#n").has_quiet_directive());
    }
}
