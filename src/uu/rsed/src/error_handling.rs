// Error reporting tied to script locations
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::fmt;
use std::io;

use uucore::error::{UError, UResult, USimpleError};

/// Exit code of errors found while compiling the script
pub const COMPILE_EXIT_CODE: i32 = 1;
/// Exit code of errors found while processing input
pub const RUNTIME_EXIT_CODE: i32 = 2;
/// Exit code of failures to write the output
pub const IO_EXIT_CODE: i32 = 4;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// Where in which script source something was defined
pub struct ScriptLocation {
    pub input_name: String,
    pub line_number: usize,
    pub column_number: usize,
}

impl ScriptLocation {
    pub fn new(input_name: impl Into<String>, line_number: usize, column_number: usize) -> Self {
        Self {
            input_name: input_name.into(),
            line_number,
            column_number,
        }
    }
}

impl fmt::Display for ScriptLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.input_name, self.line_number, self.column_number
        )
    }
}

/// Format msg as a compile error message at the specified location.
pub fn compilation_message(location: &ScriptLocation, msg: impl ToString) -> String {
    format!("{location}: error: {}", msg.to_string())
}

/// Fail with msg as a compile error at the specified location.
/// The error's exit code is 1 (compilation phase).
pub fn compilation_error<T>(location: &ScriptLocation, msg: impl ToString) -> UResult<T> {
    Err(USimpleError::new(
        COMPILE_EXIT_CODE,
        compilation_message(location, msg),
    ))
}

/// Fail with msg as an error of the command `code` defined at location.
fn command_error<T>(
    location: &ScriptLocation,
    code: char,
    msg: impl ToString,
    exit_code: i32,
) -> UResult<T> {
    Err(USimpleError::new(
        exit_code,
        format!("{location}: command `{code}': error: {}", msg.to_string()),
    ))
}

/// Fail with msg as a compilation error at the command's location.
/// The error's exit code is 1 (compilation phase).
pub fn semantic_error<T>(location: &ScriptLocation, code: char, msg: impl ToString) -> UResult<T> {
    command_error(location, code, msg, COMPILE_EXIT_CODE)
}

/// Fail with msg as a runtime error at the command's location.
/// The error's exit code is 2 (processing phase).
pub fn runtime_error<T>(location: &ScriptLocation, code: char, msg: impl ToString) -> UResult<T> {
    command_error(location, code, msg, RUNTIME_EXIT_CODE)
}

/// Convert a failure to write the output into an error.
pub fn output_error(e: io::Error) -> Box<dyn UError> {
    USimpleError::new(IO_EXIT_CODE, format!("couldn't write to output: {e}"))
}
