// Integration tests
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::fs;
use std::io::Write;
use tempfile::{NamedTempFile, tempdir};
use uutests::new_ucmd;
use uutests::util::TestScenario;
use uutests::util_name;

const LINES: &str = "l1\nl2\nl3\nl4\nl5\n";

fn temp_with(content: &str) -> NamedTempFile {
    let mut temp = NamedTempFile::new().expect("Failed to create temp file");
    write!(temp, "{content}").expect("Failed to write to temp file");
    temp.flush().expect("Failed to flush temp file");
    temp
}

/// Create a test verifying the output of a script run over LINES.
macro_rules! check_output {
    ($name:ident, $args:expr, $expected:expr) => {
        #[test]
        fn $name() {
            new_ucmd!()
                .args(&$args)
                .pipe_in(LINES)
                .succeeds()
                .stdout_is($expected);
        }
    };
}

// Invocation
#[test]
fn test_invalid_arg() {
    new_ucmd!().arg("--definitely-invalid").fails().code_is(1);
}

#[test]
fn test_missing_script_argument() {
    new_ucmd!()
        .fails()
        .code_is(1)
        .stderr_contains("missing script");
}

#[test]
fn test_empty_script_copies_input() {
    new_ucmd!().arg("").pipe_in(LINES).succeeds().stdout_is(LINES);
}

#[test]
fn test_silent_alias() {
    new_ucmd!()
        .args(&["--silent", "p"])
        .pipe_in("a\n")
        .succeeds()
        .stdout_is("a\n");
}

#[test]
fn test_debug_prints_program() {
    new_ucmd!()
        .args(&["--debug", "-n", "/x/{s/a/b/g;p\n}"])
        .pipe_in("")
        .succeeds()
        .stdout_contains("SED PROGRAM:")
        .stdout_contains("s/a/b/g");
}

#[test]
fn test_f_script() {
    let script = temp_with("s/l/L/\n# comment\n3d\n");
    new_ucmd!()
        .arg("-f")
        .arg(script.path())
        .pipe_in(LINES)
        .succeeds()
        .stdout_is("L1\nL2\nL4\nL5\n");
}

#[test]
fn test_script_sources_are_joined_in_order() {
    let script = temp_with("s/2/two/");
    new_ucmd!()
        .args(&["-e", "s/l/L/"])
        .arg("-f")
        .arg(script.path())
        .args(&["-e", "s/L/M/"])
        .pipe_in("l1\nl2\n")
        .succeeds()
        .stdout_is("M1\nMtwo\n");
}

#[test]
fn test_append_text_spans_expressions() {
    new_ucmd!()
        .args(&["-e", "1a\\", "-e", "added"])
        .pipe_in("x\n")
        .succeeds()
        .stdout_is("x\nadded\n");
}

#[test]
fn test_quiet_directive() {
    new_ucmd!()
        .arg("#n\n2p")
        .pipe_in(LINES)
        .succeeds()
        .stdout_is("l2\n");
}

// Addresses
check_output!(addr_one_line, ["-n", "4p"], "l4\n");
check_output!(addr_last, ["-n", "$p"], "l5\n");
check_output!(addr_regex, ["-n", "/l3/p"], "l3\n");
check_output!(addr_custom_delimiter, ["-n", r"\_l\_3_p"], "");
check_output!(addr_range_numeric, ["-n", "2,4p"], "l2\nl3\nl4\n");
check_output!(addr_range_reverse, ["-n", "4,2p"], "l4\n");
check_output!(addr_range_to_last, ["-n", "/3/,$p"], "l3\nl4\nl5\n");
check_output!(addr_range_relative, ["-n", "/2/,+1p"], "l2\nl3\n");
check_output!(addr_range_multiple, ["-n", "2,~4p"], "l2\nl3\nl4\n");
check_output!(addr_step, ["-n", "1~2p"], "l1\nl3\nl5\n");
check_output!(addr_zero_range, ["0,/l/d"], "l2\nl3\nl4\nl5\n");
check_output!(addr_negated, ["2,4!d"], "l2\nl3\nl4\n");
check_output!(addr_empty_regex_reuse, ["-n", "/2/,//p"], "l2\nl3\nl4\nl5\n");
check_output!(addr_case_insensitive, ["-n", "/L3/Ip"], "l3\n");

#[test]
fn test_last_address_spans_files() {
    let first = temp_with("a\nb\n");
    let second = temp_with("c\nd\n");
    new_ucmd!()
        .args(&["-n", "$p"])
        .arg(first.path())
        .arg(second.path())
        .succeeds()
        .stdout_is("d\n");
}

#[test]
fn test_separate_files() {
    let first = temp_with("a\nb\n");
    let second = temp_with("c\nd\n");
    new_ucmd!()
        .args(&["-s", "-n", "1p;$="])
        .arg(first.path())
        .arg(second.path())
        .succeeds()
        .stdout_is("a\n2\nc\n2\n");
}

#[test]
fn test_unreadable_file_is_skipped() {
    let last = temp_with("x\n");
    new_ucmd!()
        .args(&["p", "/no/such/file"])
        .arg(last.path())
        .fails()
        .code_is(2)
        .stderr_contains("can't read")
        .stdout_is("x\nx\n");
}

// Substitution
check_output!(subst_global, ["s/l/L/g"], "L1\nL2\nL3\nL4\nL5\n");
check_output!(subst_groups, [r"s/\(l\)\([0-9]\)/\2\1/"], "1l\n2l\n3l\n4l\n5l\n");
check_output!(
    subst_ere_groups,
    ["-E", r"s/(l)([0-9])/\2\1/"],
    "1l\n2l\n3l\n4l\n5l\n"
);
check_output!(subst_whole_match, ["-n", "3s/.*/(&)/p"], "(l3)\n");
check_output!(subst_escaped_ampersand, ["-n", r"1s/l/\&/p"], "&1\n");
check_output!(subst_newline, ["-n", r"1s/l/a\nb/p"], "a\nb1\n");
check_output!(subst_occurrence, ["-n", "1s/./X/2p"], "lX\n");
check_output!(subst_other_delimiter, ["-n", "1s|l|/|p"], "/1\n");

#[test]
fn test_subst_write_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out");
    let script = format!("s/[24]/X/w {}", path.display());
    new_ucmd!()
        .args(&["-n", &script])
        .pipe_in(LINES)
        .succeeds()
        .no_stdout();
    assert_eq!(fs::read_to_string(&path).unwrap(), "lX\nlX\n");
}

#[test]
fn test_no_newline_preserved() {
    new_ucmd!()
        .arg("s/b/B/")
        .pipe_in("a\nb")
        .succeeds()
        .stdout_is("a\nB");
}

// Other commands
check_output!(trans_simple, ["y/l12/L34/"], "L3\nL4\nL3\nL4\nL5\n");
check_output!(reverse_lines, ["1!G;h;$!d"], "l5\nl4\nl3\nl2\nl1\n");
check_output!(join_lines, [r":a;N;$!ba;s/\n/,/g"], "l1,l2,l3,l4,l5\n");
check_output!(next_delete, ["n;d"], "l1\nl3\nl5\n");
check_output!(print_delete_first, ["$!N;P;D"], LINES);
check_output!(line_count, ["-n", "$="], "5\n");
check_output!(insert_append, ["2i\\\nbefore\n2a after"], "l1\nbefore\nl2\nafter\nl3\nl4\nl5\n");
check_output!(change_range, ["2,4c\\\nchanged"], "l1\nchanged\nl5\n");
check_output!(block, ["-n", "2,3{p;p\n}"], "l2\nl2\nl3\nl3\n");
check_output!(test_branch, ["s/3/X/;t;d"], "lX\n");
check_output!(test_not_branch, ["s/3/X/;T;d"], "l1\nl2\nl4\nl5\n");
check_output!(zap, ["-n", "3{z;l\n}"], "$\n");
check_output!(file_name_stdin, ["-n", "1F"], "-\n");

#[test]
fn test_list_wrapping() {
    new_ucmd!()
        .args(&["-n", "-l", "5", "l"])
        .pipe_in("abcdefghij\n")
        .succeeds()
        .stdout_is("abcd\\\nefgh\\\nij$\n");
}

#[test]
fn test_list_escapes() {
    new_ucmd!()
        .args(&["-n", "l"])
        .pipe_in("a\tb\x01\n")
        .succeeds()
        .stdout_is("a\\tb\\001$\n");
}

#[test]
fn test_quit_exit_code() {
    new_ucmd!()
        .arg("2q5")
        .pipe_in(LINES)
        .fails()
        .code_is(5)
        .stdout_is("l1\nl2\n");
}

#[test]
fn test_quit_silent() {
    new_ucmd!()
        .arg("2Q")
        .pipe_in(LINES)
        .succeeds()
        .stdout_is("l1\n");
}

#[test]
fn test_read_file() {
    let inserted = temp_with("inserted\n");
    let script = format!("2r {}", inserted.path().display());
    new_ucmd!()
        .arg(&script)
        .pipe_in("a\nb\nc\n")
        .succeeds()
        .stdout_is("a\nb\ninserted\nc\n");
}

#[test]
fn test_read_lines() {
    let source = temp_with("x\n");
    let script = format!("R {}", source.path().display());
    new_ucmd!()
        .arg(&script)
        .pipe_in("a\nb\n")
        .succeeds()
        .stdout_is("a\nx\nb\n");
}

#[test]
fn test_write_stdout() {
    new_ucmd!()
        .args(&["-n", "2w /dev/stdout"])
        .pipe_in(LINES)
        .succeeds()
        .stdout_is("l2\n");
}

#[test]
fn test_null_data() {
    new_ucmd!()
        .args(&["-z", "s/^/>/"])
        .pipe_in("a\0b\0")
        .succeeds()
        .stdout_is(">a\0>b\0");
}

// Errors
#[test]
fn test_unknown_command() {
    new_ucmd!()
        .arg("1k")
        .fails()
        .code_is(1)
        .stderr_contains("error: unknown command: `k'");
}

#[test]
fn test_unterminated_substitute() {
    new_ucmd!()
        .arg("s/a/b")
        .fails()
        .code_is(1)
        .stderr_contains("unterminated `s' command");
}

#[test]
fn test_unmatched_brace() {
    new_ucmd!()
        .arg("1{p")
        .fails()
        .code_is(1)
        .stderr_contains("unmatched `{'");
}

#[test]
fn test_undefined_labels_reported_together() {
    new_ucmd!()
        .arg("b one;b two")
        .fails()
        .code_is(1)
        .stderr_contains("can't find label for jump to `one'")
        .stderr_contains("can't find label for jump to `two'");
}

#[test]
fn test_sandbox_rejects_files() {
    new_ucmd!()
        .args(&["--sandbox", "w out"])
        .fails()
        .code_is(1)
        .stderr_contains("disabled in sandbox mode");
}

#[test]
fn test_posix_requires_backslash() {
    new_ucmd!()
        .args(&["--posix", "1a text"])
        .fails()
        .code_is(1)
        .stderr_contains("expects \\ followed by text");
}

#[test]
fn test_no_previous_regex() {
    new_ucmd!()
        .arg("s//x/")
        .pipe_in("a\n")
        .fails()
        .code_is(2)
        .stderr_contains("no previous regular expression");
}
