// Program entry point and CLI processing
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

pub mod command;
pub mod error_handling;
pub mod escape_compiler;
pub mod fast_io;
pub mod fast_regex;
pub mod logging;
pub mod multi_io;
pub mod named_writer;
pub mod parser;
pub mod processor;
pub mod scanner;
pub mod script_char_provider;
pub mod script_loader;
pub mod token;

use crate::command::ProcessingOptions;
use crate::error_handling::output_error;
use crate::parser::parse;
use crate::processor::process_all_files;
use crate::script_loader::{ScriptValue, load_scripts};
use clap::{Arg, ArgMatches, Command, arg};
use std::io::{self, Write};
use std::path::PathBuf;
use uucore::error::{UResult, UUsageError, set_exit_code};
use uucore::format_usage;

const ABOUT: &str = "Stream editor for filtering and transforming text";
const USAGE: &str = "rsed [OPTION]... [script] [file]...";

/// Width of `l` output when neither -l nor a terminal gives one
const DEFAULT_LINE_WRAP: usize = 70;

#[uucore::main]
pub fn uumain(args: impl uucore::Args) -> UResult<()> {
    let matches = uu_app().try_get_matches_from(args)?;
    let (scripts, files) = get_scripts_files(&matches)?;
    let options = build_context(&matches);

    if options.debug {
        logging::init_debug_logging()?;
    }

    let script = load_scripts(&scripts)?;
    let program = parse(&script, &options)?;

    if options.debug {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{program}")
            .and_then(|()| stdout.flush())
            .map_err(output_error)?;
    }

    let exit_code = process_all_files(&program, &options, files)?;
    if exit_code != 0 {
        set_exit_code(exit_code);
    }
    Ok(())
}

pub fn uu_app() -> Command {
    Command::new(uucore::util_name())
        .about(ABOUT)
        .override_usage(format_usage(USAGE))
        .infer_long_args(true)
        .args([
            arg!([script] "Script to execute if not otherwise provided."),
            Arg::new("file")
                .help("Input files")
                .value_parser(clap::value_parser!(PathBuf))
                .num_args(0..),
            arg!(--debug "Annotate program execution."),
            Arg::new("regexp-extended")
                .short('E')
                .long("regexp-extended")
                .short_alias('r')
                .help("Use extended regular expressions.")
                .action(clap::ArgAction::SetTrue),
            arg!(-e --expression <SCRIPT> "Add script to executed commands.")
                .action(clap::ArgAction::Append),
            // Access with .get_many::<PathBuf>("script-file")
            Arg::new("script-file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Add the contents of FILE to executed commands.")
                .value_parser(clap::value_parser!(PathBuf))
                .action(clap::ArgAction::Append),
            // Access with .get_one::<usize>("line-length")
            Arg::new("line-length")
                .short('l')
                .long("line-length")
                .value_name("NUM")
                .help("Specify the 'l' command line-wrap length.")
                .value_parser(clap::value_parser!(usize)),
            arg!(-n --quiet "Suppress automatic printing of pattern space.").aliases(["silent"]),
            arg!(--posix "Disable all GNU extensions."),
            arg!(-s --separate "Consider files as separate rather than as a long stream."),
            arg!(--sandbox "Operate in a sandbox by disabling r/R/w/W commands."),
            arg!(-u --unbuffered "Flush output buffers after every line."),
            Arg::new("null-data")
                .short('z')
                .long("null-data")
                .help("Separate lines by NUL characters.")
                .action(clap::ArgAction::SetTrue),
        ])
}

// Iterate through script and file arguments specified in matches and
// return vectors of all scripts and input files in the specified order.
// If no script is specified fail with "missing script" error.
fn get_scripts_files(matches: &ArgMatches) -> UResult<(Vec<ScriptValue>, Vec<PathBuf>)> {
    let mut indexed_scripts: Vec<(usize, ScriptValue)> = Vec::new();
    let mut files: Vec<PathBuf> = Vec::new();

    if matches.contains_id("expression") || matches.contains_id("script-file") {
        // With -e or -f the first operand is an input file
        if let Some(val) = matches.get_one::<String>("script") {
            files.push(PathBuf::from(val));
        }
    } else if let Some(val) = matches.get_one::<String>("script") {
        indexed_scripts.push((0, ScriptValue::StringVal(val.to_owned())));
    } else {
        return Err(UUsageError::new(1, "missing script"));
    }

    if let Some(indices) = matches.indices_of("expression") {
        for (idx, val) in indices.zip(matches.get_many::<String>("expression").unwrap_or_default())
        {
            indexed_scripts.push((idx, ScriptValue::StringVal(val.to_owned())));
        }
    }

    if let Some(indices) = matches.indices_of("script-file") {
        for (idx, val) in indices.zip(
            matches
                .get_many::<PathBuf>("script-file")
                .unwrap_or_default(),
        ) {
            indexed_scripts.push((idx, ScriptValue::PathVal(val.to_owned())));
        }
    }

    // Preserve the command line order of -e and -f
    indexed_scripts.sort_by_key(|k| k.0);
    let scripts = indexed_scripts
        .into_iter()
        .map(|(_, value)| value)
        .collect();

    files.extend(
        matches
            .get_many::<PathBuf>("file")
            .unwrap_or_default()
            .cloned(),
    );

    Ok((scripts, files))
}

/// Return the terminal's width, if stdout is a terminal.
fn terminal_width() -> Option<usize> {
    terminal_size::terminal_size().map(|(terminal_size::Width(w), _)| usize::from(w))
}

// Parse CLI flag arguments and return the processing options based on them
fn build_context(matches: &ArgMatches) -> ProcessingOptions {
    ProcessingOptions {
        debug: matches.get_flag("debug"),
        regex_extended: matches.get_flag("regexp-extended"),
        posix: matches.get_flag("posix"),
        quiet: matches.get_flag("quiet"),
        separate: matches.get_flag("separate"),
        sandbox: matches.get_flag("sandbox"),
        unbuffered: matches.get_flag("unbuffered"),
        null_data: matches.get_flag("null-data"),
        line_wrap: matches
            .get_one::<usize>("line-length")
            .copied()
            .or_else(terminal_width)
            .unwrap_or(DEFAULT_LINE_WRAP),
    }
}
