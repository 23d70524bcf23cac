// Binary entry point
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::ffi::OsString;
use std::process;

fn main() {
    // Detect multicall vs single-call before any uucore calls
    let raw_args: Vec<OsString> = std::env::args_os().collect();
    let multicall = raw_args.len() > 1 && raw_args[1] == "rsed";
    if multicall {
        // Tell uucore to use args[1] for util_name()
        uucore::set_utility_is_second_arg();
    }

    uucore::panic::mute_sigpipe_panic();

    let mut args = raw_args;

    // Strip .exe extension from binary name on Windows for consistent error messages
    #[cfg(windows)]
    if let Some(binary_name) = args.get_mut(0) {
        let binary_str = binary_name.to_string_lossy();
        if let Some(stripped) = binary_str.strip_suffix(".exe") {
            *binary_name = OsString::from(stripped);
        }
    }

    if multicall {
        args.remove(1);
    }

    let code = rsed::uumain(args.into_iter());
    process::exit(code);
}
