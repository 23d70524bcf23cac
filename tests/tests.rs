// Integration test harness
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::env;

pub const TESTS_BINARY: &str = env!("CARGO_BIN_EXE_rsed");

// Use the ctor attribute to run this function before any tests
#[ctor::ctor]
fn init() {
    unsafe {
        // Necessary for uutests to be able to find the binary
        env::set_var("UUTESTS_BINARY_PATH", TESTS_BINARY);
        // For single-call binaries, tell uutests not to auto-add the utility name
        env::set_var("UUTESTS_UTIL_NAME", "");
        env::set_var("UUTILS_MULTICALL", "0");
    }
}

#[cfg(feature = "rsed")]
#[path = "by-util/test_rsed.rs"]
mod test_rsed;
