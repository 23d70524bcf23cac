// Diagnostic tracing enabled by --debug
//
// SPDX-License-Identifier: MIT
//
// This file is part of the rsed package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::io;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, registry};
use uucore::error::{UResult, USimpleError};

/// Environment variable overriding the default trace filter
pub const LOG_ENV: &str = "RSED_LOG";

const DEFAULT_FILTER: &str = "uu_rsed=debug";

/// Return the filter directives to use: RSED_LOG if set, else the default.
fn filter_directives(env_value: Option<String>) -> String {
    env_value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Send the engine's trace events to stderr.
pub fn init_debug_logging() -> UResult<()> {
    let directives = filter_directives(std::env::var(LOG_ENV).ok());
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| USimpleError::new(1, format!("invalid {LOG_ENV} value: {e}")))?;

    let subscriber = registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(filter);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| USimpleError::new(1, format!("failed to set up logging: {e}")))
}
