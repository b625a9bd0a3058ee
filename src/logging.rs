//! Structured logging setup.
//!
//! Output is plain text by default or JSON when requested, written to stderr
//! so stdout stays free for command output. `RUST_LOG` overrides the
//! configured level.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Initialize tracing with the given level and output format.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed in this process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

/// Span helpers.
pub mod spans {
    use std::path::Path;
    use tracing::{info_span, Span};

    /// Span wrapping the processing of one spectrum file.
    #[must_use]
    pub fn file_span(path: &Path) -> Span {
        info_span!("spectrum", path = %path.display())
    }

    /// Span wrapping the startup catch-up pass.
    #[must_use]
    pub fn catch_up_span(root: &Path) -> Span {
        info_span!("catch_up", root = %root.display())
    }
}
