//! Tracing subscriber setup
//!
//! Everything is written to stderr; the wrapped application inherits stdout.

use tracing_subscriber::EnvFilter;

/// Variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "PROVISIONER_LOG";

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "provisioner=debug,warn"
    } else {
        "provisioner=info,warn"
    }
}

fn build_filter(explicit: Option<&str>, verbose: bool) -> EnvFilter {
    explicit
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(verbose)))
}

/// Install the global subscriber; a second call is a no-op
pub fn init(verbose: bool) {
    let explicit = std::env::var(LOG_ENV)
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .filter(|v| !v.trim().is_empty());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(explicit.as_deref(), verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
