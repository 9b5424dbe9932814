//! Subscriber setup for the `easy-exp` binary.
//!
//! Log lines go to stderr; stdout carries the runner's progress output.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// HTTP plumbing under the LLM client logs every request at debug.
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_filter(level: Level) -> String {
    let mut directives = vec![level.as_str().to_ascii_lowercase()];
    if level > Level::INFO {
        directives.extend(QUIET_DEPENDENCIES.iter().map(|dep| format!("{dep}=warn")));
    }
    directives.join(",")
}

/// Install the global subscriber. Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let stderr_layer = if json {
        stderr_layer.json().with_filter(filter).boxed()
    } else {
        stderr_layer.with_filter(filter).boxed()
    };

    tracing_subscriber::registry().with(stderr_layer).try_init().ok();
}
