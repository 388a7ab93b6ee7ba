// Logging setup
// Compact tracing output on stderr so it never mixes with rendered chat on stdout

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset; `verbose` raises chatsim to debug
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,chatsim_core=debug,chatsim=debug"
    } else {
        "warn,chatsim_core=info"
    }
}

pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}
