use tracing_subscriber::EnvFilter;

/// Base level for a `-v` count: warnings only by default, `-v` for info,
/// `-vv` and above for debug.
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn build_env_filter(verbose: u8) -> EnvFilter {
    let mut directives = vec![format!("schooldir={}", level_for_verbosity(verbose))];
    // Keep the HTTP stack quiet unless explicitly requested.
    for (target, lvl) in [("hyper", "warn"), ("reqwest", "warn"), ("h2", "warn")] {
        directives.push(format!("{target}={lvl}"));
    }
    let fallback = directives.join(",");
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the stderr subscriber. `RUST_LOG` overrides the verbosity flag.
/// Calling it twice is harmless.
pub fn init(verbose: u8, no_color: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(verbose > 1)
        .try_init();
}
