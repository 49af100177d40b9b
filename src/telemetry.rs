use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

/// Plain lines like `2024-05-01 09:00:00 INFO Appended 3 new rows.` on stderr. `RUST_LOG`
/// takes precedence over `default_filter`.
pub fn init_subscriber(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // NB: a second init (tests) is harmless, keep whichever subscriber came first
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
