use tracing_subscriber::EnvFilter;

/// Subscribes to tracing events that will output to the console.
///
/// By default, it enables:
///
/// * `warn` level (and higher) on all modules,
/// * `debug` level (and higher) on the `launch_bundle` library,
/// * `info` level (and higher) on this binary.
///
/// You can override these defaults by setting the `RUST_LOG` env variable, e.g.:
///
/// ```sh
/// $ RUST_LOG=launch_bundle=trace cargo run --bin launch
/// ```
pub fn init_tracing() {
    let default_env_filter = format!("warn,launch_bundle=debug,{}=info", env!("CARGO_BIN_NAME"));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_env_filter));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
