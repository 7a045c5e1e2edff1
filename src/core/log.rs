//! Diagnostics go to stderr so they never mix with conversion results on stdout.

use tracing_subscriber::{
    EnvFilter, filter::Directive, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const APP_TARGET: &str = "kurs";

/// Builds the log filter from the `RUST_LOG` value (if any) and the `--verbose` flag.
///
/// Without `RUST_LOG` nothing is logged unless `--verbose` is given, which shows this
/// crate at `debug` and everything else (reqwest, hyper) at `warn`. A `RUST_LOG` value
/// replaces those defaults, and `--verbose` still lifts this crate to `debug` on top.
/// An unparsable `RUST_LOG` is ignored.
pub fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let fallback = if verbose { "warn" } else { "off" };
    let filter = rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback));

    if !verbose {
        return filter;
    }
    match format!("{APP_TARGET}=debug").parse::<Directive>() {
        Ok(app_debug) => filter.add_directive(app_debug),
        Err(_) => filter,
    }
}

pub fn init_logging(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(verbose, rust_log.as_deref());

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
