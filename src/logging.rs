use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

lazy_static! {
    static ref LOG_INITIALIZED: Mutex<bool> = Mutex::new(false);
}

/// Initialize logging.  If the environment variable `RUST_LOG` is set to a
/// non-empty value it is interpreted as an `EnvFilter`; otherwise only
/// warnings are shown, so structural problems found while building the
/// dashboard still reach stderr.
pub fn init_logging() {
    let mut initialized = match LOG_INITIALIZED.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if *initialized {
        return;
    }

    // An empty RUST_LOG is treated like an unset one.
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(rustlog) if !rustlog.is_empty() => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        }
        _ => EnvFilter::new("warn"),
    };

    let layer = tracing_subscriber::fmt::layer()
        .compact()
        // Output usually ends up in CI logs, where ANSI codes and wall time
        // are noise.
        .with_ansi(false)
        .without_time()
        .with_writer(std::io::stderr)
        .with_filter(env_filter)
        .boxed();

    // Fails when a subscriber was installed elsewhere first, which is fine.
    let _ = Registry::default().with(layer).try_init();
    *initialized = true;
}
