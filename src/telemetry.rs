//! Tracing setup shared by the pipeline binaries.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global tracing subscriber once.
///
/// `RUST_LOG` controls the filter; the default level is `info`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = fmt().with_env_filter(filter).finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
