use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a configured level is present.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `level`; `level` wins over [`DEFAULT_DIRECTIVE`].
pub fn init_tracing(service_name: &str, level: Option<&str>) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level.unwrap_or(DEFAULT_DIRECTIVE))
            .map_err(|e| anyhow::anyhow!("Invalid log level {:?}: {}", level, e))?,
    };

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    tracing::info!(service = service_name, "Tracing initialized");
    Ok(())
}
