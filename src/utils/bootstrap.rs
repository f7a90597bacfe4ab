//! Bootstrap utilities for arkiv binaries.
//!
//! Shared initialization code: tracing setup and shutdown wiring.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the ARKIV_LOG environment variable.
///
/// Defaults to "info" level if ARKIV_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Token cancelled on Ctrl+C.
///
/// The returned token can be cancelled by the caller as well; the signal
/// listener exits when it is.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let listener = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = listener.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        listener.cancel();
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to listen for shutdown signal");
                        listener.cancelled().await;
                    }
                }
            }
        }
    });

    token
}
