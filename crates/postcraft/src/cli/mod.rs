//! Command handlers for the `postcraft` binary.

pub mod analyze;
pub mod chat;
pub mod config;
pub mod interactive;
pub mod posts;
pub mod types;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Spinner on stderr while a provider call is in flight.
pub(crate) fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Cancels a token on Ctrl+C for as long as it is alive.
pub(crate) struct CtrlCGuard {
    token: CancellationToken,
    stop: CancellationToken,
}

impl CtrlCGuard {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        let stop = CancellationToken::new();
        let (fire, done) = (token.clone(), stop.clone());
        tokio::spawn(async move {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_ok() {
                        tracing::warn!("Interrupted, cancelling request");
                        fire.cancel();
                    }
                }
                _ = done.cancelled() => {}
            }
        });
        Self { token, stop }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for CtrlCGuard {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
