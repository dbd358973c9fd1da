// Signal handling for graceful server shutdown

use crate::error::{DocentError, Result};
use tokio::signal::unix::{signal, Signal as TokioSignal, SignalKind};

/// Shutdown signal sources for the chat server
pub struct SignalHandler {
    sigterm: TokioSignal,
    sigint: TokioSignal,
    sighup: TokioSignal,
}

impl SignalHandler {
    /// Install handlers for SIGTERM, SIGINT and SIGHUP
    pub fn new() -> Result<Self> {
        Ok(Self {
            sigterm: install(SignalKind::terminate(), "SIGTERM")?,
            sigint: install(SignalKind::interrupt(), "SIGINT")?,
            sighup: install(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    /// Wait for any shutdown signal, returning its name
    pub async fn wait(&mut self) -> &'static str {
        let name = tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sighup.recv() => "SIGHUP",
        };
        tracing::info!("Received {}", name);
        name
    }
}

fn install(kind: SignalKind, name: &str) -> Result<TokioSignal> {
    signal(kind).map_err(|e| DocentError::Io {
        source: e,
        context: format!("Failed to setup {} handler", name),
    })
}
