//! Process shutdown signals
//!
//! Ctrl+C and, on unix, SIGTERM both end a run the same way: the shared
//! cancellation token fires and the running command flushes and returns.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Listens for the signals that should stop a run
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignal {
    /// Installs the signal handlers. Signals delivered after this call are
    /// observed by [`ShutdownSignal::recv`].
    pub fn listen() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Waits for the next shutdown signal and returns its name
    pub async fn recv(&mut self) -> &'static str {
        let interrupt = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => "Ctrl+C",
                Err(e) => {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<&'static str>().await
                }
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                name = interrupt => name,
                _ = self.terminate.recv() => "SIGTERM",
            }
        }

        #[cfg(not(unix))]
        {
            interrupt.await
        }
    }

    /// Cancels `cancel` on the first shutdown signal
    pub fn cancel_on_signal(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let name = self.recv().await;
            tracing::warn!("Received {}, finishing up...", name);
            cancel.cancel();
        })
    }
}
