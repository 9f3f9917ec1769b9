use tokio::signal::unix::{signal, SignalKind};

use crate::controller::ControllerHandle;

/// Install a handler that forwards SIGTERM and SIGINT to the controller
/// as a graceful shutdown request. In-flight jobs drain; the host should
/// wait for `ReadyToQuit` before exiting.
pub fn install_shutdown_handler(handle: ControllerHandle) {
    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, initiating graceful shutdown");
            }
        }

        let _ = handle.shutdown();
    });
}
