//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] resolves with the name of the first
//! termination signal the process receives; [`ServiceHost::run`](crate::ServiceHost::run)
//! races it against its services.
//!
//! | Platform | Signals                                   |
//! |----------|-------------------------------------------|
//! | Unix     | `SIGINT`, `SIGTERM`, `SIGQUIT`, Ctrl-C    |
//! | other    | Ctrl-C                                    |

use std::io;

/// Waits for a termination signal and returns its name.
///
/// Fails when a signal handler cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
        res = tokio::signal::ctrl_c() => { res?; "ctrl_c" }
    };
    Ok(name)
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl_c")
}
