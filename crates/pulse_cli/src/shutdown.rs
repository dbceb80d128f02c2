use console::Term;
use tokio_util::sync::CancellationToken;

/// Set up the Ctrl+C handler for graceful shutdown.
///
/// The first Ctrl+C cancels `cancel`, which stops the running sync at the next
/// page boundary with a partial report. The second one exits immediately.
pub(crate) fn setup_shutdown_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            return;
        }

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current page...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current page");
        }

        cancel.cancel();

        // Wait for second Ctrl+C for force quit
        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });
}
