use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, warn};

/// Cooperative run-level abort flag shared between the signal handler and the stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Trip `token` on the first Ctrl-C; a second Ctrl-C exits immediately.
///
/// The listener runs on its own thread with a single-threaded tokio runtime so the
/// blocking stage loop never has to poll.
pub fn install_ctrl_c_handler(token: CancelToken) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                warn!("Interrupted, finishing the current object and saving progress...");
                token.cancel();

                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Second interrupt, exiting without saving");
                    std::process::exit(130);
                }
            });
        })?;

    Ok(())
}
