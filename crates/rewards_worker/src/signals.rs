//! Cooperative termination: `SIGTERM`/`SIGINT` flip a shared flag that is
//! polled at unit boundaries. No in-flight unit is interrupted.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Install the platform termination handler and return the flag it sets.
pub fn install() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));

    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let flag_handler = flag.clone();
        std::thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                tracing::info!(signal = sig, "received termination signal, finishing in-flight units then exiting");
                flag_handler.store(true, Ordering::SeqCst);
            }
        });
    }

    #[cfg(windows)]
    {
        let flag_handler = flag.clone();
        ctrlc::set_handler(move || {
            tracing::info!("received Ctrl+C, finishing in-flight units then exiting");
            flag_handler.store(true, Ordering::SeqCst);
        })?;
    }

    Ok(flag)
}
