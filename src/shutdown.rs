//! Ctrl+C handling for `beamswarm run`.
//!
//! The first interrupt lets the current tick finish and stops the run, so
//! the run report is still written. The third one exits at once.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Ctrl+C presses seen so far.
static INTERRUPTS: AtomicUsize = AtomicUsize::new(0);

const FORCE_QUIT_AFTER: usize = 3;

/// Install the process-wide Ctrl+C handler. Call once, before the run.
pub fn register_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        let presses = INTERRUPTS.fetch_add(1, Ordering::SeqCst) + 1;
        if presses >= FORCE_QUIT_AFTER {
            eprintln!("\nForce quit.");
            std::process::exit(130);
        }
        eprintln!(
            "\nStopping after the current tick (Ctrl+C {} more time(s) to force quit)",
            FORCE_QUIT_AFTER - presses
        );
    })
}

fn interrupted() -> bool {
    INTERRUPTS.load(Ordering::SeqCst) > 0
}

/// Stop flag the run loop polls between ticks. Clones share the flag.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    follows_ctrl_c: bool,
}

impl ShutdownSignal {
    /// Fires only through [`ShutdownSignal::trigger`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Also fires once Ctrl+C was pressed.
    pub fn global() -> Self {
        Self {
            flag: Arc::default(),
            follows_ctrl_c: true,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || (self.follows_ctrl_c && interrupted())
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static INTERRUPT_LOCK: Mutex<()> = Mutex::new(());

    fn with_interrupts<F: FnOnce()>(presses: usize, f: F) {
        let _guard = INTERRUPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        INTERRUPTS.store(presses, Ordering::SeqCst);
        f();
        INTERRUPTS.store(0, Ordering::SeqCst);
    }

    #[test]
    fn test_global_signal_follows_ctrl_c() {
        with_interrupts(0, || assert!(!ShutdownSignal::global().is_shutdown()));
        with_interrupts(1, || assert!(ShutdownSignal::global().is_shutdown()));
    }

    #[test]
    fn test_local_signal_ignores_ctrl_c() {
        with_interrupts(1, || {
            let signal = ShutdownSignal::new();
            assert!(!signal.is_shutdown());
            signal.trigger();
            assert!(signal.is_shutdown());
        });
    }

    #[test]
    fn test_clones_share_the_flag() {
        let first = ShutdownSignal::new();
        let second = first.clone();
        first.trigger();
        assert!(second.is_shutdown());
    }
}
