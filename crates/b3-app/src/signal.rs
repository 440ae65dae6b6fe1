//! One-shot SIGINT handling: flips a process-wide flag the main loop polls.
//! The handler itself does no cleanup; shutdown (flushing pins, closing the
//! device) happens on the main thread once it observes the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Install the SIGINT handler and return the flag it sets. Safe to call once
/// per process; a second install attempt is a programming error.
pub fn install_sigint_handler() -> Arc<AtomicBool> {
    let should_exit = Arc::new(AtomicBool::new(false));
    let flag = should_exit.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .expect("failed to install SIGINT handler");
    should_exit
}
