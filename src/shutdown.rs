//! Exit handlers, signal handling and terminal restoration.
//!
//! Handlers registered here run once: either when their owner unregisters
//! them, or when SIGINT/SIGTERM arrives. On a signal every pending handler
//! runs, by priority class and last-registered first within a class, then
//! the terminal attributes saved by [`install`] are restored and the
//! process exits with status 1.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lazy_static::lazy_static;

use crate::error::{Error, Result};

/// Exit status after a signal.
pub const SIGNAL_EXIT_CODE: i32 = 1;

/// Order classes for exit handlers; lower classes run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    First,
    Normal,
    Last,
}

/// Handle returned by [`register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnOnce() + Send>;

lazy_static! {
    static ref HANDLERS: Mutex<Vec<(Priority, u64, Handler)>> = Mutex::new(Vec::new());
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Register a handler to run on signal-triggered exit.
pub fn register<F: FnOnce() + Send + 'static>(priority: Priority, handler: F) -> HandlerId {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    if let Ok(mut handlers) = HANDLERS.lock() {
        handlers.push((priority, id, Box::new(handler)));
    }
    HandlerId(id)
}

/// Remove a handler without running it. Returns whether it was pending.
pub fn unregister(id: HandlerId) -> bool {
    match HANDLERS.lock() {
        Ok(mut handlers) => {
            let before = handlers.len();
            handlers.retain(|(_, hid, _)| *hid != id.0);
            handlers.len() != before
        }
        Err(_) => false,
    }
}

/// Run and clear every pending handler. A panicking handler does not stop
/// the ones after it.
pub fn run_handlers() {
    let mut pending = match HANDLERS.lock() {
        Ok(mut handlers) => std::mem::take(&mut *handlers),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };
    pending.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    for (_, id, handler) in pending {
        if panic::catch_unwind(AssertUnwindSafe(handler)).is_err() {
            log::warn!("exit handler {} panicked", id);
        }
    }
}

/// Save terminal attributes and install the SIGINT/SIGTERM handler.
pub fn install() -> Result<()> {
    terminal::save();
    ctrlc::set_handler(|| {
        log::debug!("signal received, running exit handlers");
        run_handlers();
        terminal::restore();
        std::process::exit(SIGNAL_EXIT_CODE);
    })
    .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

#[cfg(unix)]
mod terminal {
    use once_cell::sync::OnceCell;

    static SAVED: OnceCell<libc::termios> = OnceCell::new();

    pub fn save() {
        // SAFETY: termios is plain data; tcgetattr fills it or fails.
        let mut attrs: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &mut attrs) } == 0 {
            let _ = SAVED.set(attrs);
        }
    }

    pub fn restore() {
        if let Some(attrs) = SAVED.get() {
            // SAFETY: `attrs` came from tcgetattr on the same descriptor.
            unsafe {
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, attrs);
            }
        }
    }
}

#[cfg(not(unix))]
mod terminal {
    pub fn save() {}
    pub fn restore() {}
}
