//! UI-thread advisory
//!
//! Persistence blocks on database I/O. Applications with an interactive
//! thread can mark it, and every top-level persist call made from that thread
//! logs a warning. Nothing is enforced.

use std::sync::OnceLock;
use std::thread::{self, ThreadId};

static UI_THREAD: OnceLock<ThreadId> = OnceLock::new();

/// Record the calling thread as the UI thread.
///
/// Returns false if another thread was already marked.
pub fn mark_ui_thread() -> bool {
    UI_THREAD.set(thread::current().id()).is_ok()
}

/// Whether the calling thread is the marked UI thread
pub fn is_ui_thread() -> bool {
    UI_THREAD
        .get()
        .is_some_and(|id| *id == thread::current().id())
}

pub(crate) fn warn_if_on_ui_thread(method: &str) {
    if is_ui_thread() {
        tracing::warn!("don't call {} from the UI thread, it blocks on database I/O", method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marked_thread_is_detected() {
        let marked = thread::spawn(|| {
            mark_ui_thread();
            is_ui_thread()
        })
        .join()
        .unwrap();

        assert!(marked);
        assert!(!is_ui_thread());
    }
}
