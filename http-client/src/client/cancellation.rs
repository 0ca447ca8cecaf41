use assert_impl::assert_impl;
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering::SeqCst},
        Arc, Condvar, Mutex,
    },
};

/// Shared cancellation flag covering everything a session has in flight.
///
/// Clones share the flag. Once set it never clears; orchestration code
/// consults it at every callback boundary and drops the owning chain
/// instead of continuing.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    flag: AtomicBool,
    guarded: Mutex<bool>,
    condvar: Condvar,
}

impl CancellationToken {
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the flag and wakes every waiter.
    pub fn cancel(&self) {
        self.inner.flag.store(true, SeqCst);
        let mut cancelled = self.inner.guarded.lock().unwrap();
        *cancelled = true;
        self.inner.condvar.notify_all();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(SeqCst)
    }

    /// Blocks the caller until the flag is set.
    pub fn wait(&self) {
        let mut cancelled = self.inner.guarded.lock().unwrap();
        while !*cancelled {
            cancelled = self.inner.condvar.wait(cancelled).unwrap();
        }
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
        assert_impl!(Sync: Self);
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_wait_returns_once_cancelled() {
        let token = CancellationToken::new();
        let handle = {
            let token = token.to_owned();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                token.cancel();
            })
        };
        token.wait();
        assert!(token.is_cancelled());
        handle.join().unwrap();
    }
}
