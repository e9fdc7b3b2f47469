//! One-shot flag for single-writer state such as "shop closed".
//!
//! Readers poll it without a lock; the flag only ever moves false → true.

use std::sync::atomic::{AtomicBool, Ordering};

#[repr(transparent)]
#[derive(Debug, Default)]
pub struct OnceFlag {
    raised: AtomicBool,
}

impl OnceFlag {
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    /// Raise the flag. Returns `true` only for the call that flipped it.
    pub fn raise(&self) -> bool {
        self.raised
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_transitions_once() {
        let flag = OnceFlag::new();
        assert!(!flag.is_raised());
        assert!(flag.raise());
        assert!(!flag.raise());
        assert!(flag.is_raised());
    }
}
