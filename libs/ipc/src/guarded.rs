//! Guarded Cell
//!
//! A value paired with the binary semaphore that protects it. The value is
//! only reachable through [`GuardedRef`], so touching a shared counter without
//! holding its mutex does not compile.
//!
//! ```text
//! ┌──────────────── Guarded<u32> ────────────────┐
//! │ lock: Semaphore (1 permit)  │ value: u32     │
//! └──────────────────────────────────────────────┘
//!            lock() ──► GuardedRef ──drop──► release
//! ```

use crate::error::Result;
use crate::semaphore::{Primitive, Semaphore};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use tracing::error;

/// Mutex-protected value that lives in shared memory
///
/// `T` must be plain data (no pointers, no heap ownership): the same bytes are
/// read by other processes.
#[repr(C)]
pub struct Guarded<T> {
    lock: Semaphore,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for Guarded<T> {}
unsafe impl<T: Send> Send for Guarded<T> {}

impl<T> Guarded<T> {
    /// Initialize the lock and store the starting value.
    ///
    /// # Safety
    ///
    /// Same contract as [`Semaphore::init`].
    pub unsafe fn init(&self, name: &str, value: T) -> Result<()> {
        self.value.get().write(value);
        self.lock.init(name, 1)
    }

    /// Block until the mutex is held
    pub fn lock(&self) -> Result<GuardedRef<'_, T>> {
        self.lock.acquire()?;
        Ok(GuardedRef { cell: self })
    }

    /// Hold the mutex for the duration of `f`
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut guard = self.lock()?;
        Ok(f(&mut guard))
    }
}

impl<T> Primitive for Guarded<T> {
    fn name(&self) -> &str {
        self.lock.name()
    }

    unsafe fn destroy(&self) -> Result<()> {
        self.lock.destroy()
    }
}

impl<T> std::fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guarded").field("lock", &self.lock).finish_non_exhaustive()
    }
}

/// Proof that the mutex of a [`Guarded`] is held
///
/// Dropping the guard releases the mutex.
pub struct GuardedRef<'a, T> {
    cell: &'a Guarded<T>,
}

impl<T> Deref for GuardedRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> DerefMut for GuardedRef<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<T> Drop for GuardedRef<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.cell.lock.release() {
            error!("Failed to release guarded cell: {}", e);
        }
    }
}
