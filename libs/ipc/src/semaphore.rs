//! Process-Shared Counting Semaphore
//!
//! A POSIX unnamed semaphore (`sem_init` with `pshared = 1`) that lives inside
//! a shared mapping, next to a fixed-size copy of its name. The name is stored
//! inline rather than as a pointer because the region is mapped at different
//! addresses in different processes.
//!
//! Blocking waits are restarted when interrupted by a signal.

use crate::error::{IpcError, Result};
use nix::errno::Errno;
use std::cell::UnsafeCell;

/// Maximum length of a semaphore name in bytes
pub const NAME_CAPACITY: usize = 32;

/// Something embedded in a shared layout that owns an OS resource
pub trait Primitive {
    /// Name given at initialization
    fn name(&self) -> &str;

    /// Release the OS resource.
    ///
    /// # Safety
    ///
    /// No process may use the primitive during or after this call, and it
    /// must be called at most once per successful initialization.
    unsafe fn destroy(&self) -> Result<()>;
}

/// Counting semaphore usable across processes sharing the mapping
#[repr(C)]
pub struct Semaphore {
    sem: UnsafeCell<libc::sem_t>,
    name: UnsafeCell<[u8; NAME_CAPACITY]>,
}

// sem_t is designed for concurrent use; the name is written once before sharing.
unsafe impl Sync for Semaphore {}
unsafe impl Send for Semaphore {}

impl Semaphore {
    /// Initialize in place with `permits` available permits.
    ///
    /// # Safety
    ///
    /// `self` must live in memory that is either shared with the other users
    /// or private to this process, must not be initialized already, and no
    /// other thread or process may touch it until this call returns.
    pub unsafe fn init(&self, name: &str, permits: u32) -> Result<()> {
        let bytes = name.as_bytes();
        if bytes.len() > NAME_CAPACITY {
            return Err(IpcError::NameTooLong {
                name: name.to_string(),
                max: NAME_CAPACITY,
            });
        }

        let slot = &mut *self.name.get();
        slot.fill(0);
        slot[..bytes.len()].copy_from_slice(bytes);

        Errno::result(libc::sem_init(self.sem.get(), 1, permits))
            .map(drop)
            .map_err(|source| IpcError::SemaphoreInit {
                name: name.to_string(),
                source,
            })
    }

    /// Block until a permit is available, then take it
    pub fn acquire(&self) -> Result<()> {
        loop {
            let rc = unsafe { libc::sem_wait(self.sem.get()) };
            match Errno::result(rc) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(source) => return Err(self.wait_error(source)),
            }
        }
    }

    /// Take a permit if one is available right now
    pub fn try_acquire(&self) -> Result<bool> {
        loop {
            let rc = unsafe { libc::sem_trywait(self.sem.get()) };
            match Errno::result(rc) {
                Ok(_) => return Ok(true),
                Err(Errno::EAGAIN) => return Ok(false),
                Err(Errno::EINTR) => continue,
                Err(source) => return Err(self.wait_error(source)),
            }
        }
    }

    /// Return one permit, waking a blocked waiter if there is one
    pub fn release(&self) -> Result<()> {
        let rc = unsafe { libc::sem_post(self.sem.get()) };
        Errno::result(rc).map(drop).map_err(|source| IpcError::Post {
            name: self.name().to_string(),
            source,
        })
    }

    /// Return `count` permits one at a time
    pub fn release_many(&self, count: u32) -> Result<()> {
        (0..count).try_for_each(|_| self.release())
    }

    /// Current permit count; only meaningful as a snapshot
    pub fn permits(&self) -> Result<i32> {
        let mut value: libc::c_int = 0;
        let rc = unsafe { libc::sem_getvalue(self.sem.get(), &mut value) };
        Errno::result(rc)
            .map(|_| value)
            .map_err(|source| self.wait_error(source))
    }

    fn wait_error(&self, source: Errno) -> IpcError {
        IpcError::Wait {
            name: self.name().to_string(),
            source,
        }
    }
}

impl Primitive for Semaphore {
    fn name(&self) -> &str {
        let bytes = unsafe { &*self.name.get() };
        let len = bytes.iter().position(|b| *b == 0).unwrap_or(NAME_CAPACITY);
        std::str::from_utf8(&bytes[..len]).unwrap_or("<unnamed>")
    }

    unsafe fn destroy(&self) -> Result<()> {
        Errno::result(libc::sem_destroy(self.sem.get()))
            .map(drop)
            .map_err(|source| IpcError::SemaphoreDestroy {
                name: self.name().to_string(),
                source,
            })
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("name", &self.name())
            .field("permits", &self.permits().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::mem::MaybeUninit;
    use std::sync::Arc;
    use std::thread;

    /// Heap semaphore for single-process tests; pshared semaphores work
    /// between threads too.
    struct Boxed(Box<Semaphore>);

    impl Boxed {
        fn new(name: &str, permits: u32) -> Self {
            let sem: Box<Semaphore> = unsafe { Box::new(MaybeUninit::zeroed().assume_init()) };
            unsafe { sem.init(name, permits).unwrap() };
            Self(sem)
        }
    }

    impl Drop for Boxed {
        fn drop(&mut self) {
            unsafe { self.0.destroy().unwrap() };
        }
    }

    impl std::ops::Deref for Boxed {
        type Target = Semaphore;
        fn deref(&self) -> &Semaphore {
            &self.0
        }
    }

    #[test]
    fn test_try_acquire_on_empty_semaphore() {
        let sem = Boxed::new("empty", 0);
        assert!(!sem.try_acquire().unwrap());
        sem.release().unwrap();
        assert!(sem.try_acquire().unwrap());
        assert!(!sem.try_acquire().unwrap());
    }

    #[test]
    fn test_initial_permits_are_counted() {
        let sem = Boxed::new("wait_in_queue", 3);
        assert_eq!(sem.permits().unwrap(), 3);
        for _ in 0..3 {
            assert!(sem.try_acquire().unwrap());
        }
        assert!(!sem.try_acquire().unwrap());
    }

    #[test]
    fn test_release_many() {
        let sem = Boxed::new("batch", 0);
        sem.release_many(5).unwrap();
        assert_eq!(sem.permits().unwrap(), 5);
    }

    #[test]
    fn test_name_round_trips() {
        let sem = Boxed::new("reindeer_hitched", 0);
        assert_eq!(sem.name(), "reindeer_hitched");
    }

    #[test]
    fn test_name_too_long_is_rejected() {
        let sem: Box<Semaphore> = unsafe { Box::new(MaybeUninit::zeroed().assume_init()) };
        let long = "x".repeat(NAME_CAPACITY + 1);
        let err = unsafe { sem.init(&long, 0) }.unwrap_err();
        assert!(matches!(err, IpcError::NameTooLong { .. }));
    }

    #[test]
    fn test_blocked_waiter_is_woken() {
        let sem = Arc::new(Boxed::new("rendezvous", 0));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.acquire().unwrap())
        };
        sem.release().unwrap();
        waiter.join().unwrap();
        assert_eq!(sem.permits().unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_permits_are_conserved(initial in 0u32..16, released in 0u32..64) {
            let sem = Boxed::new("conserved", initial);
            sem.release_many(released).unwrap();

            let mut taken = 0;
            while sem.try_acquire().unwrap() {
                taken += 1;
            }
            prop_assert_eq!(taken, initial + released);
            prop_assert_eq!(sem.permits().unwrap(), 0);
        }

        #[test]
        fn prop_names_within_capacity_round_trip(name in "[a-z_]{1,32}") {
            let sem = Boxed::new(&name, 0);
            prop_assert_eq!(sem.name(), name.as_str());
        }
    }
}
