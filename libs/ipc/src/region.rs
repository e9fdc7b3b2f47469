//! File-Backed Shared Region
//!
//! Places one `#[repr(C)]` layout in a `MAP_SHARED` mapping of a file (under
//! `/dev/shm` in production) so that independently started processes can
//! attach to the same primitives and counters.
//!
//! ## Lifecycle
//!
//! ```text
//! owner:    create ──► init_in_place ──► publish magic ─ ... ─► teardown
//!                                                              (destroy, unmap, unlink)
//! attacher:                         attach (check magic) ─ ... ─► drop (unmap)
//! ```
//!
//! The file is created with `O_EXCL`: a leftover region from a crashed run is
//! reported instead of silently reused. Teardown runs every step even when an
//! earlier one fails and returns all failures together.

use crate::error::{IpcError, Result, TeardownError};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{self, OpenOptions};
use std::marker::PhantomData;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::ptr::addr_of_mut;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// A layout that can live in a [`SharedRegion`]
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, contain no pointers or heap-owning
/// fields, and be valid when every byte is zero (the region starts out
/// zero-filled). All state mutated after initialization must sit behind
/// interior mutability that is sound across processes (atomics, semaphores,
/// guarded cells).
pub unsafe trait SharedLayout: Sync + Sized {
    /// Written to the region header once initialization succeeded
    const MAGIC: u64;

    /// Parameters the owner passes to initialization
    type Init;

    /// Initialize the layout in freshly zeroed memory.
    ///
    /// On failure, everything initialized so far must already be released.
    ///
    /// # Safety
    ///
    /// `this` points to zeroed memory exclusively owned by the caller.
    unsafe fn init_in_place(this: *mut Self, init: Self::Init) -> Result<()>;

    /// Release every OS resource embedded in the layout, collecting failures.
    ///
    /// # Safety
    ///
    /// Called once, by the owner, after every other user has gone.
    unsafe fn destroy_in_place(&self) -> Vec<IpcError>;
}

#[repr(C)]
struct RegionHeader {
    magic: AtomicU64,
    size: u64,
}

#[repr(C)]
struct Frame<T> {
    header: RegionHeader,
    body: T,
}

/// Who is responsible for tearing the region down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionRole {
    Owner,
    Attached,
}

/// A mapped region hosting one `T`
pub struct SharedRegion<T: SharedLayout> {
    map: MmapMut,
    path: PathBuf,
    role: RegionRole,
    _layout: PhantomData<T>,
}

impl<T: SharedLayout> SharedRegion<T> {
    /// Size of the mapping, header included
    pub const fn mapped_size() -> usize {
        size_of::<Frame<T>>()
    }

    /// Create the region file, map it and initialize the layout
    pub fn create(path: impl AsRef<Path>, init: T::Init) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| IpcError::RegionCreate {
                path: path.clone(),
                source,
            })?;

        let prepared = file
            .set_len(Self::mapped_size() as u64)
            .map_err(|source| IpcError::RegionCreate {
                path: path.clone(),
                source,
            })
            .and_then(|()| {
                unsafe { MmapOptions::new().map_mut(&file) }.map_err(|source| IpcError::RegionMap {
                    path: path.clone(),
                    source,
                })
            });

        let mut map = match prepared {
            Ok(map) => map,
            Err(e) => {
                discard_file(&path);
                return Err(e);
            }
        };

        let frame = map.as_mut_ptr() as *mut Frame<T>;
        let initialized = unsafe {
            addr_of_mut!((*frame).header.size).write(Self::mapped_size() as u64);
            T::init_in_place(addr_of_mut!((*frame).body), init)
        };

        if let Err(e) = initialized {
            drop(map);
            discard_file(&path);
            return Err(e);
        }

        // Publishing the magic marks the layout as ready for attachers.
        unsafe { (*frame).header.magic.store(T::MAGIC, Ordering::Release) };

        debug!(
            "Created shared region {:?} ({} bytes)",
            path,
            Self::mapped_size()
        );

        Ok(Self {
            map,
            path,
            role: RegionRole::Owner,
            _layout: PhantomData,
        })
    }

    /// Map an existing region created by another process
    pub fn attach(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let attach_error = |source| IpcError::RegionAttach {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(attach_error)?;
        let file_len = file.metadata().map_err(attach_error)?.len();

        let expected_size = Self::mapped_size() as u64;
        if file_len < size_of::<RegionHeader>() as u64 {
            return Err(IpcError::LayoutMismatch {
                path,
                expected_magic: T::MAGIC,
                found_magic: 0,
                expected_size,
                found_size: file_len,
            });
        }

        let map = unsafe { MmapOptions::new().map_mut(&file) }.map_err(|source| IpcError::RegionMap {
            path: path.clone(),
            source,
        })?;

        let header = unsafe { &*(map.as_ptr() as *const RegionHeader) };
        let found_magic = header.magic.load(Ordering::Acquire);
        let found_size = header.size;
        if found_magic != T::MAGIC || found_size != expected_size || file_len != expected_size {
            return Err(IpcError::LayoutMismatch {
                path,
                expected_magic: T::MAGIC,
                found_magic,
                expected_size,
                found_size,
            });
        }

        debug!("Attached shared region {:?}", path);

        Ok(Self {
            map,
            path,
            role: RegionRole::Attached,
            _layout: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> RegionRole {
        self.role
    }

    /// Release the region.
    ///
    /// The owner destroys every primitive, unmaps and removes the file; an
    /// attacher only unmaps. Failures are aggregated, never short-circuited.
    ///
    /// # Safety
    ///
    /// For the owner: no other thread or process may still be using the
    /// primitives in the region.
    pub unsafe fn teardown(self) -> std::result::Result<(), TeardownError> {
        let Self { map, path, role, .. } = self;

        let mut failures = Vec::new();
        if role == RegionRole::Owner {
            let frame = &*(map.as_ptr() as *const Frame<T>);
            frame.header.magic.store(0, Ordering::Release);
            failures.extend(frame.body.destroy_in_place());
        }

        drop(map);

        if role == RegionRole::Owner {
            if let Err(source) = fs::remove_file(&path) {
                failures.push(IpcError::RegionRemove {
                    path: path.clone(),
                    source,
                });
            }
            if failures.is_empty() {
                debug!("Tore down shared region {:?}", path);
            }
        }

        TeardownError::check(failures)
    }
}

impl<T: SharedLayout> std::ops::Deref for SharedRegion<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &(*(self.map.as_ptr() as *const Frame<T>)).body }
    }
}

impl<T: SharedLayout> std::fmt::Debug for SharedRegion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("path", &self.path)
            .field("role", &self.role)
            .field("size", &Self::mapped_size())
            .finish()
    }
}

fn discard_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove partially created region {:?}: {}", path, e);
    }
}
