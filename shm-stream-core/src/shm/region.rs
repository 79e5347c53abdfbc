//! SharedMemoryRegion - POSIX shared memory wrapper.
//!
//! Provides safe abstraction over mmap and shm_open for zero-copy IPC.
//! All unsafe operations are encapsulated with bounds checking.
//!
//! Ownership is explicit: the handle that created the OS object is the
//! owner and removes it on [`SharedMemoryRegion::unlink`] or drop. Handles
//! obtained with [`SharedMemoryRegion::open`] only map and unmap.

use std::ffi::CString;
use std::io;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SharedMemoryError;

/// Represents a mapped shared memory region.
///
/// This struct owns the mapping and will unmap it on drop.
/// The memory can be shared between processes using the same name.
pub struct SharedMemoryRegion {
    /// Name of the shared memory object (without the leading `/`).
    name: String,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapped region in bytes.
    size: usize,
    /// File descriptor for the shared memory object.
    fd: i32,
    /// Whether this instance created the SHM (and should unlink it).
    is_owner: bool,
    /// Set once the owner has removed the OS object.
    unlinked: AtomicBool,
}

// SAFETY: SharedMemoryRegion can be sent between threads as it owns its mapping.
unsafe impl Send for SharedMemoryRegion {}

// SAFETY: the region only hands out raw pointers; all concurrent access to the
// mapped bytes goes through the atomic cursor protocol of the ring buffer.
unsafe impl Sync for SharedMemoryRegion {}

impl SharedMemoryRegion {
    /// Minimum size for a shared memory region.
    pub const MIN_SIZE: usize = 1;

    /// Maximum size for a shared memory region (2 GB).
    pub const MAX_SIZE: usize = 2 * 1024 * 1024 * 1024;

    /// Create a new shared memory region exclusively.
    ///
    /// # Arguments
    /// * `name` - Name of the shared memory object (will be prefixed with /)
    /// * `size` - Size in bytes (must be between MIN_SIZE and MAX_SIZE)
    ///
    /// # Errors
    /// `AlreadyExists` if an object of that name is present (possibly stale
    /// from a crashed run; remove it explicitly with [`Self::remove`]).
    pub fn create(name: &str, size: usize) -> Result<Self, SharedMemoryError> {
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&size) {
            return Err(SharedMemoryError::InvalidSize {
                size,
                min: Self::MIN_SIZE,
                max: Self::MAX_SIZE,
            });
        }

        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };

        if fd < 0 {
            let errno = io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::EEXIST) {
                return Err(SharedMemoryError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if result < 0 {
            let errno = io::Error::last_os_error();
            // SAFETY: fd is valid and c_name names the object we just created
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        let ptr = match Self::map(fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                // SAFETY: fd is valid and c_name names the object we just created
                unsafe {
                    libc::close(fd);
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(e);
            }
        };

        // Zero-initialize the memory
        // SAFETY: ptr is valid for size bytes
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, size);
        }

        tracing::debug!(name = %name, size = size, "Created shared memory region");

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
            is_owner: true,
            unlinked: AtomicBool::new(false),
        })
    }

    /// Open an existing shared memory region.
    ///
    /// The mapping covers the whole object; its size is discovered with `fstat`.
    ///
    /// # Errors
    /// `NotFound` if no object of that name exists, `Empty` if the creator
    /// has not sized it yet.
    pub fn open(name: &str) -> Result<Self, SharedMemoryError> {
        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };

        if fd < 0 {
            let errno = io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Err(SharedMemoryError::NotFound {
                    name: name.to_string(),
                });
            }
            return Err(SharedMemoryError::OpenFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        let size = match fstat(fd) {
            Ok(stat) => stat.st_size as usize,
            Err(errno) => {
                // SAFETY: fd is valid
                unsafe { libc::close(fd) };
                return Err(SharedMemoryError::OpenFailed {
                    name: name.to_string(),
                    reason: format!("fstat failed: {}", errno),
                });
            }
        };

        if size == 0 {
            // SAFETY: fd is valid
            unsafe { libc::close(fd) };
            return Err(SharedMemoryError::Empty {
                name: name.to_string(),
            });
        }

        let ptr = match Self::map(fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                // SAFETY: fd is valid
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };

        tracing::debug!(name = %name, size = size, "Opened shared memory region");

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
            is_owner: false,
            unlinked: AtomicBool::new(false),
        })
    }

    /// Remove a shared memory object by name.
    ///
    /// Intended for explicit recovery from a stale object left by a crashed
    /// run. Processes that still map the object keep their mapping.
    pub fn remove(name: &str) -> Result<(), SharedMemoryError> {
        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is a valid CString
        let result = unsafe { libc::shm_unlink(c_name.as_ptr()) };
        if result < 0 {
            let errno = io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Err(SharedMemoryError::NotFound {
                    name: name.to_string(),
                });
            }
            return Err(SharedMemoryError::OpenFailed {
                name: name.to_string(),
                reason: format!("shm_unlink failed: {}", errno),
            });
        }

        tracing::debug!(name = %name, "Removed shared memory region");
        Ok(())
    }

    /// Check whether a shared memory object of that name exists.
    pub fn exists(name: &str) -> bool {
        let Ok(c_name) = Self::c_name(name) else {
            return false;
        };

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };
        if fd < 0 {
            return false;
        }
        // SAFETY: fd is valid
        unsafe { libc::close(fd) };
        true
    }

    /// Get the name of this shared memory region.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the size of this shared memory region.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this handle created the region and is responsible for removing it.
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Get a raw pointer to the shared memory.
    ///
    /// Callers must ensure proper synchronization when accessing the memory.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Remove the OS object if this handle owns it.
    ///
    /// Idempotent. The local mapping stays valid until drop.
    /// Returns true if this call performed the removal.
    pub fn unlink(&self) -> bool {
        if !self.is_owner || self.unlinked.swap(true, Ordering::AcqRel) {
            return false;
        }

        match Self::remove(&self.name) {
            Ok(()) => true,
            Err(SharedMemoryError::NotFound { .. }) => {
                tracing::warn!(name = %self.name, "Shared memory region was already removed");
                false
            }
            Err(e) => {
                tracing::warn!(name = %self.name, error = %e, "Failed to unlink shared memory");
                false
            }
        }
    }

    /// Whether the underlying OS object has been removed by anyone.
    ///
    /// A removed object keeps a link count of zero while it is still mapped.
    pub fn is_unlinked(&self) -> bool {
        match fstat(self.fd) {
            Ok(stat) => stat.st_nlink == 0,
            Err(_) => true,
        }
    }

    fn c_name(name: &str) -> Result<CString, SharedMemoryError> {
        if name.is_empty() {
            return Err(SharedMemoryError::InvalidName {
                name: name.to_string(),
                reason: "Name cannot be empty".to_string(),
            });
        }
        if name.contains('/') {
            return Err(SharedMemoryError::InvalidName {
                name: name.to_string(),
                reason: "Name cannot contain '/'".to_string(),
            });
        }

        CString::new(format!("/{}", name)).map_err(|e| SharedMemoryError::InvalidName {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn map(fd: i32, size: usize) -> Result<NonNull<u8>, SharedMemoryError> {
        // SAFETY: fd is valid, size is non-zero, offset 0 is valid
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(SharedMemoryError::MapFailed {
                reason: format!("mmap failed: {}", io::Error::last_os_error()),
            });
        }

        NonNull::new(ptr as *mut u8).ok_or_else(|| SharedMemoryError::MapFailed {
            reason: "mmap returned null".to_string(),
        })
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and size were set during creation
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %io::Error::last_os_error(),
                "Failed to unmap shared memory"
            );
        }

        // SAFETY: fd was opened during creation
        unsafe { libc::close(self.fd) };

        if self.unlink() {
            tracing::debug!(name = %self.name, "Unlinked shared memory region");
        }
    }
}

fn fstat(fd: i32) -> Result<libc::stat, io::Error> {
    // SAFETY: stat is plain old data, fully written by fstat on success
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    // SAFETY: fd is a valid descriptor and stat points to writable memory
    let result = unsafe { libc::fstat(fd, &mut stat) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(stat)
}
