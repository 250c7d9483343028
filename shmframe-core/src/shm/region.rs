// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedMemoryRegion - POSIX shared memory wrapper.
//!
//! Provides safe abstraction over mmap and shm_open for zero-copy IPC.
//! All unsafe operations are encapsulated with bounds checking.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::error::FrameError;
use crate::shm::protocol::RegionMemory;
use crate::types::RegionName;

/// Represents a mapped shared memory region.
///
/// This struct owns the mapping and will unmap it on drop.
/// The memory can be shared between processes using the same name.
pub struct SharedMemoryRegion {
    /// Name of the shared memory object.
    name: RegionName,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapped region in bytes.
    size: usize,
    /// File descriptor for the shared memory object.
    fd: i32,
    /// Whether this instance created the object.
    is_owner: bool,
    /// Unlink the object when this instance drops (owners only).
    unlink_on_drop: bool,
}

// SAFETY: SharedMemoryRegion can be sent between threads as it owns its mapping.
unsafe impl Send for SharedMemoryRegion {}

// SAFETY: Byte access goes through read_at/write_at which copy through raw
// pointers; callers serialize access with the region gate.
unsafe impl Sync for SharedMemoryRegion {}

impl SharedMemoryRegion {
    /// Maximum size for a shared memory region (1 GB).
    pub const MAX_SIZE: usize = 1024 * 1024 * 1024;

    /// Create the named object, or attach to it if it already exists.
    ///
    /// Returns the region and whether this call created it. A freshly
    /// created region is zero-filled. An existing object must be exactly
    /// `size` bytes long.
    pub fn create_or_open(name: &RegionName, size: usize) -> Result<(Self, bool), FrameError> {
        match Self::create(name, size) {
            Ok(region) => Ok((region, true)),
            Err(CreateError::AlreadyExists) => Ok((Self::open(name, size)?, false)),
            Err(CreateError::Failed(e)) => Err(e),
        }
    }

    /// Create a new shared memory region.
    ///
    /// # Errors
    /// Returns `CreateError::AlreadyExists` if the object exists, or the
    /// underlying failure otherwise.
    fn create(name: &RegionName, size: usize) -> Result<Self, CreateError> {
        Self::validate_size(name, size)?;
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
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::EEXIST) {
                return Err(CreateError::AlreadyExists);
            }
            return Err(init_failure(name, format!("shm_open failed: {}", errno)).into());
        }

        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(init_failure(name, format!("ftruncate failed: {}", errno)).into());
        }

        let ptr = match Self::map(name, fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                return Err(e.into());
            }
        };

        // SAFETY: ptr is valid for size bytes
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, size);
        }

        tracing::debug!(name = %name, size = size, "Created shared memory region");

        Ok(Self {
            name: name.clone(),
            ptr,
            size,
            fd,
            is_owner: true,
            unlink_on_drop: false,
        })
    }

    /// Open an existing shared memory region.
    pub fn open(name: &RegionName, size: usize) -> Result<Self, FrameError> {
        Self::validate_size(name, size)?;
        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };

        if fd < 0 {
            return Err(init_failure(
                name,
                format!("shm_open failed: {}", std::io::Error::last_os_error()),
            ));
        }

        // Both sides must agree on the capacity: a smaller mapping would
        // reject frames the producer is allowed to store.
        // SAFETY: zeroed stat is a valid out-parameter, fd is valid
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(init_failure(name, format!("fstat failed: {}", errno)));
        }
        if stat.st_size as usize != size {
            unsafe { libc::close(fd) };
            return Err(init_failure(
                name,
                format!(
                    "Existing region is {} bytes, {} bytes requested",
                    stat.st_size, size
                ),
            ));
        }

        let ptr = match Self::map(name, fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };

        tracing::debug!(name = %name, size = size, "Opened shared memory region");

        Ok(Self {
            name: name.clone(),
            ptr,
            size,
            fd,
            is_owner: false,
            unlink_on_drop: false,
        })
    }

    /// Unlink the named object. Existing mappings stay valid.
    ///
    /// Returns `false` if there was nothing to unlink.
    pub fn unlink(name: &RegionName) -> bool {
        match CString::new(name.shm_path()) {
            // SAFETY: c_name is a valid CString
            Ok(c_name) => unsafe { libc::shm_unlink(c_name.as_ptr()) == 0 },
            Err(_) => false,
        }
    }

    /// Unlink the object when this instance drops, if it created it.
    pub fn set_unlink_on_drop(&mut self, unlink: bool) {
        self.unlink_on_drop = unlink;
    }

    /// Get the name of this shared memory region.
    pub fn name(&self) -> &RegionName {
        &self.name
    }

    /// Get the size of this shared memory region.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this instance created the underlying object.
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    fn validate_size(name: &RegionName, size: usize) -> Result<(), FrameError> {
        if size == 0 || size > Self::MAX_SIZE {
            return Err(init_failure(
                name,
                format!("Invalid size: {} (max {})", size, Self::MAX_SIZE),
            ));
        }
        Ok(())
    }

    fn c_name(name: &RegionName) -> Result<CString, FrameError> {
        CString::new(name.shm_path()).map_err(|e| init_failure(name, format!("Invalid name: {}", e)))
    }

    fn map(name: &RegionName, fd: i32, size: usize) -> Result<NonNull<u8>, FrameError> {
        // SAFETY: fd is valid, size is validated, offset 0 is valid
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
            return Err(init_failure(
                name,
                format!("mmap failed: {}", std::io::Error::last_os_error()),
            ));
        }

        NonNull::new(ptr as *mut u8)
            .ok_or_else(|| init_failure(name, "mmap returned null".to_string()))
    }

    fn check_bounds(&self, offset: usize, len: usize) -> Result<(), FrameError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(FrameError::InternalFailure {
                reason: format!(
                    "Access of {} bytes at offset {} outside {}-byte region",
                    len, offset, self.size
                ),
            }),
        }
    }
}

impl RegionMemory for SharedMemoryRegion {
    fn len(&self) -> usize {
        self.size
    }

    fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<(), FrameError> {
        self.check_bounds(offset, dst.len())?;
        // SAFETY: bounds checked above; dst is a distinct local buffer
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.ptr.as_ptr().add(offset),
                dst.as_mut_ptr(),
                dst.len(),
            );
        }
        Ok(())
    }

    fn write_at(&self, offset: usize, src: &[u8]) -> Result<(), FrameError> {
        self.check_bounds(offset, src.len())?;
        // SAFETY: bounds checked above; src is a distinct local buffer
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.as_ptr().add(offset), src.len());
        }
        Ok(())
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and size were set during creation
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared memory"
            );
        }

        // SAFETY: fd was opened during creation
        unsafe { libc::close(self.fd) };

        if self.is_owner && self.unlink_on_drop && Self::unlink(&self.name) {
            tracing::debug!(name = %self.name, "Unlinked shared memory region");
        }
    }
}

/// Creation outcome distinguishing "someone else got there first".
enum CreateError {
    AlreadyExists,
    Failed(FrameError),
}

impl From<FrameError> for CreateError {
    fn from(e: FrameError) -> Self {
        Self::Failed(e)
    }
}

fn init_failure(name: &RegionName, reason: String) -> FrameError {
    FrameError::InitializationFailure {
        name: name.to_string(),
        reason,
    }
}
