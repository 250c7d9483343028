// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Exclusive access gate guarding a region.
//!
//! One lock, one holder, for readers and writers alike. The protocol only
//! sees the [`ExclusiveGate`] trait; [`NamedGate`] is the cross-process
//! implementation backed by `flock` on a `<name>_mutex` shm object.

use std::os::fd::OwnedFd;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg, OFlag};
use nix::sys::mman;
use nix::sys::stat::Mode;

use crate::error::FrameError;
use crate::types::RegionName;

/// Back-off between non-blocking lock attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Bounded-wait exclusive lock.
pub trait ExclusiveGate: Send + Sync {
    /// Block up to `timeout` waiting for ownership. `false` on timeout.
    fn acquire(&self, timeout: Duration) -> bool;

    /// Give up ownership. Must pair with a successful `acquire`.
    fn release(&self);
}

/// Releases the gate when dropped.
pub struct GateGuard<'a> {
    gate: &'a dyn ExclusiveGate,
}

impl<'a> GateGuard<'a> {
    /// Acquire `gate`, mapping a timeout to `FrameError::LockTimeout`.
    pub fn acquire(gate: &'a dyn ExclusiveGate, timeout: Duration) -> Result<Self, FrameError> {
        if gate.acquire(timeout) {
            Ok(Self { gate })
        } else {
            Err(FrameError::LockTimeout {
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// Cross-process gate: exclusive `flock` on the shm object `/<name>_mutex`.
///
/// Each `NamedGate` owns its own open file description, so two gates on the
/// same name exclude each other even inside one process. Threads sharing
/// one `NamedGate` exclude each other through the held flag.
pub struct NamedGate {
    path: String,
    state: Mutex<GateState>,
}

struct GateState {
    /// Unlocked descriptor, `None` while held.
    idle: Option<OwnedFd>,
    held: Option<Flock<OwnedFd>>,
}

impl NamedGate {
    /// Create or open the lock object for `name`.
    pub fn open(name: &RegionName) -> Result<Self, FrameError> {
        let path = name.gate_path();
        let fd = Self::open_fd(&path).map_err(|errno| FrameError::InitializationFailure {
            name: name.to_string(),
            reason: format!("Failed to open gate {}: {}", path, errno),
        })?;

        tracing::debug!(gate = %path, "Opened region gate");

        Ok(Self {
            path,
            state: Mutex::new(GateState {
                idle: Some(fd),
                held: None,
            }),
        })
    }

    /// Unlink the lock object for `name`.
    pub fn unlink(name: &RegionName) -> bool {
        mman::shm_unlink(name.gate_path().as_str()).is_ok()
    }

    fn open_fd(path: &str) -> Result<OwnedFd, Errno> {
        mman::shm_open(
            path,
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One non-blocking attempt. `Err` on a failure retrying will not fix.
    fn try_acquire(&self) -> Result<bool, Errno> {
        let mut state = self.state();
        let Some(fd) = state.idle.take() else {
            // Held by another thread of this process.
            return Ok(false);
        };

        match Flock::lock(fd, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                state.held = Some(lock);
                Ok(true)
            }
            Err((fd, errno)) => {
                state.idle = Some(fd);
                if errno == Errno::EWOULDBLOCK || errno == Errno::EINTR {
                    Ok(false)
                } else {
                    Err(errno)
                }
            }
        }
    }
}

impl ExclusiveGate for NamedGate {
    fn acquire(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.try_acquire() {
                Ok(true) => return true,
                Ok(false) => {}
                Err(errno) => {
                    tracing::warn!(gate = %self.path, error = %errno, "Gate flock failed");
                    return false;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(RETRY_INTERVAL.min(deadline - now));
        }
    }

    fn release(&self) {
        let mut state = self.state();
        let Some(lock) = state.held.take() else {
            tracing::warn!(gate = %self.path, "Release of a gate that is not held");
            return;
        };

        match lock.unlock() {
            Ok(fd) => state.idle = Some(fd),
            Err((lock, errno)) => {
                tracing::error!(gate = %self.path, error = %errno, "Gate unlock failed");
                // Dropping closes the descriptor, which drops the lock with it.
                drop(lock);
                match Self::open_fd(&self.path) {
                    Ok(fd) => state.idle = Some(fd),
                    Err(errno) => {
                        tracing::error!(gate = %self.path, error = %errno, "Gate reopen failed")
                    }
                }
            }
        }
    }
}

/// Process-local gate for regions that never leave one process.
#[derive(Default)]
pub struct LocalGate {
    locked: Mutex<bool>,
    cond: Condvar,
}

impl LocalGate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExclusiveGate for LocalGate {
    fn acquire(&self, timeout: Duration) -> bool {
        let guard = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut locked, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |locked| *locked)
            .unwrap_or_else(PoisonError::into_inner);
        if *locked {
            return false;
        }
        *locked = true;
        true
    }

    fn release(&self) {
        *self.locked.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn unique_name(tag: &str) -> RegionName {
        RegionName::new(format!("shmframe_gate_{}_{}", tag, std::process::id())).unwrap()
    }

    #[test]
    fn test_named_gates_exclude_each_other() {
        let name = unique_name("exclusive");
        let a = NamedGate::open(&name).unwrap();
        let b = NamedGate::open(&name).unwrap();

        assert!(a.acquire(Duration::from_millis(100)));
        let start = Instant::now();
        assert!(!b.acquire(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));

        a.release();
        assert!(b.acquire(Duration::from_millis(100)));
        b.release();

        NamedGate::unlink(&name);
    }

    #[test]
    fn test_named_gate_threads_share_one_instance() {
        let name = unique_name("threads");
        let gate = Arc::new(NamedGate::open(&name).unwrap());

        assert!(gate.acquire(Duration::from_millis(100)));
        let other = Arc::clone(&gate);
        let handle = std::thread::spawn(move || other.acquire(Duration::from_millis(30)));
        assert!(!handle.join().unwrap());
        gate.release();

        let other = Arc::clone(&gate);
        let handle = std::thread::spawn(move || {
            let ok = other.acquire(Duration::from_millis(100));
            other.release();
            ok
        });
        assert!(handle.join().unwrap());

        NamedGate::unlink(&name);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let gate = LocalGate::new();
        {
            let _guard = GateGuard::acquire(&gate, Duration::from_millis(10)).unwrap();
            assert!(matches!(
                GateGuard::acquire(&gate, Duration::from_millis(10)),
                Err(FrameError::LockTimeout { timeout_ms: 10 })
            ));
        }
        assert!(GateGuard::acquire(&gate, Duration::from_millis(10)).is_ok());
    }
}
