// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Background frame poller.
//!
//! One dedicated thread per monitored region polls the slot at a fixed
//! interval and hands every frame it takes to the registered callback.
//! The region gate is only held inside `poll`; callbacks run without it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{FrameError, FrameResult};
use crate::frame::{Frame, FrameInfo};
use crate::shm::SlotStatus;

/// Callback invoked with every frame the monitor receives.
pub type FrameCallback = Box<dyn Fn(&Frame) + Send + Sync>;

/// Something the monitor can take frames from.
pub trait FrameSource: Send + Sync + 'static {
    /// Name used for the thread and in logs.
    fn label(&self) -> String;

    /// Take the pending frame, if any, copying its payload into `buf`.
    fn poll(&self, buf: &mut Vec<u8>) -> FrameResult<(u32, FrameInfo)>;

    /// Diagnostic text the peer left in the region, if readable.
    fn error_message(&self) -> Option<String>;
}

/// Poll-loop state owned by a region manager.
pub struct Monitor {
    callback: Arc<Mutex<Option<FrameCallback>>>,
    worker: Mutex<Option<Worker>>,
}

/// A running poll thread and its own stop flag.
///
/// The flag is per thread so a worker detached by `stop` from inside a
/// callback can never be revived by a later `start`.
struct Worker {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            callback: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        }
    }

    /// Register (or replace) the frame callback.
    ///
    /// Waits for an in-flight callback invocation to return first.
    pub fn set_callback(&self, callback: FrameCallback) {
        *lock(&self.callback) = Some(callback);
    }

    /// Spawn the poll thread. Returns `Ok(false)` if one is already running.
    pub fn start<S: FrameSource>(&self, source: Arc<S>, interval: Duration) -> FrameResult<bool> {
        let mut worker = lock(&self.worker);

        if let Some(current) = worker.as_ref() {
            if !current.handle.is_finished() {
                return Ok(false);
            }
        }
        // Reap a thread that exited on its own (a panicking callback).
        if let Some(finished) = worker.take() {
            if finished.handle.join().is_err() {
                tracing::error!(source = %source.label(), "Previous monitor thread panicked");
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let callback = Arc::clone(&self.callback);
        let label = source.label();

        let handle = thread::Builder::new()
            .name(format!("shmframe-monitor-{}", label))
            .spawn(move || poll_loop(source, flag, callback, interval))
            .map_err(|e| FrameError::InternalFailure {
                reason: format!("Failed to spawn monitor thread: {}", e),
            })?;

        tracing::debug!(source = %label, interval_ms = interval.as_millis() as u64, "Monitoring started");
        *worker = Some(Worker { handle, running });
        Ok(true)
    }

    /// Stop the poll thread and wait for it to exit.
    ///
    /// Returns `false` if no thread was running.
    pub fn stop(&self) -> bool {
        let Some(worker) = lock(&self.worker).take() else {
            return false;
        };

        worker.running.store(false, Ordering::Release);

        // Called from inside a callback: the loop exits on its own.
        if worker.handle.thread().id() == thread::current().id() {
            return true;
        }

        worker.handle.thread().unpark();
        if worker.handle.join().is_err() {
            tracing::error!("Monitor thread panicked");
        }
        tracing::debug!("Monitoring stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Remembers the last failure reported so a repeating one is warned about once.
#[derive(Debug, Default)]
pub(crate) struct RepeatFilter {
    last: Option<String>,
}

impl RepeatFilter {
    /// Whether `message` differs from the previously reported failure.
    /// Records it either way.
    pub(crate) fn is_new(&mut self, message: &str) -> bool {
        if self.last.as_deref() == Some(message) {
            return false;
        }
        self.last = Some(message.to_string());
        true
    }

    #[cfg(test)]
    pub(crate) fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Forget the last failure, e.g. after a successful operation.
    pub(crate) fn reset(&mut self) {
        self.last = None;
    }
}

fn poll_loop<S: FrameSource>(
    source: Arc<S>,
    running: Arc<AtomicBool>,
    callback: Arc<Mutex<Option<FrameCallback>>>,
    interval: Duration,
) {
    let label = source.label();
    let mut buf = Vec::new();
    let mut failures = RepeatFilter::default();

    while running.load(Ordering::Acquire) {
        match source.poll(&mut buf) {
            Ok((frame_id, info)) => {
                failures.reset();
                let frame = Frame {
                    frame_id,
                    info,
                    data: std::mem::take(&mut buf),
                };
                match lock(&callback).as_ref() {
                    Some(cb) => cb(&frame),
                    None => tracing::trace!(source = %label, frame_id = frame_id, "No callback, frame dropped"),
                }
                buf = frame.data;
            }
            Err(FrameError::NotReady {
                status: SlotStatus::Error,
            }) => {
                let message = source.error_message().unwrap_or_default();
                if failures.is_new(&format!("peer: {}", message)) {
                    tracing::warn!(
                        source = %label,
                        message = %message,
                        "Region is in error state, waiting for clear"
                    );
                }
            }
            Err(FrameError::NotReady { .. }) => failures.reset(),
            Err(e) if e.is_transient() => {
                tracing::debug!(source = %label, error = %e, "Poll skipped");
            }
            Err(e) => {
                // A corrupt frame stays in the slot until cleared; every
                // poll reports it again.
                if failures.is_new(&e.to_string()) {
                    tracing::warn!(source = %label, error = %e, "Poll failed");
                } else {
                    tracing::trace!(source = %label, error = %e, "Poll failed again");
                }
            }
        }

        if !running.load(Ordering::Acquire) {
            break;
        }
        thread::park_timeout(interval);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Hands out queued frames, then reports an empty slot.
    struct QueueSource {
        frames: Mutex<VecDeque<Vec<u8>>>,
        polls: AtomicUsize,
    }

    impl QueueSource {
        fn new(frames: Vec<Vec<u8>>) -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(frames.into()),
                polls: AtomicUsize::new(0),
            })
        }
    }

    impl FrameSource for QueueSource {
        fn label(&self) -> String {
            "queue".to_string()
        }

        fn poll(&self, buf: &mut Vec<u8>) -> FrameResult<(u32, FrameInfo)> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            match self.frames.lock().unwrap().pop_front() {
                Some(data) => {
                    buf.clear();
                    buf.extend_from_slice(&data);
                    Ok((n as u32 + 1, FrameInfo::image(data.len() as u32, 1, 1)))
                }
                None => Err(FrameError::NotReady {
                    status: SlotStatus::Empty,
                }),
            }
        }

        fn error_message(&self) -> Option<String> {
            None
        }
    }

    fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn test_frames_reach_callback() {
        let monitor = Monitor::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        monitor.set_callback(Box::new(move |frame: &Frame| {
            sink.lock().unwrap().push(frame.data.clone());
        }));

        let source = QueueSource::new(vec![vec![1, 2, 3], vec![4, 5]]);
        assert!(monitor
            .start(Arc::clone(&source), Duration::from_millis(5))
            .unwrap());

        assert!(wait_until(Duration::from_secs(2), || received
            .lock()
            .unwrap()
            .len()
            == 2));
        assert!(monitor.stop());
        assert_eq!(
            *received.lock().unwrap(),
            vec![vec![1, 2, 3], vec![4, 5]]
        );
    }

    #[test]
    fn test_start_is_idempotent() {
        let monitor = Monitor::new();
        let source = QueueSource::new(Vec::new());

        assert!(monitor
            .start(Arc::clone(&source), Duration::from_millis(5))
            .unwrap());
        assert!(!monitor
            .start(Arc::clone(&source), Duration::from_millis(5))
            .unwrap());
        assert!(monitor.is_running());

        assert!(monitor.stop());
        assert!(!monitor.is_running());
        assert!(!monitor.stop());
    }

    #[test]
    fn test_no_polls_after_stop() {
        let monitor = Monitor::new();
        let source = QueueSource::new(Vec::new());
        monitor
            .start(Arc::clone(&source), Duration::from_millis(1))
            .unwrap();
        assert!(wait_until(Duration::from_secs(1), || source
            .polls
            .load(Ordering::SeqCst)
            > 2));

        monitor.stop();
        let after_stop = source.polls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(source.polls.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_stop_wakes_a_long_interval() {
        let monitor = Monitor::new();
        let source = QueueSource::new(Vec::new());
        monitor.start(source, Duration::from_secs(30)).unwrap();
        thread::sleep(Duration::from_millis(10));

        let start = Instant::now();
        monitor.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_restart_after_stop_from_callback() {
        let monitor = Arc::new(Monitor::new());
        let weak = Arc::downgrade(&monitor);
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        monitor.set_callback(Box::new(move |_frame: &Frame| {
            if let Some(monitor) = weak.upgrade() {
                monitor.stop();
            }
            flag.store(true, Ordering::SeqCst);
        }));

        let first = QueueSource::new(vec![vec![1]]);
        assert!(monitor
            .start(Arc::clone(&first), Duration::from_millis(1))
            .unwrap());
        assert!(wait_until(Duration::from_secs(2), || stopped
            .load(Ordering::SeqCst)));

        // Restart right away; the detached thread must not come back
        let second = QueueSource::new(Vec::new());
        assert!(monitor
            .start(Arc::clone(&second), Duration::from_millis(1))
            .unwrap());
        thread::sleep(Duration::from_millis(20));

        let first_polls = first.polls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(first.polls.load(Ordering::SeqCst), first_polls);
        assert!(second.polls.load(Ordering::SeqCst) > 0);

        assert!(monitor.stop());
    }

    #[test]
    fn test_repeat_filter() {
        let mut filter = RepeatFilter::default();
        assert!(filter.is_new("checksum mismatch: 0x1"));
        assert!(!filter.is_new("checksum mismatch: 0x1"));
        assert!(!filter.is_new("checksum mismatch: 0x1"));

        // A different frame failing is reported again
        assert!(filter.is_new("checksum mismatch: 0x2"));

        filter.reset();
        assert!(filter.is_new("checksum mismatch: 0x2"));
    }
}
