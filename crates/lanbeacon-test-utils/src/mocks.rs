//! Mock implementations for testing.
//!
//! Provides test doubles for the collaborators the discovery engine consumes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lanbeacon_discover::PermissionGuard;

/// A permission guard that counts how often it was acquired and released.
///
/// Clones share counters, so a clone can be handed to a role while the test
/// keeps the original for inspection.
///
/// # Example
///
/// ```rust
/// use lanbeacon_discover::PermissionGuard;
/// use lanbeacon_test_utils::mocks::RecordingGuard;
///
/// let guard = RecordingGuard::new();
/// let handed_out = guard.clone();
/// handed_out.acquire();
/// handed_out.release();
///
/// assert_eq!(guard.acquired(), 1);
/// assert!(!guard.is_held());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingGuard {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl RecordingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Whether more acquisitions than releases have been recorded.
    pub fn is_held(&self) -> bool {
        self.acquired() > self.released()
    }
}

impl PermissionGuard for RecordingGuard {
    fn acquire(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Thread-safe record of callback invocations.
///
/// # Example
///
/// ```rust
/// use lanbeacon_test_utils::mocks::CallRecorder;
///
/// let recorder = CallRecorder::new();
/// let sink = recorder.clone();
/// let callback = move |value: u32| sink.record(value);
///
/// callback(7);
/// assert_eq!(recorder.calls(), vec![7]);
/// ```
#[derive(Debug)]
pub struct CallRecorder<T> {
    calls: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for CallRecorder<T> {
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
        }
    }
}

impl<T> Default for CallRecorder<T> {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> CallRecorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, value: T) {
        self.calls.lock().unwrap().push(value);
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl<T: Clone> CallRecorder<T> {
    pub fn calls(&self) -> Vec<T> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.calls.lock().unwrap().last().cloned()
    }
}
