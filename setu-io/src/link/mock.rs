//! Mock link for unit and integration testing

use super::SerialRobotLink;
use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a read on an empty buffer waits before reporting a timeout
const DEFAULT_READ_WAIT: Duration = Duration::from_millis(5);

/// In-memory link with scripted input and recorded output
///
/// Clones share the same buffers, so a test keeps one handle while the
/// gateway owns the others.
#[derive(Clone)]
pub struct MockLink {
    shared: Arc<Shared>,
    read_wait: Duration,
}

struct Shared {
    inner: Mutex<MockLinkInner>,
    changed: Condvar,
}

#[derive(Default)]
struct MockLinkInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    discards: usize,
}

impl MockLink {
    /// Create a new mock link
    pub fn new() -> Self {
        MockLink {
            shared: Arc::new(Shared {
                inner: Mutex::new(MockLinkInner::default()),
                changed: Condvar::new(),
            }),
            read_wait: DEFAULT_READ_WAIT,
        }
    }

    /// Change how long reads block on an empty buffer
    pub fn with_read_wait(mut self, wait: Duration) -> Self {
        self.read_wait = wait;
        self
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.shared.inner.lock();
        inner.read_buffer.extend(data);
        self.shared.changed.notify_all();
    }

    /// All data written so far
    pub fn written(&self) -> Vec<u8> {
        self.shared.inner.lock().write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.shared.inner.lock().write_buffer.clear();
    }

    /// Number of times the input buffer was discarded
    pub fn discards(&self) -> usize {
        self.shared.inner.lock().discards
    }

    /// Block until `predicate` holds for the written bytes or `timeout` passes
    ///
    /// Returns the written bytes when the predicate held, `None` otherwise.
    pub fn wait_written<F>(&self, timeout: Duration, predicate: F) -> Option<Vec<u8>>
    where
        F: Fn(&[u8]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        loop {
            if predicate(inner.write_buffer.as_slice()) {
                return Some(inner.write_buffer.clone());
            }
            if self
                .shared
                .changed
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return predicate(inner.write_buffer.as_slice()).then(|| inner.write_buffer.clone());
            }
        }
    }

    /// Block until the input buffer has been discarded `count` times
    pub fn wait_discards(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        while inner.discards < count {
            if self
                .shared
                .changed
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return inner.discards >= count;
            }
        }
        true
    }
}

impl SerialRobotLink for MockLink {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let deadline = Instant::now() + self.read_wait;
        let mut inner = self.shared.inner.lock();
        while inner.read_buffer.is_empty() {
            if self
                .shared
                .changed
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                break;
            }
        }

        let count = inner.read_buffer.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        inner.write_buffer.extend_from_slice(data);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.shared.inner.lock().read_buffer.len())
    }

    fn discard_input(&mut self) -> Result<usize> {
        let mut inner = self.shared.inner.lock();
        let dropped = inner.read_buffer.len();
        inner.read_buffer.clear();
        inner.discards += 1;
        self.shared.changed.notify_all();
        Ok(dropped)
    }

    fn try_clone_link(&self) -> Result<Box<dyn SerialRobotLink>> {
        Ok(Box::new(self.clone()))
    }

    fn describe(&self) -> String {
        "mock link".to_string()
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}
