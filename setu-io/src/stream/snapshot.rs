//! Published telemetry snapshots

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of the most recent telemetry frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    /// Frame decoded and checksum matched
    #[default]
    Ok = 0,
    /// Frame bytes did not sum to zero
    ChecksumFailure = 1,
    /// A field id did not match the requested list
    WrongPacketId = 2,
    /// Reader fell behind; buffered frames were dropped
    Backlog = 3,
    /// Expected a frame header and got something else
    LostSync = 4,
}

impl StreamStatus {
    /// Numeric code sent to clients
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Immutable view of the latest streamed values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSnapshot {
    pub status: StreamStatus,
    /// Last good value per packet id
    pub values: HashMap<u8, i32>,
    /// Number of snapshots published before this one
    pub sequence: u64,
}

impl StreamSnapshot {
    pub fn value(&self, id: u8) -> Option<i32> {
        self.values.get(&id).copied()
    }

    pub fn error_code(&self) -> u8 {
        self.status.code()
    }
}

/// Shared handle to the most recently published snapshot
///
/// Readers get an `Arc` to a snapshot that is never mutated; the engine
/// swaps in a new one on every publish.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHandle {
    current: Arc<RwLock<Arc<StreamSnapshot>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest snapshot
    pub fn load(&self) -> Arc<StreamSnapshot> {
        Arc::clone(&*self.current.read())
    }

    /// Publish the next snapshot; `None` keeps the previous values
    ///
    /// Returns the status being replaced.
    pub(crate) fn advance(
        &self,
        status: StreamStatus,
        values: Option<HashMap<u8, i32>>,
    ) -> StreamStatus {
        let mut current = self.current.write();
        let previous = current.status;
        let values = values.unwrap_or_else(|| current.values.clone());
        *current = Arc::new(StreamSnapshot {
            status,
            values,
            sequence: current.sequence + 1,
        });
        previous
    }

    /// Publish an empty `Ok` snapshot
    pub(crate) fn reset(&self) {
        self.advance(StreamStatus::Ok, Some(HashMap::new()));
    }
}
