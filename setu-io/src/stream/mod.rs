//! Telemetry streaming
//!
//! - [`snapshot`]: published values and their status code
//! - [`frame`]: decoding of one `19 n ... checksum` frame
//! - [`engine`]: the thread that owns the serial input

pub mod engine;
pub mod frame;
pub mod snapshot;

pub use engine::{StreamEngine, StreamEngineConfig, StreamRequest};
pub use frame::{FrameDecoder, FrameOutcome, build_frame};
pub use snapshot::{SnapshotHandle, StreamSnapshot, StreamStatus};
