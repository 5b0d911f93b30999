//! SetuIO - TCP to serial gateway for Open Interface robot vacuums
//!
//! A control client connects over TCP, sends drive/clean/dock commands and
//! receives light-bump telemetry. The gateway translates both directions to
//! the robot's serial Open Interface.
//!
//! ## Layers
//!
//! - [`link`]: serial link capability (real device, stub, mock)
//! - [`oi`]: packet table, command encoder, sensor queries, mode tracking
//! - [`stream`]: background telemetry stream decoding
//! - [`robot`]: opens a link and starts its writer and stream threads
//! - [`bridge`], [`gateway`]: TCP side

pub mod bridge;
pub mod config;
pub mod error;
pub mod gateway;
pub mod link;
pub mod oi;
pub mod robot;
pub mod stream;

// Re-export commonly used types
pub use bridge::ConnectionBridge;
pub use bridge::wire::{ClientCommand, TelemetryRecord};
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::GatewayServer;
pub use link::{CommandPort, MockLink, SerialLink, SerialRobotLink, StubLink};
pub use oi::{ModeTracker, RobotMode, TxPacket};
pub use robot::Robot;
pub use stream::{SnapshotHandle, StreamEngine, StreamSnapshot, StreamStatus};
