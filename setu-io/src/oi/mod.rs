//! Roomba Open Interface protocol
//!
//! - [`constants`]: opcodes, packet ids, LED and button bits
//! - [`packets`]: sensor packet widths/signedness and group packets
//! - [`commands`]: [`TxPacket`] command encoder
//! - [`decoder`]: single-shot sensor queries
//! - [`mode`]: robot mode tracking

pub mod commands;
pub mod constants;
pub mod decoder;
pub mod mode;
pub mod packets;

pub use commands::{Schedule, TxPacket};
pub use decoder::SensorDecoder;
pub use mode::{ModeTracker, RobotMode};
pub use packets::{GroupSpec, PacketSpec, Width};
