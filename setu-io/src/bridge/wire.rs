//! TCP wire format between the control client and the gateway
//!
//! Every value is a signed 32-bit big-endian integer.
//!
//! **Client → gateway**: an opcode, followed by one operand for the opcodes
//! that carry one.
//!
//! | Opcode | Operand | Meaning |
//! |--------|---------|---------|
//! | 1 | radius (mm) | set turn radius, drive with the last velocity |
//! | 2 | velocity (mm/s) | set velocity, drive with the last radius |
//! | 3 | - | stop, robot back to Passive |
//! | 4 | - | start cleaning |
//! | 5 | - | seek dock |
//!
//! **Gateway → client**: a repeating seven-integer record
//! `error_code, v1 .. v6` carrying the six light-bump readings.

use crate::error::{Error, Result};
use crate::oi::constants::LIGHT_BUMP_IDS;
use crate::stream::StreamSnapshot;
use std::io::{Read, Write};

pub const OP_SET_RADIUS: i32 = 1;
pub const OP_SET_VELOCITY: i32 = 2;
pub const OP_STOP: i32 = 3;
pub const OP_CLEAN: i32 = 4;
pub const OP_SEEK_DOCK: i32 = 5;

/// One decoded client command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    SetRadius(i32),
    SetVelocity(i32),
    Stop,
    Clean,
    SeekDock,
    /// Opcode the gateway does not know; carries no operand
    Unknown(i32),
}

impl ClientCommand {
    pub fn opcode(&self) -> i32 {
        match self {
            ClientCommand::SetRadius(_) => OP_SET_RADIUS,
            ClientCommand::SetVelocity(_) => OP_SET_VELOCITY,
            ClientCommand::Stop => OP_STOP,
            ClientCommand::Clean => OP_CLEAN,
            ClientCommand::SeekDock => OP_SEEK_DOCK,
            ClientCommand::Unknown(op) => *op,
        }
    }

    /// Read one command, blocking until it is complete
    ///
    /// A closed or reset socket yields [`Error::ConnectionClosed`].
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let opcode = read_i32(reader)?;
        Ok(match opcode {
            OP_SET_RADIUS => ClientCommand::SetRadius(read_i32(reader)?),
            OP_SET_VELOCITY => ClientCommand::SetVelocity(read_i32(reader)?),
            OP_STOP => ClientCommand::Stop,
            OP_CLEAN => ClientCommand::Clean,
            OP_SEEK_DOCK => ClientCommand::SeekDock,
            other => ClientCommand::Unknown(other),
        })
    }

    /// Encode the command the way a client sends it
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = Vec::with_capacity(8);
        buf.extend_from_slice(&self.opcode().to_be_bytes());
        match self {
            ClientCommand::SetRadius(value) | ClientCommand::SetVelocity(value) => {
                buf.extend_from_slice(&value.to_be_bytes())
            }
            _ => {}
        }
        writer.write_all(&buf).map_err(Error::from_socket)
    }
}

/// Telemetry record sent to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryRecord {
    pub error_code: i32,
    /// Light-bump readings, packets 46-51 in order
    pub values: [i32; 6],
}

impl TelemetryRecord {
    /// Size on the wire
    pub const SIZE: usize = 7 * 4;

    /// Record for a snapshot; packets not yet received read as 0
    pub fn from_snapshot(snapshot: &StreamSnapshot) -> Self {
        let mut values = [0i32; 6];
        for (slot, id) in values.iter_mut().zip(LIGHT_BUMP_IDS) {
            *slot = snapshot.value(id).unwrap_or(0);
        }
        Self {
            error_code: snapshot.error_code() as i32,
            values,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(&self.error_code.to_be_bytes());
        for (chunk, value) in out[4..].chunks_exact_mut(4).zip(self.values) {
            chunk.copy_from_slice(&value.to_be_bytes());
        }
        out
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer
            .write_all(&self.to_bytes())
            .map_err(Error::from_socket)
    }

    /// Read one record, as a client does
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let error_code = read_i32(reader)?;
        let mut values = [0i32; 6];
        for slot in values.iter_mut() {
            *slot = read_i32(reader)?;
        }
        Ok(Self { error_code, values })
    }
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(Error::from_socket)?;
    Ok(i32::from_be_bytes(buf))
}
