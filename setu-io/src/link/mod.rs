//! Serial link to the robot
//!
//! [`SerialRobotLink`] is the only capability the rest of the gateway sees.
//! Three variants implement it:
//!
//! | Variant | Backing |
//! |---------|---------|
//! | [`SerialLink`] | real UART via the `serialport` crate |
//! | [`StubLink`] | simulated robot, no hardware needed |
//! | [`MockLink`] | scripted in-memory buffers for tests |
//!
//! A link is split into a read half and a write half with
//! [`SerialRobotLink::try_clone_link`]. The write half is owned by the
//! [`CommandPort`] thread, the read half by the stream engine thread, so no
//! two threads ever touch the same direction of the wire.

use crate::error::{Error, Result};
use std::thread;
use std::time::{Duration, Instant};

mod mock;
mod port;
mod serial;
mod stub;

pub use mock::MockLink;
pub use port::CommandPort;
pub use serial::SerialLink;
pub use stub::StubLink;

/// Byte-stream access to the robot's Open Interface
pub trait SerialRobotLink: Send {
    /// Read into `buffer`, returns number of bytes read
    ///
    /// `Ok(0)` means the device read timeout expired with nothing buffered.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer and flush it to the device
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Bytes buffered on the input side
    fn available(&mut self) -> Result<usize>;

    /// Discard up to `count` input bytes, returns how many were dropped
    ///
    /// Stops early when a read comes back empty.
    fn skip(&mut self, count: usize) -> Result<usize> {
        let mut scratch = [0u8; 64];
        let mut skipped = 0;
        while skipped < count {
            let chunk = (count - skipped).min(scratch.len());
            let n = self.read(&mut scratch[..chunk])?;
            if n == 0 {
                break;
            }
            skipped += n;
        }
        Ok(skipped)
    }

    /// Discard everything currently buffered on the input side
    fn discard_input(&mut self) -> Result<usize> {
        let pending = self.available()?;
        self.skip(pending)
    }

    /// Second handle onto the same device
    fn try_clone_link(&self) -> Result<Box<dyn SerialRobotLink>>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Wait until at least `needed` bytes are buffered
///
/// Polls [`SerialRobotLink::available`] in `slices` steps against a hard
/// deadline. Returns the buffered count, or [`Error::SerialTimeout`] once the
/// deadline passes.
pub fn wait_for(
    link: &mut dyn SerialRobotLink,
    needed: usize,
    timeout: Duration,
    slices: u32,
) -> Result<usize> {
    let deadline = Instant::now() + timeout;
    let step = timeout / slices.max(1);

    loop {
        let available = link.available()?;
        if available >= needed {
            return Ok(available);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(Error::SerialTimeout {
                needed,
                available,
                waited_ms: timeout.as_millis() as u64,
            });
        }
        thread::sleep(step.min(deadline - now));
    }
}

/// Fill `buffer` completely or fail with [`Error::SerialTimeout`]
pub fn read_exact_within(
    link: &mut dyn SerialRobotLink,
    buffer: &mut [u8],
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut filled = 0;

    while filled < buffer.len() {
        filled += link.read(&mut buffer[filled..])?;
        if filled < buffer.len() && Instant::now() >= deadline {
            return Err(Error::SerialTimeout {
                needed: buffer.len(),
                available: filled,
                waited_ms: timeout.as_millis() as u64,
            });
        }
    }
    Ok(())
}

/// Format bytes as space-separated hex for debug logs
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
