//! Single-owner write path to the robot
//!
//! Every byte sent to the robot goes through one `oi-writer` thread. Callers
//! hand it a [`TxPacket`] and block until the packet is on the wire, so
//! commands from the TCP bridge and from the stream engine never interleave
//! mid-packet.
//!
//! ```text
//! bridge-reader ──┐
//! gateway ────────┼── WriteJob ──> oi-writer ──> link.write_all()
//! oi-stream ──────┘         <── done(Result) ──┘
//! ```

use super::{SerialRobotLink, hex};
use crate::error::{Error, Result};
use crate::oi::TxPacket;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::thread::{self, JoinHandle};

/// Depth of the job queue in front of the writer thread
const JOB_QUEUE_DEPTH: usize = 32;

struct WriteJob {
    packet: TxPacket,
    done: Sender<Result<()>>,
}

/// Cloneable handle onto the writer thread
///
/// The thread exits once the last handle is dropped.
#[derive(Clone)]
pub struct CommandPort {
    jobs: Sender<WriteJob>,
}

impl CommandPort {
    /// Spawn the writer thread owning `link`
    pub fn spawn(link: Box<dyn SerialRobotLink>) -> Result<(Self, JoinHandle<()>)> {
        let (jobs, rx) = bounded(JOB_QUEUE_DEPTH);
        let handle = thread::Builder::new()
            .name("oi-writer".to_string())
            .spawn(move || writer_loop(link, rx))
            .map_err(|e| Error::Other(format!("Failed to spawn writer thread: {}", e)))?;
        Ok((CommandPort { jobs }, handle))
    }

    /// Write one packet and wait until the writer thread reports back
    pub fn send(&self, packet: &TxPacket) -> Result<()> {
        let (done, result) = bounded(1);
        self.jobs
            .send(WriteJob {
                packet: packet.clone(),
                done,
            })
            .map_err(|_| Error::LinkClosed)?;
        result.recv().map_err(|_| Error::LinkClosed)?
    }
}

fn writer_loop(mut link: Box<dyn SerialRobotLink>, jobs: Receiver<WriteJob>) {
    log::info!("Writer thread started on {}", link.describe());
    let mut packets = 0u64;
    let mut bytes = 0u64;

    for job in jobs.iter() {
        let data = job.packet.as_bytes();
        log::debug!("TX [{}]", hex(data));
        let result = link.write_all(data);
        match &result {
            Ok(()) => {
                packets += 1;
                bytes += data.len() as u64;
            }
            Err(e) => log::error!("Serial write failed: {}", e),
        }
        // Caller may have given up waiting
        let _ = job.done.send(result);
    }

    log::info!(
        "Writer thread stopped ({} packets, {} bytes written)",
        packets,
        bytes
    );
}
