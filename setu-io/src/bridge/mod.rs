//! Per-connection bridge between a TCP client and the robot
//!
//! Each accepted connection runs two threads:
//!
//! - **bridge-reader** decodes client commands and sends them to the robot
//!   through the [`ModeTracker`], so drive commands land in Safe mode and
//!   clean/dock commands in Passive mode.
//! - **bridge-writer** streams the six light-bump sensors and sends the
//!   latest snapshot to the client at a fixed interval.
//!
//! Both share a per-connection alive flag. Whichever side fails first clears
//! it and shuts the socket down so the other side unblocks.

pub mod wire;

use crate::error::{Error, Result};
use crate::link::CommandPort;
use crate::oi::ModeTracker;
use crate::oi::constants::LIGHT_BUMP_IDS;
use crate::stream::{SnapshotHandle, StreamEngine};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use wire::{ClientCommand, TelemetryRecord};

/// Counters for one connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Client commands forwarded to the robot
    pub commands: u64,
    /// Client commands with an unknown opcode
    pub ignored: u64,
    /// Telemetry records sent to the client
    pub records: u64,
}

/// Bridge for one TCP connection
pub struct ConnectionBridge<'a> {
    port: &'a CommandPort,
    engine: &'a StreamEngine,
    /// Gateway-wide running flag
    running: &'a AtomicBool,
    telemetry_interval: Duration,
}

impl<'a> ConnectionBridge<'a> {
    pub fn new(
        port: &'a CommandPort,
        engine: &'a StreamEngine,
        running: &'a AtomicBool,
        telemetry_interval: Duration,
    ) -> Self {
        Self {
            port,
            engine,
            running,
            telemetry_interval,
        }
    }

    /// Serve `stream` until the client goes away, the robot link fails or
    /// the gateway stops
    ///
    /// Returns once both threads have exited.
    pub fn run(&self, stream: &TcpStream, mode: &mut ModeTracker) -> Result<SessionStats> {
        let snapshot = self.engine.set_stream_list(&LIGHT_BUMP_IDS)?;
        let conn_alive = AtomicBool::new(true);

        thread::scope(|s| {
            let reader = thread::Builder::new()
                .name("bridge-reader".to_string())
                .spawn_scoped(s, || self.read_loop(stream, mode, &conn_alive))
                .map_err(|e| Error::Other(format!("Failed to spawn bridge reader: {}", e)))?;

            let writer = match thread::Builder::new()
                .name("bridge-writer".to_string())
                .spawn_scoped(s, || self.write_loop(stream, &snapshot, &conn_alive))
            {
                Ok(handle) => handle,
                Err(e) => {
                    // Unblock the reader so the scope can end
                    conn_alive.store(false, Ordering::SeqCst);
                    let _ = stream.shutdown(Shutdown::Both);
                    return Err(Error::Other(format!(
                        "Failed to spawn bridge writer: {}",
                        e
                    )));
                }
            };

            let (commands, ignored) = reader
                .join()
                .map_err(|_| Error::Other("bridge reader panicked".to_string()))?;
            let records = writer
                .join()
                .map_err(|_| Error::Other("bridge writer panicked".to_string()))?;

            Ok(SessionStats {
                commands,
                ignored,
                records,
            })
        })
    }

    /// Returns (commands forwarded, commands ignored)
    fn read_loop(
        &self,
        stream: &TcpStream,
        mode: &mut ModeTracker,
        conn_alive: &AtomicBool,
    ) -> (u64, u64) {
        let mut reader = stream;
        let mut velocity = 0;
        let mut radius = 0;
        let mut commands = 0;
        let mut ignored = 0;

        let result = loop {
            let command = match ClientCommand::read_from(&mut reader) {
                Ok(command) => command,
                Err(e) => break Err(e),
            };
            log::debug!("Client command: {:?}", command);

            let sent = match command {
                ClientCommand::SetRadius(r) => {
                    radius = r;
                    mode.drive(self.port, velocity, radius)
                }
                ClientCommand::SetVelocity(v) => {
                    velocity = v;
                    mode.drive(self.port, velocity, radius)
                }
                ClientCommand::Stop => mode.passive(self.port),
                ClientCommand::Clean => mode.clean(self.port),
                ClientCommand::SeekDock => mode.seek_dock(self.port),
                ClientCommand::Unknown(opcode) => {
                    log::warn!("Ignoring unknown client opcode {}", opcode);
                    ignored += 1;
                    continue;
                }
            };
            if let Err(e) = sent {
                break Err(e);
            }
            commands += 1;
        };

        conn_alive.store(false, Ordering::SeqCst);
        match result {
            Err(e) if e.is_disconnect() => log::info!("Client disconnected"),
            Err(e) => {
                log::error!("Bridge reader stopped: {}", e);
                let _ = stream.shutdown(Shutdown::Both);
            }
            Ok(()) => {}
        }
        (commands, ignored)
    }

    /// Returns the number of records sent
    fn write_loop(
        &self,
        stream: &TcpStream,
        snapshot: &SnapshotHandle,
        conn_alive: &AtomicBool,
    ) -> u64 {
        let mut writer = stream;
        let mut records = 0;

        loop {
            thread::sleep(self.telemetry_interval);
            if !self.running.load(Ordering::SeqCst) {
                log::debug!("Gateway stopping, closing connection");
                let _ = stream.shutdown(Shutdown::Both);
                break;
            }
            if !conn_alive.load(Ordering::SeqCst) {
                break;
            }

            let record = TelemetryRecord::from_snapshot(&snapshot.load());
            if let Err(e) = record.write_to(&mut writer) {
                if e.is_disconnect() {
                    log::info!("Client went away while sending telemetry");
                } else {
                    log::error!("Failed to send telemetry: {}", e);
                }
                conn_alive.store(false, Ordering::SeqCst);
                let _ = stream.shutdown(Shutdown::Both);
                break;
            }
            records += 1;
        }
        records
    }
}
