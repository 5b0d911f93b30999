//! One robot session: the link plus the two threads that own it
//!
//! ```text
//!             try_clone_link()
//!   link ──┬──────────────────> CommandPort (oi-writer)   write half
//!          └──────────────────> StreamEngine (oi-stream)  read half
//! ```

use crate::config::Config;
use crate::error::Result;
use crate::link::{CommandPort, SerialLink, SerialRobotLink, StubLink};
use crate::oi::{ModeTracker, TxPacket};
use crate::stream::{StreamEngine, StreamEngineConfig};
use std::thread::JoinHandle;

/// Connected robot
pub struct Robot {
    port: CommandPort,
    engine: StreamEngine,
    writer: JoinHandle<()>,
    description: String,
}

impl Robot {
    /// Open the device named in the configuration (or the simulated robot)
    pub fn open(config: &Config) -> Result<Self> {
        let link: Box<dyn SerialRobotLink> = if config.device.stub {
            Box::new(StubLink::new(config.device.read_timeout()))
        } else {
            Box::new(SerialLink::open(
                &config.device.port,
                config.device.baud_rate,
                config.device.read_timeout(),
            )?)
        };
        Self::with_link(link, StreamEngineConfig::from_config(config))
    }

    /// Start the writer and stream threads on an already open link
    pub fn with_link(link: Box<dyn SerialRobotLink>, config: StreamEngineConfig) -> Result<Self> {
        let description = link.describe();
        let reader = link.try_clone_link()?;
        let (port, writer) = CommandPort::spawn(link)?;
        let engine = StreamEngine::spawn(reader, port.clone(), config)?;
        log::info!("Robot link ready: {}", description);

        Ok(Self {
            port,
            engine,
            writer,
            description,
        })
    }

    /// Write path shared by every command sender
    pub fn port(&self) -> &CommandPort {
        &self.port
    }

    pub fn engine(&self) -> &StreamEngine {
        &self.engine
    }

    /// Encode and send one command
    pub fn send(&self, pkt: &TxPacket) -> Result<()> {
        self.port.send(pkt)
    }

    /// Start the Open Interface and enter Safe mode
    pub fn arm(&self) -> Result<ModeTracker> {
        let mut mode = ModeTracker::new();
        mode.arm(&self.port)?;
        log::info!("Robot armed ({:?})", mode.mode());
        Ok(mode)
    }

    /// Stop streaming, hand the robot back in Passive and join the link threads
    pub fn disconnect(self) -> Result<()> {
        let Robot {
            port,
            engine,
            writer,
            description,
        } = self;

        let stopped = engine.set_stream_list(&[]).map(|_| ());
        engine.shutdown();
        drop(engine);

        let mut pkt = TxPacket::new();
        pkt.set_passive();
        let passive = port.send(&pkt);

        drop(port);
        if writer.join().is_err() {
            log::error!("Writer thread panicked");
        }
        log::info!("Robot disconnected: {}", description);
        stopped.and(passive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MockLink;
    use crate::oi::RobotMode;

    #[test]
    fn test_arm_and_disconnect() {
        let link = MockLink::new();
        let robot = Robot::with_link(Box::new(link.clone()), StreamEngineConfig::default()).unwrap();

        let mode = robot.arm().unwrap();
        assert_eq!(mode.mode(), RobotMode::Safe);

        let mut pkt = TxPacket::new();
        pkt.set_leds(0, 0, 255);
        robot.send(&pkt).unwrap();

        robot.disconnect().unwrap();
        assert_eq!(link.written(), vec![128, 131, 139, 0, 0, 255, 150, 0, 128]);
    }

    #[test]
    fn test_disconnect_stops_active_stream_once() {
        let link = MockLink::new();
        let robot = Robot::with_link(Box::new(link.clone()), StreamEngineConfig::default()).unwrap();
        robot.engine().set_stream_list(&[7]).unwrap();
        link.wait_written(std::time::Duration::from_secs(2), |w| w == [148, 1, 7])
            .unwrap();

        robot.disconnect().unwrap();
        assert_eq!(link.written(), vec![148, 1, 7, 150, 0, 128]);
    }

    #[test]
    fn test_open_stub() {
        let mut config = Config::default();
        config.device.stub = true;
        let robot = Robot::open(&config).unwrap();
        robot.arm().unwrap();
        assert!(robot.engine().query_sensor(7).is_ok());
        robot.disconnect().unwrap();
    }
}
