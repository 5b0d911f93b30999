//! Robot control mode tracking
//!
//! The robot only obeys drive commands in Safe (or Full) mode, and only runs
//! its own cleaning/docking behaviours from Passive. [`ModeTracker`] records
//! the last mode the gateway put the robot in and switches mode before a
//! command that needs a different one.

use super::commands::TxPacket;
use crate::error::Result;
use crate::link::CommandPort;

/// Open Interface mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotMode {
    Passive,
    Safe,
    Full,
}

/// Last known robot mode plus mode-gated command dispatch
#[derive(Debug)]
pub struct ModeTracker {
    mode: RobotMode,
}

impl ModeTracker {
    /// Tracker for a robot whose Open Interface was just started
    pub fn new() -> Self {
        Self {
            mode: RobotMode::Passive,
        }
    }

    pub fn mode(&self) -> RobotMode {
        self.mode
    }

    /// Start the Open Interface (robot enters Passive)
    pub fn start(&mut self, port: &CommandPort) -> Result<()> {
        let mut pkt = TxPacket::new();
        pkt.set_start();
        self.transition(port, &pkt, RobotMode::Passive)
    }

    pub fn passive(&mut self, port: &CommandPort) -> Result<()> {
        let mut pkt = TxPacket::new();
        pkt.set_passive();
        self.transition(port, &pkt, RobotMode::Passive)
    }

    pub fn safe(&mut self, port: &CommandPort) -> Result<()> {
        let mut pkt = TxPacket::new();
        pkt.set_safe();
        self.transition(port, &pkt, RobotMode::Safe)
    }

    pub fn full(&mut self, port: &CommandPort) -> Result<()> {
        let mut pkt = TxPacket::new();
        pkt.set_full();
        self.transition(port, &pkt, RobotMode::Full)
    }

    /// Start the Open Interface and enter Safe, ready for drive commands
    pub fn arm(&mut self, port: &CommandPort) -> Result<()> {
        self.start(port)?;
        self.safe(port)
    }

    /// Drive, entering Safe first unless already there
    pub fn drive(&mut self, port: &CommandPort, velocity: i32, radius: i32) -> Result<()> {
        if self.mode != RobotMode::Safe {
            self.safe(port)?;
        }
        let mut pkt = TxPacket::new();
        pkt.set_drive(velocity, radius);
        port.send(&pkt)
    }

    /// Start a cleaning cycle, entering Passive first unless already there
    pub fn clean(&mut self, port: &CommandPort) -> Result<()> {
        if self.mode != RobotMode::Passive {
            self.passive(port)?;
        }
        let mut pkt = TxPacket::new();
        pkt.set_clean();
        port.send(&pkt)
    }

    /// Send the robot to its dock, entering Passive first unless already there
    pub fn seek_dock(&mut self, port: &CommandPort) -> Result<()> {
        if self.mode != RobotMode::Passive {
            self.passive(port)?;
        }
        let mut pkt = TxPacket::new();
        pkt.set_seek_dock();
        port.send(&pkt)
    }

    fn transition(&mut self, port: &CommandPort, pkt: &TxPacket, mode: RobotMode) -> Result<()> {
        port.send(pkt)?;
        if self.mode != mode {
            log::debug!("Robot mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
        Ok(())
    }
}

impl Default for ModeTracker {
    fn default() -> Self {
        Self::new()
    }
}
