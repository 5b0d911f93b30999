//! Real serial device

use super::SerialRobotLink;
use crate::error::Result;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// UART connection to the robot's Open Interface port
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: String,
    baud_rate: u32,
}

impl SerialLink {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyAMA0")
    /// * `baud_rate` - Baud rate (115200 unless the robot was switched)
    /// * `read_timeout` - How long a read waits for the first byte
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialLink {
            port,
            path: path.to_string(),
            baud_rate,
        })
    }
}

impl SerialRobotLink for SerialLink {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn discard_input(&mut self) -> Result<usize> {
        let pending = self.available()?;
        self.port.clear(ClearBuffer::Input)?;
        Ok(pending)
    }

    fn try_clone_link(&self) -> Result<Box<dyn SerialRobotLink>> {
        Ok(Box::new(SerialLink {
            port: self.port.try_clone()?,
            path: self.path.clone(),
            baud_rate: self.baud_rate,
        }))
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }
}
