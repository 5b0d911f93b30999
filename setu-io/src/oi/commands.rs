//! Command encoder for the Open Interface
//!
//! [`TxPacket`] is one reusable buffer that every outgoing command is built
//! in. Each `set_*` method clamps its inputs to the documented range, then
//! writes the opcode followed by the parameter bytes, multi-byte fields
//! big-endian.
//!
//! # Pattern
//!
//! ```
//! use setu_io::oi::TxPacket;
//!
//! let mut pkt = TxPacket::new();
//! pkt.set_drive(100, 50);
//! assert_eq!(pkt.as_bytes(), &[137, 0, 100, 0, 50]);
//! pkt.set_clean();
//! assert_eq!(pkt.as_bytes(), &[135]);
//! ```

use super::constants::*;
use super::packets;
use crate::error::{Error, Result};

/// Largest command: `148 n id1..idN` with every sensor id
const MAX_PACKET_SIZE: usize = 64;

/// Reusable TX buffer for all Open Interface commands
#[derive(Clone)]
pub struct TxPacket {
    data: [u8; MAX_PACKET_SIZE],
    len: usize,
}

/// Weekly cleaning schedule for the `167` command
///
/// `times` holds `(hour, minute)` for Sunday through Saturday. Bit 0 of
/// `days` enables Sunday, bit 6 Saturday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Schedule {
    pub days: u8,
    pub times: [(u8, u8); 7],
}

impl TxPacket {
    pub const fn new() -> Self {
        Self {
            data: [0u8; MAX_PACKET_SIZE],
            len: 0,
        }
    }

    /// Get packet bytes for sending
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    fn begin(&mut self, opcode: u8) {
        self.data[0] = opcode;
        self.len = 1;
    }

    fn push(&mut self, byte: u8) {
        self.data[self.len] = byte;
        self.len += 1;
    }

    fn push_i16(&mut self, value: i16) {
        for byte in value.to_be_bytes() {
            self.push(byte);
        }
    }

    fn push_ids(&mut self, ids: &[u8]) {
        self.push(ids.len() as u8);
        for &id in ids {
            self.push(id);
        }
    }

    // ========================================================================
    // Mode commands
    // ========================================================================

    /// Start the Open Interface (128), robot enters Passive
    pub fn set_start(&mut self) {
        self.begin(OP_START);
    }

    /// Back to Passive (128)
    pub fn set_passive(&mut self) {
        self.begin(OP_START);
    }

    pub fn set_safe(&mut self) {
        self.begin(OP_SAFE);
    }

    pub fn set_full(&mut self) {
        self.begin(OP_FULL);
    }

    /// Change baud rate (129)
    ///
    /// Codes 0-11 map to 300..115200 baud.
    pub fn set_baud(&mut self, code: u8) -> Result<()> {
        if code > MAX_BAUD_CODE {
            return Err(Error::InvalidArgument(format!(
                "baud code {} out of range 0..={}",
                code, MAX_BAUD_CODE
            )));
        }
        self.begin(OP_BAUD);
        self.push(code);
        Ok(())
    }

    // ========================================================================
    // Cleaning commands
    // ========================================================================

    pub fn set_clean(&mut self) {
        self.begin(OP_CLEAN);
    }

    pub fn set_max(&mut self) {
        self.begin(OP_MAX);
    }

    pub fn set_spot(&mut self) {
        self.begin(OP_SPOT);
    }

    pub fn set_seek_dock(&mut self) {
        self.begin(OP_SEEK_DOCK);
    }

    pub fn set_power(&mut self) {
        self.begin(OP_POWER);
    }

    /// Weekly schedule (167), 15 parameter bytes
    pub fn set_schedule(&mut self, schedule: &Schedule) {
        self.begin(OP_SCHEDULE);
        self.push(schedule.days & 0x7F);
        for (hour, minute) in schedule.times {
            self.push(hour.min(23));
            self.push(minute.min(59));
        }
    }

    /// Set the robot clock (168)
    ///
    /// Day 0 is Sunday.
    pub fn set_day_time(&mut self, day: u8, hour: u8, minute: u8) {
        self.begin(OP_SET_DAY_TIME);
        self.push(day.min(6));
        self.push(hour.min(23));
        self.push(minute.min(59));
    }

    // ========================================================================
    // Actuator commands
    // ========================================================================

    /// Drive (137) with velocity in mm/s and turn radius in mm
    ///
    /// Velocity is clamped to ±500, radius to ±2000 unless it is one of the
    /// straight-drive values 32767/32768, which pass through unchanged.
    pub fn set_drive(&mut self, velocity: i32, radius: i32) {
        let velocity = velocity.clamp(-MAX_VELOCITY_MM_S, MAX_VELOCITY_MM_S);
        let radius = if radius == RADIUS_STRAIGHT || radius == RADIUS_STRAIGHT_ALT {
            radius
        } else {
            radius.clamp(-MAX_RADIUS_MM, MAX_RADIUS_MM)
        };
        self.begin(OP_DRIVE);
        self.push_i16(velocity as i16);
        // 32768 is 0x8000 on the wire
        self.push_i16(radius as u16 as i16);
    }

    /// Direct wheel PWM (146), each wheel clamped to ±255
    ///
    /// The wire carries the right wheel first.
    pub fn set_drive_pwm(&mut self, left: i32, right: i32) {
        self.begin(OP_DRIVE_PWM);
        self.push_i16(right.clamp(-MAX_DRIVE_PWM, MAX_DRIVE_PWM) as i16);
        self.push_i16(left.clamp(-MAX_DRIVE_PWM, MAX_DRIVE_PWM) as i16);
    }

    /// Brush and vacuum PWM (144)
    ///
    /// Brushes take ±127 (negative runs them backwards), vacuum 0-127.
    pub fn set_pwm_motors(&mut self, main_brush: i32, side_brush: i32, vacuum: i32) {
        self.begin(OP_PWM_MOTORS);
        self.push(main_brush.clamp(-MAX_BRUSH_PWM, MAX_BRUSH_PWM) as i8 as u8);
        self.push(side_brush.clamp(-MAX_BRUSH_PWM, MAX_BRUSH_PWM) as i8 as u8);
        self.push(vacuum.clamp(0, MAX_VACUUM_PWM) as u8);
    }

    /// LEDs (139): bit mask, power LED color (0 green - 255 red), intensity
    pub fn set_leds(&mut self, bits: u8, color: u8, intensity: u8) {
        self.begin(OP_LEDS);
        self.push(bits);
        self.push(color);
        self.push(intensity);
    }

    /// Simulate button presses (165)
    pub fn set_buttons(&mut self, which: u8) {
        self.begin(OP_BUTTONS);
        self.push(which);
    }

    /// Play a stored song (141), song number clamped to 0-4
    pub fn set_play(&mut self, song_number: u8) {
        self.begin(OP_PLAY);
        self.push(song_number.min(MAX_SONG_NUMBER));
    }

    /// Define a song (140)
    ///
    /// Not supported by the gateway; always fails.
    pub fn set_song(&mut self, _song_number: u8, _notes: &[u8], _durations: &[u8]) -> Result<()> {
        Err(Error::NotImplemented("song definition (opcode 140)"))
    }

    // ========================================================================
    // Input commands
    // ========================================================================

    /// Single sensor or group query (142)
    pub fn set_query_sensor(&mut self, id: u8) -> Result<()> {
        if !packets::is_sensor(id) {
            packets::group(id)?;
        }
        self.begin(OP_SENSORS);
        self.push(id);
        Ok(())
    }

    /// Arbitrary list query (149)
    pub fn set_query_list(&mut self, ids: &[u8]) -> Result<()> {
        packets::list_specs(ids)?;
        self.begin(OP_QUERY_LIST);
        self.push_ids(ids);
        Ok(())
    }

    /// Start streaming `ids` every 15 ms (148)
    pub fn set_stream(&mut self, ids: &[u8]) -> Result<()> {
        packets::list_specs(ids)?;
        self.begin(OP_STREAM);
        self.push_ids(ids);
        Ok(())
    }

    /// Pause (`150 0`) or resume (`150 1`) the stream
    pub fn set_pause_resume(&mut self, resume: bool) {
        self.begin(OP_PAUSE_RESUME_STREAM);
        self.push(resume as u8);
    }
}

impl Default for TxPacket {
    fn default() -> Self {
        Self::new()
    }
}
