//! Simulated robot for running without hardware
//!
//! `StubLink` parses the commands written to it and answers like a robot
//! would:
//!
//! | Command | Response |
//! |---------|----------|
//! | `142 id` | zero-filled value or group of the right size |
//! | `149 n ids` | zero-filled values, sizes from the packet table |
//! | `148 n ids` | one telemetry frame every 15 ms |
//! | `150 0/1` | pause / resume the frames |
//! | anything else | logged, mode and drive state tracked |
//!
//! Streamed values are slow triangle waves between 0 and 100, except the
//! OI mode (35) and requested velocity/radius (39/40), which follow the
//! commands received.

use super::{SerialRobotLink, hex};
use crate::error::Result;
use crate::oi::constants::*;
use crate::oi::packets::{self, PacketSpec};
use crate::stream::build_frame;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME_PERIOD: Duration = Duration::from_millis(STREAM_PERIOD_MS);

/// Frames older than this are not replayed after a long pause in reading
const MAX_CATCH_UP: Duration = Duration::from_secs(1);

/// Peak of the synthetic triangle wave
const WAVE_PEAK: u32 = 100;

/// Simulated robot
#[derive(Clone)]
pub struct StubLink {
    shared: Arc<Shared>,
    read_timeout: Duration,
}

struct Shared {
    state: Mutex<StubState>,
    changed: Condvar,
}

struct StubState {
    input: VecDeque<u8>,
    stream_ids: Vec<u8>,
    streaming: bool,
    next_frame: Instant,
    tick: u32,
    /// OI mode as the robot reports it: 0 off, 1 passive, 2 safe, 3 full
    mode: u8,
    velocity: i32,
    radius: i32,
}

impl StubLink {
    /// `read_timeout` bounds how long a read waits for the next byte
    pub fn new(read_timeout: Duration) -> Self {
        log::info!("Using simulated robot (no serial hardware)");
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(StubState {
                    input: VecDeque::new(),
                    stream_ids: Vec::new(),
                    streaming: false,
                    next_frame: Instant::now(),
                    tick: 0,
                    mode: 0,
                    velocity: 0,
                    radius: 0,
                }),
                changed: Condvar::new(),
            }),
            read_timeout,
        }
    }

    /// OI mode the simulated robot is in
    pub fn oi_mode(&self) -> u8 {
        self.shared.state.lock().mode
    }

    /// Last drive command as (velocity, radius)
    pub fn drive_state(&self) -> (i32, i32) {
        let state = self.shared.state.lock();
        (state.velocity, state.radius)
    }
}

impl StubState {
    /// Queue every frame that is due
    fn pump(&mut self) {
        if !self.streaming || self.stream_ids.is_empty() {
            return;
        }
        let now = Instant::now();
        if now.duration_since(self.next_frame) > MAX_CATCH_UP {
            self.next_frame = now;
        }
        while self.next_frame <= now {
            self.emit_frame();
            self.next_frame += FRAME_PERIOD;
        }
    }

    fn emit_frame(&mut self) {
        let fields: Vec<(u8, i32)> = self
            .stream_ids
            .iter()
            .filter_map(|&id| packets::lookup(id))
            .map(|spec| (spec.id, self.value(&spec)))
            .collect();
        match build_frame(&fields) {
            Ok(frame) => self.input.extend(frame),
            Err(e) => log::warn!("Stub: cannot build frame: {}", e),
        }
        self.tick = self.tick.wrapping_add(1);
    }

    fn value(&self, spec: &PacketSpec) -> i32 {
        match spec.id {
            OI_MODE => self.mode as i32,
            REQUESTED_VELOCITY => self.velocity,
            REQUESTED_RADIUS => self.radius,
            id => {
                let phase = (self.tick + id as u32 * 7) % (2 * WAVE_PEAK);
                let level = if phase < WAVE_PEAK {
                    phase
                } else {
                    2 * WAVE_PEAK - phase
                };
                level as i32
            }
        }
    }

    fn respond_zeros(&mut self, size: usize) {
        self.input.extend(std::iter::repeat_n(0u8, size));
    }

    /// Apply every complete command in `data`
    fn handle_commands(&mut self, data: &[u8]) {
        let mut rest = data;
        while let Some(&opcode) = rest.first() {
            let Some(len) = command_len(rest) else {
                log::warn!("Stub: unknown or truncated command [{}]", hex(rest));
                return;
            };
            let (command, tail) = rest.split_at(len);
            self.handle_command(opcode, &command[1..]);
            rest = tail;
        }
    }

    fn handle_command(&mut self, opcode: u8, params: &[u8]) {
        log::debug!("Stub: opcode {} [{}]", opcode, hex(params));
        match opcode {
            OP_START | OP_POWER | OP_SPOT | OP_CLEAN | OP_MAX | OP_SEEK_DOCK => self.mode = 1,
            OP_SAFE => self.mode = 2,
            OP_FULL => self.mode = 3,
            OP_DRIVE => {
                self.velocity = i16::from_be_bytes([params[0], params[1]]) as i32;
                self.radius = i16::from_be_bytes([params[2], params[3]]) as i32;
            }
            OP_SENSORS => match packets::response_size(params[0]) {
                Ok(size) => self.respond_zeros(size),
                Err(e) => log::warn!("Stub: {}", e),
            },
            OP_QUERY_LIST => {
                let size = params[1..]
                    .iter()
                    .filter_map(|&id| packets::lookup(id))
                    .map(|spec| spec.size())
                    .sum();
                self.respond_zeros(size);
            }
            OP_STREAM => {
                self.stream_ids = params[1..].to_vec();
                self.streaming = !self.stream_ids.is_empty();
                self.next_frame = Instant::now() + FRAME_PERIOD;
            }
            OP_PAUSE_RESUME_STREAM => {
                let resume = params[0] == 1;
                if resume && !self.streaming {
                    self.next_frame = Instant::now() + FRAME_PERIOD;
                }
                self.streaming = resume && !self.stream_ids.is_empty();
            }
            _ => {}
        }
    }
}

/// Total length of the command starting at `data[0]`, if complete and known
fn command_len(data: &[u8]) -> Option<usize> {
    let params = match data[0] {
        OP_START | OP_SAFE | OP_FULL | OP_POWER | OP_SPOT | OP_CLEAN | OP_MAX
        | OP_SEEK_DOCK => 0,
        OP_BAUD | OP_PLAY | OP_SENSORS | OP_PAUSE_RESUME_STREAM | OP_BUTTONS => 1,
        OP_LEDS | OP_PWM_MOTORS | OP_SET_DAY_TIME => 3,
        OP_DRIVE | OP_DRIVE_PWM => 4,
        OP_SCHEDULE => 15,
        OP_STREAM | OP_QUERY_LIST => 1 + *data.get(1)? as usize,
        _ => return None,
    };
    let len = 1 + params;
    (data.len() >= len).then_some(len)
}

impl SerialRobotLink for StubLink {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let deadline = Instant::now() + self.read_timeout;
        let mut state = self.shared.state.lock();
        loop {
            state.pump();
            if !state.input.is_empty() || Instant::now() >= deadline {
                break;
            }
            let wake_at = if state.streaming {
                state.next_frame.min(deadline)
            } else {
                deadline
            };
            self.shared.changed.wait_until(&mut state, wake_at);
        }

        let count = state.input.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(state.input.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.pump();
        state.handle_commands(data);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        let mut state = self.shared.state.lock();
        state.pump();
        Ok(state.input.len())
    }

    fn discard_input(&mut self) -> Result<usize> {
        let mut state = self.shared.state.lock();
        state.pump();
        let dropped = state.input.len();
        state.input.clear();
        Ok(dropped)
    }

    fn try_clone_link(&self) -> Result<Box<dyn SerialRobotLink>> {
        Ok(Box::new(self.clone()))
    }

    fn describe(&self) -> String {
        "simulated robot".to_string()
    }
}
