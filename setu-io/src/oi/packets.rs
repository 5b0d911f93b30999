//! Sensor packet table
//!
//! Every sensor packet (ids 7-58) is either one or two bytes wide. Two-byte
//! values are big-endian. Only distance, angle, current, the requested
//! velocities/radius and the motor currents are signed; all one-byte fields
//! are unsigned.
//!
//! Group packets (0-6, 100, 106, 107) return a contiguous run of sensor
//! packets in one response. Their byte sizes are computed from the table at
//! compile time rather than written out by hand.

use super::constants::*;
use crate::error::{Error, Result};

/// Field width on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    One,
    Two,
}

impl Width {
    pub const fn bytes(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
        }
    }
}

/// Width and signedness of one sensor packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSpec {
    pub id: u8,
    pub width: Width,
    pub signed: bool,
}

impl PacketSpec {
    /// Bytes occupied by the value
    pub const fn size(&self) -> usize {
        self.width.bytes()
    }

    /// Decode a big-endian value of this packet's width
    ///
    /// `bytes` must hold at least [`PacketSpec::size`] bytes.
    pub fn decode(&self, bytes: &[u8]) -> i32 {
        match (self.width, self.signed) {
            (Width::One, false) => bytes[0] as i32,
            (Width::One, true) => bytes[0] as i8 as i32,
            (Width::Two, false) => u16::from_be_bytes([bytes[0], bytes[1]]) as i32,
            (Width::Two, true) => i16::from_be_bytes([bytes[0], bytes[1]]) as i32,
        }
    }

    /// Encode `value` into `out`, returns the number of bytes written
    ///
    /// Values outside the field's range are truncated to its width.
    pub fn encode(&self, value: i32, out: &mut [u8]) -> usize {
        match self.width {
            Width::One => {
                out[0] = value as u8;
                1
            }
            Width::Two => {
                out[..2].copy_from_slice(&(value as u16).to_be_bytes());
                2
            }
        }
    }

    /// Smallest and largest value the field can carry
    pub const fn range(&self) -> (i32, i32) {
        match (self.width, self.signed) {
            (Width::One, false) => (0, u8::MAX as i32),
            (Width::One, true) => (i8::MIN as i32, i8::MAX as i32),
            (Width::Two, false) => (0, u16::MAX as i32),
            (Width::Two, true) => (i16::MIN as i32, i16::MAX as i32),
        }
    }
}

/// A group packet: contiguous sensor ids returned in one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSpec {
    pub id: u8,
    pub first: u8,
    pub last: u8,
    /// Total response size in bytes
    pub size: usize,
}

impl GroupSpec {
    const fn new(id: u8, first: u8, last: u8) -> Self {
        Self {
            id,
            first,
            last,
            size: run_size(first, last),
        }
    }

    /// Member ids in response order
    pub fn members(&self) -> std::ops::RangeInclusive<u8> {
        self.first..=self.last
    }
}

/// Table lookup for sensor ids
pub const fn lookup(id: u8) -> Option<PacketSpec> {
    let (width, signed) = match id {
        BUMPS..=BUTTONS => (Width::One, false),
        DISTANCE | ANGLE => (Width::Two, true),
        CHARGING_STATE => (Width::One, false),
        VOLTAGE => (Width::Two, false),
        CURRENT => (Width::Two, true),
        TEMPERATURE => (Width::One, false),
        BATTERY_CHARGE | BATTERY_CAPACITY => (Width::Two, false),
        WALL_SIGNAL..=CLIFF_R_SIGNAL => (Width::Two, false),
        UNUSED_32 => (Width::One, false),
        UNUSED_33 => (Width::Two, false),
        CHARGING_SOURCES..=STREAM_PACKETS => (Width::One, false),
        REQUESTED_VELOCITY..=REQUESTED_VELOCITY_L => (Width::Two, true),
        ENCODER_R | ENCODER_L => (Width::Two, false),
        LIGHT_BUMPER => (Width::One, false),
        LIGHT_BUMP_L..=LIGHT_BUMP_R => (Width::Two, false),
        IR_CHAR_L | IR_CHAR_R => (Width::One, false),
        MOTOR_CURRENT_L..=MOTOR_CURRENT_SIDE_BRUSH => (Width::Two, true),
        STASIS => (Width::One, false),
        _ => return None,
    };
    Some(PacketSpec { id, width, signed })
}

/// Sum of member widths for the ids `first..=last`
///
/// Ids without a table entry count as zero.
pub const fn run_size(first: u8, last: u8) -> usize {
    let mut total = 0;
    let mut id = first;
    while id <= last {
        if let Some(spec) = lookup(id) {
            total += spec.size();
        }
        if id == u8::MAX {
            break;
        }
        id += 1;
    }
    total
}

/// All group packets
pub const GROUPS: [GroupSpec; 10] = [
    GroupSpec::new(0, BUMPS, BATTERY_CAPACITY),
    GroupSpec::new(1, BUMPS, UNUSED_16),
    GroupSpec::new(2, IR_OMNI, ANGLE),
    GroupSpec::new(3, CHARGING_STATE, BATTERY_CAPACITY),
    GroupSpec::new(4, WALL_SIGNAL, CHARGING_SOURCES),
    GroupSpec::new(5, OI_MODE, REQUESTED_VELOCITY_L),
    GroupSpec::new(6, BUMPS, REQUESTED_VELOCITY_L),
    GroupSpec::new(100, BUMPS, STASIS),
    GroupSpec::new(106, LIGHT_BUMP_L, LIGHT_BUMP_R),
    GroupSpec::new(107, MOTOR_CURRENT_L, STASIS),
];

/// Width and signedness of a sensor packet
pub fn width_and_sign(id: u8) -> Result<(Width, bool)> {
    let spec = spec(id)?;
    Ok((spec.width, spec.signed))
}

/// Table entry for a sensor packet
pub fn spec(id: u8) -> Result<PacketSpec> {
    lookup(id).ok_or(Error::UnknownPacket(id))
}

/// Group definition for a group packet id
pub fn group(id: u8) -> Result<GroupSpec> {
    GROUPS
        .iter()
        .find(|g| g.id == id)
        .copied()
        .ok_or(Error::UnknownGroup(id))
}

/// True for single sensor packet ids (7-58)
pub const fn is_sensor(id: u8) -> bool {
    lookup(id).is_some()
}

/// Bytes the robot answers with for a `142 id` query
pub fn response_size(id: u8) -> Result<usize> {
    match lookup(id) {
        Some(spec) => Ok(spec.size()),
        None => group(id).map(|g| g.size),
    }
}

/// Validate an id list for stream or list queries, returning the specs in order
pub fn list_specs(ids: &[u8]) -> Result<Vec<PacketSpec>> {
    if ids.is_empty() || ids.len() > MAX_LIST_IDS {
        return Err(Error::InvalidArgument(format!(
            "packet list must hold 1..={} ids, got {}",
            MAX_LIST_IDS,
            ids.len()
        )));
    }
    ids.iter().map(|&id| spec(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_sensor_has_width() {
        for id in FIRST_SENSOR_ID..=LAST_SENSOR_ID {
            let (width, _) = width_and_sign(id).unwrap();
            assert!(matches!(width.bytes(), 1 | 2), "id {id}");
        }
    }

    #[test]
    fn test_unknown_ids() {
        for id in [0u8, 6, 59, 69, 100, 255] {
            assert!(matches!(spec(id), Err(Error::UnknownPacket(i)) if i == id));
        }
    }

    #[test]
    fn test_signed_fields() {
        let signed: Vec<u8> = (FIRST_SENSOR_ID..=LAST_SENSOR_ID)
            .filter(|&id| spec(id).unwrap().signed)
            .collect();
        assert_eq!(signed, vec![19, 20, 23, 39, 40, 41, 42, 54, 55, 56, 57]);
        for id in signed {
            assert_eq!(spec(id).unwrap().width, Width::Two);
        }
    }

    #[test]
    fn test_group_sizes() {
        let expected = [
            (0, 7, 26, 26),
            (1, 7, 16, 10),
            (2, 17, 20, 6),
            (3, 21, 26, 10),
            (4, 27, 34, 14),
            (5, 35, 42, 12),
            (6, 7, 42, 52),
            (100, 7, 58, 80),
            (106, 46, 51, 12),
            (107, 54, 58, 9),
        ];
        for (id, first, last, size) in expected {
            let g = group(id).unwrap();
            assert_eq!((g.first, g.last, g.size), (first, last, size), "group {id}");
        }
    }

    #[test]
    fn test_unknown_group() {
        assert!(matches!(group(101), Err(Error::UnknownGroup(101))));
        assert!(matches!(group(7), Err(Error::UnknownGroup(7))));
        assert!(matches!(response_size(101), Err(Error::UnknownGroup(101))));
    }

    #[test]
    fn test_response_size() {
        assert_eq!(response_size(ANGLE).unwrap(), 2);
        assert_eq!(response_size(BUMPS).unwrap(), 1);
        assert_eq!(response_size(106).unwrap(), 12);
    }

    #[test]
    fn test_decode_signedness() {
        let angle = spec(ANGLE).unwrap();
        assert_eq!(angle.decode(&[0xFF, 0xFE]), -2);

        let voltage = spec(VOLTAGE).unwrap();
        assert_eq!(voltage.decode(&[0xFF, 0xFE]), 65534);

        let bumps = spec(BUMPS).unwrap();
        assert_eq!(bumps.decode(&[0xFF]), 255);
    }

    #[test]
    fn test_values_survive_the_wire() {
        for id in FIRST_SENSOR_ID..=LAST_SENSOR_ID {
            let spec = spec(id).unwrap();
            let (min, max) = spec.range();
            for value in [min, (min + max) / 2, max] {
                let mut buf = [0u8; 2];
                let n = spec.encode(value, &mut buf);
                assert_eq!(n, spec.size());
                assert_eq!(spec.decode(&buf[..n]), value, "id {id} value {value}");
            }
        }
    }

    #[test]
    fn test_list_specs_limits() {
        assert!(matches!(list_specs(&[]), Err(Error::InvalidArgument(_))));
        let all: Vec<u8> = (FIRST_SENSOR_ID..=LAST_SENSOR_ID).collect();
        assert_eq!(list_specs(&all).unwrap().len(), MAX_LIST_IDS);
        let too_many: Vec<u8> = std::iter::repeat_n(BUMPS, MAX_LIST_IDS + 1).collect();
        assert!(matches!(
            list_specs(&too_many),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(list_specs(&[46, 100]), Err(Error::UnknownPacket(100))));
    }
}
