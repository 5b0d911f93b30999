//! Telemetry frame decoding
//!
//! While streaming, the robot sends one frame every 15 ms:
//!
//! ```text
//! ┌────────┬────────┬─────┬──────────┬─────┬──────────┬──────────┐
//! │ 19     │ n      │ id1 │ value1   │ ... │ valueN   │ checksum │
//! │ header │ length │     │ 1|2 byte │     │          │          │
//! └────────┴────────┴─────┴──────────┴─────┴──────────┴──────────┘
//! ```
//!
//! `n` counts the id and value bytes. All bytes of a good frame, checksum
//! included, sum to zero modulo 256.
//!
//! [`FrameDecoder::next_frame`] consumes exactly one element per call and
//! never tries to salvage a damaged one: the next header is the resync point.

use super::snapshot::StreamStatus;
use crate::error::{Error, Result};
use crate::link::{SerialRobotLink, read_exact_within};
use crate::oi::constants::STREAM_HEADER;
use crate::oi::packets::{self, PacketSpec};
use std::collections::HashMap;
use std::time::Duration;

/// Result of one [`FrameDecoder::next_frame`] call
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Nothing arrived within one device read
    Idle,
    /// A frame decoded with a good checksum
    Good(HashMap<u8, i32>),
    /// A frame or byte was rejected
    Fault(StreamStatus),
}

/// Decoder for one stream request's frames
pub struct FrameDecoder {
    specs: Vec<PacketSpec>,
    frame_timeout: Duration,
}

impl FrameDecoder {
    /// Decoder for frames carrying `ids` in order
    pub fn new(ids: &[u8], frame_timeout: Duration) -> Result<Self> {
        Ok(Self {
            specs: packets::list_specs(ids)?,
            frame_timeout,
        })
    }

    /// Read and decode the next element from `link`
    pub fn next_frame(&mut self, link: &mut dyn SerialRobotLink) -> Result<FrameOutcome> {
        let mut header = [0u8; 1];
        if link.read(&mut header)? == 0 {
            return Ok(FrameOutcome::Idle);
        }
        if header[0] != STREAM_HEADER {
            log::trace!("Out of sync: 0x{:02X} where header expected", header[0]);
            return Ok(FrameOutcome::Fault(StreamStatus::LostSync));
        }

        match self.decode_body(link) {
            Err(Error::SerialTimeout { needed, available, .. }) => {
                log::trace!("Frame cut short ({}/{} bytes)", available, needed);
                Ok(FrameOutcome::Fault(StreamStatus::LostSync))
            }
            other => other,
        }
    }

    /// Everything after the header byte
    fn decode_body(&mut self, link: &mut dyn SerialRobotLink) -> Result<FrameOutcome> {
        let mut byte = [0u8; 1];
        read_exact_within(link, &mut byte, self.frame_timeout)?;
        let length = byte[0];
        let element = length as usize + 3;

        // The rest of this frame is element - 2 bytes; anything beyond a
        // whole further element means we are behind the robot
        let available = link.available()?;
        if available >= 2 * element - 2 {
            let stale = available / element * element;
            let dropped = link.skip(stale)?;
            log::trace!("Backlog: dropped {} of {} buffered bytes", dropped, available);
            return Ok(FrameOutcome::Fault(StreamStatus::Backlog));
        }

        let mut sum = STREAM_HEADER.wrapping_add(length);
        let mut remaining = length as usize;
        let mut values = HashMap::with_capacity(self.specs.len());
        let mut raw = [0u8; 2];

        for spec in &self.specs {
            read_exact_within(link, &mut byte, self.frame_timeout)?;
            sum = sum.wrapping_add(byte[0]);
            remaining = remaining.saturating_sub(1);

            if byte[0] != spec.id {
                log::trace!("Expected packet {} got {}", spec.id, byte[0]);
                // Rest of the payload plus the checksum
                let mut rest = vec![0u8; remaining + 1];
                read_exact_within(link, &mut rest, self.frame_timeout)?;
                return Ok(FrameOutcome::Fault(StreamStatus::WrongPacketId));
            }

            let field = &mut raw[..spec.size()];
            read_exact_within(link, field, self.frame_timeout)?;
            for &b in field.iter() {
                sum = sum.wrapping_add(b);
            }
            remaining = remaining.saturating_sub(spec.size());
            values.insert(spec.id, spec.decode(field));
        }

        read_exact_within(link, &mut byte, self.frame_timeout)?;
        sum = sum.wrapping_add(byte[0]);

        if sum == 0 {
            Ok(FrameOutcome::Good(values))
        } else {
            log::trace!("Checksum failure (sum 0x{:02X})", sum);
            Ok(FrameOutcome::Fault(StreamStatus::ChecksumFailure))
        }
    }
}

/// Encode one telemetry frame the way the robot sends it
///
/// Values are truncated to their packet's width. Fails on ids outside the
/// sensor table.
pub fn build_frame(fields: &[(u8, i32)]) -> Result<Vec<u8>> {
    let mut frame = vec![STREAM_HEADER, 0];
    let mut raw = [0u8; 2];
    for &(id, value) in fields {
        let spec = packets::spec(id)?;
        frame.push(id);
        let n = spec.encode(value, &mut raw);
        frame.extend_from_slice(&raw[..n]);
    }
    let length = frame.len() - 2;
    if length > u8::MAX as usize {
        return Err(Error::InvalidArgument(format!(
            "frame payload of {} bytes does not fit the length byte",
            length
        )));
    }
    frame[1] = length as u8;
    let sum = frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    frame.push(sum.wrapping_neg());
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MockLink;
    use crate::oi::constants::LIGHT_BUMP_IDS;

    const TIMEOUT: Duration = Duration::from_millis(30);

    fn light_bump_frame() -> Vec<u8> {
        build_frame(&[(46, 10), (47, 20), (48, 5), (49, 5), (50, 20), (51, 10)]).unwrap()
    }

    fn decoder() -> FrameDecoder {
        FrameDecoder::new(&LIGHT_BUMP_IDS, TIMEOUT).unwrap()
    }

    #[test]
    fn test_build_frame_layout() {
        let frame = light_bump_frame();
        assert_eq!(
            &frame[..20],
            &[
                19, 18, 46, 0, 10, 47, 0, 20, 48, 0, 5, 49, 0, 5, 50, 0, 20, 51, 0, 10
            ]
        );
        let sum = frame.iter().fold(0u8, |a, &b| a.wrapping_add(b));
        assert_eq!(sum, 0);
    }

    #[test]
    fn test_good_frame() {
        let mut link = MockLink::new();
        link.inject_read(&light_bump_frame());

        let outcome = decoder().next_frame(&mut link).unwrap();
        let FrameOutcome::Good(values) = outcome else {
            panic!("expected good frame, got {outcome:?}");
        };
        assert_eq!(values[&46], 10);
        assert_eq!(values[&47], 20);
        assert_eq!(values[&48], 5);
        assert_eq!(values[&49], 5);
        assert_eq!(values[&50], 20);
        assert_eq!(values[&51], 10);
        assert_eq!(link.available().unwrap(), 0);
    }

    #[test]
    fn test_signed_values() {
        let mut link = MockLink::new();
        link.inject_read(&build_frame(&[(19, -5), (7, 3)]).unwrap());
        let mut decoder = FrameDecoder::new(&[19, 7], TIMEOUT).unwrap();
        let outcome = decoder.next_frame(&mut link).unwrap();
        let FrameOutcome::Good(values) = outcome else {
            panic!("expected good frame, got {outcome:?}");
        };
        assert_eq!(values[&19], -5);
        assert_eq!(values[&7], 3);
    }

    #[test]
    fn test_idle_when_silent() {
        let mut link = MockLink::new();
        assert_eq!(decoder().next_frame(&mut link).unwrap(), FrameOutcome::Idle);
    }

    #[test]
    fn test_lost_sync_on_non_header() {
        let mut link = MockLink::new();
        link.inject_read(&[0x42]);
        assert_eq!(
            decoder().next_frame(&mut link).unwrap(),
            FrameOutcome::Fault(StreamStatus::LostSync)
        );
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut link = MockLink::new();
        link.inject_read(&[0x00, 0x33]);
        link.inject_read(&light_bump_frame());

        let mut decoder = decoder();
        let mut outcomes = Vec::new();
        loop {
            let outcome = decoder.next_frame(&mut link).unwrap();
            if outcome == FrameOutcome::Idle {
                break;
            }
            outcomes.push(outcome);
        }
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], FrameOutcome::Fault(StreamStatus::LostSync));
        assert_eq!(outcomes[1], FrameOutcome::Fault(StreamStatus::LostSync));
        assert!(matches!(outcomes[2], FrameOutcome::Good(_)));
    }

    #[test]
    fn test_every_single_byte_mutation_is_rejected() {
        let good = light_bump_frame();
        // Skip header (lost sync) and length (changes framing)
        for index in 2..good.len() {
            let mut frame = good.clone();
            frame[index] = frame[index].wrapping_add(1);

            let mut link = MockLink::new();
            link.inject_read(&frame);
            let outcome = decoder().next_frame(&mut link).unwrap();
            assert!(
                matches!(
                    outcome,
                    FrameOutcome::Fault(StreamStatus::ChecksumFailure)
                        | FrameOutcome::Fault(StreamStatus::WrongPacketId)
                ),
                "byte {index}: {outcome:?}"
            );
        }
    }

    #[test]
    fn test_value_mutation_is_checksum_failure() {
        let mut frame = light_bump_frame();
        frame[4] = 11;
        let mut link = MockLink::new();
        link.inject_read(&frame);
        assert_eq!(
            decoder().next_frame(&mut link).unwrap(),
            FrameOutcome::Fault(StreamStatus::ChecksumFailure)
        );
        assert_eq!(link.available().unwrap(), 0);
    }

    #[test]
    fn test_wrong_packet_id_skips_element() {
        let wrong = build_frame(&[(45, 1), (47, 20)]).unwrap();
        let mut link = MockLink::new();
        link.inject_read(&wrong);
        link.inject_read(&light_bump_frame());

        let mut decoder = decoder();
        assert_eq!(
            decoder.next_frame(&mut link).unwrap(),
            FrameOutcome::Fault(StreamStatus::WrongPacketId)
        );
        // Next read lands on the following header
        assert!(matches!(
            decoder.next_frame(&mut link).unwrap(),
            FrameOutcome::Good(_)
        ));
    }

    #[test]
    fn test_backlog_drops_whole_elements() {
        let frame = light_bump_frame();
        let k = frame.len();
        assert_eq!(k, 18 + 3);

        let mut link = MockLink::new();
        for _ in 0..3 {
            link.inject_read(&frame);
        }
        let mut decoder = decoder();
        assert_eq!(
            decoder.next_frame(&mut link).unwrap(),
            FrameOutcome::Fault(StreamStatus::Backlog)
        );
        // After header + length: 3k - 2 buffered, floor((3k-2)/k)*k = 2k dropped
        assert_eq!(link.available().unwrap(), k - 2);
    }

    #[test]
    fn test_exactly_one_frame_is_not_backlog() {
        let frame = light_bump_frame();
        let mut link = MockLink::new();
        link.inject_read(&frame);
        // One byte short of a second element
        link.inject_read(&frame[..frame.len() - 1]);

        let outcome = decoder().next_frame(&mut link).unwrap();
        assert!(matches!(outcome, FrameOutcome::Good(_)), "{outcome:?}");
    }

    #[test]
    fn test_truncated_frame_is_lost_sync() {
        let frame = light_bump_frame();
        let mut link = MockLink::new();
        link.inject_read(&frame[..8]);
        assert_eq!(
            decoder().next_frame(&mut link).unwrap(),
            FrameOutcome::Fault(StreamStatus::LostSync)
        );
    }

    #[test]
    fn test_fields_follow_request_not_length_byte() {
        // Length byte disagrees with the payload; fields are read per request
        let frame = [
            19, 12, 46, 0, 10, 47, 0, 20, 48, 0, 5, 49, 0, 5, 50, 0, 20, 51, 0, 10, 120,
        ];
        let mut link = MockLink::new();
        link.inject_read(&frame);

        let FrameOutcome::Good(values) = decoder().next_frame(&mut link).unwrap() else {
            panic!("expected good frame");
        };
        assert_eq!(values.len(), 6);
        assert_eq!(values[&50], 20);
        assert_eq!(link.available().unwrap(), 0);
    }

    #[test]
    fn test_build_frame_rejects_unknown_ids() {
        assert!(matches!(
            build_frame(&[(100, 0)]),
            Err(Error::UnknownPacket(100))
        ));
    }
}
