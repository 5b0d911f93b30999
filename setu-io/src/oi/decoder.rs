//! Single-shot sensor queries
//!
//! Sends a `142`/`149` request, waits until the full response is buffered,
//! then decodes each field from the packet table. The wait is bounded; on
//! expiry the query fails with [`Error::SerialTimeout`] and whatever partial
//! response arrived is left for the caller to discard.

use super::commands::TxPacket;
use super::constants::{FIRST_SENSOR_ID, LAST_SENSOR_ID};
use super::packets::{self, PacketSpec};
use crate::error::{Error, Result};
use crate::link::{CommandPort, SerialRobotLink, read_exact_within, wait_for};
use std::time::Duration;

/// Decoder for request/response sensor queries
#[derive(Debug, Clone, Copy)]
pub struct SensorDecoder {
    timeout: Duration,
    slices: u32,
}

impl SensorDecoder {
    /// `timeout` bounds the wait for each response, polled in `slices` steps
    pub fn new(timeout: Duration, slices: u32) -> Self {
        Self {
            timeout,
            slices: slices.max(1),
        }
    }

    /// Query one sensor packet (ids 7-58)
    pub fn query_sensor(
        &self,
        port: &CommandPort,
        link: &mut dyn SerialRobotLink,
        id: u8,
    ) -> Result<i32> {
        if !(FIRST_SENSOR_ID..=LAST_SENSOR_ID).contains(&id) {
            return Err(Error::InvalidArgument(format!(
                "packet {} is not a single sensor value, use a group query",
                id
            )));
        }
        let spec = packets::spec(id)?;

        let mut pkt = TxPacket::new();
        pkt.set_query_sensor(id)?;
        port.send(&pkt)?;

        let mut raw = [0u8; 2];
        self.read_response(link, &mut raw[..spec.size()])?;
        let value = spec.decode(&raw);
        log::trace!("Sensor {} = {}", id, value);
        Ok(value)
    }

    /// Query a group packet, storing each member at `results[id]`
    ///
    /// Slots for ids outside the group are left untouched. `results` must be
    /// long enough to index the group's last member.
    pub fn query_group(
        &self,
        port: &CommandPort,
        link: &mut dyn SerialRobotLink,
        group_id: u8,
        results: &mut [i32],
    ) -> Result<()> {
        let group = packets::group(group_id)?;
        if results.len() <= group.last as usize {
            return Err(Error::InvalidArgument(format!(
                "results buffer of {} slots cannot hold packet {}",
                results.len(),
                group.last
            )));
        }
        let specs = group
            .members()
            .map(packets::spec)
            .collect::<Result<Vec<_>>>()?;

        let mut pkt = TxPacket::new();
        pkt.set_query_sensor(group_id)?;
        port.send(&pkt)?;

        let mut raw = vec![0u8; group.size];
        self.read_response(link, &mut raw)?;
        for (spec, value) in decode_run(&specs, &raw) {
            results[spec.id as usize] = value;
        }
        log::trace!("Group {} decoded ({} bytes)", group_id, group.size);
        Ok(())
    }

    /// Query an arbitrary list of sensor ids, storing values in request order
    pub fn query_list(
        &self,
        port: &CommandPort,
        link: &mut dyn SerialRobotLink,
        ids: &[u8],
        results: &mut [i32],
    ) -> Result<()> {
        let specs = packets::list_specs(ids)?;
        if results.len() < ids.len() {
            return Err(Error::InvalidArgument(format!(
                "results buffer of {} slots cannot hold {} values",
                results.len(),
                ids.len()
            )));
        }

        let mut pkt = TxPacket::new();
        pkt.set_query_list(ids)?;
        port.send(&pkt)?;

        let size = specs.iter().map(PacketSpec::size).sum();
        let mut raw = vec![0u8; size];
        self.read_response(link, &mut raw)?;
        for (slot, (_, value)) in results.iter_mut().zip(decode_run(&specs, &raw)) {
            *slot = value;
        }
        Ok(())
    }

    fn read_response(&self, link: &mut dyn SerialRobotLink, buffer: &mut [u8]) -> Result<()> {
        wait_for(link, buffer.len(), self.timeout, self.slices)?;
        read_exact_within(link, buffer, self.timeout)
    }
}

/// Decode back-to-back values laid out as `specs` describes
fn decode_run<'a>(
    specs: &'a [PacketSpec],
    raw: &'a [u8],
) -> impl Iterator<Item = (&'a PacketSpec, i32)> + 'a {
    let mut offset = 0;
    specs.iter().map(move |spec| {
        let value = spec.decode(&raw[offset..offset + spec.size()]);
        offset += spec.size();
        (spec, value)
    })
}
