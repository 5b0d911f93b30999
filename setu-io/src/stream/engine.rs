//! Stream engine: the only reader of the serial link
//!
//! The `oi-stream` thread owns the read half of the link. Other threads talk
//! to it through messages:
//!
//! - **Stream requests** go into a single pending slot. A newer request
//!   replaces an older one the thread has not picked up yet, so only the
//!   latest list ever reaches the robot.
//! - **Queries** (single sensor, group, list, pause/resume) are sent over a
//!   channel with a reply channel attached.
//!
//! Decoded frames are published as immutable
//! [`StreamSnapshot`](super::StreamSnapshot)s through a
//! [`SnapshotHandle`]; frame faults become the snapshot's status and heal on
//! the next good frame.
//!
//! ```text
//!            set_stream_list()          query_*()
//!                   │                       │
//!            pending slot + wake       query channel
//!                   └──────────┬────────────┘
//!                              ▼
//!   link.read() ──────────> oi-stream ──────────> SnapshotHandle
//!                              │
//!                              └── 148 / 150 / 142 / 149 ──> CommandPort
//! ```

use super::frame::{FrameDecoder, FrameOutcome};
use super::snapshot::{SnapshotHandle, StreamStatus};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::link::{CommandPort, SerialRobotLink};
use crate::oi::constants::{FIRST_SENSOR_ID, LAST_SENSOR_ID};
use crate::oi::packets;
use crate::oi::{SensorDecoder, TxPacket};
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Timing for the stream engine
#[derive(Debug, Clone, Copy)]
pub struct StreamEngineConfig {
    /// Bounded wait for the rest of a frame after its header
    pub frame_timeout: Duration,
    /// Bounded wait for a query response
    pub query_timeout: Duration,
    /// Sub-intervals the query wait is polled in
    pub poll_slices: u32,
    /// How long the idle thread waits for work before re-checking state
    pub idle_poll: Duration,
}

impl StreamEngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            frame_timeout: config.stream.frame_timeout(),
            query_timeout: config.sensors.query_timeout(),
            poll_slices: config.sensors.poll_slices,
            idle_poll: config.device.read_timeout(),
        }
    }
}

impl Default for StreamEngineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Ordered packet ids to stream; empty means stop streaming
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRequest {
    ids: Vec<u8>,
}

impl StreamRequest {
    /// Validated request; an empty slice is a stop request
    pub fn new(ids: &[u8]) -> Result<Self> {
        if !ids.is_empty() {
            packets::list_specs(ids)?;
        }
        Ok(Self { ids: ids.to_vec() })
    }

    pub fn ids(&self) -> &[u8] {
        &self.ids
    }

    pub fn is_stop(&self) -> bool {
        self.ids.is_empty()
    }
}

enum Query {
    Sensor {
        id: u8,
        reply: Sender<Result<i32>>,
    },
    Group {
        id: u8,
        reply: Sender<Result<Vec<i32>>>,
    },
    List {
        ids: Vec<u8>,
        reply: Sender<Result<Vec<i32>>>,
    },
    PauseResume {
        resume: bool,
        reply: Sender<Result<()>>,
    },
}

/// Handle onto the `oi-stream` thread
pub struct StreamEngine {
    pending: Arc<Mutex<Option<StreamRequest>>>,
    wake: Sender<()>,
    queries: Sender<Query>,
    snapshot: SnapshotHandle,
    /// Last requested list was non-empty
    streaming: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StreamEngine {
    /// Spawn the stream thread
    ///
    /// `link` is the read half; commands the engine issues itself go
    /// through `port`.
    pub fn spawn(
        link: Box<dyn SerialRobotLink>,
        port: CommandPort,
        config: StreamEngineConfig,
    ) -> Result<Self> {
        let pending = Arc::new(Mutex::new(None));
        let (wake_tx, wake_rx) = bounded(1);
        let (query_tx, query_rx) = unbounded();
        let snapshot = SnapshotHandle::new();
        let running = Arc::new(AtomicBool::new(true));

        let mut worker = Worker {
            link,
            port,
            decoder: SensorDecoder::new(config.query_timeout, config.poll_slices),
            config,
            frames: None,
            paused: false,
            pending: Arc::clone(&pending),
            wake: wake_rx,
            queries: query_rx,
            snapshot: snapshot.clone(),
            running: Arc::clone(&running),
            stats: FrameStats::default(),
        };

        let handle = thread::Builder::new()
            .name("oi-stream".to_string())
            .spawn(move || worker.run())
            .map_err(|e| Error::Other(format!("Failed to spawn stream thread: {}", e)))?;

        Ok(Self {
            pending,
            wake: wake_tx,
            queries: query_tx,
            snapshot,
            streaming: Arc::new(AtomicBool::new(false)),
            running,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Replace the streamed packet list
    ///
    /// Returns the snapshot handle straight away; the thread picks the
    /// request up on its next iteration. Only the latest request made before
    /// then takes effect. An empty list stops streaming.
    ///
    /// The handle already shows an empty snapshot, and no frame decoded
    /// against an earlier list is published after this returns.
    pub fn set_stream_list(&self, ids: &[u8]) -> Result<SnapshotHandle> {
        let request = StreamRequest::new(ids)?;
        log::info!("Stream list -> {:?}", request.ids());
        self.streaming.store(!request.is_stop(), Ordering::SeqCst);
        {
            let mut pending = self.pending.lock();
            *pending = Some(request);
            self.snapshot.reset();
        }
        // A wake-up already queued covers this request too
        let _ = self.wake.try_send(());
        Ok(self.snapshot.clone())
    }

    /// Handle for reading published snapshots
    pub fn snapshot(&self) -> SnapshotHandle {
        self.snapshot.clone()
    }

    /// True when the last requested list was non-empty
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Query one sensor packet (ids 7-58)
    pub fn query_sensor(&self, id: u8) -> Result<i32> {
        if !(FIRST_SENSOR_ID..=LAST_SENSOR_ID).contains(&id) {
            return Err(Error::InvalidArgument(format!(
                "packet {} is not a single sensor value, use a group query",
                id
            )));
        }
        self.ensure_idle()?;
        self.ask(|reply| Query::Sensor { id, reply })
    }

    /// Query a group packet; the result is indexed by packet id
    pub fn query_group(&self, id: u8) -> Result<Vec<i32>> {
        packets::group(id)?;
        self.ensure_idle()?;
        self.ask(|reply| Query::Group { id, reply })
    }

    /// Query a list of sensor ids; the result is in request order
    pub fn query_list(&self, ids: &[u8]) -> Result<Vec<i32>> {
        packets::list_specs(ids)?;
        self.ensure_idle()?;
        let ids = ids.to_vec();
        self.ask(|reply| Query::List { ids, reply })
    }

    /// Pause the active stream (`150 0`), keeping the list
    pub fn pause_stream(&self) -> Result<()> {
        self.ask(|reply| Query::PauseResume {
            resume: false,
            reply,
        })
    }

    /// Resume a paused stream (`150 1`)
    pub fn resume_stream(&self) -> Result<()> {
        self.ask(|reply| Query::PauseResume {
            resume: true,
            reply,
        })
    }

    /// Stop the thread and wait for it to exit
    ///
    /// An active stream is stopped on the robot first. Calling this more than
    /// once is harmless.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.wake.try_send(());
        let handle = self.worker.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            log::error!("Stream thread panicked");
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_streaming() {
            return Err(Error::StreamActive);
        }
        Ok(())
    }

    fn ask<T>(&self, make: impl FnOnce(Sender<Result<T>>) -> Query) -> Result<T> {
        let (reply, result) = bounded(1);
        self.queries
            .send(make(reply))
            .map_err(|_| Error::LinkClosed)?;
        result.recv().map_err(|_| Error::LinkClosed)?
    }
}

impl Drop for StreamEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum IdleEvent {
    Query(Query),
    Closed,
    Tick,
}

#[derive(Default)]
struct FrameStats {
    good: u64,
    faults: [u64; 5],
}

struct Worker {
    link: Box<dyn SerialRobotLink>,
    port: CommandPort,
    decoder: SensorDecoder,
    config: StreamEngineConfig,
    /// Set while a stream list is active
    frames: Option<FrameDecoder>,
    paused: bool,
    pending: Arc<Mutex<Option<StreamRequest>>>,
    wake: Receiver<()>,
    queries: Receiver<Query>,
    snapshot: SnapshotHandle,
    running: Arc<AtomicBool>,
    stats: FrameStats,
}

impl Worker {
    fn run(&mut self) {
        log::info!("Stream thread started on {}", self.link.describe());

        while self.running.load(Ordering::SeqCst) {
            let request = self.pending.lock().take();
            if let Some(request) = request {
                self.apply(request);
            }

            let outcome = match (&mut self.frames, self.paused) {
                (Some(frames), false) => Some(frames.next_frame(self.link.as_mut())),
                _ => None,
            };

            match outcome {
                Some(Ok(outcome)) => self.record(outcome),
                Some(Err(e)) => {
                    log::error!("Serial read failed: {}", e);
                    thread::sleep(self.config.idle_poll);
                }
                None => {
                    let event = select! {
                        recv(self.queries) -> msg => msg.map_or(IdleEvent::Closed, IdleEvent::Query),
                        recv(self.wake) -> _ => IdleEvent::Tick,
                        default(self.config.idle_poll) => IdleEvent::Tick,
                    };
                    match event {
                        IdleEvent::Query(query) => self.handle(query),
                        IdleEvent::Closed => break,
                        IdleEvent::Tick => {}
                    }
                    continue;
                }
            }

            // Streaming: answer queued queries between frames
            while let Ok(query) = self.queries.try_recv() {
                self.handle(query);
            }
        }

        // A stop requested right before shutdown still reaches the robot
        let request = self.pending.lock().take();
        match request {
            Some(request) if request.is_stop() => self.apply(request),
            _ if self.frames.is_some() => self.send_stop(),
            _ => {}
        }
        log::info!(
            "Stream thread stopped ({} good frames, faults: checksum {}, wrong id {}, backlog {}, lost sync {})",
            self.stats.good,
            self.stats.faults[1],
            self.stats.faults[2],
            self.stats.faults[3],
            self.stats.faults[4]
        );
    }

    fn apply(&mut self, request: StreamRequest) {
        self.paused = false;

        if request.is_stop() {
            self.frames = None;
            self.send_stop();
            self.snapshot.reset();
            log::info!("Streaming stopped");
            return;
        }

        let frames = match FrameDecoder::new(request.ids(), self.config.frame_timeout) {
            Ok(frames) => frames,
            Err(e) => {
                log::error!("Rejected stream request {:?}: {}", request.ids(), e);
                return;
            }
        };

        let mut pkt = TxPacket::new();
        let sent = pkt
            .set_stream(request.ids())
            .and_then(|()| self.port.send(&pkt));
        if let Err(e) = sent {
            log::error!("Failed to start stream: {}", e);
            self.frames = None;
            return;
        }

        self.snapshot.reset();

        // Frames from an earlier list may still be buffered
        match self.link.discard_input() {
            Ok(n) if n > 0 => log::debug!("Discarded {} stale bytes", n),
            Ok(_) => {}
            Err(e) => log::warn!("Failed to discard stale input: {}", e),
        }

        self.frames = Some(frames);
        log::info!("Streaming {:?}", request.ids());
    }

    fn send_stop(&mut self) {
        let mut pkt = TxPacket::new();
        pkt.set_pause_resume(false);
        if let Err(e) = self.port.send(&pkt) {
            log::error!("Failed to stop stream: {}", e);
        }
    }

    fn record(&mut self, outcome: FrameOutcome) {
        let (status, values) = match outcome {
            FrameOutcome::Idle => return,
            FrameOutcome::Good(values) => {
                self.stats.good += 1;
                log::trace!("Frame {:?}", values);
                (StreamStatus::Ok, Some(values))
            }
            FrameOutcome::Fault(status) => {
                self.stats.faults[status.code() as usize] += 1;
                (status, None)
            }
        };

        // Held until published so set_stream_list cannot slip in between
        let pending = self.pending.lock();
        if pending.is_some() {
            log::debug!("Dropped frame decoded against the previous list");
            return;
        }
        // A run of junk bytes is one sync loss, not one per byte
        if status == StreamStatus::LostSync
            && self.snapshot.load().status == StreamStatus::LostSync
        {
            return;
        }
        let previous = self.snapshot.advance(status, values);
        if previous != status {
            log::debug!("Stream status {:?} -> {:?}", previous, status);
        }
    }

    fn handle(&mut self, query: Query) {
        let streaming = self.frames.is_some();
        match query {
            Query::Sensor { id, reply } => {
                let result = if streaming {
                    Err(Error::StreamActive)
                } else {
                    self.decoder
                        .query_sensor(&self.port, self.link.as_mut(), id)
                };
                let _ = reply.send(self.settle(result));
            }
            Query::Group { id, reply } => {
                let result = if streaming {
                    Err(Error::StreamActive)
                } else {
                    packets::group(id).and_then(|group| {
                        let mut results = vec![0; group.last as usize + 1];
                        self.decoder.query_group(
                            &self.port,
                            self.link.as_mut(),
                            id,
                            &mut results,
                        )?;
                        Ok(results)
                    })
                };
                let _ = reply.send(self.settle(result));
            }
            Query::List { ids, reply } => {
                let result = if streaming {
                    Err(Error::StreamActive)
                } else {
                    let mut results = vec![0; ids.len()];
                    self.decoder
                        .query_list(&self.port, self.link.as_mut(), &ids, &mut results)
                        .map(|()| results)
                };
                let _ = reply.send(self.settle(result));
            }
            Query::PauseResume { resume, reply } => {
                let _ = reply.send(self.pause_resume(resume));
            }
        }
    }

    /// Drop a partial response so it cannot be mistaken for the next one
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(Error::SerialTimeout { .. }) = &result
            && let Err(e) = self.link.discard_input()
        {
            log::warn!("Failed to discard partial response: {}", e);
        }
        result
    }

    fn pause_resume(&mut self, resume: bool) -> Result<()> {
        if self.frames.is_none() {
            return Err(Error::InvalidArgument(
                "no active stream to pause or resume".to_string(),
            ));
        }
        let mut pkt = TxPacket::new();
        pkt.set_pause_resume(resume);
        self.port.send(&pkt)?;
        self.paused = !resume;
        log::info!("Stream {}", if resume { "resumed" } else { "paused" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MockLink;
    use crate::oi::constants::*;
    use crate::stream::{StreamSnapshot, build_frame};
    use std::time::Instant;

    struct Harness {
        link: MockLink,
        engine: StreamEngine,
        writer: Option<JoinHandle<()>>,
    }

    impl Harness {
        fn new() -> Self {
            let link = MockLink::new();
            let (port, writer) = CommandPort::spawn(Box::new(link.clone())).unwrap();
            let config = StreamEngineConfig {
                frame_timeout: Duration::from_millis(50),
                query_timeout: Duration::from_millis(200),
                poll_slices: 10,
                idle_poll: Duration::from_millis(5),
            };
            let engine = StreamEngine::spawn(Box::new(link.clone()), port, config).unwrap();
            Self {
                link,
                engine,
                writer: Some(writer),
            }
        }

        /// Start streaming `ids` and wait until the engine is reading frames
        fn stream(&self, ids: &[u8]) -> SnapshotHandle {
            let discards = self.link.discards();
            let handle = self.engine.set_stream_list(ids).unwrap();
            assert!(
                self.link
                    .wait_discards(discards + 1, Duration::from_secs(2))
            );
            handle
        }

        fn finish(mut self) -> Vec<u8> {
            self.engine.shutdown();
            drop(self.engine);
            if let Some(writer) = self.writer.take() {
                writer.join().unwrap();
            }
            self.link.written()
        }
    }

    fn wait_sequence(handle: &SnapshotHandle, sequence: u64) -> Arc<StreamSnapshot> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let snapshot = handle.load();
            if snapshot.sequence >= sequence {
                return snapshot;
            }
            assert!(Instant::now() < deadline, "no snapshot {sequence}");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn light_bump_frame(base: i32) -> Vec<u8> {
        let fields: Vec<(u8, i32)> = LIGHT_BUMP_IDS
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, base + i as i32))
            .collect();
        build_frame(&fields).unwrap()
    }

    #[test]
    fn test_stream_request_validation() {
        assert!(StreamRequest::new(&[]).unwrap().is_stop());
        assert_eq!(StreamRequest::new(&[46, 7]).unwrap().ids(), &[46, 7]);
        assert!(matches!(
            StreamRequest::new(&[46, 3]),
            Err(Error::UnknownPacket(3))
        ));
    }

    #[test]
    fn test_stream_decodes_frames() {
        let h = Harness::new();
        let handle = h.stream(&LIGHT_BUMP_IDS);
        let start = wait_sequence(&handle, 1);
        assert!(start.values.is_empty());

        h.link.inject_read(&light_bump_frame(100));
        let snapshot = wait_sequence(&handle, start.sequence + 1);
        assert_eq!(snapshot.status, StreamStatus::Ok);
        assert_eq!(snapshot.value(46), Some(100));
        assert_eq!(snapshot.value(51), Some(105));

        let written = h.finish();
        assert_eq!(&written[..8], &[148, 6, 46, 47, 48, 49, 50, 51]);
        // Shutdown stops the stream
        assert_eq!(&written[written.len() - 2..], &[150, 0]);
    }

    #[test]
    fn test_checksum_failure_keeps_previous_values() {
        let h = Harness::new();
        let handle = h.stream(&LIGHT_BUMP_IDS);
        let start = wait_sequence(&handle, 1).sequence;

        h.link.inject_read(&light_bump_frame(10));
        wait_sequence(&handle, start + 1);

        let mut bad = light_bump_frame(50);
        let last = bad.len() - 1;
        bad[last] = bad[last].wrapping_add(1);
        h.link.inject_read(&bad);
        let snapshot = wait_sequence(&handle, start + 2);
        assert_eq!(snapshot.status, StreamStatus::ChecksumFailure);
        assert_eq!(snapshot.error_code(), 1);
        assert_eq!(snapshot.value(46), Some(10));

        // Heals on the next good frame
        h.link.inject_read(&light_bump_frame(20));
        let snapshot = wait_sequence(&handle, start + 3);
        assert_eq!(snapshot.status, StreamStatus::Ok);
        assert_eq!(snapshot.value(46), Some(20));
        h.finish();
    }

    #[test]
    fn test_lost_sync_reported_once_per_run() {
        let h = Harness::new();
        let handle = h.stream(&LIGHT_BUMP_IDS);
        let start = wait_sequence(&handle, 1).sequence;

        h.link.inject_read(&[0x01, 0x02, 0x03, 0x04]);
        let snapshot = wait_sequence(&handle, start + 1);
        assert_eq!(snapshot.status, StreamStatus::LostSync);

        h.link.inject_read(&light_bump_frame(1));
        let snapshot = wait_sequence(&handle, start + 2);
        assert_eq!(snapshot.status, StreamStatus::Ok);
        assert_eq!(snapshot.value(46), Some(1));
        h.finish();
    }

    #[test]
    fn test_new_list_never_shows_old_values() {
        let h = Harness::new();
        let handle = h.stream(&LIGHT_BUMP_IDS);
        let start = wait_sequence(&handle, 1).sequence;
        h.link.inject_read(&light_bump_frame(10));
        assert_eq!(wait_sequence(&handle, start + 1).value(47), Some(11));

        h.engine.set_stream_list(&[]).unwrap();
        let handle = h.stream(&[LIGHT_BUMP_L]);
        let fresh = handle.load();
        assert!(fresh.values.is_empty());

        h.link
            .inject_read(&build_frame(&[(LIGHT_BUMP_L, 77)]).unwrap());
        let snapshot = wait_sequence(&handle, fresh.sequence + 1);
        assert_eq!(snapshot.value(LIGHT_BUMP_L), Some(77));
        assert_eq!(snapshot.value(LIGHT_BUMP_FL), None);
        h.finish();
    }

    #[test]
    fn test_list_switch_mid_frame_drops_old_frame() {
        let h = Harness::new();
        let handle = h.stream(&LIGHT_BUMP_IDS);
        let discards = h.link.discards();

        // Header and the first fields; the engine is now inside the frame
        let frame = light_bump_frame(10);
        h.link.inject_read(&frame[..6]);
        thread::sleep(Duration::from_millis(15));

        h.engine.set_stream_list(&[]).unwrap();
        let handle = h.engine.set_stream_list(&[LIGHT_BUMP_L]).unwrap();
        let switched = handle.load();
        assert!(switched.values.is_empty());
        h.link.inject_read(&frame[6..]);

        let deadline = Instant::now() + Duration::from_millis(150);
        while Instant::now() < deadline {
            let snapshot = handle.load();
            assert!(snapshot.sequence >= switched.sequence);
            assert_eq!(
                snapshot.value(LIGHT_BUMP_FL),
                None,
                "old list published as snapshot {}",
                snapshot.sequence
            );
            thread::sleep(Duration::from_millis(1));
        }
        assert!(h.link.wait_discards(discards + 1, Duration::from_secs(2)));

        let written = h.finish();
        assert!(written.windows(3).any(|w| w == [148, 1, LIGHT_BUMP_L]));
    }

    #[test]
    fn test_stop_sends_pause_and_resets() {
        let h = Harness::new();
        let handle = h.stream(&LIGHT_BUMP_IDS);
        let start = wait_sequence(&handle, 1).sequence;
        h.link.inject_read(&light_bump_frame(10));
        wait_sequence(&handle, start + 1);

        h.engine.set_stream_list(&[]).unwrap();
        assert!(!h.engine.is_streaming());
        let written = h
            .link
            .wait_written(Duration::from_secs(2), |w| w.ends_with(&[150, 0]));
        assert!(written.is_some());
        let snapshot = wait_sequence(&handle, start + 2);
        assert!(snapshot.values.is_empty());
        assert_eq!(snapshot.status, StreamStatus::Ok);
        h.finish();
    }

    #[test]
    fn test_invalid_list_is_rejected_up_front() {
        let h = Harness::new();
        assert!(matches!(
            h.engine.set_stream_list(&[46, 200]),
            Err(Error::UnknownPacket(200))
        ));
        assert!(!h.engine.is_streaming());
        assert!(h.finish().is_empty());
    }

    #[test]
    fn test_queries_when_idle() {
        let h = Harness::new();
        h.link.inject_read(&[0x00, 0x2A]);
        assert_eq!(h.engine.query_sensor(VOLTAGE).unwrap(), 42);

        h.link.inject_read(&[0, 1, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6]);
        let group = h.engine.query_group(106).unwrap();
        assert_eq!(group.len(), 52);
        assert_eq!(&group[46..52], &[1, 2, 3, 4, 5, 6]);

        h.link.inject_read(&[9, 0xFF, 0xFF]);
        assert_eq!(h.engine.query_list(&[BUMPS, ANGLE]).unwrap(), vec![9, -1]);

        assert!(matches!(
            h.engine.query_sensor(100),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            h.engine.query_group(101),
            Err(Error::UnknownGroup(101))
        ));

        let written = h.finish();
        assert_eq!(
            written,
            vec![142, VOLTAGE, 142, 106, 149, 2, BUMPS, ANGLE]
        );
    }

    #[test]
    fn test_query_timeout_discards_partial_response() {
        let h = Harness::new();
        h.link.inject_read(&[0x01]);
        assert!(matches!(
            h.engine.query_sensor(VOLTAGE),
            Err(Error::SerialTimeout { .. })
        ));
        h.link.inject_read(&[0x00, 0x07]);
        assert_eq!(h.engine.query_sensor(VOLTAGE).unwrap(), 7);
        h.finish();
    }

    #[test]
    fn test_queries_refused_while_streaming() {
        let h = Harness::new();
        h.stream(&LIGHT_BUMP_IDS);
        assert!(matches!(
            h.engine.query_sensor(BUMPS),
            Err(Error::StreamActive)
        ));
        assert!(matches!(
            h.engine.query_list(&[BUMPS]),
            Err(Error::StreamActive)
        ));
        h.finish();
    }

    #[test]
    fn test_pause_and_resume() {
        let h = Harness::new();
        assert!(matches!(
            h.engine.pause_stream(),
            Err(Error::InvalidArgument(_))
        ));

        h.stream(&LIGHT_BUMP_IDS);
        h.engine.pause_stream().unwrap();
        h.engine.resume_stream().unwrap();
        let written = h.finish();
        assert_eq!(
            &written[8..],
            &[150, 0, 150, 1, 150, 0],
            "pause, resume, stop on shutdown"
        );
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let h = Harness::new();
        h.engine.shutdown();
        h.engine.shutdown();
        assert!(matches!(
            h.engine.query_sensor(BUMPS),
            Err(Error::LinkClosed)
        ));
        h.finish();
    }
}
