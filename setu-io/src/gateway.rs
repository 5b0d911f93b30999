//! TCP gateway: accepts one control client at a time and bridges it to the robot
//!
//! Lifecycle of one accept cycle:
//!
//! 1. arm the robot (`start`, `safe`); while the serial link refuses, retry
//!    with a growing delay
//! 2. wait for a client (non-blocking accept, polled every 10 ms so Ctrl-C is
//!    noticed)
//! 3. light the "check robot" LED and run a [`ConnectionBridge`]
//! 4. tear down: stop driving, LEDs off, stop the stream, back to Safe,
//!    close the socket

use crate::bridge::{ConnectionBridge, SessionStats};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::oi::constants::LED_CHECK_ROBOT;
use crate::oi::{ModeTracker, TxPacket};
use crate::robot::Robot;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const ACCEPT_POLL: Duration = Duration::from_millis(10);
const ARM_RETRY_MIN: Duration = Duration::from_millis(100);
const ARM_RETRY_MAX: Duration = Duration::from_secs(2);

/// Gateway bound to its listening socket
pub struct GatewayServer {
    listener: TcpListener,
    robot: Robot,
    running: Arc<AtomicBool>,
    telemetry_interval: Duration,
}

impl GatewayServer {
    /// Bind to the configured address
    pub fn bind(config: &Config, robot: Robot, running: Arc<AtomicBool>) -> Result<Self> {
        Self::bind_addr(
            &config.network.bind_address,
            robot,
            running,
            config.stream.telemetry_interval(),
        )
    }

    pub fn bind_addr(
        addr: &str,
        robot: Robot,
        running: Arc<AtomicBool>,
        telemetry_interval: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| Error::Other(format!("Failed to bind to {}: {}", addr, e)))?;
        if let Err(e) = listener.set_nonblocking(true) {
            log::warn!("Failed to set nonblocking mode: {}", e);
        }
        log::info!("Gateway listening on {}", addr);

        Ok(Self {
            listener,
            robot,
            running,
            telemetry_interval,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve clients until the running flag is cleared
    ///
    /// Returns the number of sessions served. A robot that cannot be armed
    /// is retried rather than ending the gateway.
    pub fn serve(&self) -> u64 {
        let mut sessions = 0;
        let mut retry = ARM_RETRY_MIN;

        while self.running.load(Ordering::SeqCst) {
            let mut mode = match self.robot.arm() {
                Ok(mode) => {
                    retry = ARM_RETRY_MIN;
                    mode
                }
                Err(e) => {
                    log::error!("Failed to arm robot, retrying in {:?}: {}", retry, e);
                    self.pause(retry);
                    retry = (retry * 2).min(ARM_RETRY_MAX);
                    continue;
                }
            };

            let Some((stream, addr)) = self.accept() else {
                break;
            };
            self.run_session(&stream, addr, &mut mode);
            sessions += 1;
        }

        log::info!("Gateway stopped after {} session(s)", sessions);
        sessions
    }

    /// Disconnect the robot, handing it back in Passive
    pub fn shutdown(self) -> Result<()> {
        drop(self.listener);
        self.robot.disconnect()
    }

    /// Sleep for `delay`, cut short once the gateway is stopping
    fn pause(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while self.running.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(ACCEPT_POLL);
        }
    }

    /// Wait for the next client; `None` once the gateway is stopping
    fn accept(&self) -> Option<(TcpStream, SocketAddr)> {
        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    // Blocking reads for the bridge threads
                    if let Err(e) = stream.set_nonblocking(false) {
                        log::error!("Dropping client {}: {}", addr, e);
                        continue;
                    }
                    if let Err(e) = stream.set_nodelay(true) {
                        log::debug!("Failed to set TCP_NODELAY: {}", e);
                    }
                    return Some((stream, addr));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => {
                    log::error!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }
        None
    }

    fn run_session(&self, stream: &TcpStream, addr: SocketAddr, mode: &mut ModeTracker) {
        log::info!("Client connected: {}", addr);

        let mut pkt = TxPacket::new();
        pkt.set_leds(LED_CHECK_ROBOT, 0, 0);
        if let Err(e) = self.robot.send(&pkt) {
            log::warn!("Failed to light connection LED: {}", e);
        }

        let bridge = ConnectionBridge::new(
            self.robot.port(),
            self.robot.engine(),
            &self.running,
            self.telemetry_interval,
        );
        match bridge.run(stream, mode) {
            Ok(SessionStats {
                commands,
                ignored,
                records,
            }) => log::info!(
                "Session with {} ended: {} command(s), {} ignored, {} telemetry record(s)",
                addr,
                commands,
                ignored,
                records
            ),
            Err(e) => log::error!("Session with {} failed: {}", addr, e),
        }

        self.teardown(stream, mode);
    }

    /// Leave the robot stopped, dark and in Safe before closing the socket
    fn teardown(&self, stream: &TcpStream, mode: &mut ModeTracker) {
        let port = self.robot.port();

        if let Err(e) = mode.drive(port, 0, 0) {
            log::warn!("Failed to stop driving: {}", e);
        }
        let mut pkt = TxPacket::new();
        pkt.set_leds(0, 0, 0);
        if let Err(e) = port.send(&pkt) {
            log::warn!("Failed to clear LEDs: {}", e);
        }
        if let Err(e) = self.robot.engine().set_stream_list(&[]) {
            log::warn!("Failed to stop stream: {}", e);
        }
        if let Err(e) = mode.safe(port) {
            log::warn!("Failed to return to Safe: {}", e);
        }
        let _ = stream.shutdown(Shutdown::Both);
        log::debug!("Session teardown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{MockLink, SerialRobotLink};
    use crate::stream::StreamEngineConfig;
    use std::sync::atomic::AtomicUsize;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_session_lifecycle() {
        let link = MockLink::new();
        let robot = Robot::with_link(Box::new(link.clone()), StreamEngineConfig::default()).unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let server = GatewayServer::bind_addr(
            "127.0.0.1:0",
            robot,
            Arc::clone(&running),
            Duration::from_millis(20),
        )
        .unwrap();
        let addr = server.local_addr().unwrap();

        let sessions = thread::scope(|s| {
            let serving = s.spawn(|| server.serve());

            let client = TcpStream::connect(addr).unwrap();
            link.wait_written(Duration::from_secs(2), |w| {
                contains(w, &[148, 6, 46, 47, 48, 49, 50, 51])
            })
            .unwrap();
            drop(client);

            // Teardown, then the next cycle arms again
            link.wait_written(Duration::from_secs(2), |w| {
                w.windows(4)
                    .position(|l| l == [139, 0, 0, 0])
                    .is_some_and(|at| contains(&w[at..], &[128, 131]))
            })
            .unwrap();

            running.store(false, Ordering::SeqCst);
            serving.join().unwrap()
        });
        assert_eq!(sessions, 1);

        let written = link.written();
        assert!(written.starts_with(&[128, 131, 139, LED_CHECK_ROBOT, 0, 0]));
        assert!(contains(&written, &[137, 0, 0, 0, 0, 139, 0, 0, 0]));
        assert!(contains(&written, &[150, 0]));

        server.shutdown().unwrap();
        assert_eq!(link.written().last(), Some(&128));
    }

    #[test]
    fn test_serve_returns_when_stopped() {
        let link = MockLink::new();
        let robot = Robot::with_link(Box::new(link.clone()), StreamEngineConfig::default()).unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let server = GatewayServer::bind_addr(
            "127.0.0.1:0",
            robot,
            Arc::clone(&running),
            Duration::from_millis(20),
        )
        .unwrap();

        let sessions = thread::scope(|s| {
            let serving = s.spawn(|| server.serve());
            link.wait_written(Duration::from_secs(2), |w| w == [128, 131])
                .unwrap();
            running.store(false, Ordering::SeqCst);
            serving.join().unwrap()
        });

        assert_eq!(sessions, 0);
        server.shutdown().unwrap();
    }

    /// Serial link whose writes always fail, counting the attempts
    struct DeadLink {
        attempts: Arc<AtomicUsize>,
    }

    impl SerialRobotLink for DeadLink {
        fn write_all(&mut self, _data: &[u8]) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::from(io::ErrorKind::BrokenPipe).into())
        }

        fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }

        fn available(&mut self) -> Result<usize> {
            Ok(0)
        }

        fn try_clone_link(&self) -> Result<Box<dyn SerialRobotLink>> {
            Ok(Box::new(DeadLink {
                attempts: Arc::clone(&self.attempts),
            }))
        }

        fn describe(&self) -> String {
            "dead link".to_string()
        }
    }

    #[test]
    fn test_serve_keeps_retrying_when_robot_cannot_be_armed() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let link = DeadLink {
            attempts: Arc::clone(&attempts),
        };
        let robot = Robot::with_link(Box::new(link), StreamEngineConfig::default()).unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let server = GatewayServer::bind_addr(
            "127.0.0.1:0",
            robot,
            Arc::clone(&running),
            Duration::from_millis(20),
        )
        .unwrap();

        let sessions = thread::scope(|s| {
            let serving = s.spawn(|| server.serve());

            // First attempt, then at least one retry after the backoff
            let deadline = Instant::now() + Duration::from_secs(2);
            while attempts.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            assert!(attempts.load(Ordering::SeqCst) >= 2);
            assert!(!serving.is_finished());

            running.store(false, Ordering::SeqCst);
            serving.join().unwrap()
        });

        assert_eq!(sessions, 0);
        assert!(server.shutdown().is_err());
    }
}
