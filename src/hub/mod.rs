//! # Telemetry Hub
//!
//! Fans one upstream simulator telemetry feed out to any number of
//! downstream subscribers with at-most-latest delivery: the hub keeps a
//! single current snapshot and pushes it on every ingest, never a
//! history.
//!
//! Subscribers register over a UDP command socket and are removed the
//! first time a send to them fails; a dead subscriber never stalls the
//! others. All subscriber-set mutation happens on the hub's own receive
//! loop, so no locking is involved.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::config::{BroadcastFormat, Config};
use crate::crsf::codec;
use crate::error::Result;
use crate::telemetry::liftoff::StreamFormat;
use crate::translate::{self, GeoReference};

/// Subscriber command: register, or keep an existing registration alive
pub const OPCODE_REGISTER: u8 = 0x00;

/// Subscriber command: unregister
pub const OPCODE_UNREGISTER: u8 = 0x01;

/// Shut the hub down
pub const OPCODE_QUIT: u8 = 0xFF;

/// Outbound datagram sink, abstracted so broadcast behavior is testable
/// without sockets.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    /// Send one datagram to `addr`
    async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

#[async_trait]
impl DatagramSink for UdpSocket {
    async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, data, addr).await
    }
}

/// The dynamically changing set of downstream subscribers.
///
/// Owned by the hub's receive loop; single-writer by construction.
#[derive(Debug, Default)]
pub struct SubscriberSet {
    subscribers: Vec<SocketAddr>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber; re-registering is a keepalive, not a duplicate
    pub fn register(&mut self, addr: SocketAddr) -> bool {
        if self.subscribers.contains(&addr) {
            return false;
        }
        self.subscribers.push(addr);
        info!("subscriber registered: {} ({} total)", addr, self.subscribers.len());
        true
    }

    /// Remove a subscriber if present
    pub fn unregister(&mut self, addr: SocketAddr) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|&a| a != addr);
        let removed = self.subscribers.len() != before;
        if removed {
            info!("subscriber unregistered: {} ({} total)", addr, self.subscribers.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Send `data` to every subscriber, best-effort.
    ///
    /// A failed send is logged and the subscriber removed on the spot;
    /// delivery to the rest continues.
    pub async fn broadcast<S: DatagramSink>(&mut self, sink: &S, data: &[u8]) {
        let mut failed: Vec<SocketAddr> = Vec::new();

        for &addr in &self.subscribers {
            if let Err(e) = sink.send_to(data, addr).await {
                warn!("dropping subscriber {}: {}", addr, e);
                failed.push(addr);
            }
        }

        for addr in failed {
            self.unregister(addr);
        }
    }
}

/// Hub state independent of the sockets it serves
struct HubState {
    subscribers: SubscriberSet,
    /// The single latest telemetry snapshot, overwritten on every ingest
    snapshot: Option<Vec<u8>>,
    format: BroadcastFormat,
    stream_format: StreamFormat,
    geo: GeoReference,
}

impl HubState {
    /// Accept one upstream telemetry datagram: store it as the current
    /// snapshot and push it to every subscriber (push-on-ingest).
    ///
    /// Only a minimal format check happens here; in raw mode the
    /// datagram passes through untouched, in CRSF mode it is translated
    /// and re-encoded for direct radio playback.
    async fn ingest<S: DatagramSink>(&mut self, sink: &S, datagram: &[u8]) {
        if datagram.is_empty() {
            return;
        }

        let payload = match self.format {
            BroadcastFormat::Raw => datagram.to_vec(),
            BroadcastFormat::Crsf => match self.encode_crsf(datagram) {
                Some(payload) => payload,
                None => return,
            },
        };

        self.subscribers.broadcast(sink, &payload).await;
        self.snapshot = Some(payload);
    }

    /// Translate a simulator datagram into a run of CRSF frames
    fn encode_crsf(&self, datagram: &[u8]) -> Option<Vec<u8>> {
        let sim = match self.stream_format.parse(datagram) {
            Ok(sim) => sim,
            Err(e) => {
                debug!("dropping unparseable telemetry datagram: {}", e);
                return None;
            }
        };

        let mut out = Vec::new();
        for record in translate::sim_to_records(&sim, self.geo) {
            match record.to_frame().and_then(|frame| codec::encode(&frame)) {
                Ok(wire) => out.extend_from_slice(&wire),
                Err(e) => debug!("skipping record: {}", e),
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// Handle one subscriber command. Returns `true` when the hub should
    /// shut down.
    fn handle_command(&mut self, data: &[u8], addr: SocketAddr) -> bool {
        let Some(&opcode) = data.first() else {
            return false;
        };

        match opcode {
            OPCODE_REGISTER => {
                self.subscribers.register(addr);
            }
            OPCODE_UNREGISTER => {
                self.subscribers.unregister(addr);
            }
            OPCODE_QUIT => {
                info!("quit requested by {}", addr);
                return true;
            }
            other => {
                debug!("unknown command 0x{:02X} from {}", other, addr);
            }
        }

        false
    }
}

/// The telemetry broker process: one ingest socket, N subscribers.
pub struct TelemetryHub {
    telemetry_sock: UdpSocket,
    command_sock: UdpSocket,
    state: HubState,
}

impl TelemetryHub {
    /// Bind the ingest and command sockets.
    pub async fn bind(config: &Config) -> Result<Self> {
        let telemetry_sock = UdpSocket::bind(&config.hub.telemetry_bind).await?;
        let command_sock = UdpSocket::bind(&config.hub.command_bind).await?;

        info!(
            "telemetry hub: ingest on {}, commands on {}",
            config.hub.telemetry_bind, config.hub.command_bind
        );

        Ok(Self {
            telemetry_sock,
            command_sock,
            state: HubState {
                subscribers: SubscriberSet::new(),
                snapshot: None,
                format: config.hub.broadcast_format,
                stream_format: StreamFormat::new(config.simulator.stream_format.clone()),
                geo: config.telemetry.geo_reference(),
            },
        })
    }

    /// Current number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.state.subscribers.len()
    }

    /// Run the hub until a quit command or ctrl-c.
    ///
    /// Both sockets are served from this single task, which is the only
    /// writer of the subscriber set and the snapshot.
    pub async fn run(mut self) -> Result<()> {
        let mut telemetry_buf = [0u8; 4096];
        let mut command_buf = [0u8; 64];

        loop {
            tokio::select! {
                result = self.telemetry_sock.recv_from(&mut telemetry_buf) => {
                    let (n, _) = result?;
                    self.state.ingest(&self.command_sock, &telemetry_buf[..n]).await;
                }

                result = self.command_sock.recv_from(&mut command_buf) => {
                    let (n, addr) = result?;
                    if self.state.handle_command(&command_buf[..n], addr) {
                        return Ok(());
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("received ctrl-c, shutting down hub");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use std::sync::Mutex;

    /// Records sends and fails on demand, per address
    struct MockSink {
        sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
        fail_for: Mutex<Option<SocketAddr>>,
    }

    impl MockSink {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: Mutex::new(None),
            }
        }

        fn sent_to(&self, addr: SocketAddr) -> Vec<Vec<u8>> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(a, _)| *a == addr)
                .map(|(_, d)| d.clone())
                .collect()
        }
    }

    #[async_trait]
    impl DatagramSink for MockSink {
        async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
            if *self.fail_for.lock().unwrap() == Some(addr) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            self.sent.lock().unwrap().push((addr, data.to_vec()));
            Ok(data.len())
        }
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn raw_state() -> HubState {
        HubState {
            subscribers: SubscriberSet::new(),
            snapshot: None,
            format: BroadcastFormat::Raw,
            stream_format: StreamFormat::new(vec![]),
            geo: GeoReference::default(),
        }
    }

    #[test]
    fn test_register_unregister() {
        let mut set = SubscriberSet::new();

        assert!(set.register(addr(9100)));
        assert!(!set.register(addr(9100)), "re-register is a keepalive");
        assert!(set.register(addr(9101)));
        assert_eq!(set.len(), 2);

        assert!(set.unregister(addr(9100)));
        assert!(!set.unregister(addr(9100)));
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let mut state = raw_state();
        let sink = MockSink::new();

        for port in [9100, 9101, 9102] {
            state.subscribers.register(addr(port));
        }

        state.ingest(&sink, b"snapshot-1").await;

        for port in [9100, 9101, 9102] {
            assert_eq!(sink.sent_to(addr(port)), vec![b"snapshot-1".to_vec()]);
        }

        // After one unregisters, only the remaining two receive
        state.subscribers.unregister(addr(9101));
        state.ingest(&sink, b"snapshot-2").await;

        assert_eq!(sink.sent_to(addr(9100)).len(), 2);
        assert_eq!(sink.sent_to(addr(9101)).len(), 1);
        assert_eq!(sink.sent_to(addr(9102)).len(), 2);
    }

    #[tokio::test]
    async fn test_failing_subscriber_removed_without_blocking_others() {
        let mut state = raw_state();
        let sink = MockSink::new();

        state.subscribers.register(addr(9100));
        state.subscribers.register(addr(9101));
        state.subscribers.register(addr(9102));
        *sink.fail_for.lock().unwrap() = Some(addr(9101));

        state.ingest(&sink, b"data").await;

        // Healthy subscribers got the snapshot, the failing one is gone
        assert_eq!(sink.sent_to(addr(9100)).len(), 1);
        assert_eq!(sink.sent_to(addr(9102)).len(), 1);
        assert_eq!(state.subscribers.len(), 2);

        // And it stays gone on the next ingest
        *sink.fail_for.lock().unwrap() = None;
        state.ingest(&sink, b"data-2").await;
        assert_eq!(sink.sent_to(addr(9101)).len(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_overwritten_latest_wins() {
        let mut state = raw_state();
        let sink = MockSink::new();

        state.ingest(&sink, b"old").await;
        state.ingest(&sink, b"new").await;

        assert_eq!(state.snapshot.as_deref(), Some(b"new".as_slice()));
    }

    #[tokio::test]
    async fn test_empty_datagram_ignored() {
        let mut state = raw_state();
        let sink = MockSink::new();

        state.subscribers.register(addr(9100));
        state.ingest(&sink, b"").await;

        assert_eq!(state.snapshot, None);
        assert!(sink.sent_to(addr(9100)).is_empty());
    }

    #[tokio::test]
    async fn test_no_backlog_for_late_subscribers() {
        let mut state = raw_state();
        let sink = MockSink::new();

        state.ingest(&sink, b"early").await;
        state.subscribers.register(addr(9100));

        // Nothing delivered until the next ingest
        assert!(sink.sent_to(addr(9100)).is_empty());

        state.ingest(&sink, b"later").await;
        assert_eq!(sink.sent_to(addr(9100)), vec![b"later".to_vec()]);
    }

    #[tokio::test]
    async fn test_crsf_broadcast_format() {
        use crate::crsf::protocol::FrameType;
        use crate::telemetry::liftoff::StreamAttribute;

        let mut state = HubState {
            subscribers: SubscriberSet::new(),
            snapshot: None,
            format: BroadcastFormat::Crsf,
            stream_format: StreamFormat::new(vec![StreamAttribute::Battery]),
            geo: GeoReference::default(),
        };
        let sink = MockSink::new();
        state.subscribers.register(addr(9100));

        let mut datagram = Vec::new();
        datagram.extend_from_slice(&0.5f32.to_le_bytes());
        datagram.extend_from_slice(&14.8f32.to_le_bytes());
        state.ingest(&sink, &datagram).await;

        let sent = sink.sent_to(addr(9100));
        assert_eq!(sent.len(), 1);

        let (frame, _) = codec::decode(&sent[0]).unwrap();
        assert_eq!(frame.frame_type, FrameType::BatterySensor);
    }

    #[tokio::test]
    async fn test_crsf_format_drops_garbage() {
        let mut state = HubState {
            subscribers: SubscriberSet::new(),
            snapshot: None,
            format: BroadcastFormat::Crsf,
            stream_format: StreamFormat::new(vec![
                crate::telemetry::liftoff::StreamAttribute::Position,
            ]),
            geo: GeoReference::default(),
        };
        let sink = MockSink::new();
        state.subscribers.register(addr(9100));

        state.ingest(&sink, &[0x01]).await;

        assert_eq!(state.snapshot, None);
        assert!(sink.sent_to(addr(9100)).is_empty());
    }

    #[tokio::test]
    async fn test_quit_command() {
        let mut state = raw_state();
        assert!(!state.handle_command(&[OPCODE_REGISTER], addr(9100)));
        assert!(!state.handle_command(&[], addr(9100)));
        assert!(state.handle_command(&[OPCODE_QUIT], addr(9100)));
    }

    #[tokio::test]
    async fn test_hub_end_to_end_over_udp() {
        let mut config = Config::default();
        config.hub = HubConfig {
            telemetry_bind: "127.0.0.1:0".to_string(),
            command_bind: "127.0.0.1:0".to_string(),
            broadcast_format: BroadcastFormat::Raw,
        };

        let hub = TelemetryHub::bind(&config).await.unwrap();
        let telemetry_addr = hub.telemetry_sock.local_addr().unwrap();
        let command_addr = hub.command_sock.local_addr().unwrap();

        let subscriber = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let producer = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let hub_task = tokio::spawn(hub.run());

        // Register, then feed one datagram upstream
        subscriber
            .send_to(&[OPCODE_REGISTER], command_addr)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        producer
            .send_to(b"live-telemetry", telemetry_addr)
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            subscriber.recv_from(&mut buf),
        )
        .await
        .expect("broadcast should arrive")
        .unwrap();
        assert_eq!(&buf[..n], b"live-telemetry");

        // Quit opcode shuts the hub down cleanly
        subscriber
            .send_to(&[OPCODE_QUIT], command_addr)
            .await
            .unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), hub_task)
            .await
            .expect("hub should exit")
            .unwrap();
        assert!(result.is_ok());
    }
}
