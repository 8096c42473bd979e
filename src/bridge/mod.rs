//! # Protocol Bridge
//!
//! Moves control data from the radio link to the simulator and telemetry
//! the other way.
//!
//! Control path: radio bytes -> stream framer -> validated frames ->
//! type + payload datagrams toward the simulator's control socket.
//! Telemetry path: simulator datagram -> Liftoff parser -> translator ->
//! CRSF frames -> radio, rate-limited to the telemetry interval.
//!
//! Transport loss is recoverable (reconnect with backoff); when control
//! data stops arriving, the failsafe channel set keeps the simulator fed
//! instead of it reading silence as zero input.

use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::{Config, FailsafePolicy};
use crate::crsf::channels::ChannelSet;
use crate::crsf::codec;
use crate::crsf::framer::StreamFramer;
use crate::crsf::protocol::{CrsfFrame, FrameType};
use crate::error::{BridgeError, Result};
use crate::hub::OPCODE_REGISTER;
use crate::telemetry::liftoff::StreamFormat;
use crate::translate;
use crate::transport::RadioTransport;

/// Ceiling for the reconnect backoff
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Decides when the failsafe channel set is due.
///
/// Emits at most once per timeout period after fresh control data stops
/// arriving; a new control frame rearms the guard.
#[derive(Debug)]
pub struct FailsafeGuard {
    timeout: Duration,
    last_control: Instant,
    last_failsafe: Option<Instant>,
}

impl FailsafeGuard {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_control: now,
            last_failsafe: None,
        }
    }

    /// Record that a fresh control frame arrived
    pub fn note_control(&mut self, now: Instant) {
        self.last_control = now;
        self.last_failsafe = None;
    }

    /// Whether a failsafe emission is due right now.
    ///
    /// Returns `true` at most once per timeout period, so polling faster
    /// than the period never produces a burst.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last_control) < self.timeout {
            return false;
        }

        match self.last_failsafe {
            Some(last) if now.duration_since(last) < self.timeout => false,
            _ => {
                self.last_failsafe = Some(now);
                true
            }
        }
    }
}

/// Counters for the periodic link statistics log line
#[derive(Debug, Default)]
struct LinkStats {
    control_frames: u64,
    control_bytes: u64,
    crc_errors: u64,
    telemetry_frames: u64,
    failsafe_emits: u64,
}

/// The bidirectional CRSF <-> simulator bridge.
pub struct Bridge {
    config: Config,
    stream_format: StreamFormat,
    failsafe_channels: ChannelSet,
}

impl Bridge {
    pub fn new(config: Config) -> Self {
        let stream_format = StreamFormat::new(config.simulator.stream_format.clone());
        let failsafe_channels = config.failsafe.channel_set();
        Self {
            config,
            stream_format,
            failsafe_channels,
        }
    }

    /// Run the bridge until ctrl-c.
    ///
    /// Transport-level failures reopen the radio link with exponential
    /// backoff; only configuration errors or backoff exhaustion
    /// terminate with an error.
    pub async fn run(self) -> Result<()> {
        let mut attempts: u32 = 0;

        loop {
            match RadioTransport::open(&self.config.radio).await {
                Ok(radio) => {
                    info!("radio link up ({})", radio.describe());
                    attempts = 0;

                    match self.run_connected(radio).await {
                        Ok(()) => return Ok(()),
                        Err(e) if is_recoverable(&e) => {
                            warn!("radio link lost: {}", e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) if is_recoverable(&e) => {
                    warn!("failed to open radio transport: {}", e);
                }
                Err(e) => return Err(e),
            }

            attempts += 1;
            let max = self.config.radio.max_reconnect_attempts;
            if max != 0 && attempts >= max {
                return Err(BridgeError::Serial(format!(
                    "giving up after {} reconnect attempts",
                    attempts
                )));
            }

            let backoff = backoff_delay(self.config.radio.reconnect_interval_ms, attempts);
            info!("reconnecting in {:?} (attempt {})", backoff, attempts);
            tokio::time::sleep(backoff).await;
        }
    }

    /// Main loop over one live radio transport. Returns `Ok(())` only on
    /// graceful shutdown; any transport error bubbles up for the
    /// reconnect loop.
    async fn run_connected(&self, mut radio: RadioTransport) -> Result<()> {
        // Control data goes out on a connected socket so ICMP errors
        // surface as send errors we can ignore per-datagram.
        let control_sock = UdpSocket::bind("0.0.0.0:0").await?;
        control_sock
            .connect(&self.config.simulator.control_addr)
            .await?;

        // Telemetry comes either straight from the simulator or from a
        // hub we register with.
        let telemetry_sock = match &self.config.simulator.router_addr {
            Some(router_addr) => {
                let sock = UdpSocket::bind("0.0.0.0:0").await?;
                sock.connect(router_addr).await?;
                sock.send(&[OPCODE_REGISTER]).await?;
                info!("subscribed to telemetry hub at {}", router_addr);
                sock
            }
            None => {
                let sock = UdpSocket::bind(&self.config.simulator.telemetry_bind).await?;
                info!(
                    "listening for simulator telemetry on {}",
                    self.config.simulator.telemetry_bind
                );
                sock
            }
        };

        let mut framer = StreamFramer::new();
        let mut stats = LinkStats::default();
        let mut last_channels: Option<ChannelSet> = None;

        let failsafe_timeout = Duration::from_millis(self.config.failsafe.timeout_ms);
        let mut failsafe = FailsafeGuard::new(failsafe_timeout, Instant::now());
        // Poll at half the timeout so a due emission is never late by
        // more than half a period
        let mut failsafe_tick = interval(failsafe_timeout / 2);

        let telemetry_interval = Duration::from_millis(self.config.telemetry.interval_ms);
        let mut next_telemetry_send = Instant::now();

        let mut stats_tick = interval(Duration::from_millis(self.config.radio.stats_interval_ms));
        let mut keepalive_tick =
            interval(Duration::from_millis(self.config.simulator.keepalive_interval_ms));

        let mut radio_buf = [0u8; 2048];
        let mut telemetry_buf = [0u8; 4096];

        info!("bridge running");

        loop {
            tokio::select! {
                // Control path: radio -> framer -> simulator
                result = radio.recv(&mut radio_buf) => {
                    let n = result?;
                    if n == 0 {
                        return Err(BridgeError::Serial("radio stream closed".to_string()));
                    }

                    framer.extend(&radio_buf[..n]);
                    while let Some(frame) = framer.next_frame() {
                        self.forward_control_frame(
                            &control_sock,
                            &frame,
                            &mut last_channels,
                            &mut failsafe,
                            &mut stats,
                        ).await;
                    }
                }

                // Telemetry path: simulator -> translator -> radio
                result = telemetry_sock.recv(&mut telemetry_buf) => {
                    let n = match result {
                        Ok(n) => n,
                        Err(e) => {
                            // Connected UDP sockets surface ICMP errors
                            // here; the stream itself is fine.
                            debug!("telemetry recv error: {}", e);
                            continue;
                        }
                    };

                    let now = Instant::now();
                    if now < next_telemetry_send {
                        continue;
                    }
                    next_telemetry_send = now + telemetry_interval;

                    self.forward_telemetry(&mut radio, &telemetry_buf[..n], &mut stats).await?;
                }

                // Failsafe: keep the simulator fed when control stops
                _ = failsafe_tick.tick() => {
                    if failsafe.poll(Instant::now()) {
                        let channels = match self.config.failsafe.policy {
                            FailsafePolicy::HoldLast => {
                                last_channels.unwrap_or(self.failsafe_channels)
                            }
                            FailsafePolicy::Preset => self.failsafe_channels,
                        };

                        warn!("no control data within {:?}, emitting failsafe", failsafe_timeout);
                        stats.failsafe_emits += 1;
                        self.send_control_datagram(&control_sock, &channels.to_frame()).await;
                    }
                }

                _ = stats_tick.tick() => {
                    let framer_stats = framer.stats();
                    info!(
                        "link: {} ctrl frames / {} bytes, {} crc errors, {} telemetry frames, {} failsafe",
                        stats.control_frames,
                        stats.control_bytes,
                        framer_stats.crc_errors + stats.crc_errors,
                        stats.telemetry_frames,
                        stats.failsafe_emits,
                    );
                    framer.reset_stats();
                    stats = LinkStats::default();
                }

                // Hub registration doubles as a keepalive
                _ = keepalive_tick.tick() => {
                    if self.config.simulator.router_addr.is_some() {
                        if let Err(e) = telemetry_sock.send(&[OPCODE_REGISTER]).await {
                            debug!("hub keepalive failed: {}", e);
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("received ctrl-c, shutting down bridge");
                    return Ok(());
                }
            }
        }
    }

    /// Forward one validated radio frame to the simulator.
    ///
    /// RC channel frames refresh the failsafe guard and the last
    /// known-good channel set; every valid frame is forwarded as a
    /// type + payload datagram, framing stripped.
    async fn forward_control_frame(
        &self,
        control_sock: &UdpSocket,
        frame: &CrsfFrame,
        last_channels: &mut Option<ChannelSet>,
        failsafe: &mut FailsafeGuard,
        stats: &mut LinkStats,
    ) {
        if frame.frame_type == FrameType::RcChannelsPacked {
            match ChannelSet::unpack(&frame.payload) {
                Ok(channels) => {
                    *last_channels = Some(channels);
                    failsafe.note_control(Instant::now());
                }
                Err(e) => {
                    // Partial channel data never goes downstream
                    debug!("dropping malformed channels frame: {}", e);
                    stats.crc_errors += 1;
                    return;
                }
            }
        }

        stats.control_frames += 1;
        stats.control_bytes += frame.payload.len() as u64 + 1;
        self.send_control_datagram(control_sock, frame).await;
    }

    /// Send a frame's type + payload toward the simulator, absorbing
    /// per-datagram send errors (nobody listening is not a bridge
    /// failure).
    async fn send_control_datagram(&self, control_sock: &UdpSocket, frame: &CrsfFrame) {
        let mut datagram = Vec::with_capacity(1 + frame.payload.len());
        datagram.push(frame.frame_type.to_u8());
        datagram.extend_from_slice(&frame.payload);

        if let Err(e) = control_sock.send(&datagram).await {
            debug!("control send failed: {}", e);
        }
    }

    /// Translate one simulator datagram and write the resulting CRSF
    /// frames to the radio.
    async fn forward_telemetry(
        &self,
        radio: &mut RadioTransport,
        datagram: &[u8],
        stats: &mut LinkStats,
    ) -> Result<()> {
        let sim = match self.stream_format.parse(datagram) {
            Ok(sim) => sim,
            Err(e) => {
                // Corrupt or foreign datagram; drop it, keep the stream
                debug!("unparseable telemetry datagram: {}", e);
                return Ok(());
            }
        };

        let records =
            translate::sim_to_records(&sim, self.config.telemetry.geo_reference());

        for record in records {
            let frame = match record.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("skipping oversized telemetry record: {}", e);
                    continue;
                }
            };

            // encode cannot fail here: to_frame validated the payload
            let wire = codec::encode(&frame)?;
            radio.send(&wire).await?;
            stats.telemetry_frames += 1;
        }

        Ok(())
    }
}

/// Whether an error should trigger a reconnect instead of ending the
/// bridge
fn is_recoverable(error: &BridgeError) -> bool {
    matches!(
        error,
        BridgeError::Serial(_) | BridgeError::SerialPortNotFound(_) | BridgeError::Io(_)
    )
}

/// Exponential backoff, doubling per attempt, capped
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(10);
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}
