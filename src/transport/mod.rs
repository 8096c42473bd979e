//! # Radio Transport
//!
//! Byte-oriented duplex link to the radio hardware carrying raw CRSF
//! frames: either a serial device (ELRS/Crossfire module over USB) or a
//! UDP tunnel for setups where another host owns the serial port.
//!
//! Transport-level failures are recoverable; the bridge reopens the
//! transport with backoff rather than exiting.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UdpSocket;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::{RadioConfig, RadioTransportKind};
use crate::error::{BridgeError, Result};

/// CRSF baud rate for ELRS modules (420,000 baud)
pub const CRSF_BAUD_RATE: u32 = 420_000;

/// Default radio serial device paths to try, in order of preference
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices (most common for ELRS)
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Open duplex link to the radio hardware.
pub enum RadioTransport {
    /// Direct serial connection
    Serial {
        port: tokio_serial::SerialStream,
        device_path: String,
    },
    /// UDP tunnel; frames travel as datagram payloads. The peer address
    /// is learned from the first datagram received, like a connect-back
    /// server.
    Udp {
        socket: UdpSocket,
        peer: Option<std::net::SocketAddr>,
    },
}

impl std::fmt::Debug for RadioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RadioTransport::Serial { device_path, .. } => f
                .debug_struct("RadioTransport::Serial")
                .field("device_path", device_path)
                .finish_non_exhaustive(),
            RadioTransport::Udp { peer, .. } => f
                .debug_struct("RadioTransport::Udp")
                .field("peer", peer)
                .finish_non_exhaustive(),
        }
    }
}

impl RadioTransport {
    /// Open the transport described by the radio configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no serial device can be opened or the UDP
    /// socket cannot be bound.
    pub async fn open(config: &RadioConfig) -> Result<Self> {
        match config.transport {
            RadioTransportKind::Serial => {
                let mut paths: Vec<&str> = Vec::new();
                if !config.port.is_empty() {
                    paths.push(config.port.as_str());
                }
                paths.extend_from_slice(DEFAULT_DEVICE_PATHS);
                Self::open_serial(&paths, config.baud_rate)
            }
            RadioTransportKind::Udp => {
                let socket = UdpSocket::bind(&config.udp_bind).await?;
                info!("radio UDP tunnel listening on {}", config.udp_bind);
                Ok(Self::Udp { socket, peer: None })
            }
        }
    }

    /// Open the first serial device that responds, with CRSF settings
    /// (8N1, no flow control).
    fn open_serial(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("trying to open serial port: {}", path);

            match tokio_serial::new(*path, baud_rate)
                .data_bits(tokio_serial::DataBits::Eight)
                .parity(tokio_serial::Parity::None)
                .stop_bits(tokio_serial::StopBits::One)
                .flow_control(tokio_serial::FlowControl::None)
                .open_native_async()
            {
                Ok(port) => {
                    info!("opened radio serial device at {}", path);
                    return Ok(Self::Serial {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(BridgeError::SerialPortNotFound(paths.join(", ")))
    }

    /// Receive the next chunk of radio bytes into `buf`.
    ///
    /// For serial this is whatever the driver has buffered; for UDP one
    /// datagram. A return of 0 from the serial port means the device
    /// went away.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            RadioTransport::Serial { port, .. } => {
                let n = port
                    .read(buf)
                    .await
                    .map_err(|e| BridgeError::Serial(format!("serial read failed: {}", e)))?;
                Ok(n)
            }
            RadioTransport::Udp { socket, peer } => {
                let (n, addr) = socket.recv_from(buf).await?;
                if peer.map(|p| p != addr).unwrap_or(true) {
                    info!("radio tunnel peer is now {}", addr);
                    *peer = Some(addr);
                }
                Ok(n)
            }
        }
    }

    /// Send a complete CRSF frame to the radio.
    ///
    /// On the UDP tunnel the frame is silently dropped until a peer has
    /// been learned.
    pub async fn send(&mut self, frame: &[u8]) -> Result<()> {
        match self {
            RadioTransport::Serial { port, .. } => {
                port.write_all(frame)
                    .await
                    .map_err(|e| BridgeError::Serial(format!("serial write failed: {}", e)))?;
                port.flush()
                    .await
                    .map_err(|e| BridgeError::Serial(format!("serial flush failed: {}", e)))?;
                debug!("sent CRSF frame ({} bytes)", frame.len());
                Ok(())
            }
            RadioTransport::Udp { socket, peer } => {
                if let Some(addr) = peer {
                    socket.send_to(frame, *addr).await?;
                    debug!("sent CRSF frame ({} bytes) to {}", frame.len(), addr);
                } else {
                    debug!("no tunnel peer yet, dropping outgoing frame");
                }
                Ok(())
            }
        }
    }

    /// Human-readable description for log lines
    pub fn describe(&self) -> String {
        match self {
            RadioTransport::Serial { device_path, .. } => format!("serial {}", device_path),
            RadioTransport::Udp { socket, .. } => match socket.local_addr() {
                Ok(addr) => format!("udp {}", addr),
                Err(_) => "udp".to_string(),
            },
        }
    }
}
