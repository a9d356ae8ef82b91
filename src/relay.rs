//! Actuator relay: receives the completion OSC message and writes the
//! unlock byte to the box controller's serial device.

use anyhow::{Context, Result};
use rosc::{decoder, OscPacket};
use std::fs::OpenOptions;
use std::io::Write;
use std::net::UdpSocket;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;

const MAX_DATAGRAM: usize = 1536;

/// Whether `packet` (or any message nested in a bundle) targets `address`.
pub fn packet_matches(packet: &OscPacket, address: &str) -> bool {
    match packet {
        OscPacket::Message(msg) => msg.addr == address,
        OscPacket::Bundle(bundle) => bundle.content.iter().any(|p| packet_matches(p, address)),
    }
}

pub struct BoxRelay {
    socket: UdpSocket,
    address: String,
    device: PathBuf,
    payload: Vec<u8>,
}

impl BoxRelay {
    pub fn bind(config: &RelayConfig, osc_address: &str) -> Result<Self> {
        let socket = UdpSocket::bind(&config.listen_addr)
            .with_context(|| format!("failed to bind {}", config.listen_addr))?;
        Ok(Self {
            socket,
            address: osc_address.to_string(),
            device: PathBuf::from(&config.device),
            payload: config.payload.as_bytes().to_vec(),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Decode one datagram and open the box if it is ours.
    /// Returns true when the payload was written.
    pub fn handle_datagram(&self, data: &[u8]) -> Result<bool> {
        let (_, packet) = decoder::decode_udp(data)
            .map_err(|e| anyhow::anyhow!("invalid OSC packet: {:?}", e))?;
        if !packet_matches(&packet, &self.address) {
            debug!(?packet, "ignoring OSC packet");
            return Ok(false);
        }
        self.open_box()?;
        Ok(true)
    }

    fn open_box(&self) -> Result<()> {
        // Reopened every time so an unplugged device recovers on replug.
        let mut device = OpenOptions::new()
            .write(true)
            .open(&self.device)
            .with_context(|| format!("failed to open {}", self.device.display()))?;
        device.write_all(&self.payload)?;
        device.flush()?;
        info!(device = %self.device.display(), "box opened");
        Ok(())
    }

    /// Blocking receive loop. Per-datagram failures are logged and skipped.
    pub fn run(&self) -> Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let (n, from) = self.socket.recv_from(&mut buf)?;
            if let Err(e) = self.handle_datagram(&buf[..n]) {
                warn!(%from, error = %format!("{:#}", e), "relay failed");
            }
        }
    }
}
