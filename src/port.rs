//! Byte-sink seam between the playback loop and the physical transport.
//!
//! A [`PortOpener`] is held by the device for its whole life; each playback run
//! opens one [`ActuatorPort`], owns it exclusively, and closes it before
//! releasing the device.

use async_trait::async_trait;

use crate::codec::{PacketCodec, SerialPacket};
use crate::error::Result;
use crate::serial::SerialConfig;

/// An open connection to the actuator array.
#[async_trait]
pub trait ActuatorPort: Send {
    async fn write_packet(&mut self, packet: &SerialPacket) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens connections for a given port configuration.
#[async_trait]
pub trait PortOpener: Send + Sync {
    async fn open(&self, config: &SerialConfig) -> Result<Box<dyn ActuatorPort>>;
}

/// Opens real serial ports through tokio-serial.
#[cfg(feature = "serial")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialPortOpener;

#[cfg(feature = "serial")]
#[async_trait]
impl ActuatorPort for crate::serial::SerialPort {
    async fn write_packet(&mut self, packet: &SerialPacket) -> Result<()> {
        self.write_all(packet.as_bytes()).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        crate::serial::SerialPort::close(*self).await
    }
}

#[cfg(feature = "serial")]
#[async_trait]
impl PortOpener for SerialPortOpener {
    async fn open(&self, config: &SerialConfig) -> Result<Box<dyn ActuatorPort>> {
        let port = crate::serial::SerialPort::open(config)?;
        tracing::info!("Opened {} @ {} baud", config.port, config.baud_rate);
        Ok(Box::new(port))
    }
}

/// Stands in for hardware: decodes every packet and logs it.
#[derive(Clone, Copy, Debug, Default)]
pub struct DryRunOpener {
    codec: PacketCodec,
}

impl DryRunOpener {
    pub fn new(codec: PacketCodec) -> Self {
        Self { codec }
    }
}

struct DryRunPort {
    name: String,
    codec: PacketCodec,
    written: usize,
}

#[async_trait]
impl ActuatorPort for DryRunPort {
    async fn write_packet(&mut self, packet: &SerialPacket) -> Result<()> {
        let lengths = self.codec.decode(packet.as_bytes())?;
        self.written += 1;
        tracing::info!(
            "[dry-run {}] #{} {} -> {:.4?}",
            self.name,
            self.written,
            packet.to_hex(),
            lengths.as_array()
        );
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tracing::info!("[dry-run {}] closed after {} packets", self.name, self.written);
        Ok(())
    }
}

#[async_trait]
impl PortOpener for DryRunOpener {
    async fn open(&self, config: &SerialConfig) -> Result<Box<dyn ActuatorPort>> {
        Ok(Box::new(DryRunPort {
            name: config.port.clone(),
            codec: self.codec,
            written: 0,
        }))
    }
}
