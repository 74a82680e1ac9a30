//! Serial port configuration and the async port used to reach the rig.
//!
//! Port access goes through [`tokio-serial`](https://crates.io/crates/tokio-serial)
//! (behind the `serial` feature), which works on Linux, macOS, and Windows.
//!
//! # Example
//!
//! ```no_run
//! use digibow::serial::{SerialConfig, SerialPort};
//!
//! # async fn example() -> digibow::Result<()> {
//! let config = SerialConfig::new("/dev/ttyUSB0", 115200);
//! let mut port = SerialPort::open(&config)?;
//! port.write_all(&[0x55, 0xAA]).await?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};

/// Common baud rates as constants.
pub mod baud {
    /// 9600 baud
    pub const B9600: u32 = 9600;
    /// 19200 baud
    pub const B19200: u32 = 19200;
    /// 57600 baud
    pub const B57600: u32 = 57600;
    /// 115200 baud (most common)
    pub const B115200: u32 = 115200;
}

/// Serial port configuration.
///
/// The port name doubles as the device identity: one rig per port.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    #[serde(alias = "serialPort")]
    pub port: String,
    /// Baud rate (e.g., 9600, 115200)
    #[serde(default = "default_baud", alias = "baudRate")]
    pub baud_rate: u32,
    /// Number of data bits per character
    #[serde(default, alias = "dataBits")]
    pub data_bits: DataBits,
    /// Parity checking mode
    #[serde(default)]
    pub parity: Parity,
    /// Number of stop bits
    #[serde(default, alias = "stopBits")]
    pub stop_bits: StopBits,
}

fn default_baud() -> u32 {
    baud::B115200
}

impl SerialConfig {
    /// Create a new config with common defaults (8N1).
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyUSB0", baud::B115200)
    }
}

/// Number of data bits per character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    /// 8 data bits (most common, default)
    #[default]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = RigError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(RigError::Config(format!("unsupported data bits: {}", other))),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(db: DataBits) -> Self {
        match db {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Parity checking mode.
///
/// Parsed leniently: "even" and "odd" (any case) select those modes,
/// anything else means no parity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Parity {
    /// No parity bit (most common, default)
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "even" | "e" => Parity::Even,
            "odd" | "o" => Parity::Odd,
            _ => Parity::None,
        }
    }
}

impl From<String> for Parity {
    fn from(s: String) -> Self {
        Parity::from_name(&s)
    }
}

impl From<Parity> for String {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => "none",
            Parity::Odd => "odd",
            Parity::Even => "even",
        }
        .to_string()
    }
}

/// Number of stop bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    /// 1 stop bit (most common, default)
    #[default]
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = RigError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(RigError::Config(format!("unsupported stop bits: {}", other))),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(sb: StopBits) -> Self {
        match sb {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

#[cfg(feature = "serial")]
mod native {
    use tokio::io::AsyncWriteExt;
    use tokio_serial::{SerialPortBuilderExt, SerialStream};

    use super::{DataBits, Parity, SerialConfig, StopBits};
    use crate::error::Result;

    impl From<DataBits> for tokio_serial::DataBits {
        fn from(db: DataBits) -> Self {
            match db {
                DataBits::Five => tokio_serial::DataBits::Five,
                DataBits::Six => tokio_serial::DataBits::Six,
                DataBits::Seven => tokio_serial::DataBits::Seven,
                DataBits::Eight => tokio_serial::DataBits::Eight,
            }
        }
    }

    impl From<Parity> for tokio_serial::Parity {
        fn from(p: Parity) -> Self {
            match p {
                Parity::None => tokio_serial::Parity::None,
                Parity::Odd => tokio_serial::Parity::Odd,
                Parity::Even => tokio_serial::Parity::Even,
            }
        }
    }

    impl From<StopBits> for tokio_serial::StopBits {
        fn from(sb: StopBits) -> Self {
            match sb {
                StopBits::One => tokio_serial::StopBits::One,
                StopBits::Two => tokio_serial::StopBits::Two,
            }
        }
    }

    /// An async, write-only connection to the rig's serial port.
    pub struct SerialPort {
        inner: SerialStream,
    }

    impl SerialPort {
        /// Open a serial port with the given configuration.
        pub fn open(config: &SerialConfig) -> Result<Self> {
            let port = tokio_serial::new(&config.port, config.baud_rate)
                .data_bits(config.data_bits.into())
                .parity(config.parity.into())
                .stop_bits(config.stop_bits.into())
                .open_native_async()
                .map_err(|e| {
                    crate::error::RigError::port_io(format!("open {}: {}", config.port, e))
                })?;

            Ok(Self { inner: port })
        }

        /// Write all data to the serial port
        pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
            self.inner.write_all(data).await?;
            Ok(())
        }

        /// Flush and release the port.
        pub async fn close(mut self) -> Result<()> {
            self.inner.flush().await?;
            Ok(())
        }
    }

    /// List available serial ports on the system.
    pub fn list_ports() -> Result<Vec<String>> {
        let ports = tokio_serial::available_ports()
            .map_err(|e| crate::error::RigError::port_io(e.to_string()))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}

#[cfg(feature = "serial")]
pub use native::{list_ports, SerialPort};
