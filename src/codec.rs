//! Serial command codec for the actuator array.
//!
//! Every packet is 24 bytes:
//!
//! ```text
//! [0x55 0xAA]            framing, not part of the checksum
//! [0x13 0xFF 0xF3]       header payload, seeds the checksum
//! 6 x [idx hi lo]        idx = 1..=6, value = i16 big-endian
//! [sum]                  low 8 bits of header payload + all groups
//! ```
//!
//! Each value is `round((length - offset) * scale)` with the calibration
//! offset and scale from [`CodecConfig`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};

/// Number of actuators on the rig.
pub const ACTUATORS: usize = 6;

/// Fixed packet preamble.
pub const HEADER: [u8; 5] = [0x55, 0xAA, 0x13, 0xFF, 0xF3];

/// Total encoded packet size.
pub const PACKET_SIZE: usize = HEADER.len() + ACTUATORS * 3 + 1;

// The first two framing bytes are excluded from the checksum.
const CHECKSUM_SEED: u32 = HEADER[2] as u32 + HEADER[3] as u32 + HEADER[4] as u32;

/// Target extensions for the six linear actuators, as returned by the solver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActuatorLengths(pub [f64; ACTUATORS]);

impl ActuatorLengths {
    /// The same length on every actuator.
    pub fn uniform(length: f64) -> Self {
        Self([length; ACTUATORS])
    }

    pub fn as_array(&self) -> &[f64; ACTUATORS] {
        &self.0
    }
}

/// Calibration applied when quantizing lengths to wire values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Subtracted from each length before scaling.
    pub offset: f64,
    /// Ticks per unit length.
    pub scale: f64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            offset: 0.1569,
            scale: 40000.0,
        }
    }
}

/// An encoded, checksummed packet ready for the port.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SerialPacket([u8; PACKET_SIZE]);

impl SerialPacket {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The trailing checksum byte.
    pub fn checksum(&self) -> u8 {
        self.0[PACKET_SIZE - 1]
    }

    /// Lowercase hex rendering, used in debug logs.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Debug for SerialPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SerialPacket({})", self.to_hex())
    }
}

/// Encoder/decoder bound to one calibration.
#[derive(Clone, Copy, Debug, Default)]
pub struct PacketCodec {
    config: CodecConfig,
}

impl PacketCodec {
    pub fn new(config: CodecConfig) -> Result<Self> {
        if !config.scale.is_finite() || config.scale <= 0.0 || !config.offset.is_finite() {
            return Err(RigError::Config(format!(
                "calibration must be finite with a positive scale, got {:?}",
                config
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Quantize a single length to its wire value.
    fn quantize(&self, actuator: usize, value: f64) -> Result<i16> {
        let ticks = ((value - self.config.offset) * self.config.scale).round();
        if !ticks.is_finite() || ticks < i16::MIN as f64 || ticks > i16::MAX as f64 {
            return Err(RigError::ValueOutOfRange { actuator, value });
        }
        Ok(ticks as i16)
    }

    /// Encode six actuator lengths into a packet.
    pub fn encode(&self, lengths: &ActuatorLengths) -> Result<SerialPacket> {
        let mut buf = [0u8; PACKET_SIZE];
        buf[..HEADER.len()].copy_from_slice(&HEADER);

        let mut sum = CHECKSUM_SEED;
        for (i, &value) in lengths.0.iter().enumerate() {
            let index = (i + 1) as u8;
            let [hi, lo] = self.quantize(i, value)?.to_be_bytes();
            let at = HEADER.len() + i * 3;
            buf[at] = index;
            buf[at + 1] = hi;
            buf[at + 2] = lo;
            sum += index as u32 + hi as u32 + lo as u32;
        }
        buf[PACKET_SIZE - 1] = (sum & 0xFF) as u8;

        Ok(SerialPacket(buf))
    }

    /// Decode a packet back into lengths.
    ///
    /// The rig never answers, so this only serves tests and the dry-run port.
    pub fn decode(&self, data: &[u8]) -> Result<ActuatorLengths> {
        if data.len() != PACKET_SIZE {
            return Err(RigError::MalformedPacket(format!(
                "need {} bytes, got {}",
                PACKET_SIZE,
                data.len()
            )));
        }
        if data[..HEADER.len()] != HEADER {
            return Err(RigError::MalformedPacket(format!(
                "bad header {:02x?}",
                &data[..HEADER.len()]
            )));
        }

        let mut sum = CHECKSUM_SEED;
        let mut lengths = [0.0; ACTUATORS];
        for (i, group) in data[HEADER.len()..PACKET_SIZE - 1].chunks_exact(3).enumerate() {
            if group[0] as usize != i + 1 {
                return Err(RigError::MalformedPacket(format!(
                    "group {} carries index {}",
                    i, group[0]
                )));
            }
            let ticks = i16::from_be_bytes([group[1], group[2]]);
            lengths[i] = ticks as f64 / self.config.scale + self.config.offset;
            sum += group.iter().map(|&b| b as u32).sum::<u32>();
        }

        let expected = (sum & 0xFF) as u8;
        if data[PACKET_SIZE - 1] != expected {
            return Err(RigError::MalformedPacket(format!(
                "checksum {:02x}, expected {:02x}",
                data[PACKET_SIZE - 1],
                expected
            )));
        }

        Ok(ActuatorLengths(lengths))
    }

    /// A packet that holds every actuator at `neutral`.
    pub fn neutral(&self, neutral: &ActuatorLengths) -> Result<SerialPacket> {
        self.encode(neutral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec() -> PacketCodec {
        PacketCodec::default()
    }

    #[test]
    fn test_packet_layout() {
        let packet = codec()
            .encode(&ActuatorLengths([0.1569, 0.1570, 0.1568, 0.2, 0.1, 0.1569]))
            .unwrap();
        let b = packet.as_bytes();
        assert_eq!(b.len(), 24);
        assert_eq!(&b[..5], &HEADER);

        // Indices are 1-based.
        for i in 0..6 {
            assert_eq!(b[5 + i * 3], (i + 1) as u8);
        }

        // 0.1569 -> 0 ticks
        assert_eq!(&b[6..8], &[0x00, 0x00]);
        // 0.1570 -> 4 ticks
        assert_eq!(&b[9..11], &[0x00, 0x04]);
        // 0.1568 -> -4 ticks, big-endian two's complement
        assert_eq!(&b[12..14], &[0xFF, 0xFC]);
        // 0.2 -> 1724 ticks = 0x06BC
        assert_eq!(&b[15..17], &[0x06, 0xBC]);
    }

    #[test]
    fn test_neutral_packet_is_all_zero_ticks() {
        let c = codec();
        let packet = c.neutral(&ActuatorLengths::uniform(0.1569)).unwrap();
        let b = packet.as_bytes();
        for i in 0..6 {
            assert_eq!(&b[6 + i * 3..8 + i * 3], &[0, 0]);
        }
        // 0x13 + 0xFF + 0xF3 + (1+2+3+4+5+6) = 0x205 + 21 = 538 -> 0x1A
        assert_eq!(packet.checksum(), 0x1A);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = codec()
            .encode(&ActuatorLengths([0.1569, 0.1569, 5.0, 0.1569, 0.1569, 0.1569]))
            .unwrap_err();
        assert!(matches!(err, RigError::ValueOutOfRange { actuator: 2, .. }));

        let err = codec()
            .encode(&ActuatorLengths([f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, RigError::ValueOutOfRange { actuator: 0, .. }));
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let c = codec();
        let packet = c.encode(&ActuatorLengths::uniform(0.17)).unwrap();

        let mut bad = packet.as_bytes().to_vec();
        bad[7] ^= 0x01;
        assert!(matches!(c.decode(&bad), Err(RigError::MalformedPacket(_))));

        let mut bad = packet.as_bytes().to_vec();
        bad[0] = 0x00;
        assert!(matches!(c.decode(&bad), Err(RigError::MalformedPacket(_))));

        assert!(c.decode(&packet.as_bytes()[..20]).is_err());
    }

    #[test]
    fn test_invalid_calibration() {
        assert!(PacketCodec::new(CodecConfig {
            offset: 0.0,
            scale: 0.0
        })
        .is_err());
    }

    fn encodable() -> impl Strategy<Value = f64> {
        // Stay inside the i16 window around the offset.
        -0.65..0.97f64
    }

    proptest! {
        #[test]
        fn encode_decode_within_resolution(
            a in encodable(), b in encodable(), c in encodable(),
            d in encodable(), e in encodable(), f in encodable(),
        ) {
            let codec = codec();
            let lengths = ActuatorLengths([a, b, c, d, e, f]);
            let packet = codec.encode(&lengths).unwrap();
            let decoded = codec.decode(packet.as_bytes()).unwrap();
            for (x, y) in lengths.0.iter().zip(decoded.0.iter()) {
                prop_assert!((x - y).abs() <= 0.5 / 40000.0 + 1e-12);
            }
        }

        #[test]
        fn checksum_is_byte_sum(
            a in encodable(), b in encodable(), c in encodable(),
            d in encodable(), e in encodable(), f in encodable(),
        ) {
            let packet = codec().encode(&ActuatorLengths([a, b, c, d, e, f])).unwrap();
            let bytes = packet.as_bytes();
            let sum: u32 = bytes[2..PACKET_SIZE - 1].iter().map(|&x| x as u32).sum();
            prop_assert_eq!(packet.checksum(), (sum % 256) as u8);
        }
    }
}
