//! Fixed-size telemetry frame.

use crate::crc::checksum;
use crate::{FrameError, FrameResult};

/// Sentinel at offset 0, little-endian on the wire (`5A A5`).
pub const FRAME_MAGIC: u16 = 0xA55A;
/// Only protocol version accepted by [`decode`].
pub const FRAME_VERSION: u8 = 1;
/// Total frame size in bytes, including the checksum trailer.
pub const FRAME_LEN: usize = 14;
/// Magic sentinel as it appears on the wire.
pub const MAGIC_BYTES: [u8; 2] = FRAME_MAGIC.to_le_bytes();

/// Value carried by the `length` field.
const FRAME_LEN_FIELD: u8 = FRAME_LEN as u8;

const VERSION_OFFSET: usize = 2;
const LENGTH_OFFSET: usize = 3;
const RPM_OFFSET: usize = 4;
const VSS_OFFSET: usize = 6;
const FLAGS_OFFSET: usize = 8;
const AUX_OFFSET: usize = 10;
/// The checksum covers every byte before this offset.
pub const CHECKSUM_OFFSET: usize = 12;

/// Decoded payload of one telemetry frame.
///
/// Magic, version and length are protocol constants and are validated rather
/// than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Frame {
    /// Engine speed, raw integer rpm.
    pub rpm: u16,
    /// Vehicle speed sensor reading in centimetres per second.
    pub vss_cm_s: u16,
    /// Indicator bits plus fuel level, see [`crate::flags`].
    pub flags: u16,
    /// Reserved word; current firmware sends zero.
    pub aux: u16,
}

impl Frame {
    pub const fn new(rpm: u16, vss_cm_s: u16, flags: u16) -> Self {
        Self {
            rpm,
            vss_cm_s,
            flags,
            aux: 0,
        }
    }

    /// Vehicle speed as reported to the gauges.
    ///
    /// Uses the firmware's conversion `(vss / 100.0) * 0.036` verbatim so the
    /// displayed value matches the reference cluster.
    pub fn speed_kmh(&self) -> f64 {
        (f64::from(self.vss_cm_s) / 100.0) * 0.036
    }

    /// Decode and validate a frame. See [`decode`].
    pub fn decode(bytes: &[u8]) -> FrameResult<Self> {
        decode(bytes)
    }

    /// Encode into wire bytes. See [`encode`].
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        encode(self)
    }
}

fn read_u16(raw: &[u8; FRAME_LEN], offset: usize) -> u16 {
    let lo = raw.get(offset).copied().unwrap_or_default();
    let hi = raw.get(offset.wrapping_add(1)).copied().unwrap_or_default();
    u16::from_le_bytes([lo, hi])
}

fn write_u16(raw: &mut [u8; FRAME_LEN], offset: usize, value: u16) {
    if let Some(slot) = raw.get_mut(offset..offset.wrapping_add(2)) {
        slot.copy_from_slice(&value.to_le_bytes());
    }
}

/// Decode one frame from the start of `bytes`.
///
/// Checks are applied in wire order: magic, version, length, checksum. Input
/// longer than [`FRAME_LEN`] is decoded from its first `FRAME_LEN` bytes;
/// shorter input is rejected as [`FrameError::Truncated`].
pub fn decode(bytes: &[u8]) -> FrameResult<Frame> {
    let Some(raw) = bytes.first_chunk::<FRAME_LEN>() else {
        return Err(FrameError::Truncated {
            expected: FRAME_LEN,
            actual: bytes.len(),
        });
    };

    let magic = read_u16(raw, 0);
    if magic != FRAME_MAGIC {
        return Err(FrameError::BadMagic {
            expected: FRAME_MAGIC,
            found: magic,
        });
    }

    let version = raw[VERSION_OFFSET];
    if version != FRAME_VERSION {
        return Err(FrameError::BadVersion {
            expected: FRAME_VERSION,
            found: version,
        });
    }

    let length = raw[LENGTH_OFFSET];
    if length != FRAME_LEN_FIELD {
        return Err(FrameError::BadLength {
            expected: FRAME_LEN_FIELD,
            found: length,
        });
    }

    let (body, _) = raw.split_at(CHECKSUM_OFFSET);
    let computed = checksum(body);
    let received = read_u16(raw, CHECKSUM_OFFSET);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { received, computed });
    }

    Ok(Frame {
        rpm: read_u16(raw, RPM_OFFSET),
        vss_cm_s: read_u16(raw, VSS_OFFSET),
        flags: read_u16(raw, FLAGS_OFFSET),
        aux: read_u16(raw, AUX_OFFSET),
    })
}

/// Encode `frame` into its 14 wire bytes, checksum included.
///
/// Only test harnesses and the simulator need this; the ingestion path never
/// encodes.
pub fn encode(frame: &Frame) -> [u8; FRAME_LEN] {
    let mut raw = [0u8; FRAME_LEN];
    write_u16(&mut raw, 0, FRAME_MAGIC);
    raw[VERSION_OFFSET] = FRAME_VERSION;
    raw[LENGTH_OFFSET] = FRAME_LEN_FIELD;
    write_u16(&mut raw, RPM_OFFSET, frame.rpm);
    write_u16(&mut raw, VSS_OFFSET, frame.vss_cm_s);
    write_u16(&mut raw, FLAGS_OFFSET, frame.flags);
    write_u16(&mut raw, AUX_OFFSET, frame.aux);

    let (body, _) = raw.split_at(CHECKSUM_OFFSET);
    let crc = checksum(body);
    write_u16(&mut raw, CHECKSUM_OFFSET, crc);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&Frame::new(2500, 2000, 0x0005));
        assert_eq!(&bytes[..4], &[0x5A, 0xA5, 0x01, 0x0E]);
        assert_eq!(&bytes[4..6], &2500u16.to_le_bytes());
        assert_eq!(&bytes[6..8], &2000u16.to_le_bytes());
        assert_eq!(&bytes[8..10], &[0x05, 0x00]);
        assert_eq!(&bytes[10..12], &[0x00, 0x00]);
        let crc = checksum(&bytes[..12]);
        assert_eq!(&bytes[12..], &crc.to_le_bytes());
    }

    #[test]
    fn test_decode_valid() -> TestResult {
        let frame = Frame {
            rpm: 7200,
            vss_cm_s: 3333,
            flags: 0b1010_0101,
            aux: 0xBEEF,
        };
        let decoded = decode(&encode(&frame))?;
        assert_eq!(decoded, frame);
        Ok(())
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let bytes = encode(&Frame::default());
        let result = decode(&bytes[..FRAME_LEN - 1]);
        assert_eq!(
            result,
            Err(FrameError::Truncated {
                expected: FRAME_LEN,
                actual: FRAME_LEN - 1
            })
        );
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = encode(&Frame::default());
        bytes[1] = 0x00;
        assert!(matches!(
            decode(&bytes),
            Err(FrameError::BadMagic { found: 0x005A, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_version_before_checksum() {
        let mut bytes = encode(&Frame::default());
        bytes[2] = 2;
        assert_eq!(
            decode(&bytes),
            Err(FrameError::BadVersion {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let mut bytes = encode(&Frame::default());
        bytes[3] = 12;
        assert_eq!(
            decode(&bytes),
            Err(FrameError::BadLength {
                expected: 14,
                found: 12
            })
        );
    }

    #[test]
    fn test_decode_rejects_corrupted_payload() {
        let mut bytes = encode(&Frame::new(1000, 500, 0));
        bytes[5] ^= 0x40;
        assert!(matches!(
            decode(&bytes),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_uses_leading_frame_of_longer_input() -> TestResult {
        let frame = Frame::new(900, 100, 3);
        let mut bytes = encode(&frame).to_vec();
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        assert_eq!(decode(&bytes)?, frame);
        Ok(())
    }

    #[test]
    fn test_speed_conversion_formula() {
        let frame = Frame::new(0, 2000, 0);
        assert!((frame.speed_kmh() - 0.72).abs() < 1e-12);
        assert!(Frame::new(0, 0, 0).speed_kmh().abs() < f64::EPSILON);
    }
}
