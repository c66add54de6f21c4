//! CRC-16/X-25 frame checksum.
//!
//! Polynomial 0x1021, reflected input and output, initial value 0xFFFF,
//! final XOR 0xFFFF. The catalogue name used by the `crc` crate is
//! `CRC_16_IBM_SDLC`.

use crc::{CRC_16_IBM_SDLC, Crc};

/// Shared, table-driven X-25 instance.
pub const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

/// Compute the frame checksum over `bytes`.
#[inline]
pub fn checksum(bytes: &[u8]) -> u16 {
    X25.checksum(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_check_value() {
        assert_eq!(checksum(b"123456789"), 0x906E);
    }

    #[test]
    fn test_empty_input() {
        // init 0xFFFF xor-out 0xFFFF with no data
        assert_eq!(checksum(&[]), 0x0000);
    }

    #[test]
    fn test_matches_bitwise_reference() {
        fn bitwise(data: &[u8]) -> u16 {
            let mut crc: u16 = 0xFFFF;
            for &byte in data {
                crc ^= u16::from(byte);
                for _ in 0..8 {
                    crc = if crc & 1 != 0 {
                        (crc >> 1) ^ 0x8408
                    } else {
                        crc >> 1
                    };
                }
            }
            crc ^ 0xFFFF
        }

        let samples: [&[u8]; 4] = [
            b"",
            &[0x5A, 0xA5, 0x01, 0x0E],
            &[0x00; 12],
            &[0xFF, 0x10, 0x21, 0x80, 0x7F],
        ];
        for sample in samples {
            assert_eq!(checksum(sample), bitwise(sample), "sample {sample:02x?}");
        }
    }
}
