//! CompactSize variable-length integer.
//!
//! CompactSize is used in transaction data to indicate the number of
//! upcoming fields or the length of an upcoming field. The encoding uses
//! 1, 3, 5, or 9 bytes depending on the magnitude of the value.
//!
//! See <http://learnmeabitcoin.com/glossary/varint>

use crate::CodecError;

/// A variable-length integer in the Bitcoin-family wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompactSize(pub u64);

impl CompactSize {
    /// Decode a CompactSize from the front of a byte slice.
    ///
    /// # Arguments
    /// * `data` - Byte slice starting with a CompactSize encoding.
    ///
    /// # Returns
    /// `Ok((value, bytes_consumed))`, or `CodecError::UnexpectedEof` if the
    /// slice is too short for the prefix it announces.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), CodecError> {
        let first = *data.first().ok_or(CodecError::UnexpectedEof)?;
        let need = match first {
            0xff => 9,
            0xfe => 5,
            0xfd => 3,
            _ => 1,
        };
        if data.len() < need {
            return Err(CodecError::UnexpectedEof);
        }
        let value = match first {
            0xff => u64::from_le_bytes([
                data[1], data[2], data[3], data[4], data[5], data[6], data[7], data[8],
            ]),
            0xfe => u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as u64,
            0xfd => u16::from_le_bytes([data[1], data[2]]) as u64,
            b => b as u64,
        };
        Ok((CompactSize(value), need))
    }

    /// Return the wire-format byte length of this value: 1, 3, 5, or 9.
    ///
    /// Values 0-252 take 1 byte; 253-65535 take 3 bytes behind a 0xFD
    /// prefix; up to 2^32-1 take 5 bytes behind 0xFE; anything larger
    /// takes 9 bytes behind 0xFF.
    pub fn size(&self) -> usize {
        if self.0 < 0xfd {
            1
        } else if self.0 <= 0xffff {
            3
        } else if self.0 <= 0xffff_ffff {
            5
        } else {
            9
        }
    }

    /// Alias for `size()`, for readability when the encoded length is being
    /// added into a larger running byte total.
    pub fn total(&self) -> usize {
        self.size()
    }

    /// Write the encoding into a caller-provided buffer.
    ///
    /// # Arguments
    /// * `dst` - Destination buffer; must hold at least `size()` bytes.
    ///
    /// # Returns
    /// `Ok(bytes_written)`, or `CodecError::BufferTooSmall` if the buffer
    /// cannot hold the encoding. Nothing is written on failure.
    pub fn encode_into(&self, dst: &mut [u8]) -> Result<usize, CodecError> {
        let need = self.size();
        if dst.len() < need {
            return Err(CodecError::BufferTooSmall {
                need,
                have: dst.len(),
            });
        }
        match need {
            1 => dst[0] = self.0 as u8,
            3 => {
                dst[0] = 0xfd;
                dst[1..3].copy_from_slice(&(self.0 as u16).to_le_bytes());
            }
            5 => {
                dst[0] = 0xfe;
                dst[1..5].copy_from_slice(&(self.0 as u32).to_le_bytes());
            }
            _ => {
                dst[0] = 0xff;
                dst[1..9].copy_from_slice(&self.0.to_le_bytes());
            }
        }
        Ok(need)
    }

    /// Encode into a freshly allocated byte vector of exactly `size()` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.size()];
        // Buffer is sized exactly; encode_into cannot fail.
        let _ = self.encode_into(&mut buf);
        buf
    }

    /// Return the underlying integer value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CompactSize {
    fn from(v: u64) -> Self {
        CompactSize(v)
    }
}

impl From<usize> for CompactSize {
    fn from(v: usize) -> Self {
        CompactSize(v as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_classes() {
        assert_eq!(CompactSize(0).size(), 1);
        assert_eq!(CompactSize(252).size(), 1);
        assert_eq!(CompactSize(253).size(), 3);
        assert_eq!(CompactSize(65535).size(), 3);
        assert_eq!(CompactSize(65536).size(), 5);
        assert_eq!(CompactSize(4294967295).size(), 5);
        assert_eq!(CompactSize(4294967296).size(), 9);
        assert_eq!(CompactSize(u64::MAX).size(), 9);
    }

    #[test]
    fn total_matches_size() {
        for v in [0u64, 252, 253, 65535, 65536, u64::MAX] {
            assert_eq!(CompactSize(v).total(), CompactSize(v).size());
        }
    }

    #[test]
    fn encode_known_vectors() {
        let cases: Vec<(u64, Vec<u8>)> = vec![
            (0, vec![0x00]),
            (1, vec![0x01]),
            (252, vec![0xfc]),
            (253, vec![0xfd, 0xfd, 0x00]),
            (65535, vec![0xfd, 0xff, 0xff]),
            (65536, vec![0xfe, 0x00, 0x00, 0x01, 0x00]),
            (4294967295, vec![0xfe, 0xff, 0xff, 0xff, 0xff]),
            (4294967296, vec![0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]),
            (u64::MAX, vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]),
        ];
        for (value, expected) in cases {
            let cs = CompactSize(value);
            assert_eq!(cs.to_bytes(), expected, "encoding mismatch for {}", value);
            assert_eq!(cs.to_bytes().len(), cs.size(), "size mismatch for {}", value);
        }
    }

    #[test]
    fn encode_into_rejects_short_buffer() {
        let cs = CompactSize(65536);
        let mut buf = [0u8; 4];
        match cs.encode_into(&mut buf) {
            Err(CodecError::BufferTooSmall { need: 5, have: 4 }) => {}
            other => panic!("expected BufferTooSmall, got {:?}", other),
        }
        // Nothing was written.
        assert_eq!(buf, [0u8; 4]);
    }

    #[test]
    fn decode_boundary_values() {
        for v in [0u64, 1, 252, 253, 65535, 65536, 4294967295, 4294967296] {
            let bytes = CompactSize(v).to_bytes();
            let (decoded, consumed) = CompactSize::decode(&bytes).unwrap();
            assert_eq!(decoded.value(), v);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn decode_truncated_input() {
        assert!(CompactSize::decode(&[]).is_err());
        assert!(CompactSize::decode(&[0xfd, 0x01]).is_err());
        assert!(CompactSize::decode(&[0xfe, 0x01, 0x02]).is_err());
        assert!(CompactSize::decode(&[0xff, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }
}
