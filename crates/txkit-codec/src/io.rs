//! Cursor-based reader and writer for wire-format binary data.
//!
//! All multi-byte integers are little-endian, matching the Bitcoin-family
//! transaction serialization.

use crate::{CodecError, CompactSize};

/// A cursor over a byte slice for reading wire-format data.
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        WireReader { data, pos: 0 }
    }

    /// Read `n` bytes and advance the cursor.
    ///
    /// # Returns
    /// A slice of length `n`, or `CodecError::UnexpectedEof` if fewer
    /// than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&mut self) -> Result<u16, CodecError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32, CodecError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian u64.
    pub fn read_u64_le(&mut self) -> Result<u64, CodecError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Read a CompactSize and advance the cursor accordingly.
    pub fn read_compact_size(&mut self) -> Result<CompactSize, CodecError> {
        let (value, consumed) = CompactSize::decode(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    /// Number of unread bytes remaining.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// A growable buffer for writing wire-format data.
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Create a new empty writer.
    pub fn new() -> Self {
        WireWriter { buf: Vec::new() }
    }

    /// Create a writer with a pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        WireWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a single byte.
    pub fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    /// Append a little-endian u16.
    pub fn write_u16_le(&mut self, val: u16) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Append a little-endian u32.
    pub fn write_u32_le(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Append a little-endian u64.
    pub fn write_u64_le(&mut self, val: u64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Append a CompactSize in its minimal encoding.
    pub fn write_compact_size(&mut self, cs: CompactSize) {
        self.buf.extend_from_slice(&cs.to_bytes());
    }

    /// Consume the writer and return the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Borrow the current buffer contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for WireWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_writer_roundtrip() {
        let mut writer = WireWriter::new();
        writer.write_u8(0x42);
        writer.write_u16_le(0x1234);
        writer.write_u32_le(0xDEADBEEF);
        writer.write_u64_le(0x0102030405060708);
        writer.write_compact_size(CompactSize(300));
        writer.write_bytes(b"hello");

        let data = writer.into_bytes();
        let mut reader = WireReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x42);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_u64_le().unwrap(), 0x0102030405060708);
        assert_eq!(reader.read_compact_size().unwrap(), CompactSize(300));
        assert_eq!(reader.read_bytes(5).unwrap(), b"hello");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn reader_eof() {
        let mut reader = WireReader::new(&[0x01]);
        assert!(reader.read_u8().is_ok());
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn reader_rejects_oversized_request() {
        // A length field large enough to overflow `pos + n` must fail
        // cleanly, not wrap around the bounds check.
        let mut reader = WireReader::new(&[0u8; 4]);
        assert!(reader.read_bytes(usize::MAX).is_err());
        assert!(reader.read_bytes(5).is_err());
        assert_eq!(reader.read_bytes(4).unwrap(), &[0u8; 4]);
    }

    #[test]
    fn reader_compact_size_classes() {
        let mut reader = WireReader::new(&[0x05]);
        assert_eq!(reader.read_compact_size().unwrap(), CompactSize(5));

        let mut reader = WireReader::new(&[0xfd, 0x00, 0x01]);
        assert_eq!(reader.read_compact_size().unwrap(), CompactSize(256));

        let mut reader = WireReader::new(&[0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(reader.read_compact_size().unwrap(), CompactSize(65536));

        let mut reader =
            WireReader::new(&[0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(reader.read_compact_size().unwrap(), CompactSize(4294967296));
    }
}
