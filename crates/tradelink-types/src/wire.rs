//! Binary wire primitives for proxy packets
//!
//! Big-endian fixed-width integers, UTF-8 strings prefixed with a `u16`
//! byte length, and byte blobs prefixed with a `u32` length. Every encoding
//! is self-delimited so icons can be concatenated without framing.

use uuid::Uuid;

use crate::error::{Result, TradeError};

/// Largest string `write_utf` accepts, in bytes
pub const MAX_UTF_LEN: usize = u16::MAX as usize;

/// Growable output buffer
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_uuid(&mut self, value: &Uuid) {
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Length-prefixed UTF-8 string
    pub fn write_utf(&mut self, value: &str) -> Result<()> {
        let len = value.len();
        if len > MAX_UTF_LEN {
            return Err(TradeError::serialization(format!(
                "string of {} bytes exceeds {}",
                len, MAX_UTF_LEN
            )));
        }
        self.write_u16(len as u16);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub fn write_optional_utf(&mut self, value: Option<&str>) -> Result<()> {
        self.write_bool(value.is_some());
        if let Some(value) = value {
            self.write_utf(value)?;
        }
        Ok(())
    }

    /// Length-prefixed opaque bytes
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| TradeError::serialization("byte blob exceeds u32 length"))?;
        self.write_u32(len);
        self.buf.extend_from_slice(value);
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Cursor over an input buffer
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(TradeError::serialization(format!(
                "need {} bytes at offset {}, only {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(TradeError::serialization(format!("invalid bool byte {}", other))),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_uuid(&mut self) -> Result<Uuid> {
        Ok(Uuid::from_bytes(self.take_array()?))
    }

    pub fn read_utf(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| TradeError::serialization(format!("invalid utf-8: {}", e)))
    }

    pub fn read_optional_utf(&mut self) -> Result<Option<String>> {
        if self.read_bool()? {
            Ok(Some(self.read_utf()?))
        } else {
            Ok(None)
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Fail if unread bytes remain
    pub fn expect_end(&self) -> Result<()> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(TradeError::serialization(format!(
                "{} trailing bytes",
                self.remaining()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf_is_length_prefixed() {
        let mut out = WireWriter::new();
        out.write_utf("Steve").unwrap();
        assert_eq!(out.as_bytes(), &[0, 5, b'S', b't', b'e', b'v', b'e']);
    }

    #[test]
    fn test_mixed_fields_read_back_in_order() {
        let id = Uuid::new_v4();
        let mut out = WireWriter::new();
        out.write_u8(7);
        out.write_bool(true);
        out.write_u64(42);
        out.write_uuid(&id);
        out.write_optional_utf(None).unwrap();
        out.write_bytes(&[1, 2, 3]).unwrap();
        let bytes = out.into_bytes();

        let mut input = WireReader::new(&bytes);
        assert_eq!(input.read_u8().unwrap(), 7);
        assert!(input.read_bool().unwrap());
        assert_eq!(input.read_u64().unwrap(), 42);
        assert_eq!(input.read_uuid().unwrap(), id);
        assert_eq!(input.read_optional_utf().unwrap(), None);
        assert_eq!(input.read_bytes().unwrap(), vec![1, 2, 3]);
        input.expect_end().unwrap();
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let mut input = WireReader::new(&[0, 10, b'a']);
        let err = input.read_utf().unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_oversized_string_rejected() {
        let long = "x".repeat(MAX_UTF_LEN + 1);
        assert!(WireWriter::new().write_utf(&long).is_err());
    }

    #[test]
    fn test_invalid_bool_byte() {
        assert!(WireReader::new(&[2]).read_bool().is_err());
    }
}
