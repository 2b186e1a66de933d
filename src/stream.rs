//! Ordered primitive-field persistence stream.
//!
//! [`StreamWriter`] appends fields; [`StreamReader`] reads them back in the
//! same order. Integers and floats are little-endian, strings and sequences
//! are prefixed with a `u32` length. Node handles are written as their raw
//! `u32` index and resolved by the reader's owner.

use crate::error::FormatError;
use crate::graph::NodeId;

/// Append-only field writer.
#[derive(Clone, Debug, Default)]
pub struct StreamWriter {
    buf: Vec<u8>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_str(&mut self, v: &str) {
        self.write_u32(v.len() as u32);
        self.buf.extend_from_slice(v.as_bytes());
    }

    pub fn write_node(&mut self, id: NodeId) {
        self.write_u32(id.0);
    }

    pub fn write_f64s(&mut self, v: &[f64]) {
        self.write_u32(v.len() as u32);
        for &x in v {
            self.write_f64(x);
        }
    }

    pub fn write_usizes(&mut self, v: &[usize]) {
        self.write_u32(v.len() as u32);
        for &x in v {
            self.write_u64(x as u64);
        }
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential field reader over a byte slice.
#[derive(Clone, Debug)]
pub struct StreamReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        StreamReader { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let bytes = self.take_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn take_slice(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < n {
            return Err(FormatError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, FormatError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, FormatError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, FormatError> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, FormatError> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    pub fn read_str(&mut self) -> Result<String, FormatError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take_slice(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| FormatError::InvalidUtf8)
    }

    /// Raw node handle; the caller maps it to a live node.
    pub fn read_handle(&mut self) -> Result<u32, FormatError> {
        self.read_u32()
    }

    pub fn read_f64s(&mut self) -> Result<Vec<f64>, FormatError> {
        let n = self.read_u32()? as usize;
        // Bound the allocation by what the stream can actually hold.
        if self.remaining() < n.saturating_mul(8) {
            return Err(FormatError::Truncated {
                needed: n.saturating_mul(8),
                remaining: self.remaining(),
            });
        }
        (0..n).map(|_| self.read_f64()).collect()
    }

    pub fn read_usizes(&mut self) -> Result<Vec<usize>, FormatError> {
        let n = self.read_u32()? as usize;
        if self.remaining() < n.saturating_mul(8) {
            return Err(FormatError::Truncated {
                needed: n.saturating_mul(8),
                remaining: self.remaining(),
            });
        }
        (0..n).map(|_| self.read_u64().map(|v| v as usize)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_read_back_in_order() {
        let mut w = StreamWriter::new();
        w.write_u8(7);
        w.write_bool(true);
        w.write_i64(-3);
        w.write_f64(0.25);
        w.write_str("offset");
        w.write_f64s(&[1.0, 2.0]);

        let bytes = w.into_bytes();
        let mut r = StreamReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_i64().unwrap(), -3);
        assert_eq!(r.read_f64().unwrap(), 0.25);
        assert_eq!(r.read_str().unwrap(), "offset");
        assert_eq!(r.read_f64s().unwrap(), vec![1.0, 2.0]);
        assert!(r.is_at_end());
    }

    #[test]
    fn truncation_is_reported() {
        let mut w = StreamWriter::new();
        w.write_u32(5);
        let bytes = w.into_bytes();
        let mut r = StreamReader::new(&bytes[..3]);
        assert_eq!(
            r.read_u32(),
            Err(FormatError::Truncated {
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn huge_length_prefix_does_not_allocate() {
        let mut w = StreamWriter::new();
        w.write_u32(u32::MAX);
        let bytes = w.into_bytes();
        let mut r = StreamReader::new(&bytes);
        assert!(matches!(r.read_f64s(), Err(FormatError::Truncated { .. })));
    }
}
