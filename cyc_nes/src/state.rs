//! Binary save-state records.
//!
//! Every component writes a fixed-size little-endian record. The size of a
//! record is known up front through [`Snapshot::state_size`], so a loader can
//! reject a mismatched record before touching any state.

use thiserror::Error;

pub const SAVE_MAGIC: i32 = 1098186332;
pub const SAVE_VERSION: u32 = 0;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("bad save-state magic number {0:#010x}")]
    BadMagic(i32),
    #[error("unsupported save-state version {0}")]
    UnsupportedVersion(u32),
    #[error("{name} record has {found} bytes, expected {expected}")]
    RecordSize {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("save-state data ended early")]
    Truncated,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A component that can be serialized into a fixed-size record.
///
/// `load_state` is only called with a reader holding exactly `state_size`
/// bytes, and implementations decode every field leniently, so a load that
/// passed the size check never fails half way.
pub trait Snapshot {
    fn state_name(&self) -> &'static str;
    fn state_size(&self, version: u32) -> usize;
    fn save_state(&self, w: &mut StateWriter);
    fn load_state(&mut self, r: &mut StateReader<'_>, version: u32) -> Result<(), StateError>;
}

pub fn save_record<T: Snapshot + ?Sized>(item: &T) -> Vec<u8> {
    let mut w = StateWriter::with_capacity(item.state_size(SAVE_VERSION));
    item.save_state(&mut w);
    w.into_inner()
}

pub fn load_record<T: Snapshot + ?Sized>(
    item: &mut T,
    data: &[u8],
    version: u32,
) -> Result<(), StateError> {
    check_size(item, data.len(), version)?;
    item.load_state(&mut StateReader::new(data), version)
}

pub(crate) fn check_size<T: Snapshot + ?Sized>(
    item: &T,
    found: usize,
    version: u32,
) -> Result<(), StateError> {
    let expected = item.state_size(version);
    if found != expected {
        return Err(StateError::RecordSize {
            name: item.state_name(),
            expected,
            found,
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Splits off the next `len` bytes as a reader of their own.
    pub fn take(&mut self, len: usize) -> Result<StateReader<'a>, StateError> {
        Ok(StateReader::new(self.slice(len)?))
    }

    fn slice(&mut self, len: usize) -> Result<&'a [u8], StateError> {
        if self.remaining() < len {
            return Err(StateError::Truncated);
        }
        let s = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(s)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], StateError> {
        let mut a = [0u8; N];
        a.copy_from_slice(self.slice(N)?);
        Ok(a)
    }

    pub fn read_u8(&mut self) -> Result<u8, StateError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, StateError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, StateError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, StateError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, StateError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, StateError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, StateError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), StateError> {
        out.copy_from_slice(self.slice(out.len())?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_bounds() {
        let mut w = StateWriter::new();
        w.write_u16(0xbeef);
        w.write_u32(7);
        w.write_bool(true);
        let data = w.into_inner();
        assert_eq!(data.len(), 7);

        let mut r = StateReader::new(&data);
        assert_eq!(r.read_u16().unwrap(), 0xbeef);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert!(r.read_bool().unwrap());
        assert!(matches!(r.read_u8(), Err(StateError::Truncated)));
    }

    #[test]
    fn test_take_splits_records() {
        let data = [1u8, 2, 3, 4, 5];
        let mut r = StateReader::new(&data);
        let mut head = r.take(2).unwrap();
        assert_eq!(head.read_u16().unwrap(), 0x0201);
        assert_eq!(r.remaining(), 3);
        assert!(r.take(4).is_err());
    }
}
