//! Serialization buffer shared by requests and replies
//!
//! Models the raw `HdfSBuf` implementation: every item is stored
//! little-endian and padded to a 4-byte boundary. Strings and byte buffers
//! carry a `u32` length prefix (including the terminating NUL for
//! strings); a null string is a bare zero length.
//!
//! Reads borrow from the buffer. Callers that need a value past the
//! lifetime of the request must copy it, which is exactly what generated
//! stubs do for strings.

use crate::error::{Result, SbufError};

/// Alignment of every item in the buffer
pub const SBUF_ALIGN: usize = 4;

/// Largest payload a generated stub accepts for one array or string
pub const HDI_BUFF_MAX_SIZE: usize = 1024 * 200;

/// Handle value that denotes "no remote service"
pub const REMOTE_NULL: u32 = 0;

/// Request/reply buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HdfSbuf {
    data: Vec<u8>,
    read_pos: usize,
    capacity: Option<usize>,
}

fn align_up(len: usize) -> usize {
    (len + SBUF_ALIGN - 1) & !(SBUF_ALIGN - 1)
}

impl HdfSbuf {
    /// Create an empty, unbounded buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer whose writes fail once `capacity` bytes are used
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            read_pos: 0,
            capacity: Some(capacity),
        }
    }

    /// Wrap bytes received from a peer
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            read_pos: 0,
            capacity: None,
        }
    }

    /// Raw serialized contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes written
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Current read offset
    pub fn read_offset(&self) -> usize {
        self.read_pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_pos)
    }

    /// Drop everything past `len` bytes, simulating a short transfer
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        self.read_pos = self.read_pos.min(self.data.len());
    }

    /// Reset the read cursor to the start
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    fn reserve(&self, needed: usize) -> Result<()> {
        match self.capacity {
            Some(capacity) if self.data.len() + needed > capacity => {
                Err(SbufError::Overflow { needed, capacity })
            }
            _ => Ok(()),
        }
    }

    fn write_aligned(&mut self, bytes: &[u8]) -> Result<()> {
        let padded = align_up(bytes.len());
        self.reserve(padded)?;
        self.data.extend_from_slice(bytes);
        self.data.resize(self.data.len() + padded - bytes.len(), 0);
        Ok(())
    }

    fn read_aligned(&mut self, len: usize) -> Result<&[u8]> {
        let padded = align_up(len);
        if self.remaining() < padded {
            return Err(SbufError::Truncated {
                offset: self.read_pos,
                needed: padded,
                remaining: self.remaining(),
            });
        }
        let start = self.read_pos;
        self.read_pos += padded;
        Ok(&self.data[start..start + len])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_aligned(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_aligned(&value.to_le_bytes())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_aligned(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_aligned(&value.to_le_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_aligned(&value.to_le_bytes())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_aligned(&value.to_le_bytes())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_aligned(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_aligned(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_aligned(&value.to_le_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_aligned(&value.to_bits().to_le_bytes())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_aligned(&value.to_bits().to_le_bytes())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(u8::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(u32::from_le_bytes(self.read_array()?)))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_le_bytes(self.read_array()?)))
    }

    /// Write a length-prefixed byte buffer
    pub fn write_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(SBUF_ALIGN + align_up(bytes.len()))?;
        self.write_u32(bytes.len() as u32)?;
        self.write_aligned(bytes)
    }

    /// Consume a length-prefixed item, returning its payload range
    fn read_buffer_range(&mut self) -> Result<(usize, usize)> {
        let start = self.read_pos;
        let len = self.read_u32()? as usize;
        if let Err(err) = self.read_aligned(len).map(|_| ()) {
            self.read_pos = start;
            return Err(err);
        }
        Ok((start + SBUF_ALIGN, len))
    }

    /// Read a length-prefixed byte buffer, borrowing from `self`
    pub fn read_buffer(&mut self) -> Result<&[u8]> {
        let (offset, len) = self.read_buffer_range()?;
        Ok(&self.data[offset..offset + len])
    }

    /// Write a string, or the null string for `None`
    pub fn write_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            None => self.write_u32(0),
            Some(text) => {
                let mut bytes = Vec::with_capacity(text.len() + 1);
                bytes.extend_from_slice(text.as_bytes());
                bytes.push(0);
                self.write_buffer(&bytes)
            }
        }
    }

    /// Read a string, borrowing from `self`
    ///
    /// The returned slice dies with the buffer; stubs duplicate it.
    pub fn read_string(&mut self) -> Result<&str> {
        let start = self.read_pos;
        let (offset, len) = self.read_buffer_range()?;
        let check = match self.data[offset..offset + len].split_last() {
            Some((&0, text)) => std::str::from_utf8(text)
                .map(|_| ())
                .map_err(|_| SbufError::InvalidUtf8(start)),
            Some(_) => Err(SbufError::Unterminated(start)),
            None => Err(SbufError::NullString(start)),
        };
        if let Err(err) = check {
            self.read_pos = start;
            return Err(err);
        }
        std::str::from_utf8(&self.data[offset..offset + len - 1])
            .map_err(|_| SbufError::InvalidUtf8(start))
    }

    /// Write a remote service handle (the null handle is `REMOTE_NULL`)
    pub fn write_remote_service(&mut self, handle: u32) -> Result<()> {
        self.write_u32(handle)
    }

    /// Read a remote service handle; the null handle is an error
    pub fn read_remote_service(&mut self) -> Result<u32> {
        let start = self.read_pos;
        let handle = self.read_u32()?;
        if handle == REMOTE_NULL {
            self.read_pos = start;
            return Err(SbufError::NullRemote(start));
        }
        Ok(handle)
    }

    /// Write a file descriptor
    pub fn write_file_descriptor(&mut self, fd: i32) -> Result<()> {
        self.write_i32(fd)
    }

    /// Read a file descriptor; negative descriptors are rejected
    pub fn read_file_descriptor(&mut self) -> Result<i32> {
        let start = self.read_pos;
        let fd = self.read_i32()?;
        if fd < 0 {
            self.read_pos = start;
            return Err(SbufError::BadFd { offset: start, fd });
        }
        Ok(fd)
    }
}
