//! Sequential big-endian reader over a byte slice.

use crate::error::FormatError;

pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Step back `n` bytes. Never moves before the start of the data.
    pub fn rewind(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        if self.remaining() < N {
            return Err(FormatError::UnexpectedEof {
                pos: self.pos,
                wanted: N,
            });
        }
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(bytes)
    }

    pub fn peek(&self) -> Result<u8, FormatError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(FormatError::UnexpectedEof {
                pos: self.pos,
                wanted: 1,
            })
    }

    pub fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, FormatError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub fn i32(&mut self) -> Result<i32, FormatError> {
        Ok(self.u32()? as i32)
    }

    /// Unsigned variable-width value: one byte below 128, else two bytes.
    pub fn smart(&mut self) -> Result<i32, FormatError> {
        if self.peek()? < 128 {
            Ok(self.u8()? as i32)
        } else {
            Ok(self.u16()? as i32 - 32768)
        }
    }

    /// Signed variable-width value centered on zero.
    pub fn signed_smart(&mut self) -> Result<i32, FormatError> {
        if self.peek()? < 128 {
            Ok(self.u8()? as i32 - 64)
        } else {
            Ok(self.u16()? as i32 - 49152)
        }
    }
}
