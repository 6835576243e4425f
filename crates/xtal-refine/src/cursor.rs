//! Checked sequential access to flat parameter buffers.
//!
//! A cursor hands out consecutive blocks of a caller-owned buffer. Asking for
//! more than remains fails with `BufferTooSmall`; `finish` fails with
//! `BufferTooLarge` if anything is left over. Every traversal of a flat
//! buffer ends with `finish`.

use crate::error::{RefineError, RefineResult};

/// Read-only cursor.
#[derive(Debug)]
pub struct BlockCursor<'a, T> {
    data: &'a [T],
    offset: usize,
    buffer: &'static str,
}

impl<'a, T> BlockCursor<'a, T> {
    /// `buffer` names the buffer's role in error messages, e.g. `"shifts"`.
    pub fn new(data: &'a [T], buffer: &'static str) -> Self {
        Self {
            data,
            offset: 0,
            buffer,
        }
    }

    pub fn take(&mut self, stride: usize) -> RefineResult<&'a [T]> {
        let remaining = self.remaining();
        if stride > remaining {
            return Err(self.too_small(stride, remaining));
        }
        let block = &self.data[self.offset..self.offset + stride];
        self.offset += stride;
        Ok(block)
    }

    pub fn take_one(&mut self) -> RefineResult<&'a T> {
        let block = self.take(1)?;
        Ok(&block[0])
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn at_end(&self) -> bool {
        self.offset == self.data.len()
    }

    pub fn finish(self) -> RefineResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(RefineError::BufferTooLarge {
                buffer: self.buffer,
                consumed: self.offset,
                leftover: self.remaining(),
            })
        }
    }

    fn too_small(&self, requested: usize, remaining: usize) -> RefineError {
        RefineError::BufferTooSmall {
            buffer: self.buffer,
            offset: self.offset,
            requested,
            remaining,
        }
    }
}

/// Read-write cursor. Only the blocks it hands out can be modified.
#[derive(Debug)]
pub struct BlockCursorMut<'a, T> {
    rest: &'a mut [T],
    offset: usize,
    buffer: &'static str,
}

impl<'a, T> BlockCursorMut<'a, T> {
    pub fn new(data: &'a mut [T], buffer: &'static str) -> Self {
        Self {
            rest: data,
            offset: 0,
            buffer,
        }
    }

    pub fn take(&mut self, stride: usize) -> RefineResult<&'a mut [T]> {
        let remaining = self.rest.len();
        if stride > remaining {
            return Err(RefineError::BufferTooSmall {
                buffer: self.buffer,
                offset: self.offset,
                requested: stride,
                remaining,
            });
        }
        let rest = std::mem::take(&mut self.rest);
        let (block, tail) = rest.split_at_mut(stride);
        self.rest = tail;
        self.offset += stride;
        Ok(block)
    }

    pub fn take_one(&mut self) -> RefineResult<&'a mut T> {
        let block = self.take(1)?;
        Ok(&mut block[0])
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    pub fn at_end(&self) -> bool {
        self.rest.is_empty()
    }

    pub fn finish(self) -> RefineResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(RefineError::BufferTooLarge {
                buffer: self.buffer,
                consumed: self.offset,
                leftover: self.rest.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_advances_by_stride() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut cursor = BlockCursor::new(&data, "shifts");
        assert_eq!(cursor.take(3).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(*cursor.take_one().unwrap(), 4.0);
        assert_eq!(cursor.position(), 4);
        assert!(!cursor.at_end());
        assert_eq!(cursor.take(0).unwrap().len(), 0);
        cursor.take_one().unwrap();
        assert!(cursor.at_end());
        cursor.finish().unwrap();
    }

    #[test]
    fn overrun_reports_remaining() {
        let data = [1.0, 2.0];
        let mut cursor = BlockCursor::new(&data, "shifts");
        cursor.take_one().unwrap();
        match cursor.take(6) {
            Err(RefineError::BufferTooSmall {
                buffer,
                offset,
                requested,
                remaining,
            }) => {
                assert_eq!(buffer, "shifts");
                assert_eq!((offset, requested, remaining), (1, 6, 1));
            }
            other => panic!("unexpected {other:?}"),
        }
        // a failed take does not move the cursor
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn leftover_fails_finish() {
        let data = [0.0; 4];
        let mut cursor = BlockCursor::new(&data, "gradients");
        cursor.take(3).unwrap();
        let err = cursor.finish().unwrap_err();
        assert!(matches!(
            err,
            RefineError::BufferTooLarge {
                consumed: 3,
                leftover: 1,
                ..
            }
        ));
    }

    #[test]
    fn mutable_blocks_write_in_place() {
        let mut data = [0.0; 5];
        {
            let mut cursor = BlockCursorMut::new(&mut data, "gradients");
            let first = cursor.take(2).unwrap();
            let second = cursor.take(3).unwrap();
            first[1] = 1.0;
            second[2] = 2.0;
            assert!(cursor.take_one().is_err());
            cursor.finish().unwrap();
        }
        assert_eq!(data, [0.0, 1.0, 0.0, 0.0, 2.0]);
    }
}
