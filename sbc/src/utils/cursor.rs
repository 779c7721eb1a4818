use crate::utils::errors::CursorError;

/// Bounds-checked read position over a borrowed byte buffer.
///
/// Advances and seeks are rejected rather than clamped, so the remaining
/// length can never go out of step with the position.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes from the current position to the end of the buffer.
    #[inline(always)]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.data
    }

    pub fn advance(&mut self, n: usize) -> Result<(), CursorError> {
        if n > self.remaining() {
            return Err(CursorError::OutOfBounds {
                requested: n,
                remaining: self.remaining(),
            });
        }

        self.pos += n;
        Ok(())
    }

    /// Moves to an absolute offset. Seeking to `len` (end of buffer) is allowed.
    pub fn seek(&mut self, offset: usize) -> Result<(), CursorError> {
        if offset > self.data.len() {
            return Err(CursorError::OutOfBounds {
                requested: offset.saturating_sub(self.pos),
                remaining: self.remaining(),
            });
        }

        self.pos = offset;
        Ok(())
    }

    pub fn seek_end(&mut self) {
        self.pos = self.data.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_bounds_checked() {
        let data = [0u8; 8];
        let mut cursor = ByteCursor::new(&data);

        assert!(cursor.advance(5).is_ok());
        assert_eq!(cursor.remaining(), 3);
        assert_eq!(
            cursor.advance(4),
            Err(CursorError::OutOfBounds {
                requested: 4,
                remaining: 3
            })
        );
        assert_eq!(cursor.position(), 5);

        assert!(cursor.advance(3).is_ok());
        assert!(cursor.is_empty());
        assert!(cursor.rest().is_empty());
    }

    #[test]
    fn seek_allows_end_but_not_beyond() {
        let data = [1u8, 2, 3];
        let mut cursor = ByteCursor::new(&data);

        assert!(cursor.seek(3).is_ok());
        assert!(cursor.is_empty());
        assert!(cursor.seek(4).is_err());

        cursor.seek(1).unwrap();
        assert_eq!(cursor.rest(), &[2, 3]);
    }
}
