//! Bit-level reading for SBC frame bodies.
//!
//! Frame headers are fixed byte layouts and are decoded with masks; everything
//! after the header (join flags, scale factors, quantised samples) is packed
//! MSB-first with no byte alignment and goes through this reader.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_n({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        self.available().and_then(|avail| {
            if n as u64 > avail {
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "skip_n: out of bounds bits",
                ))
            } else {
                self.bs.skip(n)
            }
        })
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| self.len - pos)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_msb_first_across_byte_boundaries() -> io::Result<()> {
        let mut reader = BsIoSliceReader::from_slice(&[0b1011_0011, 0b1100_0000]);

        assert!(reader.get()?);
        assert_eq!(reader.get_n::<u8>(3)?, 0b011);
        assert_eq!(reader.get_n::<u16>(6)?, 0b0011_11);
        assert_eq!(reader.position()?, 10);
        assert_eq!(reader.available()?, 6);

        reader.skip_n(6)?;
        assert_eq!(reader.available()?, 0);
        assert!(reader.get().is_err());
        Ok(())
    }

    #[test]
    fn skip_rejects_overrun() {
        let mut reader = BsIoSliceReader::from_slice(&[0xFF]);
        assert!(reader.skip_n(9).is_err());
        assert!(reader.skip_n(8).is_ok());
    }
}
