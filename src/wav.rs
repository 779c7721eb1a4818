use std::io::{self, Seek, SeekFrom, Write};

use log::warn;
use sbc::structs::geometry::PcmFormat;
use sbcd_macros::{ToBytes, riff_chunk};

use crate::join_bytes_le;

const WAVE_FORMAT_PCM: u16 = 1;

/// Offset of the RIFF size field.
const RIFF_SIZE_POSITION: u64 = 4;

pub trait RiffChunk {
    fn chunk_id(&self) -> &[u8; 4];
    fn chunk_data(&self) -> Vec<u8>;

    fn write_all<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let data = self.chunk_data();
        writer.write_all(self.chunk_id())?;
        writer.write_all(&(data.len() as u32).to_le_bytes())?;
        writer.write_all(&data)?;

        // Chunks are word aligned
        if data.len() % 2 == 1 {
            writer.write_all(&[0])?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ToBytes)]
#[riff_chunk(b"fmt ")]
pub struct FormatChunk {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl FormatChunk {
    pub fn pcm(format: &PcmFormat) -> Self {
        let block_align = format.bytes_per_frame() as u16;
        Self {
            format_tag: WAVE_FORMAT_PCM,
            channels: format.channels,
            sample_rate: format.sample_rate,
            byte_rate: format.sample_rate * block_align as u32,
            block_align,
            bits_per_sample: format.bits_per_sample,
        }
    }
}

/// RIFF/WAVE writer for interleaved 16-bit PCM.
///
/// Sizes are written as placeholders and patched in [`finish`](WAVWriter::finish),
/// which also runs on drop.
pub struct WAVWriter<W: Write + Seek> {
    writer: W,
    format: FormatChunk,
    data_size_position: Option<u64>,
    data_written: u64,
    finished: bool,
}

impl<W: Write + Seek> WAVWriter<W> {
    pub fn new(writer: W, format: &PcmFormat) -> Self {
        Self {
            writer,
            format: FormatChunk::pcm(format),
            data_size_position: None,
            data_written: 0,
            finished: false,
        }
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        if self.data_size_position.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "WAV header already written",
            ));
        }

        self.writer
            .write_all(&join_bytes_le!(*b"RIFF", 0u32, *b"WAVE"))?;
        self.format.write_all(&mut self.writer)?;

        self.writer.write_all(b"data")?;
        self.data_size_position = Some(self.writer.stream_position()?);
        self.writer.write_all(&0u32.to_le_bytes())?;

        Ok(())
    }

    pub fn write_samples(&mut self, samples: &[i16]) -> io::Result<()> {
        if self.data_size_position.is_none() {
            self.write_header()?;
        }
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "WAV writer already finished",
            ));
        }

        let bytes = join_bytes_le!(*samples);
        self.writer.write_all(&bytes)?;
        self.data_written += bytes.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Patches the RIFF and data sizes. Idempotent.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let Some(data_size_position) = self.data_size_position else {
            return Ok(());
        };

        if self.data_written % 2 == 1 {
            self.writer.write_all(&[0])?;
        }

        let end = self.writer.stream_position()?;
        if end > u32::MAX as u64 {
            warn!("WAV output exceeds 4 GiB; size fields are clamped");
        }

        let data_size = self.data_written.min(u32::MAX as u64) as u32;
        let riff_size = (end - 8).min(u32::MAX as u64) as u32;

        self.writer.seek(SeekFrom::Start(data_size_position))?;
        self.writer.write_all(&data_size.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(RIFF_SIZE_POSITION))?;
        self.writer.write_all(&riff_size.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()
    }

    /// Bytes of PCM written to the data chunk.
    pub fn data_written(&self) -> u64 {
        self.data_written
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write + Seek> Drop for WAVWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Failed to finalise WAV output: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const STEREO_44K: PcmFormat = PcmFormat {
        sample_rate: 44_100,
        channels: 2,
        bits_per_sample: 16,
    };

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn format_chunk_layout() {
        let chunk = FormatChunk::pcm(&STEREO_44K);
        assert_eq!(chunk.byte_rate, 176_400);
        assert_eq!(chunk.block_align, 4);

        let mut bytes = Vec::new();
        chunk.write_all(&mut bytes).unwrap();

        assert_eq!(&bytes[..4], b"fmt ");
        assert_eq!(u32_at(&bytes, 4), 16);
        assert_eq!(bytes.len(), 24);
    }

    #[test]
    fn header_and_sizes_are_patched() -> io::Result<()> {
        let mut writer = WAVWriter::new(Cursor::new(Vec::new()), &STEREO_44K);
        writer.write_samples(&[1, -1, 2, -2])?;
        writer.write_samples(&[3, -3])?;
        writer.finish()?;

        let bytes = writer.get_ref().get_ref();
        assert_eq!(bytes.len(), 44 + 12);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(bytes, 4), 36 + 12);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(bytes, 40), 12);
        assert_eq!(&bytes[44..48], &[1, 0, 0xFF, 0xFF]);
        assert_eq!(writer.data_written(), 12);
        Ok(())
    }

    #[test]
    fn finish_is_idempotent_and_blocks_writes() -> io::Result<()> {
        let mut writer = WAVWriter::new(Cursor::new(Vec::new()), &STEREO_44K);
        writer.write_header()?;
        writer.finish()?;
        writer.finish()?;

        assert_eq!(writer.get_ref().get_ref().len(), 44);
        assert!(writer.write_samples(&[0]).is_err());
        Ok(())
    }
}
