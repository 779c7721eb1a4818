use log::trace;

use crate::structs::allocation::{ScaleFactors, allocate_bits};
use crate::structs::geometry::{MAX_BLOCKS, MAX_CHANNELS, MAX_SUBBANDS, MIN_BITPOOL};
use crate::structs::header::{ChannelMode, FrameHeader, HEADER_LEN};
use crate::structs::synthesis::{SynthesisBank, to_pcm16};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::DecodeError;

/// Frame decoder contract used by [`StreamDecoder`](crate::process::stream::StreamDecoder).
///
/// `decode` consumes one frame from the start of `data`. After a failure the
/// caller must not assume anything about how far the frame extended; it
/// finds the next frame start itself and calls `reset` before decoding again.
pub trait FrameCodec {
    /// Discards all filter-bank history and fixes the expected layout.
    fn reset(&mut self, channels: usize, subbands: usize) -> Result<(), DecodeError>;

    /// Decodes the frame at the start of `data` into interleaved 16-bit PCM.
    ///
    /// `pcm` is resized to the frame's sample count and fully overwritten.
    fn decode(&mut self, data: &[u8], pcm: &mut Vec<i16>) -> Result<DecodedFrame, DecodeError>;
}

impl<C: FrameCodec + ?Sized> FrameCodec for Box<C> {
    fn reset(&mut self, channels: usize, subbands: usize) -> Result<(), DecodeError> {
        (**self).reset(channels, subbands)
    }

    fn decode(&mut self, data: &[u8], pcm: &mut Vec<i16>) -> Result<DecodedFrame, DecodeError> {
        (**self).decode(data, pcm)
    }
}

/// Outcome of a successful [`FrameCodec::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    pub header: FrameHeader,
    /// Bytes consumed from the start of the input.
    pub consumed: usize,
}

/// Built-in SBC frame decoder.
///
/// # Example
///
/// ```rust
/// use sbc::process::EXAMPLE_DATA;
/// use sbc::process::decode::{FrameCodec, SbcDecoder};
///
/// let mut decoder = SbcDecoder::default();
/// decoder.reset(1, 4)?;
///
/// let mut pcm = Vec::new();
/// let frame = decoder.decode(EXAMPLE_DATA, &mut pcm)?;
/// assert_eq!(frame.consumed, 7);
/// assert_eq!(pcm.len(), 16);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct SbcDecoder {
    bank: Option<SynthesisBank>,
}

impl SbcDecoder {
    pub fn new(channels: usize, subbands: usize) -> Result<Self, DecodeError> {
        let mut decoder = Self::default();
        decoder.reset(channels, subbands)?;
        Ok(decoder)
    }
}

impl FrameCodec for SbcDecoder {
    fn reset(&mut self, channels: usize, subbands: usize) -> Result<(), DecodeError> {
        if !matches!(channels, 1 | 2) || !matches!(subbands, 4 | 8) {
            return Err(DecodeError::UnsupportedGeometry { channels, subbands });
        }

        match self.bank.as_mut() {
            Some(bank) if bank.channels() == channels && bank.subbands() == subbands => {
                bank.reset()
            }
            _ => self.bank = Some(SynthesisBank::new(channels, subbands)),
        }

        Ok(())
    }

    fn decode(&mut self, data: &[u8], pcm: &mut Vec<i16>) -> Result<DecodedFrame, DecodeError> {
        let header = FrameHeader::parse(data, 0)?;
        let geometry = header.geometry();

        let Some(bank) = self.bank.as_mut() else {
            return Err(DecodeError::NotReset);
        };

        if geometry.num_channels != bank.channels() || geometry.num_subbands != bank.subbands() {
            return Err(DecodeError::GeometryMismatch {
                expected_channels: bank.channels(),
                expected_subbands: bank.subbands(),
                channels: geometry.num_channels,
                subbands: geometry.num_subbands,
            });
        }

        let max = geometry.max_bitpool();
        if header.bitpool < MIN_BITPOOL || header.bitpool as u32 > max {
            return Err(DecodeError::BitpoolOutOfRange {
                bitpool: header.bitpool,
                max,
            });
        }

        let length = geometry.frame_length_bytes;
        if length > data.len() {
            return Err(DecodeError::InvalidFrameLength {
                length,
                available: data.len(),
            });
        }

        let channels = geometry.num_channels;
        let subbands = geometry.num_subbands;
        let blocks = geometry.num_blocks;

        let reader = &mut BsIoSliceReader::from_slice(&data[HEADER_LEN..length]);

        let mut join = [false; MAX_SUBBANDS];
        if header.channel_mode == ChannelMode::JointStereo {
            for flag in join.iter_mut().take(subbands - 1) {
                *flag = reader.get()?;
            }
            // Last join bit is reserved.
            reader.skip_n(1)?;
        }

        let mut scale_factors: ScaleFactors = [[0; MAX_SUBBANDS]; MAX_CHANNELS];
        for sf in scale_factors.iter_mut().take(channels) {
            for value in sf.iter_mut().take(subbands) {
                *value = reader.get_n::<u8>(4)?;
            }
        }

        let bits = allocate_bits(&header, &scale_factors);

        let mut samples = [[[0f32; MAX_SUBBANDS]; MAX_CHANNELS]; MAX_BLOCKS];
        for block in samples.iter_mut().take(blocks) {
            for ch in 0..channels {
                for sb in 0..subbands {
                    let nbits = bits[ch][sb];
                    if nbits == 0 {
                        continue;
                    }

                    let quantised = reader.get_n::<u16>(nbits as u32)? as f32;
                    let levels = ((1u32 << nbits) - 1) as f32;
                    let scale = (1u32 << (scale_factors[ch][sb] + 1)) as f32;
                    block[ch][sb] = scale * ((quantised * 2.0 + 1.0) / levels - 1.0);
                }
            }
        }

        if header.channel_mode == ChannelMode::JointStereo {
            for block in samples.iter_mut().take(blocks) {
                for sb in (0..subbands).filter(|&sb| join[sb]) {
                    let (mid, side) = (block[0][sb], block[1][sb]);
                    block[0][sb] = mid + side;
                    block[1][sb] = mid - side;
                }
            }
        }

        trace!(
            "{} frame: {length} bytes, {} padding bits",
            header.channel_mode,
            reader.available()?
        );

        let pcm_len = geometry.pcm_len();
        if pcm.len() != pcm_len {
            pcm.resize(pcm_len, 0);
        }

        let mut out = [0f32; MAX_SUBBANDS];
        for (blk, block) in samples.iter().enumerate().take(blocks) {
            for (ch, subband_samples) in block.iter().enumerate().take(channels) {
                bank.synthesize(ch, &subband_samples[..subbands], &mut out[..subbands]);
                for (j, &x) in out.iter().enumerate().take(subbands) {
                    pcm[(blk * subbands + j) * channels + ch] = to_pcm16(x);
                }
            }
        }

        Ok(DecodedFrame {
            header,
            consumed: length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::EXAMPLE_DATA;
    use crate::process::fixtures;
    use crate::structs::header::SYNCWORD;

    #[test]
    fn decodes_example_frames_back_to_back() -> Result<(), DecodeError> {
        let mut decoder = SbcDecoder::new(1, 4)?;
        let mut pcm = Vec::new();

        let first = decoder.decode(EXAMPLE_DATA, &mut pcm)?;
        assert_eq!(first.consumed, 7);
        assert_eq!(pcm.len(), 16);

        let second = decoder.decode(&EXAMPLE_DATA[first.consumed..], &mut pcm)?;
        assert_eq!(second.consumed, 7);
        assert_eq!(second.header, first.header);
        Ok(())
    }

    #[test]
    fn decodes_every_channel_mode() -> Result<(), DecodeError> {
        for mode in 0..4u8 {
            for subband_code in 0..2u8 {
                let header = fixtures::header(2, 3, mode, 0, subband_code, 24);
                let frame = fixtures::frame(&header, mode + subband_code);
                let geometry = header.geometry();

                let mut decoder = SbcDecoder::new(geometry.num_channels, geometry.num_subbands)?;
                let mut pcm = Vec::new();
                let decoded = decoder.decode(&frame, &mut pcm)?;

                assert_eq!(decoded.consumed, frame.len());
                assert_eq!(pcm.len(), geometry.pcm_len());
            }
        }
        Ok(())
    }

    #[test]
    fn requires_reset() {
        let mut decoder = SbcDecoder::default();
        let mut pcm = Vec::new();
        assert!(matches!(
            decoder.decode(EXAMPLE_DATA, &mut pcm),
            Err(DecodeError::NotReset)
        ));
    }

    #[test]
    fn rejects_unsupported_reset() {
        let mut decoder = SbcDecoder::default();
        assert!(matches!(
            decoder.reset(3, 8),
            Err(DecodeError::UnsupportedGeometry {
                channels: 3,
                subbands: 8
            })
        ));
    }

    #[test]
    fn failure_modes() -> Result<(), DecodeError> {
        let mut decoder = SbcDecoder::new(1, 4)?;
        let mut pcm = Vec::new();

        let mut bad_sync = EXAMPLE_DATA.to_vec();
        bad_sync[0] = 0x00;
        assert!(matches!(
            decoder.decode(&bad_sync, &mut pcm),
            Err(DecodeError::Header(_))
        ));

        assert!(matches!(
            decoder.decode(&EXAMPLE_DATA[..6], &mut pcm),
            Err(DecodeError::InvalidFrameLength {
                length: 7,
                available: 6
            })
        ));

        let mut bad_bitpool = EXAMPLE_DATA.to_vec();
        bad_bitpool[2] = 65;
        assert!(matches!(
            decoder.decode(&bad_bitpool, &mut pcm),
            Err(DecodeError::BitpoolOutOfRange {
                bitpool: 65,
                max: 64
            })
        ));

        // Stereo frame against a mono context
        let stereo = [SYNCWORD, 0b10_00_10_0_0, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            decoder.decode(&stereo, &mut pcm),
            Err(DecodeError::GeometryMismatch {
                expected_channels: 1,
                channels: 2,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn reset_discards_history() -> Result<(), DecodeError> {
        let header = fixtures::header(2, 3, 2, 0, 1, 32);
        let frame = fixtures::frame(&header, 9);

        let mut fresh = SbcDecoder::new(2, 8)?;
        let mut expected = Vec::new();
        fresh.decode(&frame, &mut expected)?;

        let mut decoder = SbcDecoder::new(2, 8)?;
        let mut pcm = Vec::new();
        decoder.decode(&fixtures::frame(&header, 3), &mut pcm)?;
        decoder.reset(2, 8)?;
        decoder.decode(&frame, &mut pcm)?;

        assert_eq!(pcm, expected);
        Ok(())
    }
}
