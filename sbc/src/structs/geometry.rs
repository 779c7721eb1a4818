use crate::structs::header::{ChannelMode, FrameHeader, HEADER_LEN, SamplingFrequency};

pub const MAX_CHANNELS: usize = 2;
pub const MAX_SUBBANDS: usize = 8;
pub const MAX_BLOCKS: usize = 16;

/// Lowest bitpool accepted by A2DP sinks.
pub const MIN_BITPOOL: u8 = 2;

/// Values derived from a frame header.
///
/// Frame length follows the A2DP Annex B formula for each channel mode:
///
/// - Mono / Dual channel: `4 + (4*M*C)/8 + ceil(B*C*bitpool/8)`
/// - Stereo: `4 + (4*M*C)/8 + ceil(B*bitpool/8)`
/// - Joint stereo: `4 + (4*M*C)/8 + ceil((M + B*bitpool)/8)`
///
/// where M is the subband count, C the channel count and B the block count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub sampling_frequency: SamplingFrequency,
    pub channel_mode: ChannelMode,
    pub num_channels: usize,
    pub num_blocks: usize,
    pub num_subbands: usize,
    pub bitpool: u8,
    pub frame_length_bytes: usize,
}

impl FrameGeometry {
    pub fn from_header(header: &FrameHeader) -> Self {
        let num_channels = header.channels();
        let num_blocks = header.blocks();
        let num_subbands = header.subbands();
        let bitpool = header.bitpool as usize;

        let payload_bits = match header.channel_mode {
            ChannelMode::Mono | ChannelMode::DualChannel => num_blocks * num_channels * bitpool,
            ChannelMode::Stereo => num_blocks * bitpool,
            ChannelMode::JointStereo => num_subbands + num_blocks * bitpool,
        };

        let frame_length_bytes =
            HEADER_LEN + (4 * num_subbands * num_channels) / 8 + payload_bits.div_ceil(8);

        Self {
            sampling_frequency: header.sampling_frequency,
            channel_mode: header.channel_mode,
            num_channels,
            num_blocks,
            num_subbands,
            bitpool: header.bitpool,
            frame_length_bytes,
        }
    }

    /// Bytes taken by the 4-bit scale factors, which follow the header and
    /// the join flags (joint stereo only).
    pub const fn scale_factor_bytes(&self) -> usize {
        (self.num_subbands * self.num_channels) / 2
    }

    /// Largest bitpool the channel mode can carry without over-allocating.
    pub const fn max_bitpool(&self) -> u32 {
        match self.channel_mode {
            ChannelMode::Mono | ChannelMode::DualChannel => 16 * self.num_subbands as u32,
            ChannelMode::Stereo | ChannelMode::JointStereo => 32 * self.num_subbands as u32,
        }
    }

    pub const fn samples_per_channel(&self) -> usize {
        self.num_blocks * self.num_subbands
    }

    /// Interleaved PCM sample count produced by one frame.
    pub const fn pcm_len(&self) -> usize {
        self.samples_per_channel() * self.num_channels
    }

    pub const fn pcm_format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sampling_frequency.hz(),
            channels: self.num_channels as u16,
            bits_per_sample: 16,
        }
    }
}

/// Interleaved signed 16-bit PCM description handed to audio sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    pub const fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::header::SYNCWORD;

    fn geometry(mode: u8, bitpool: u8) -> FrameGeometry {
        FrameHeader::parse(&[SYNCWORD, mode, bitpool, 0], 0)
            .unwrap()
            .geometry()
    }

    #[test]
    fn annex_b_lengths() {
        // 44.1 kHz, 16 blocks, 8 subbands, loudness
        assert_eq!(geometry(0b10_11_00_0_1, 31).frame_length_bytes, 4 + 4 + 62);
        assert_eq!(geometry(0b10_11_01_0_1, 31).frame_length_bytes, 4 + 8 + 124);
        assert_eq!(geometry(0b10_11_10_0_1, 32).frame_length_bytes, 4 + 8 + 64);
        // Joint stereo at the common A2DP high-quality setting
        assert_eq!(geometry(0b10_11_11_0_1, 53).frame_length_bytes, 119);
        // 4 subbands, 4 blocks, mono, bitpool 2
        assert_eq!(geometry(0b10_00_00_0_0, 2).frame_length_bytes, 7);
    }

    #[test]
    fn frame_length_is_positive_for_every_header() {
        for mode in 0..=u8::MAX {
            for bitpool in 0..=u8::MAX {
                let g = geometry(mode, bitpool);
                assert!(g.frame_length_bytes > HEADER_LEN);
                assert_eq!(g.scale_factor_bytes(), 4 * g.num_subbands * g.num_channels / 8);
            }
        }
    }

    #[test]
    fn derived_counts() {
        let g = geometry(0b01_10_10_1_0, 20);

        assert_eq!(g.sampling_frequency.hz(), 32_000);
        assert_eq!(g.num_blocks, 12);
        assert_eq!(g.num_channels, 2);
        assert_eq!(g.num_subbands, 4);
        assert_eq!(g.samples_per_channel(), 48);
        assert_eq!(g.pcm_len(), 96);
        assert_eq!(g.max_bitpool(), 128);
        assert_eq!(
            g.pcm_format(),
            PcmFormat {
                sample_rate: 32_000,
                channels: 2,
                bits_per_sample: 16
            }
        );
    }
}
