//! SBC frame header.
//!
//! ## Layout
//!
//! | Byte | Bits 7-6 | Bits 5-4 | Bits 3-2 | Bit 1 | Bit 0 |
//! |---|---|---|---|---|---|
//! | 0 | syncword (`0x9C`) | | | | |
//! | 1 | sampling frequency | blocks | channel mode | allocation | subbands |
//! | 2 | bitpool | | | | |
//! | 3 | crc (not validated) | | | | |
//!
//! Every field is a fixed-width mask, so any 4 bytes decode structurally. Only
//! the syncword makes a header well-formed; the remaining fields are nonsense
//! when the offset is wrong, which is what resynchronisation has to detect.

use std::fmt::{self, Display};

use crate::structs::geometry::FrameGeometry;
use crate::utils::errors::HeaderError;

/// Fixed marker opening every SBC frame.
pub const SYNCWORD: u8 = 0x9C;

/// Header length in bytes, including the unvalidated CRC byte.
pub const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplingFrequency {
    F16000,
    F32000,
    F44100,
    F48000,
}

impl SamplingFrequency {
    pub const fn from_code(code: u8) -> Self {
        match code & 0x3 {
            0 => Self::F16000,
            1 => Self::F32000,
            2 => Self::F44100,
            _ => Self::F48000,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn hz(self) -> u32 {
        match self {
            Self::F16000 => 16_000,
            Self::F32000 => 32_000,
            Self::F44100 => 44_100,
            Self::F48000 => 48_000,
        }
    }

    pub fn khz(self) -> f64 {
        self.hz() as f64 / 1000.0
    }
}

impl Display for SamplingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} kHz", self.khz())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    Mono,
    DualChannel,
    Stereo,
    JointStereo,
}

impl ChannelMode {
    pub const fn from_code(code: u8) -> Self {
        match code & 0x3 {
            0 => Self::Mono,
            1 => Self::DualChannel,
            2 => Self::Stereo,
            _ => Self::JointStereo,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn channels(self) -> usize {
        match self {
            Self::Mono => 1,
            _ => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Mono => "Mono",
            Self::DualChannel => "Dual channel",
            Self::Stereo => "Stereo",
            Self::JointStereo => "Joint stereo",
        }
    }
}

impl Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationMethod {
    Loudness,
    Snr,
}

impl AllocationMethod {
    pub const fn from_code(code: u8) -> Self {
        if code & 0x1 == 0 {
            Self::Loudness
        } else {
            Self::Snr
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Loudness => "Loudness",
            Self::Snr => "SNR",
        }
    }
}

impl Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Header fields of a single SBC frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    pub syncword: u8,
    pub sampling_frequency: SamplingFrequency,
    /// Block count is `(code + 1) * 4`.
    pub block_count_code: u8,
    pub channel_mode: ChannelMode,
    pub allocation_method: AllocationMethod,
    /// 0 selects 4 subbands, 1 selects 8.
    pub subband_code: u8,
    pub bitpool: u8,
    pub crc_check: u8,
}

impl FrameHeader {
    /// Extracts the header fields from the 4 bytes at `offset`.
    ///
    /// The syncword is not checked; see [`FrameHeader::parse`].
    pub fn read(buffer: &[u8], offset: usize) -> Result<Self, HeaderError> {
        let Some(bytes) = buffer.get(offset..offset.saturating_add(HEADER_LEN)) else {
            return Err(HeaderError::Truncated {
                offset,
                available: buffer.len().saturating_sub(offset),
            });
        };

        let mode = bytes[1];
        Ok(Self {
            syncword: bytes[0],
            sampling_frequency: SamplingFrequency::from_code(mode >> 6),
            block_count_code: (mode >> 4) & 0x3,
            channel_mode: ChannelMode::from_code(mode >> 2),
            allocation_method: AllocationMethod::from_code(mode >> 1),
            subband_code: mode & 0x1,
            bitpool: bytes[2],
            crc_check: bytes[3],
        })
    }

    /// Reads the header at `offset` and requires a valid syncword.
    pub fn parse(buffer: &[u8], offset: usize) -> Result<Self, HeaderError> {
        let header = Self::read(buffer, offset)?;
        if !header.is_well_formed() {
            return Err(HeaderError::InvalidSyncword {
                offset,
                value: header.syncword,
            });
        }

        Ok(header)
    }

    pub const fn is_well_formed(&self) -> bool {
        self.syncword == SYNCWORD
    }

    /// The packed second header byte.
    pub const fn mode_byte(&self) -> u8 {
        (self.sampling_frequency.code() << 6)
            | ((self.block_count_code & 0x3) << 4)
            | (self.channel_mode.code() << 2)
            | (self.allocation_method.code() << 1)
            | (self.subband_code & 0x1)
    }

    pub const fn to_bytes(&self) -> [u8; HEADER_LEN] {
        [self.syncword, self.mode_byte(), self.bitpool, self.crc_check]
    }

    pub const fn blocks(&self) -> usize {
        (self.block_count_code as usize + 1) * 4
    }

    pub const fn subbands(&self) -> usize {
        if self.subband_code == 0 { 4 } else { 8 }
    }

    pub const fn channels(&self) -> usize {
        self.channel_mode.channels()
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::from_header(self)
    }

    pub fn summary(&self) -> HeaderSummary {
        HeaderSummary {
            sampling_frequency: self.sampling_frequency,
            blocks: self.blocks(),
            channel_mode: self.channel_mode,
            allocation_method: self.allocation_method,
            subbands: self.subbands(),
            bitpool: self.bitpool,
        }
    }
}

/// Human-readable stream description, printed once per stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSummary {
    pub sampling_frequency: SamplingFrequency,
    pub blocks: usize,
    pub channel_mode: ChannelMode,
    pub allocation_method: AllocationMethod,
    pub subbands: usize,
    pub bitpool: u8,
}

impl Display for HeaderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sampling frequency: {}", self.sampling_frequency)?;
        writeln!(f, "Block size: {}", self.blocks)?;
        writeln!(f, "Channel mode: {}", self.channel_mode)?;
        writeln!(f, "Allocation method: {}", self.allocation_method)?;
        writeln!(f, "Subbands: {}", self.subbands)?;
        write!(f, "Bitpool: {}", self.bitpool)
    }
}
