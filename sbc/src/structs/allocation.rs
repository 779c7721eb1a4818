//! Bit allocation (A2DP 12.6.3).
//!
//! Mono and dual channel frames allocate each channel's bitpool on its own.
//! Stereo and joint stereo frames share one bitpool across both channels,
//! walking subbands with the channels interleaved.

use crate::structs::geometry::{MAX_CHANNELS, MAX_SUBBANDS};
use crate::structs::header::{AllocationMethod, ChannelMode, FrameHeader, SamplingFrequency};

pub type ScaleFactors = [[u8; MAX_SUBBANDS]; MAX_CHANNELS];
pub type BitAllocation = [[u8; MAX_SUBBANDS]; MAX_CHANNELS];

const MAX_BITS: i32 = 16;

// Keeps the slicing loop finite for bitpools the decoder did not range-check.
const MIN_BITSLICE: i32 = -32;

const LOUDNESS_OFFSET_4: [[i32; 4]; 4] = [[-1, 0, 0, 0], [-2, 0, 0, 1], [-2, 0, 0, 1], [-2, 0, 0, 1]];

const LOUDNESS_OFFSET_8: [[i32; 8]; 4] = [
    [-2, 0, 0, 0, 0, 0, 0, 1],
    [-3, 0, 0, 0, 0, 0, 1, 2],
    [-4, 0, 0, 0, 0, 0, 1, 2],
    [-4, 0, 0, 0, 0, 0, 1, 2],
];

pub fn allocate_bits(header: &FrameHeader, scale_factors: &ScaleFactors) -> BitAllocation {
    let subbands = header.subbands();
    let channels = header.channels();
    let bitpool = header.bitpool as i32;

    let mut bitneed = [[0i32; MAX_SUBBANDS]; MAX_CHANNELS];
    for (need, sf) in bitneed.iter_mut().zip(scale_factors).take(channels) {
        compute_bitneed(header, &sf[..subbands], &mut need[..subbands]);
    }

    let mut bits = [[0u8; MAX_SUBBANDS]; MAX_CHANNELS];
    match header.channel_mode {
        ChannelMode::Mono | ChannelMode::DualChannel => {
            for ch in 0..channels {
                let mut slots = [0i32; MAX_SUBBANDS];
                distribute(&bitneed[ch][..subbands], bitpool, &mut slots[..subbands]);
                for sb in 0..subbands {
                    bits[ch][sb] = slots[sb] as u8;
                }
            }
        }
        ChannelMode::Stereo | ChannelMode::JointStereo => {
            // Interleave as ch0/sb0, ch1/sb0, ch0/sb1, ... so the refinement
            // passes visit channels alternately.
            let mut needs = [0i32; MAX_SUBBANDS * MAX_CHANNELS];
            for sb in 0..subbands {
                needs[2 * sb] = bitneed[0][sb];
                needs[2 * sb + 1] = bitneed[1][sb];
            }

            let mut slots = [0i32; MAX_SUBBANDS * MAX_CHANNELS];
            distribute(&needs[..2 * subbands], bitpool, &mut slots[..2 * subbands]);
            for sb in 0..subbands {
                bits[0][sb] = slots[2 * sb] as u8;
                bits[1][sb] = slots[2 * sb + 1] as u8;
            }
        }
    }

    bits
}

fn compute_bitneed(header: &FrameHeader, scale_factors: &[u8], bitneed: &mut [i32]) {
    match header.allocation_method {
        AllocationMethod::Snr => {
            for (need, &sf) in bitneed.iter_mut().zip(scale_factors) {
                *need = sf as i32;
            }
        }
        AllocationMethod::Loudness => {
            let offsets = loudness_offsets(header.sampling_frequency, scale_factors.len());
            for ((need, &sf), offset) in bitneed.iter_mut().zip(scale_factors).zip(offsets) {
                *need = if sf == 0 {
                    -5
                } else {
                    let loudness = sf as i32 - offset;
                    if loudness > 0 { loudness / 2 } else { loudness }
                };
            }
        }
    }
}

fn loudness_offsets(frequency: SamplingFrequency, subbands: usize) -> &'static [i32] {
    let index = frequency.code() as usize;
    if subbands == 4 {
        &LOUDNESS_OFFSET_4[index]
    } else {
        &LOUDNESS_OFFSET_8[index]
    }
}

/// Spreads `bitpool` bits over the slots described by `bitneed`.
fn distribute(bitneed: &[i32], bitpool: i32, bits: &mut [i32]) {
    let max_bitneed = bitneed.iter().copied().max().unwrap_or(0);

    let mut bitcount = 0;
    let mut slicecount = 0;
    let mut bitslice = max_bitneed + 1;
    loop {
        bitslice -= 1;
        bitcount += slicecount;
        slicecount = 0;
        for &need in bitneed {
            if need > bitslice + 1 && need < bitslice + MAX_BITS {
                slicecount += 1;
            } else if need == bitslice + 1 {
                slicecount += 2;
            }
        }

        if bitcount + slicecount >= bitpool || bitslice < MIN_BITSLICE {
            break;
        }
    }

    if bitcount + slicecount == bitpool {
        bitcount += slicecount;
        bitslice -= 1;
    }

    for (b, &need) in bits.iter_mut().zip(bitneed) {
        *b = if need < bitslice + 2 {
            0
        } else {
            (need - bitslice).min(MAX_BITS)
        };
    }

    for (b, &need) in bits.iter_mut().zip(bitneed) {
        if bitcount >= bitpool {
            break;
        }
        if *b >= 2 && *b < MAX_BITS {
            *b += 1;
            bitcount += 1;
        } else if need == bitslice + 1 && bitpool > bitcount + 1 {
            *b = 2;
            bitcount += 2;
        }
    }

    for b in bits.iter_mut() {
        if bitcount >= bitpool {
            break;
        }
        if *b < MAX_BITS {
            *b += 1;
            bitcount += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::header::SYNCWORD;

    fn header(mode: u8, bitpool: u8) -> FrameHeader {
        FrameHeader::parse(&[SYNCWORD, mode, bitpool, 0], 0).unwrap()
    }

    fn total(bits: &BitAllocation) -> u32 {
        bits.iter().flatten().map(|&b| b as u32).sum()
    }

    #[test]
    fn snr_mono_uses_whole_bitpool() {
        // 48 kHz, 16 blocks, mono, SNR, 8 subbands
        let h = header(0b11_11_00_1_1, 20);
        let mut sf = [[0u8; MAX_SUBBANDS]; MAX_CHANNELS];
        sf[0] = [9, 8, 7, 6, 5, 4, 3, 2];

        let bits = allocate_bits(&h, &sf);
        assert_eq!(total(&bits), 20);
        assert!(bits[1].iter().all(|&b| b == 0));
        // Louder subbands never get fewer bits than quieter ones
        assert!(bits[0].windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn stereo_shares_bitpool_across_channels() {
        // 44.1 kHz, 16 blocks, stereo, loudness, 8 subbands
        let h = header(0b10_11_10_0_1, 32);
        let sf = [[10, 9, 8, 7, 6, 5, 4, 3], [3, 4, 5, 6, 7, 8, 9, 10]];

        let bits = allocate_bits(&h, &sf);
        assert_eq!(total(&bits), 32);
        assert!(bits.iter().flatten().all(|&b| b as i32 <= MAX_BITS));
    }

    #[test]
    fn dual_channel_allocates_per_channel() {
        // 32 kHz, 8 blocks, dual channel, SNR, 4 subbands
        let h = header(0b01_01_01_1_0, 12);
        let sf = [[5, 5, 5, 5, 0, 0, 0, 0], [1, 2, 3, 4, 0, 0, 0, 0]];

        let bits = allocate_bits(&h, &sf);
        assert_eq!(bits[0][..4].iter().map(|&b| b as u32).sum::<u32>(), 12);
        assert_eq!(bits[1][..4].iter().map(|&b| b as u32).sum::<u32>(), 12);
        assert!(bits.iter().all(|ch| ch[4..].iter().all(|&b| b == 0)));
    }

    #[test]
    fn silent_subbands_get_no_bits_when_pool_is_small() {
        // 44.1 kHz, 4 blocks, mono, loudness, 4 subbands
        let h = header(0b10_00_00_0_0, 2);
        let sf = [[0, 0, 0, 12, 0, 0, 0, 0], [0; MAX_SUBBANDS]];

        let bits = allocate_bits(&h, &sf);
        assert_eq!(bits[0][..4], [0, 0, 0, 2]);
    }

    #[test]
    fn maximum_bitpool_terminates() {
        // 16 kHz, 16 blocks, joint stereo, SNR, 8 subbands at the 32*M ceiling
        let h = header(0b00_11_11_1_1, 255);
        let sf = [[15; MAX_SUBBANDS], [0; MAX_SUBBANDS]];

        let bits = allocate_bits(&h, &sf);
        assert!(total(&bits) <= 255);
    }
}
