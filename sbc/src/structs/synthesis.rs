//! Polyphase synthesis filter bank.
//!
//! Per block and channel: shift the history vector `V` by `2M`, matrix the
//! `M` subband samples into the first `2M` entries, gather the `U` vector from
//! alternating halves of `V`, window it and fold ten windowed taps into each
//! output sample.
//!
//! The prototype window is a Hann-windowed sinc low-pass with cutoff
//! `pi / 2M`, built at construction. It is close to, but not bit-exact with,
//! the A2DP reference table.

use std::f64::consts::PI;

pub struct SynthesisBank {
    subbands: usize,
    /// `2M x M` cosine modulation matrix, row-major.
    matrix: Vec<f32>,
    /// `10M` window taps, scaled by `M`.
    window: Vec<f32>,
    /// One `20M` history vector per channel.
    history: Vec<Vec<f32>>,
}

impl SynthesisBank {
    pub fn new(channels: usize, subbands: usize) -> Self {
        let m = subbands;

        let matrix = (0..2 * m)
            .flat_map(|k| {
                (0..m).map(move |i| {
                    ((i as f64 + 0.5) * (k as f64 + m as f64 / 2.0) * PI / m as f64).cos() as f32
                })
            })
            .collect();

        Self {
            subbands,
            matrix,
            window: prototype_window(m),
            history: vec![vec![0.0; 20 * m]; channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.history.len()
    }

    pub fn subbands(&self) -> usize {
        self.subbands
    }

    /// Clears the filter history of every channel.
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|v| v.fill(0.0));
    }

    /// Runs one block of `M` subband samples for `channel`, writing `M`
    /// time-domain samples to `out`.
    pub fn synthesize(&mut self, channel: usize, subband_samples: &[f32], out: &mut [f32]) {
        let m = self.subbands;
        let v = &mut self.history[channel];

        v.copy_within(0..18 * m, 2 * m);
        for k in 0..2 * m {
            let row = &self.matrix[k * m..(k + 1) * m];
            v[k] = row
                .iter()
                .zip(subband_samples)
                .map(|(n, s)| n * s)
                .sum();
        }

        for (j, x) in out.iter_mut().enumerate().take(m) {
            let mut acc = 0.0;
            for i in 0..5 {
                acc += v[4 * i * m + j] * self.window[2 * i * m + j];
                acc += v[4 * i * m + 3 * m + j] * self.window[2 * i * m + m + j];
            }
            *x = acc;
        }
    }
}

fn prototype_window(m: usize) -> Vec<f32> {
    let len = 10 * m;
    let center = (5 * m) as f64;
    let cutoff = 1.0 / (2 * m) as f64;

    let taps = (0..len)
        .map(|n| {
            let t = n as f64 - center;
            let sinc = if t == 0.0 {
                cutoff
            } else {
                (PI * cutoff * t).sin() / (PI * t)
            };
            let hann = 0.5 - 0.5 * (2.0 * PI * n as f64 / len as f64).cos();
            sinc * hann
        })
        .collect::<Vec<_>>();

    let gain: f64 = taps.iter().sum();
    taps.iter()
        .map(|h| (h / gain * m as f64) as f32)
        .collect()
}

/// Rounds and saturates a synthesised sample to signed 16-bit.
#[inline(always)]
pub fn to_pcm16(sample: f32) -> i16 {
    sample.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_symmetric_and_starts_at_zero() {
        for m in [4, 8] {
            let w = prototype_window(m);
            assert_eq!(w.len(), 10 * m);
            assert_eq!(w[0], 0.0);
            for n in 1..10 * m {
                assert!((w[n] - w[10 * m - n]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn silence_in_silence_out() {
        let mut bank = SynthesisBank::new(2, 8);
        let mut out = [1.0f32; 8];

        for _ in 0..16 {
            bank.synthesize(1, &[0.0; 8], &mut out);
        }
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn reset_clears_history() {
        let mut bank = SynthesisBank::new(1, 4);
        let mut out = [0.0f32; 4];

        bank.synthesize(0, &[1000.0, -500.0, 250.0, 0.0], &mut out);
        bank.synthesize(0, &[0.0; 4], &mut out);
        assert!(out.iter().any(|&x| x != 0.0));

        bank.reset();
        bank.synthesize(0, &[0.0; 4], &mut out);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn pcm16_saturates() {
        assert_eq!(to_pcm16(40_000.0), i16::MAX);
        assert_eq!(to_pcm16(-40_000.0), i16::MIN);
        assert_eq!(to_pcm16(-1.6), -2);
    }
}
