//! Choosing the next trustworthy frame start after a decode failure.
//!
//! A bare `0x9C` turns up regularly inside compressed payload, so the default
//! strategy also requires the mode byte and bitpool of the last good header.
//! Both are fixed for the lifetime of a negotiated A2DP link.

use std::fmt::{self, Display};

use log::trace;

use crate::process::scan::find_next_sync;
use crate::structs::header::{FrameHeader, SYNCWORD};

/// The `(syncword, mode byte, bitpool)` triple of a known-good header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub mode_byte: u8,
    pub bitpool: u8,
}

impl Fingerprint {
    pub const fn from_header(header: &FrameHeader) -> Self {
        Self {
            mode_byte: header.mode_byte(),
            bitpool: header.bitpool,
        }
    }

    pub const fn bytes(&self) -> [u8; 3] {
        [SYNCWORD, self.mode_byte, self.bitpool]
    }

    pub fn matches_at(&self, buffer: &[u8], offset: usize) -> bool {
        buffer
            .get(offset..offset.saturating_add(3))
            .is_some_and(|candidate| candidate == self.bytes())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResyncStrategy {
    /// Accept the next `0x9C`.
    Syncword,
    /// Accept the next `0x9C` followed by the fingerprint's mode byte and bitpool.
    #[default]
    Fingerprint,
}

impl ResyncStrategy {
    /// Next accepted frame start strictly after `failed_at`.
    ///
    /// `None` means the rest of the buffer holds no acceptable frame and is
    /// dropped as trailing garbage.
    pub fn next_frame_start(
        self,
        buffer: &[u8],
        failed_at: usize,
        fingerprint: &Fingerprint,
    ) -> Option<usize> {
        let mut from = failed_at.saturating_add(1);

        while let Some(candidate) = find_next_sync(buffer, from) {
            let accepted = match self {
                Self::Syncword => true,
                Self::Fingerprint => fingerprint.matches_at(buffer, candidate),
            };

            if accepted {
                return Some(candidate);
            }

            trace!("Rejected resync candidate at offset {candidate}");
            from = candidate + 1;
        }

        None
    }
}

impl Display for ResyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syncword => write!(f, "syncword"),
            Self::Fingerprint => write!(f, "fingerprint"),
        }
    }
}
