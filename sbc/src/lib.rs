//! Frame recovery and decoding for SBC (Bluetooth A2DP sub-band codec) streams.
//!
//! ## Technical Overview
//!
//! An SBC stream is a plain concatenation of frames with no container. Each
//! frame opens with the `0x9C` syncword and a 3-byte header that fully
//! determines its length, so a reader that trusts one header can walk the
//! whole stream. Captured or transmitted streams are rarely clean, and a
//! corrupted header makes the next offset unknowable.
//!
//! ### Recovery
//!
//! After a failed frame the decoder writes one block of silence in its place,
//! scans forward for the next syncword and, by default, accepts it only if
//! the following mode byte and bitpool match the last good header. The
//! codec is reset before decoding resumes. Running out of candidates ends
//! the stream normally.
//!
//! ### Frame Layout
//!
//! - Header: syncword, sampling frequency, blocks, channel mode, allocation,
//!   subbands, bitpool, CRC
//! - Joint stereo flags (joint stereo only)
//! - 4-bit scale factors per channel and subband
//! - Quantised subband samples, padded to a byte boundary
//!
//! ## Quick Start
//!
//! ```rust
//! use sbc::process::{EXAMPLE_DATA, decode::SbcDecoder, sink::NullSink};
//! use sbc::process::stream::{DecoderOptions, Step, StreamDecoder};
//!
//! let mut decoder = StreamDecoder::new(
//!     EXAMPLE_DATA,
//!     SbcDecoder::default(),
//!     NullSink,
//!     DecoderOptions::default(),
//! );
//!
//! loop {
//!     match decoder.step()? {
//!         Step::Decoded { header, first, .. } => {
//!             if first {
//!                 println!("{}", header.summary());
//!             }
//!         }
//!         Step::Skipped { offset, reason, .. } => {
//!             eprintln!("Frame at {offset} skipped: {reason}");
//!         }
//!         Step::Finished => break,
//!     }
//! }
//!
//! let report = decoder.finish();
//! assert_eq!(report.valid_frames, 2);
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Stream processing.
///
/// 1. **Scanning** ([`process::scan`]): Syncword search.
///
/// 2. **Resynchronisation** ([`process::resync`]): Choosing the next frame
///    start after a failure.
///
/// 3. **Decoding** ([`process::decode`]): Frames to interleaved 16-bit PCM.
///
/// 4. **Output** ([`process::sink`]): Scoped audio sink handling.
///
/// 5. **Decode Loop** ([`process::stream`]): The per-frame state machine.
pub mod process;

/// Data structures representing SBC format components.
///
/// - **Headers** ([`structs::header`]): Frame header fields and labels
/// - **Geometry** ([`structs::geometry`]): Frame length and sample counts
/// - **Bit Allocation** ([`structs::allocation`]): Loudness and SNR allocation
/// - **Synthesis** ([`structs::synthesis`]): Polyphase synthesis filter bank
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **Cursor** ([`utils::cursor`]): Bounds-checked byte offsets
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
