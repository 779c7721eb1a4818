use anyhow::{Result, bail};
use log::{debug, info, warn};

use crate::process::decode::FrameCodec;
use crate::process::resync::{Fingerprint, ResyncStrategy};
use crate::process::scan::{find_frame_start, find_next_sync};
use crate::process::sink::{AudioSink, ScopedSink};
use crate::structs::geometry::FrameGeometry;
use crate::structs::header::FrameHeader;
use crate::utils::cursor::ByteCursor;
use crate::utils::errors::{DecodeError, StreamError};

/// Default number of frames between sink drains.
pub const DEFAULT_FLUSH_INTERVAL: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    pub resync: ResyncStrategy,
    pub flush_interval: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            resync: ResyncStrategy::default(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// What one call to [`StreamDecoder::step`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A frame decoded and its PCM went to the sink.
    Decoded {
        offset: usize,
        length: usize,
        header: FrameHeader,
        /// Set on the first frame of the stream only.
        first: bool,
    },
    /// A frame failed; silence was written in its place and the cursor moved
    /// to `resumed_at`, or to the end of the buffer when that is `None`.
    Skipped {
        offset: usize,
        reason: String,
        resumed_at: Option<usize>,
    },
    /// End of stream. Further calls keep returning this.
    Finished,
}

/// A decode failure and where decoding picked up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    pub failed_at: usize,
    pub resumed_at: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub valid_frames: u64,
    pub invalid_frames: u64,
    /// Offset of the first syncword; bytes before it were never parsed.
    pub first_sync: Option<usize>,
    /// Header of the first successfully decoded frame.
    pub stream: Option<FrameHeader>,
    pub recoveries: Vec<Recovery>,
    /// Bytes dropped after the last failed resync.
    pub trailing_bytes: usize,
    /// Per-channel samples produced by valid frames.
    pub samples_per_channel: u64,
}

impl DecodeReport {
    pub fn duration_secs(&self) -> Option<f64> {
        let header = self.stream.as_ref()?;
        Some(self.samples_per_channel as f64 / header.sampling_frequency.hz() as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    SeekingFirstSync,
    Decoding,
    Done,
}

/// Drives a loaded SBC stream through a [`FrameCodec`] into an [`AudioSink`].
///
/// Decode failures are never fatal. Once a frame has decoded, a failed frame
/// is replaced by silence of the same nominal length. The cursor then moves
/// to the next frame start chosen by the [`ResyncStrategy`] and the codec is
/// reset to the layout found there. The only
/// fatal condition is a buffer without any syncword.
///
/// # Example
///
/// ```rust
/// use sbc::process::EXAMPLE_DATA;
/// use sbc::process::decode::SbcDecoder;
/// use sbc::process::sink::NullSink;
/// use sbc::process::stream::{DecoderOptions, StreamDecoder};
///
/// let decoder = StreamDecoder::new(
///     EXAMPLE_DATA,
///     SbcDecoder::default(),
///     NullSink,
///     DecoderOptions::default(),
/// );
///
/// let report = decoder.run()?;
/// assert_eq!(report.valid_frames, 2);
/// assert_eq!(report.invalid_frames, 0);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct StreamDecoder<'a, C: FrameCodec, S: AudioSink> {
    cursor: ByteCursor<'a>,
    codec: C,
    sink: ScopedSink<S>,
    options: DecoderOptions,
    state: LoopState,
    /// Taken from the last successfully decoded frame.
    fingerprint: Option<Fingerprint>,
    /// Geometry of the last accepted frame; sizes silence filler.
    geometry: Option<FrameGeometry>,
    pcm: Vec<i16>,
    silence: Vec<i16>,
    report: DecodeReport,
}

impl<'a, C: FrameCodec, S: AudioSink> StreamDecoder<'a, C, S> {
    pub fn new(buffer: &'a [u8], codec: C, sink: S, options: DecoderOptions) -> Self {
        Self {
            cursor: ByteCursor::new(buffer),
            codec,
            sink: ScopedSink::new(sink, options.flush_interval),
            options,
            state: LoopState::SeekingFirstSync,
            fingerprint: None,
            geometry: None,
            pcm: Vec::new(),
            silence: Vec::new(),
            report: DecodeReport::default(),
        }
    }

    /// Current read offset into the buffer.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn report(&self) -> &DecodeReport {
        &self.report
    }

    /// Advances the state machine by one frame.
    pub fn step(&mut self) -> Result<Step> {
        match self.state {
            LoopState::SeekingFirstSync => self.seek_first_sync()?,
            LoopState::Decoding => {}
            LoopState::Done => return Ok(Step::Finished),
        }

        if self.cursor.is_empty() {
            self.finish_stream();
            return Ok(Step::Finished);
        }

        let offset = self.cursor.position();
        match self.decode_frame() {
            Ok((header, length)) => Ok(self.accept(offset, header, length)),
            Err(e) => self.recover(offset, e),
        }
    }

    /// Runs to end of stream, closing the sink on every exit path.
    pub fn run(mut self) -> Result<DecodeReport> {
        while self.step()? != Step::Finished {}
        Ok(self.finish())
    }

    /// Closes the sink and hands back the report.
    pub fn finish(mut self) -> DecodeReport {
        self.sink.finish();
        std::mem::take(&mut self.report)
    }

    fn seek_first_sync(&mut self) -> Result<()> {
        let buffer = self.cursor.buffer();
        let Some(offset) = find_frame_start(buffer, 0) else {
            bail!(StreamError::NoSyncFound);
        };

        if offset > 0 {
            debug!("Skipped {offset} bytes before the first syncword");
        }

        let header = FrameHeader::read(buffer, offset)?;
        let geometry = header.geometry();

        self.cursor.seek(offset)?;
        self.codec
            .reset(geometry.num_channels, geometry.num_subbands)?;
        self.report.first_sync = Some(offset);
        self.state = LoopState::Decoding;

        Ok(())
    }

    fn decode_frame(&mut self) -> Result<(FrameHeader, usize), DecodeError> {
        let decoded = self.codec.decode(self.cursor.rest(), &mut self.pcm)?;

        let available = self.cursor.remaining();
        if decoded.consumed == 0 || self.cursor.advance(decoded.consumed).is_err() {
            return Err(DecodeError::InvalidFrameLength {
                length: decoded.consumed,
                available,
            });
        }

        Ok((decoded.header, decoded.consumed))
    }

    fn accept(&mut self, offset: usize, header: FrameHeader, length: usize) -> Step {
        let first = self.report.valid_frames == 0;
        let geometry = header.geometry();

        self.report.valid_frames += 1;
        self.report.samples_per_channel += geometry.samples_per_channel() as u64;
        if first {
            self.report.stream = Some(header);
        }

        self.fingerprint = Some(Fingerprint::from_header(&header));
        self.geometry = Some(geometry);
        self.sink.write(&geometry.pcm_format(), &self.pcm);

        debug!("Frame at offset {offset}: {length} bytes");

        Step::Decoded {
            offset,
            length,
            header,
            first,
        }
    }

    fn recover(&mut self, offset: usize, error: DecodeError) -> Result<Step> {
        self.report.invalid_frames += 1;
        warn!("Invalid frame at offset {offset}: {error}");

        self.write_silence();

        let buffer = self.cursor.buffer();
        let resumed_at = match self.fingerprint {
            Some(fingerprint) => self
                .options
                .resync
                .next_frame_start(buffer, offset, &fingerprint),
            // Nothing accepted yet, so there is no fingerprint to match
            None => find_next_sync(buffer, offset + 1),
        };

        self.report.recoveries.push(Recovery {
            failed_at: offset,
            resumed_at,
        });

        match resumed_at {
            Some(next) => {
                debug!(
                    "Resynchronised at offset {next} after skipping {} bytes",
                    next - offset
                );
                self.cursor.seek(next)?;

                // The first syncword may have been a false positive, so the
                // layout comes from the header being resumed at
                let layout = FrameHeader::read(buffer, next)
                    .map(|header| header.geometry())
                    .ok()
                    .or(self.geometry);
                if let Some(geometry) = layout {
                    self.codec
                        .reset(geometry.num_channels, geometry.num_subbands)?;
                }
            }
            None => {
                self.report.trailing_bytes = buffer.len() - offset;
                info!(
                    "No frame start after offset {offset}; dropping {} trailing bytes",
                    self.report.trailing_bytes
                );
                self.cursor.seek_end();
                self.finish_stream();
            }
        }

        Ok(Step::Skipped {
            offset,
            reason: error.to_string(),
            resumed_at,
        })
    }

    /// No-op until a frame has been accepted, so an unverified header never
    /// decides the sink format.
    fn write_silence(&mut self) {
        let Some(geometry) = self.geometry else {
            return;
        };

        let len = geometry.pcm_len();
        if self.silence.len() != len {
            self.silence.resize(len, 0);
        }
        self.sink.write(&geometry.pcm_format(), &self.silence);
    }

    fn finish_stream(&mut self) {
        if self.state != LoopState::Done {
            info!(
                "End of stream: {} frames decoded, {} skipped",
                self.report.valid_frames, self.report.invalid_frames
            );
        }
        self.state = LoopState::Done;
        self.sink.finish();
    }
}
