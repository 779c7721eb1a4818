use std::io;

use log::{debug, warn};

pub use crate::structs::geometry::PcmFormat;

/// Blocking PCM output device.
///
/// `write` returns once the block has been accepted, which is the only
/// backpressure the decode loop sees.
pub trait AudioSink {
    fn open(&mut self, format: &PcmFormat) -> io::Result<()>;
    fn write(&mut self, pcm: &[i16]) -> io::Result<()>;
    fn drain(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

impl<S: AudioSink + ?Sized> AudioSink for &mut S {
    fn open(&mut self, format: &PcmFormat) -> io::Result<()> {
        (**self).open(format)
    }

    fn write(&mut self, pcm: &[i16]) -> io::Result<()> {
        (**self).write(pcm)
    }

    fn drain(&mut self) -> io::Result<()> {
        (**self).drain()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn open(&mut self, format: &PcmFormat) -> io::Result<()> {
        (**self).open(format)
    }

    fn write(&mut self, pcm: &[i16]) -> io::Result<()> {
        (**self).write(pcm)
    }

    fn drain(&mut self) -> io::Result<()> {
        (**self).drain()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Discards everything. Used when no output was requested.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn open(&mut self, _format: &PcmFormat) -> io::Result<()> {
        Ok(())
    }

    fn write(&mut self, _pcm: &[i16]) -> io::Result<()> {
        Ok(())
    }

    fn drain(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Pending,
    Open,
    Failed,
    Closed,
}

/// Owns an [`AudioSink`] for the duration of a stream.
///
/// Opens on the first write, drains every `flush_interval` writes, and
/// drains and closes on [`finish`](ScopedSink::finish) or drop. Sink errors
/// are logged and never reach the caller: after a failure every further
/// write is dropped.
pub struct ScopedSink<S: AudioSink> {
    sink: S,
    state: SinkState,
    format: Option<PcmFormat>,
    flush_interval: usize,
    unflushed: usize,
    samples_written: u64,
}

impl<S: AudioSink> ScopedSink<S> {
    pub fn new(sink: S, flush_interval: usize) -> Self {
        Self {
            sink,
            state: SinkState::Pending,
            format: None,
            flush_interval: flush_interval.max(1),
            unflushed: 0,
            samples_written: 0,
        }
    }

    pub fn write(&mut self, format: &PcmFormat, pcm: &[i16]) {
        if self.state == SinkState::Pending {
            match self.sink.open(format) {
                Ok(()) => {
                    debug!(
                        "Audio sink opened: {} Hz, {} channels",
                        format.sample_rate, format.channels
                    );
                    self.format = Some(*format);
                    self.state = SinkState::Open;
                }
                Err(e) => {
                    warn!("Audio sink unavailable, continuing without output: {e}");
                    self.state = SinkState::Failed;
                }
            }
        }

        if self.state != SinkState::Open {
            return;
        }

        if self.format.as_ref() != Some(format) {
            warn!("PCM format changed mid-stream; writing with the opened format");
        }

        if let Err(e) = self.sink.write(pcm) {
            warn!("Audio sink write failed, dropping further output: {e}");
            self.state = SinkState::Failed;
            return;
        }

        self.samples_written += pcm.len() as u64;
        self.unflushed += 1;
        if self.unflushed >= self.flush_interval {
            self.drain();
        }
    }

    fn drain(&mut self) {
        self.unflushed = 0;
        if let Err(e) = self.sink.drain() {
            warn!("Audio sink drain failed, dropping further output: {e}");
            self.state = SinkState::Failed;
        }
    }

    /// Drains and closes the sink. Idempotent.
    pub fn finish(&mut self) {
        if self.state == SinkState::Open {
            if self.unflushed > 0 {
                self.drain();
            }
            if let Err(e) = self.sink.close() {
                warn!("Audio sink close failed: {e}");
            }
        }

        self.state = SinkState::Closed;
    }

    pub fn is_open(&self) -> bool {
        self.state == SinkState::Open
    }

    /// Interleaved samples accepted by the sink so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}

impl<S: AudioSink> Drop for ScopedSink<S> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every call for inspection.
    #[derive(Debug, Default)]
    pub(crate) struct MemorySink {
        pub format: Option<PcmFormat>,
        pub writes: Vec<Vec<i16>>,
        pub drains: usize,
        pub closed: bool,
        pub fail_open: bool,
        pub fail_write_after: Option<usize>,
    }

    impl AudioSink for MemorySink {
        fn open(&mut self, format: &PcmFormat) -> io::Result<()> {
            if self.fail_open {
                return Err(io::Error::other("no device"));
            }
            self.format = Some(*format);
            Ok(())
        }

        fn write(&mut self, pcm: &[i16]) -> io::Result<()> {
            if self.fail_write_after == Some(self.writes.len()) {
                return Err(io::Error::other("device lost"));
            }
            self.writes.push(pcm.to_vec());
            Ok(())
        }

        fn drain(&mut self) -> io::Result<()> {
            self.drains += 1;
            Ok(())
        }

        fn close(&mut self) -> io::Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    const FORMAT: PcmFormat = PcmFormat {
        sample_rate: 44_100,
        channels: 2,
        bits_per_sample: 16,
    };

    #[test]
    fn opens_lazily_and_flushes_in_batches() {
        let mut memory = MemorySink::default();
        {
            let mut sink = ScopedSink::new(&mut memory, 3);
            assert!(!sink.is_open());

            for _ in 0..7 {
                sink.write(&FORMAT, &[1, 2, 3, 4]);
            }
            assert!(sink.is_open());
            assert_eq!(sink.samples_written(), 28);
        }

        assert_eq!(memory.format, Some(FORMAT));
        assert_eq!(memory.writes.len(), 7);
        // Two full batches plus the remainder drained on drop
        assert_eq!(memory.drains, 3);
        assert!(memory.closed);
    }

    #[test]
    fn failed_open_turns_writes_into_no_ops() {
        let mut memory = MemorySink {
            fail_open: true,
            ..Default::default()
        };
        {
            let mut sink = ScopedSink::new(&mut memory, 1);
            sink.write(&FORMAT, &[0; 4]);
            sink.write(&FORMAT, &[0; 4]);
            sink.finish();
            assert_eq!(sink.samples_written(), 0);
        }

        assert!(memory.writes.is_empty());
        assert_eq!(memory.drains, 0);
        assert!(!memory.closed);
    }

    #[test]
    fn write_failure_stops_output() {
        let mut memory = MemorySink {
            fail_write_after: Some(2),
            ..Default::default()
        };
        {
            let mut sink = ScopedSink::new(&mut memory, 10);
            for _ in 0..5 {
                sink.write(&FORMAT, &[7; 2]);
            }
            assert!(!sink.is_open());
        }

        assert_eq!(memory.writes.len(), 2);
        assert!(!memory.closed);
    }

    #[test]
    fn never_written_sink_is_never_opened() {
        let mut memory = MemorySink::default();
        drop(ScopedSink::new(&mut memory, 4));

        assert!(memory.format.is_none());
        assert!(!memory.closed);
    }
}
