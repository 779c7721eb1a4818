use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use log::{debug, error, info, warn};
use ringbuf::traits::*;
use ringbuf::{HeapCons, HeapProd, HeapRb};
use sbc::process::sink::{AudioSink, PcmFormat};

/// Audio held between the decode loop and the device callback.
const QUEUE_MILLIS: usize = 250;

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// How long a write or drain waits for the device to take samples.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Producer half, owned by the decode loop. Blocks while the queue is full.
struct QueueWriter {
    producer: HeapProd<i16>,
    failed: Arc<AtomicBool>,
    stall_timeout: Duration,
}

/// Consumer half, moved into the device callback. Never blocks.
struct QueueReader {
    consumer: HeapCons<i16>,
    underruns: Arc<AtomicU64>,
}

fn sample_queue(capacity: usize, stall_timeout: Duration) -> (QueueWriter, QueueReader) {
    let (producer, consumer) = HeapRb::<i16>::new(capacity.max(1)).split();

    let writer = QueueWriter {
        producer,
        failed: Arc::new(AtomicBool::new(false)),
        stall_timeout,
    };
    let reader = QueueReader {
        consumer,
        underruns: Arc::new(AtomicU64::new(0)),
    };

    (writer, reader)
}

impl QueueWriter {
    fn check_device(&self) -> io::Result<()> {
        if self.failed.load(Ordering::Acquire) {
            return Err(io::Error::other("audio device reported an error"));
        }
        Ok(())
    }

    fn stalled(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!(
                "audio device stopped taking samples for {:?}",
                self.stall_timeout
            ),
        )
    }

    /// Queues all of `pcm`, waiting for the callback to make room.
    fn push(&mut self, mut pcm: &[i16]) -> io::Result<()> {
        let mut last_progress = Instant::now();

        while !pcm.is_empty() {
            self.check_device()?;

            let pushed = self.producer.push_slice(pcm);
            if pushed > 0 {
                pcm = &pcm[pushed..];
                last_progress = Instant::now();
                continue;
            }

            if last_progress.elapsed() > self.stall_timeout {
                return Err(self.stalled());
            }
            thread::sleep(POLL_INTERVAL);
        }

        Ok(())
    }

    /// Waits until the callback has taken every queued sample.
    fn wait_empty(&mut self) -> io::Result<()> {
        let mut queued = self.producer.occupied_len();
        let mut last_progress = Instant::now();

        while queued > 0 {
            self.check_device()?;

            let now_queued = self.producer.occupied_len();
            if now_queued < queued {
                last_progress = Instant::now();
            } else if last_progress.elapsed() > self.stall_timeout {
                return Err(self.stalled());
            }
            queued = now_queued;

            if queued > 0 {
                thread::sleep(POLL_INTERVAL);
            }
        }

        Ok(())
    }
}

impl QueueReader {
    /// Fills a device buffer, padding with silence when the queue runs dry.
    fn fill<T: Sample + FromSample<i16>>(&mut self, out: &mut [T]) {
        let mut starved = false;

        for slot in out.iter_mut() {
            *slot = match self.consumer.try_pop() {
                Some(sample) => T::from_sample(sample),
                None => {
                    starved = true;
                    T::EQUILIBRIUM
                }
            };
        }

        if starved {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Rank of a device sample format; lower is preferred. `None` when the
/// callback cannot produce it.
fn format_preference(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::I16 => Some(0),
        SampleFormat::F32 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    }
}

fn pick_config(device: &Device, format: &PcmFormat) -> io::Result<(StreamConfig, SampleFormat)> {
    let rate = cpal::SampleRate(format.sample_rate);

    let (_, supported) = device
        .supported_output_configs()
        .map_err(io::Error::other)?
        .filter(|config| {
            config.channels() == format.channels
                && config.min_sample_rate() <= rate
                && rate <= config.max_sample_rate()
        })
        .filter_map(|config| format_preference(config.sample_format()).map(|rank| (rank, config)))
        .min_by_key(|(rank, _)| *rank)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!(
                    "no output configuration for {} Hz, {} channels",
                    format.sample_rate, format.channels
                ),
            )
        })?;

    let supported = supported.with_sample_rate(rate);
    Ok((supported.config(), supported.sample_format()))
}

fn find_device(name: Option<&str>) -> io::Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = name {
        let found = host
            .output_devices()
            .map_err(io::Error::other)?
            .find(|device| device.name().ok().as_deref() == Some(name));

        match found {
            Some(device) => return Ok(device),
            None => warn!("Output device '{name}' not found, falling back to the default device"),
        }
    }

    host.default_output_device()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no default output device"))
}

fn build_stream<T: SizedSample + FromSample<i16>>(
    device: &Device,
    config: &StreamConfig,
    mut reader: QueueReader,
    failed: Arc<AtomicBool>,
) -> io::Result<Stream> {
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| reader.fill(data),
            move |err| {
                error!("Audio stream error: {err}");
                failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(io::Error::other)
}

struct Playback {
    // Dropping the stream stops the callback
    stream: Stream,
    writer: QueueWriter,
    underruns: Arc<AtomicU64>,
}

/// [`AudioSink`] playing decoded PCM on an output device through cpal.
///
/// Nothing touches the audio host until `open`, so a missing device only
/// means no playback. Writes block while the queue is full, which paces the
/// decode loop to real time.
pub struct PlaybackSink {
    device_name: Option<String>,
    playback: Option<Playback>,
}

impl PlaybackSink {
    /// `None` selects the host's default output device.
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            playback: None,
        }
    }

    fn playback(&mut self) -> io::Result<&mut Playback> {
        self.playback
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "playback not open"))
    }
}

impl AudioSink for PlaybackSink {
    fn open(&mut self, format: &PcmFormat) -> io::Result<()> {
        let device = find_device(self.device_name.as_deref())?;
        let (config, sample_format) = pick_config(&device, format)?;

        let capacity = format.sample_rate as usize * format.channels as usize * QUEUE_MILLIS / 1000;
        let (writer, reader) = sample_queue(capacity, STALL_TIMEOUT);
        let underruns = Arc::clone(&reader.underruns);
        let failed = Arc::clone(&writer.failed);

        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, reader, failed)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &config, reader, failed)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, reader, failed)?,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported device sample format {other:?}"),
                ));
            }
        };
        stream.play().map_err(io::Error::other)?;

        info!(
            "Playing on {} ({} Hz, {} channels, {sample_format:?})",
            device.name().unwrap_or_else(|_| "unknown device".to_string()),
            config.sample_rate.0,
            config.channels
        );

        self.playback = Some(Playback {
            stream,
            writer,
            underruns,
        });
        Ok(())
    }

    fn write(&mut self, pcm: &[i16]) -> io::Result<()> {
        self.playback()?.writer.push(pcm)
    }

    fn drain(&mut self) -> io::Result<()> {
        match self.playback.as_mut() {
            Some(playback) => playback.writer.wait_empty(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(mut playback) = self.playback.take() else {
            return Ok(());
        };

        let drained = playback.writer.wait_empty();
        if let Err(e) = playback.stream.pause() {
            debug!("Failed to pause audio stream: {e}");
        }

        let underruns = playback.underruns.load(Ordering::Relaxed);
        if underruns > 0 {
            debug!("{underruns} device buffers were padded with silence");
        }

        drained
    }
}
