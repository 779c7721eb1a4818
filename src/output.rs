use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use sbc::process::sink::{AudioSink, PcmFormat};

use crate::cli::command::AudioFormat;
use crate::join_bytes_le;
use crate::wav::WAVWriter;

/// Where decoded PCM goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Raw little-endian PCM on stdout.
    Stdout,
    File { path: PathBuf, format: AudioFormat },
}

impl Destination {
    /// `-` selects stdout; file paths without an extension get one matching `format`.
    pub fn new(path: &Path, format: AudioFormat) -> Self {
        if path.as_os_str() == "-" {
            return Self::Stdout;
        }

        let path = if path.extension().is_some() {
            path.to_path_buf()
        } else {
            path.with_extension(format.extension())
        };

        Self::File { path, format }
    }
}

enum Writer {
    Wav(WAVWriter<BufWriter<File>>),
    Pcm(BufWriter<Box<dyn Write>>),
}

/// [`AudioSink`] writing WAV or raw PCM. Nothing is created until `open`.
pub struct AudioWriter {
    destination: Destination,
    writer: Option<Writer>,
}

impl AudioWriter {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            writer: None,
        }
    }
}

impl AudioSink for AudioWriter {
    fn open(&mut self, format: &PcmFormat) -> io::Result<()> {
        let writer = match &self.destination {
            Destination::Stdout => {
                let stdout: Box<dyn Write> = Box::new(io::stdout().lock());
                Writer::Pcm(BufWriter::new(stdout))
            }
            Destination::File {
                path,
                format: AudioFormat::Pcm,
            } => {
                let file: Box<dyn Write> = Box::new(File::create(path)?);
                Writer::Pcm(BufWriter::new(file))
            }
            Destination::File {
                path,
                format: AudioFormat::Wav,
            } => {
                let mut wav = WAVWriter::new(BufWriter::new(File::create(path)?), format);
                wav.write_header()?;
                Writer::Wav(wav)
            }
        };

        if let Destination::File { path, .. } = &self.destination {
            info!("Writing audio to {}", path.display());
        }

        self.writer = Some(writer);
        Ok(())
    }

    fn write(&mut self, pcm: &[i16]) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(Writer::Wav(wav)) => wav.write_samples(pcm),
            Some(Writer::Pcm(raw)) => raw.write_all(&join_bytes_le!(*pcm)),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "audio output not open",
            )),
        }
    }

    fn drain(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(Writer::Wav(wav)) => wav.flush(),
            Some(Writer::Pcm(raw)) => raw.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(Writer::Wav(mut wav)) => {
                wav.finish()?;
                debug!("Wrote {} bytes of WAV sample data", wav.data_written());
                Ok(())
            }
            Some(Writer::Pcm(mut raw)) => raw.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_is_stdout() {
        assert_eq!(
            Destination::new(Path::new("-"), AudioFormat::Wav),
            Destination::Stdout
        );
    }

    #[test]
    fn missing_extension_follows_format() {
        assert_eq!(
            Destination::new(Path::new("out/capture"), AudioFormat::Pcm),
            Destination::File {
                path: PathBuf::from("out/capture.pcm"),
                format: AudioFormat::Pcm
            }
        );
        assert_eq!(
            Destination::new(Path::new("capture.raw"), AudioFormat::Pcm),
            Destination::File {
                path: PathBuf::from("capture.raw"),
                format: AudioFormat::Pcm
            }
        );
    }

    #[test]
    fn writes_before_open_fail_without_touching_disk() {
        let mut writer = AudioWriter::new(Destination::new(
            Path::new("never/created.wav"),
            AudioFormat::Wav,
        ));

        assert!(writer.write(&[0, 1]).is_err());
        assert!(writer.drain().is_ok());
        assert!(writer.close().is_ok());
    }
}
