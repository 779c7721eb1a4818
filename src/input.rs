use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use sbc::utils::errors::StreamError;

/// Whole-stream input from a file or stdin pipe.
pub struct InputReader {
    reader: Box<dyn Read>,
    /// Size reported by the filesystem; unknown for pipes.
    expected_len: Option<u64>,
}

impl InputReader {
    /// Open `input_path`; use "-" for stdin pipe input.
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let input_path = input_path.as_ref();

        if input_path.as_os_str() == "-" {
            return Ok(Self {
                reader: Box::new(io::stdin().lock()),
                expected_len: None,
            });
        }

        let file = File::open(input_path)
            .with_context(|| format!("Failed to open {}", input_path.display()))?;
        let expected_len = file.metadata()?.len();

        Ok(Self {
            reader: Box::new(BufReader::new(file)),
            expected_len: Some(expected_len),
        })
    }

    pub fn is_pipe(&self) -> bool {
        self.expected_len.is_none()
    }

    /// Reads the whole stream, checking it against the reported size.
    pub fn read_all(mut self) -> Result<Vec<u8>> {
        let data = match self.expected_len {
            Some(expected) => read_sized(&mut self.reader, expected)?,
            None => {
                let mut data = Vec::new();
                self.reader.read_to_end(&mut data)?;
                data
            }
        };

        debug!("Loaded {} bytes", data.len());
        Ok(data)
    }
}

/// Reads up to `expected_len` bytes and fails with
/// [`StreamError::TruncatedFile`] if fewer arrive.
pub fn read_sized<R: Read>(reader: R, expected_len: u64) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(usize::try_from(expected_len).unwrap_or(0));
    let read = reader.take(expected_len).read_to_end(&mut data)? as u64;

    if read < expected_len {
        return Err(StreamError::TruncatedFile {
            expected: expected_len,
            read,
        }
        .into());
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_exactly_the_reported_size() -> Result<()> {
        let data = read_sized(Cursor::new(vec![0x9C; 16]), 16)?;
        assert_eq!(data.len(), 16);

        // Growth after the size was taken is ignored
        let data = read_sized(Cursor::new(vec![0x9C; 20]), 16)?;
        assert_eq!(data.len(), 16);
        Ok(())
    }

    #[test]
    fn short_read_is_truncated_file() {
        let error = read_sized(Cursor::new(vec![0u8; 10]), 100).unwrap_err();

        assert_eq!(
            error.downcast_ref::<StreamError>(),
            Some(&StreamError::TruncatedFile {
                expected: 100,
                read: 10
            })
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(InputReader::new("this/path/does/not/exist.sbc").is_err());
    }
}
