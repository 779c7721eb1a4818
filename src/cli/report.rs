use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use sbc::process::stream::{DecodeReport, Recovery};
use sbc::structs::header::FrameHeader;
use serde::Serialize;

use crate::timestamp::time_str;

#[derive(Debug, Serialize)]
pub struct StreamReport {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamInfo>,
    pub frames: FrameCounts,
    pub recoveries: Vec<RecoveryEntry>,
    pub trailing_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StreamInfo {
    pub sampling_frequency: u32,
    pub block_size: usize,
    pub channel_mode: &'static str,
    pub allocation_method: &'static str,
    pub subbands: usize,
    pub bitpool: u8,
    pub frame_length: usize,
    pub first_sync: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FrameCounts {
    pub valid: u64,
    pub invalid: u64,
}

#[derive(Debug, Serialize)]
pub struct RecoveryEntry {
    pub failed_at: usize,
    /// Absent when the rest of the stream was dropped.
    pub resumed_at: Option<usize>,
}

impl StreamInfo {
    fn new(header: &FrameHeader, first_sync: Option<usize>) -> Self {
        Self {
            sampling_frequency: header.sampling_frequency.hz(),
            block_size: header.blocks(),
            channel_mode: header.channel_mode.label(),
            allocation_method: header.allocation_method.label(),
            subbands: header.subbands(),
            bitpool: header.bitpool,
            frame_length: header.geometry().frame_length_bytes,
            first_sync,
        }
    }
}

impl From<&Recovery> for RecoveryEntry {
    fn from(recovery: &Recovery) -> Self {
        Self {
            failed_at: recovery.failed_at,
            resumed_at: recovery.resumed_at,
        }
    }
}

impl StreamReport {
    pub fn new(input: &Path, report: &DecodeReport) -> Self {
        Self {
            input: input.display().to_string(),
            stream: report
                .stream
                .as_ref()
                .map(|header| StreamInfo::new(header, report.first_sync)),
            frames: FrameCounts {
                valid: report.valid_frames,
                invalid: report.invalid_frames,
            },
            recoveries: report.recoveries.iter().map(RecoveryEntry::from).collect(),
            trailing_bytes: report.trailing_bytes,
            duration: report.duration_secs().map(time_str),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_yaml()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbc::structs::header::SYNCWORD;

    #[test]
    fn yaml_layout() -> Result<()> {
        let header = FrameHeader::parse(&[SYNCWORD, 0xBD, 35, 0], 0)?;
        let report = DecodeReport {
            valid_frames: 2,
            invalid_frames: 1,
            first_sync: Some(0),
            stream: Some(header),
            recoveries: vec![Recovery {
                failed_at: 119,
                resumed_at: None,
            }],
            trailing_bytes: 40,
            samples_per_channel: 44_100,
        };

        let yaml = StreamReport::new(Path::new("capture.sbc"), &report).to_yaml()?;

        assert!(yaml.contains("input: capture.sbc"));
        assert!(yaml.contains("channel_mode: Joint stereo"));
        assert!(yaml.contains("sampling_frequency: 44100"));
        assert!(yaml.contains("valid: 2"));
        assert!(yaml.contains("invalid: 1"));
        assert!(yaml.contains("failed_at: 119"));
        assert!(yaml.contains("resumed_at: null"));
        assert!(yaml.contains("trailing_bytes: 40"));
        assert!(yaml.contains("duration: 00:00:01.000"));
        Ok(())
    }

    #[test]
    fn stream_without_valid_frames_omits_stream_info() -> Result<()> {
        let yaml = StreamReport::new(Path::new("-"), &DecodeReport::default()).to_yaml()?;

        assert!(!yaml.contains("stream:"));
        assert!(!yaml.contains("duration:"));
        assert!(yaml.contains("recoveries: []"));
        Ok(())
    }
}
