use std::time::Instant;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar};
use log::{debug, info};
use sbc::process::decode::SbcDecoder;
use sbc::process::sink::{AudioSink, NullSink};
use sbc::process::stream::{Step, StreamDecoder};

use super::command::Cli;
use super::progress::create_progress_bar;
use super::report::StreamReport;
use crate::input::InputReader;
use crate::output::{AudioWriter, Destination};
use crate::playback::PlaybackSink;
use crate::timestamp::time_str;

/// Prints a console report line without tearing the progress bar. Goes to
/// stderr when stdout carries PCM.
fn report_line(pb: Option<&ProgressBar>, to_stderr: bool, line: &str) {
    let print = || {
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    };

    match pb {
        Some(pb) => pb.suspend(print),
        None => print(),
    }
}

pub fn cmd_decode(cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    macro_rules! pb_update {
        ($pb:expr, $method:ident($($args:expr),*)) => {
            if let Some(ref pb) = $pb {
                pb.$method($($args),*);
            }
        };
    }

    let options = cli.decoder_options();
    info!(
        "Decoding SBC stream: {} (resync: {}, flush interval: {})",
        cli.input.display(),
        options.resync,
        options.flush_interval
    );

    let input = InputReader::new(&cli.input)?;
    if input.is_pipe() {
        debug!("Reading stream from stdin");
    }
    let data = input.read_all()?;

    let destination = cli
        .output
        .as_deref()
        .map(|path| Destination::new(path, cli.format));
    let to_stderr = destination == Some(Destination::Stdout);

    let sink: Box<dyn AudioSink> = match destination {
        Some(destination) => Box::new(AudioWriter::new(destination)),
        None if cli.play => Box::new(PlaybackSink::new(cli.device.clone())),
        None => {
            debug!("No output requested; decoding without playback");
            Box::new(NullSink)
        }
    };

    let pb = multi
        .map(|multi| create_progress_bar(multi, data.len() as u64))
        .transpose()?;

    let start_time = Instant::now();
    let mut decoder = StreamDecoder::new(&data, SbcDecoder::default(), sink, options);

    loop {
        let step = match decoder.step() {
            Ok(step) => step,
            Err(e) => {
                pb_update!(pb, finish_with_message("decode failed"));
                return Err(e);
            }
        };

        match step {
            Step::Decoded {
                header,
                first: true,
                ..
            } => {
                report_line(pb.as_ref(), to_stderr, &header.summary().to_string());
                pb_update!(pb, set_message("decoding"));
            }
            Step::Decoded { .. } => {}
            Step::Skipped {
                resumed_at: Some(offset),
                ..
            } => {
                pb_update!(pb, set_message(format!("resynchronised at offset {offset}")));
            }
            Step::Skipped {
                resumed_at: None, ..
            } => {}
            Step::Finished => break,
        }

        pb_update!(pb, set_position(decoder.position() as u64));
    }

    let report = decoder.finish();
    let elapsed = start_time.elapsed();

    report_line(
        pb.as_ref(),
        to_stderr,
        &format!(
            "Processed {} frames, skipped {}",
            report.valid_frames, report.invalid_frames
        ),
    );

    if let Some(duration) = report.duration_secs() {
        report_line(
            pb.as_ref(),
            to_stderr,
            &format!("Duration: {}", time_str(duration)),
        );

        let realtime_multiplier = duration / elapsed.as_secs_f64().max(f64::EPSILON);
        pb_update!(
            pb,
            finish_with_message(format!(
                "speed: {realtime_multiplier:.1}x | timestamp: {}",
                time_str(duration)
            ))
        );
    } else {
        pb_update!(pb, finish_with_message("no frames decoded"));
    }

    if report.trailing_bytes > 0 {
        debug!("{} trailing bytes dropped", report.trailing_bytes);
    }

    if let Some(path) = &cli.report {
        StreamReport::new(&cli.input, &report).write(path)?;
    }

    info!("Decoding completed in {:.3}s", elapsed.as_secs_f64());
    Ok(())
}
