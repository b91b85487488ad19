use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use ingest::container::conform_parameter_set;
use ingest::extractor::{ExtractorOutput, Format, SampleMetadata, SeekMap, TrackKind, TrackOutput};
use ingest::media::annexb::ElementaryStream;
use ingest::{
    CancellationToken, DataSourceRegistry, DataSpec, ExtractorRegistry, FrameFramer,
    FramePublisher, IngestConfig, Loader, SharedFrameSession,
};

#[derive(Parser)]
#[command(
    name = "rtsp-probe",
    about = "Replay an H.264 elementary stream through the ingestion pipeline"
)]
struct Args {
    /// Annex B H.264 file to replay
    #[arg(long, short)]
    input: PathBuf,

    /// URL the native session is opened with
    #[arg(long, default_value = "rtsp://127.0.0.1:8554/stream")]
    url: String,

    /// Publishing rate of the replayed pictures
    #[arg(long, default_value_t = 25)]
    fps: u32,

    /// Stop after this many samples (0 = until the feed ends)
    #[arg(long, default_value_t = 0)]
    frames: usize,

    /// Wait between polls that find no new frame
    #[arg(long, default_value_t = 100)]
    poll_interval_ms: u64,

    /// Out-of-band parameter sets, as in an SDP `sprop-parameter-sets` value
    #[arg(long)]
    sprop: Option<String>,
}

/// Prints the track format and one line per sample; cancels after `limit`
/// samples.
struct PrintingOutput {
    track: PrintingTrack,
}

struct PrintingTrack {
    samples: usize,
    limit: usize,
    cancel: CancellationToken,
}

impl ExtractorOutput for PrintingOutput {
    fn track(&mut self, id: u32, kind: TrackKind) -> &mut dyn TrackOutput {
        tracing::debug!(id, ?kind, "track declared");
        &mut self.track
    }

    fn end_tracks(&mut self) {}

    fn seek_map(&mut self, seek_map: SeekMap) {
        tracing::debug!(?seek_map, "seek map");
    }
}

impl TrackOutput for PrintingTrack {
    fn format(&mut self, format: Format) {
        println!(
            "format: {} {}x{} par={:.3} codecs={}",
            format.sample_mime_type,
            format.width,
            format.height,
            format.pixel_width_height_ratio,
            format.codecs.as_deref().unwrap_or("-")
        );
    }

    fn sample_data(&mut self, _data: &[u8]) {}

    fn sample_metadata(&mut self, metadata: SampleMetadata) {
        self.samples += 1;
        println!("sample {}: {} bytes", self.samples, metadata.size);
        if self.limit > 0 && self.samples >= self.limit {
            self.cancel.cancel();
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let data = match std::fs::read(&args.input) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read {}: {}", args.input.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let stream = ElementaryStream::from_annexb(&data);
    if stream.pictures.is_empty() {
        eprintln!("No coded pictures in {}", args.input.display());
        return ExitCode::FAILURE;
    }

    let session = SharedFrameSession::new();
    let publisher = session.publisher();
    if let Err(message) = publish_parameter_set(&publisher, &stream, args.sprop.as_deref()) {
        eprintln!("{message}");
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    let config = IngestConfig::default()
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));

    let sources = DataSourceRegistry::new();
    for scheme in ["rtsp", "rtsps"] {
        let session = session.clone();
        let config = config.clone();
        let cancel = cancel.clone();
        sources.register(scheme, move || {
            let framer = FrameFramer::new(session.clone(), config.clone());
            Box::new(framer.with_cancellation(cancel.clone()))
        });
    }
    let loader = Loader::new(sources, ExtractorRegistry::with_defaults(&config))
        .with_cancellation(cancel.clone());

    let feeder = {
        let cancel = cancel.clone();
        let frame_interval = Duration::from_secs(1) / args.fps.max(1);
        let pictures = stream.pictures;
        thread::spawn(move || {
            for (index, picture) in pictures.iter().enumerate() {
                if cancel.is_cancelled() {
                    return;
                }
                let pts_us = index as u64 * frame_interval.as_micros() as u64;
                publisher.publish_frame(picture, pts_us);
                cancel.wait_timeout(frame_interval);
            }
            // Give the loader one more interval to pick up the last picture.
            cancel.wait_timeout(frame_interval);
            tracing::info!(pictures = pictures.len(), "feed finished");
            cancel.cancel();
        })
    };

    let mut output = PrintingOutput {
        track: PrintingTrack {
            samples: 0,
            limit: args.frames,
            cancel: cancel.clone(),
        },
    };
    let result = loader.load(&DataSpec::new(&args.url), &mut output);
    cancel.cancel();
    if feeder.join().is_err() {
        eprintln!("Feeder thread panicked");
    }

    match result {
        Ok(summary) => {
            println!(
                "done: extractor={} samples={} bytes={} reads={}",
                summary.extractor, output.track.samples, summary.bytes_consumed, summary.read_calls
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Load failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn publish_parameter_set(
    publisher: &FramePublisher,
    stream: &ElementaryStream,
    sprop: Option<&str>,
) -> Result<(), String> {
    if let Some(sprop) = sprop {
        match publisher.set_sprop_parameter_sets(sprop) {
            Ok(true) => return Ok(()),
            Ok(false) => tracing::warn!("sprop-parameter-sets ignored, using in-band SPS"),
            Err(e) => return Err(format!("Invalid --sprop: {e}")),
        }
    }

    let sps = stream
        .sps
        .as_deref()
        .ok_or_else(|| "No SPS in the input and no --sprop given".to_string())?;
    match conform_parameter_set(sps) {
        Ok(padded) => publisher.set_parameter_set(&padded),
        Err(e) => {
            tracing::warn!(error = %e, "SPS does not fit the probe window, framing unpadded");
            publisher.set_parameter_set(sps);
        }
    }
    Ok(())
}
