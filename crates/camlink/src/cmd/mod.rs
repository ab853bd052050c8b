use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use camlink_frame::{MIC_AUDIO_PORT, PC_AUDIO_PORT, VIDEO_PORT};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod control;
pub mod record;
pub mod serve;
pub mod talk;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the phone side: serve all three channels from files.
    Serve(ServeArgs),
    /// Receive video frames from a phone.
    Watch(WatchArgs),
    /// Send one camera command (replaces any current video client).
    Control(ControlArgs),
    /// Record the phone's microphone to a raw PCM file.
    Record(RecordArgs),
    /// Play a raw PCM file on the phone's speaker.
    Talk(TalkArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Control(args) => control::run(args, format),
        Command::Record(args) => record::run(args, format),
        Command::Talk(args) => talk::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// JSON session config; flags below override it.
    #[arg(long, value_name = "FILE", env = "CAMLINK_CONFIG")]
    pub config: Option<PathBuf>,
    /// Address to bind all channels to.
    #[arg(long, value_name = "IP")]
    pub bind: Option<String>,
    #[arg(long, value_name = "PORT")]
    pub video_port: Option<u16>,
    #[arg(long, value_name = "PORT")]
    pub mic_port: Option<u16>,
    #[arg(long, value_name = "PORT")]
    pub speaker_port: Option<u16>,
    /// A JPEG file, or a directory of them, replayed as the camera feed.
    #[arg(long, value_name = "PATH")]
    pub frames: Option<PathBuf>,
    /// Frames per second offered to the video client.
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u32).range(1..=120))]
    pub fps: u32,
    /// Raw s16le mono 44.1 kHz PCM looped as the microphone (silence if omitted).
    #[arg(long, value_name = "FILE")]
    pub mic: Option<PathBuf>,
    /// Store PCM received on the speaker channel (discarded if omitted).
    #[arg(long, value_name = "FILE")]
    pub speaker_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Phone address.
    pub host: String,
    #[arg(long, default_value_t = VIDEO_PORT)]
    pub port: u16,
    /// Write each frame to DIR as frame-NNNNNN.jpg.
    #[arg(long, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ControlArgs {
    /// Phone address.
    pub host: String,
    /// SWITCH_CAMERA, TOGGLE_FLASH or ZOOM:<0.0-1.0>.
    pub command: String,
    #[arg(long, default_value_t = VIDEO_PORT)]
    pub port: u16,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Phone address.
    pub host: String,
    /// Output file for raw PCM.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub out: PathBuf,
    #[arg(long, default_value_t = MIC_AUDIO_PORT)]
    pub port: u16,
    /// Stop after this many seconds of audio.
    #[arg(long)]
    pub seconds: Option<u64>,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct TalkArgs {
    /// Phone address.
    pub host: String,
    /// Raw s16le mono 44.1 kHz PCM to play.
    #[arg(long, short = 'i', value_name = "FILE")]
    pub input: PathBuf,
    #[arg(long, default_value_t = PC_AUDIO_PORT)]
    pub port: u16,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
