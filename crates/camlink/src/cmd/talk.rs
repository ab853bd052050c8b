use std::fs;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use camlink_frame::pcm_bytes_per_second;
use camlink_session::connect_speaker;
use tracing::info;

use crate::cmd::{parse_duration, TalkArgs};
use crate::exit::{io_error, session_error, CliResult, SUCCESS};
use crate::output::{print_record, AudioRecord, OutputFormat};

const CHUNK: usize = 4096;

pub fn run(args: TalkArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let pcm = fs::read(&args.input)
        .map_err(|err| io_error(&format!("failed reading {}", args.input.display()), err))?;

    let mut stream = connect_speaker((args.host.as_str(), args.port), timeout)
        .map_err(|err| session_error("connect failed", err))?;
    info!(peer = ?stream.peer_addr(), bytes = pcm.len(), "streaming to speaker");

    let started = Instant::now();
    let mut sent = 0usize;
    for chunk in pcm.chunks(CHUNK) {
        pace(started, sent);
        stream
            .write_all(chunk)
            .map_err(|err| io_error("send failed", err))?;
        sent += chunk.len();
    }
    stream.shutdown();

    print_record(
        &AudioRecord {
            direction: "speaker",
            bytes: sent as u64,
            seconds: sent as f64 / pcm_bytes_per_second() as f64,
            path: args.input.display().to_string(),
        },
        format,
    );
    Ok(SUCCESS)
}

// Keep the sender at playback speed so the phone never buffers more than a chunk ahead.
fn pace(started: Instant, sent: usize) {
    let due = Duration::from_secs_f64(sent as f64 / pcm_bytes_per_second() as f64);
    if let Some(wait) = due.checked_sub(started.elapsed()) {
        thread::sleep(wait);
    }
}
