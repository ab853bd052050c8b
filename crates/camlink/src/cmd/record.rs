use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::time::Instant;

use camlink_frame::pcm_bytes_per_second;
use camlink_session::connect_mic;
use tracing::info;

use crate::cmd::{parse_duration, RecordArgs};
use crate::exit::{io_error, session_error, CliResult, SUCCESS};
use crate::output::{print_record, AudioRecord, OutputFormat};

const CHUNK: usize = 4096;

pub fn run(args: RecordArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let limit = args
        .seconds
        .map(|secs| secs.saturating_mul(pcm_bytes_per_second() as u64));

    let file = File::create(&args.out)
        .map_err(|err| io_error(&format!("failed creating {}", args.out.display()), err))?;
    let mut out = BufWriter::new(file);

    let mut stream = connect_mic((args.host.as_str(), args.port), timeout)
        .map_err(|err| session_error("connect failed", err))?;
    info!(peer = ?stream.peer_addr(), "recording microphone");

    let started = Instant::now();
    let mut total = 0u64;
    let mut buf = [0u8; CHUNK];
    while limit.is_none_or(|limit| total < limit) {
        let want = limit.map_or(CHUNK, |limit| CHUNK.min((limit - total) as usize));
        let read = match stream.read(&mut buf[..want]) {
            Ok(0) => {
                info!("phone closed the mic channel");
                break;
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("receive failed", err)),
        };
        out.write_all(&buf[..read])
            .map_err(|err| io_error("write failed", err))?;
        total += read as u64;
    }
    out.flush().map_err(|err| io_error("write failed", err))?;
    stream.shutdown();

    info!(bytes = total, elapsed = ?started.elapsed(), "recording finished");
    print_record(
        &AudioRecord {
            direction: "mic",
            bytes: total,
            seconds: total as f64 / pcm_bytes_per_second() as f64,
            path: args.out.display().to_string(),
        },
        format,
    );
    Ok(SUCCESS)
}
