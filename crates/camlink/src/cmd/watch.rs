use std::fs;
use std::path::Path;

use camlink_frame::FrameError;
use camlink_session::{SessionError, VideoClient};
use tracing::{debug, info};

use crate::cmd::{parse_duration, WatchArgs};
use crate::devices::jpeg_dimensions;
use crate::exit::{io_error, session_error, CliResult, SUCCESS};
use crate::output::{now_unix_seconds, print_raw, print_record, FrameRecord, OutputFormat};

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    if let Some(dir) = &args.save_dir {
        fs::create_dir_all(dir)
            .map_err(|err| io_error(&format!("failed creating {}", dir.display()), err))?;
    }

    let mut client = VideoClient::connect((args.host.as_str(), args.port), timeout)
        .map_err(|err| session_error("connect failed", err))?;
    info!(peer = ?client.peer(), "watching video channel");

    let mut received = 0u64;
    while args.count.is_none_or(|count| received < count) {
        let frame = match client.read_frame() {
            Ok(frame) => frame,
            Err(SessionError::Frame(FrameError::ConnectionClosed)) => {
                info!(frames = received, "phone closed the connection");
                break;
            }
            Err(err) => return Err(session_error("receive failed", err)),
        };
        received += 1;

        let saved_to = match &args.save_dir {
            Some(dir) => Some(save_frame(dir, received, &frame.payload)?),
            None => None,
        };

        if let OutputFormat::Raw = format {
            print_raw(&frame.payload);
            continue;
        }

        let (width, height) = jpeg_dimensions(&frame.payload).unzip();
        print_record(
            &FrameRecord {
                index: received,
                size: frame.payload.len(),
                width,
                height,
                saved_to,
                timestamp: now_unix_seconds(),
            },
            format,
        );
    }

    debug!(skipped = client.skipped_bytes(), "watch finished");
    client.shutdown();
    Ok(SUCCESS)
}

fn save_frame(dir: &Path, index: u64, payload: &[u8]) -> CliResult<String> {
    let path = dir.join(format!("frame-{index:06}.jpg"));
    fs::write(&path, payload)
        .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;
    Ok(path.display().to_string())
}
