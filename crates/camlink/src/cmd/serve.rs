use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camlink_session::{
    run_capture_loop, Devices, FrameSource, MicDevice, SessionConfig, SpeakerDevice, Supervisor,
};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, ServeArgs};
use crate::devices::{FileSpeaker, JpegReplay, LoggingCamera, PcmFileMic};
use crate::exit::{io_error, session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_record, ListeningRecord, OutputFormat};

const IDLE_POLL: Duration = Duration::from_millis(100);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args)?;

    let source: Option<Box<dyn FrameSource>> = match &args.frames {
        Some(path) => Some(Box::new(JpegReplay::load(path).map_err(|err| {
            io_error(&format!("failed loading frames from {}", path.display()), err)
        })?)),
        None => None,
    };
    let mic: Arc<dyn MicDevice> = match &args.mic {
        Some(path) => Arc::new(PcmFileMic::load(path).map_err(|err| {
            io_error(&format!("failed loading mic PCM from {}", path.display()), err)
        })?),
        None => Arc::new(PcmFileMic::silent()),
    };
    let speaker: Arc<dyn SpeakerDevice> = match &args.speaker_out {
        Some(path) => Arc::new(FileSpeaker::create(path).map_err(|err| {
            io_error(&format!("failed creating {}", path.display()), err)
        })?),
        None => Arc::new(FileSpeaker::discard()),
    };

    let mut supervisor = Supervisor::start(
        config,
        Devices {
            camera: Box::new(LoggingCamera::default()),
            mic,
            speaker,
        },
    )
    .map_err(|err| session_error("start failed", err))?;

    let addrs = supervisor.local_addrs();
    print_record(
        &ListeningRecord {
            video: addrs.video.to_string(),
            mic: addrs.mic.to_string(),
            speaker: addrs.speaker.to_string(),
        },
        format,
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let capture = match source {
        Some(mut source) => {
            let sender = supervisor.frame_sender();
            let running = Arc::clone(&running);
            let interval = Duration::from_secs(1) / args.fps;
            let handle = thread::Builder::new()
                .name("camlink-capture".to_string())
                .spawn(move || run_capture_loop(source.as_mut(), &sender, &running, interval))
                .map_err(|err| {
                    CliError::new(INTERNAL, format!("failed to start capture thread: {err}"))
                })?;
            Some(handle)
        }
        None => None,
    };

    while running.load(Ordering::SeqCst) {
        thread::sleep(IDLE_POLL);
    }

    info!("shutting down");
    supervisor.shutdown();
    if let Some(handle) = capture {
        match handle.join() {
            Ok(stats) => info!(
                captured = stats.captured,
                sent = stats.sent,
                dropped = stats.dropped,
                "capture finished"
            ),
            Err(_) => return Err(CliError::new(INTERNAL, "capture thread panicked")),
        }
    }

    Ok(SUCCESS)
}

fn load_config(args: &ServeArgs) -> CliResult<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)
            .map_err(|err| session_error("config load failed", err))?,
        None => SessionConfig::default(),
    };

    if let Some(bind) = &args.bind {
        config.bind_host = bind.clone();
    }
    if let Some(port) = args.video_port {
        config.video_port = port;
    }
    if let Some(port) = args.mic_port {
        config.mic_port = port;
    }
    if let Some(port) = args.speaker_port {
        config.speaker_port = port;
    }

    config
        .validate()
        .map_err(|err| session_error("invalid config", err))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::DATA_INVALID;

    fn args() -> ServeArgs {
        ServeArgs {
            config: None,
            bind: None,
            video_port: None,
            mic_port: None,
            speaker_port: None,
            frames: None,
            fps: 15,
            mic: None,
            speaker_out: None,
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = load_config(&ServeArgs {
            bind: Some("127.0.0.1".to_string()),
            video_port: Some(0),
            ..args()
        })
        .expect("config should load");
        assert_eq!(config.bind_host, "127.0.0.1");
        assert_eq!(config.video_port, 0);
        assert_eq!(config.mic_port, 6678);
    }

    #[test]
    fn conflicting_ports_are_invalid() {
        let err = load_config(&ServeArgs {
            mic_port: Some(6677),
            ..args()
        })
        .unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }
}
