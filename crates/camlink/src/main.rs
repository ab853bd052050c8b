mod cmd;
mod devices;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "camlink", version, about = "Phone camera, mic and speaker over TCP")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "CAMLINK_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    /// Stamp log lines with time since start instead of wall-clock time.
    #[arg(long, global = true)]
    log_uptime: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level, cli.log_uptime);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "camlink",
            "serve",
            "--frames",
            "/tmp/frames",
            "--fps",
            "30",
            "--video-port",
            "7000",
        ])
        .expect("serve args should parse");

        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.fps, 30);
                assert_eq!(args.video_port, Some(7000));
                assert!(args.mic.is_none());
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_fps() {
        let err = Cli::try_parse_from(["camlink", "serve", "--fps", "0"])
            .expect_err("zero fps should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn control_defaults_to_video_port() {
        let cli = Cli::try_parse_from(["camlink", "control", "192.168.1.20", "ZOOM:0.5"])
            .expect("control args should parse");
        match cli.command {
            Command::Control(args) => {
                assert_eq!(args.port, 6677);
                assert_eq!(args.command, "ZOOM:0.5");
            }
            other => panic!("expected control, got {other:?}"),
        }
    }

    #[test]
    fn logging_flags_are_global() {
        let cli = Cli::try_parse_from([
            "camlink",
            "watch",
            "192.168.1.20",
            "--log-format",
            "compact",
            "--log-uptime",
        ])
        .expect("logging flags should parse after the subcommand");
        assert_eq!(cli.log_format, LogFormat::Compact);
        assert!(cli.log_uptime);
    }

    #[test]
    fn record_requires_output() {
        let err = Cli::try_parse_from(["camlink", "record", "192.168.1.20"])
            .expect_err("missing --out should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
