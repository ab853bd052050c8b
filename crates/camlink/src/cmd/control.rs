use camlink_session::{Command, VideoClient};

use crate::cmd::{parse_duration, ControlArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_record, CommandRecord, OutputFormat};

pub fn run(args: ControlArgs, format: OutputFormat) -> CliResult<i32> {
    let command = parse_command(&args.command)?;
    let timeout = parse_duration(&args.timeout)?;

    let mut client = VideoClient::connect((args.host.as_str(), args.port), timeout)
        .map_err(|err| session_error("connect failed", err))?;
    client
        .send_command(&command)
        .map_err(|err| session_error("send failed", err))?;
    let peer = client
        .peer()
        .map_or_else(|| format!("{}:{}", args.host, args.port), |addr| addr.to_string());
    client.shutdown();

    print_record(
        &CommandRecord {
            command: command.to_wire_text(),
            peer,
        },
        format,
    );
    Ok(SUCCESS)
}

fn parse_command(text: &str) -> CliResult<Command> {
    let command = Command::parse(text);
    match command {
        Command::Unrecognized(_) => Err(CliError::new(
            USAGE,
            format!("unrecognized command {text:?} (expected SWITCH_CAMERA, TOGGLE_FLASH or ZOOM:<0.0-1.0>)"),
        )),
        Command::SetZoom(level) if !(0.0..=1.0).contains(&level) => Err(CliError::new(
            USAGE,
            format!("zoom level {level} outside 0.0..=1.0"),
        )),
        command => Ok(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_commands() {
        assert_eq!(
            parse_command("ZOOM:0.5").expect("zoom should parse"),
            Command::SetZoom(0.5)
        );
        assert_eq!(
            parse_command("SWITCH_CAMERA").expect("switch should parse"),
            Command::SwitchCamera
        );
    }

    #[test]
    fn rejects_unknown_and_out_of_range() {
        assert_eq!(parse_command("FOCUS").unwrap_err().code, USAGE);
        assert_eq!(parse_command("ZOOM:1.5").unwrap_err().code, USAGE);
        assert_eq!(parse_command("ZOOM:NaN").unwrap_err().code, USAGE);
    }
}
