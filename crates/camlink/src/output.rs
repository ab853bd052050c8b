use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Frame payloads written to stdout as-is (an MJPEG byte stream).
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Something a command prints, one record per call.
pub trait Record: Serialize {
    fn headers(&self) -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

pub fn print_record<R: Record>(record: &R, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(record.headers())
                .add_row(record.row());
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = record
                .headers()
                .iter()
                .zip(record.row())
                .map(|(key, value)| format!("{}={value}", key.to_lowercase()))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// One frame received by `watch`.
#[derive(Serialize)]
pub struct FrameRecord {
    pub index: u64,
    pub size: usize,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<String>,
    pub timestamp: String,
}

impl Record for FrameRecord {
    fn headers(&self) -> Vec<&'static str> {
        vec!["INDEX", "SIZE", "WIDTH", "HEIGHT", "SAVED"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.index.to_string(),
            self.size.to_string(),
            optional(self.width),
            optional(self.height),
            self.saved_to.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }
}

/// Where `serve` is listening.
#[derive(Serialize)]
pub struct ListeningRecord {
    pub video: String,
    pub mic: String,
    pub speaker: String,
}

impl Record for ListeningRecord {
    fn headers(&self) -> Vec<&'static str> {
        vec!["VIDEO", "MIC", "SPEAKER"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.video.clone(), self.mic.clone(), self.speaker.clone()]
    }
}

/// Summary of an audio transfer (`record` and `talk`).
#[derive(Serialize)]
pub struct AudioRecord {
    pub direction: &'static str,
    pub bytes: u64,
    pub seconds: f64,
    pub path: String,
}

impl Record for AudioRecord {
    fn headers(&self) -> Vec<&'static str> {
        vec!["DIRECTION", "BYTES", "SECONDS", "PATH"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.direction.to_string(),
            self.bytes.to_string(),
            format!("{:.2}", self.seconds),
            self.path.clone(),
        ]
    }
}

/// A command sent by `control`.
#[derive(Serialize)]
pub struct CommandRecord {
    pub command: String,
    pub peer: String,
}

impl Record for CommandRecord {
    fn headers(&self) -> Vec<&'static str> {
        vec!["COMMAND", "PEER"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.command.clone(), self.peer.clone()]
    }
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

fn optional(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
