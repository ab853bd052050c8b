//! File-backed stand-ins for the phone's camera, microphone and speaker,
//! used by `serve`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use camlink_frame::pcm_bytes_per_second;
use camlink_session::{
    CameraControl, CapturedFrame, DeviceError, FrameSource, MicCapture, MicDevice, SpeakerDevice,
    SpeakerPlayback,
};
use tracing::{debug, info};

/// Width and height from a JPEG's start-of-frame segment.
pub fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut pos = 2usize;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let len = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if pos + 9 > data.len() {
                return None;
            }
            let height = u16::from_be_bytes([data[pos + 5], data[pos + 6]]);
            let width = u16::from_be_bytes([data[pos + 7], data[pos + 8]]);
            return Some((u32::from(width), u32::from(height)));
        }
        if marker == 0xDA || len < 2 {
            return None;
        }
        pos += 2 + len;
    }
    None
}

/// Replays JPEG files in a loop.
pub struct JpegReplay {
    frames: Vec<CapturedFrame>,
    next: usize,
}

impl JpegReplay {
    /// Load one `.jpg` file, or every `.jpg`/`.jpeg` in a directory in name order.
    pub fn load(path: &Path) -> io::Result<Self> {
        let files = if path.is_dir() {
            let mut files = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| {
                            ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg")
                        })
                })
                .collect::<Vec<PathBuf>>();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        let mut frames = Vec::with_capacity(files.len());
        for file in &files {
            let data = fs::read(file)?;
            let (width, height) = jpeg_dimensions(&data).unwrap_or((0, 0));
            frames.push(CapturedFrame::new(Bytes::from(data), width, height));
        }
        if frames.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no JPEG files in {}", path.display()),
            ));
        }
        info!(count = frames.len(), path = %path.display(), "loaded frames");
        Ok(Self { frames, next: 0 })
    }
}

impl FrameSource for JpegReplay {
    fn capture_frame(&mut self) -> Option<CapturedFrame> {
        let frame = self.frames.get(self.next)?.clone();
        self.next = (self.next + 1) % self.frames.len();
        Some(frame)
    }
}

/// Microphone that plays back a raw PCM file on a loop, or silence.
pub struct PcmFileMic {
    samples: Option<Bytes>,
}

impl PcmFileMic {
    pub fn silent() -> Self {
        Self { samples: None }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let data = fs::read(path)?;
        if data.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is empty", path.display()),
            ));
        }
        info!(bytes = data.len(), path = %path.display(), "loaded mic PCM");
        Ok(Self {
            samples: Some(Bytes::from(data)),
        })
    }
}

impl MicDevice for PcmFileMic {
    fn open(&self) -> Result<Box<dyn MicCapture>, DeviceError> {
        Ok(Box::new(PcmFileCapture {
            samples: self.samples.clone(),
            pos: 0,
            started: Instant::now(),
            delivered: 0,
        }))
    }
}

struct PcmFileCapture {
    samples: Option<Bytes>,
    pos: usize,
    started: Instant,
    delivered: u64,
}

impl PcmFileCapture {
    // Sleep until `delivered` bytes would have been produced by a real microphone.
    fn pace(&self) {
        let due = Duration::from_secs_f64(self.delivered as f64 / pcm_bytes_per_second() as f64);
        if let Some(wait) = due.checked_sub(self.started.elapsed()) {
            thread::sleep(wait);
        }
    }
}

impl MicCapture for PcmFileCapture {
    fn read_samples(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.pace();
        match &self.samples {
            Some(samples) => {
                for byte in buf.iter_mut() {
                    *byte = samples[self.pos];
                    self.pos = (self.pos + 1) % samples.len();
                }
            }
            None => buf.fill(0),
        }
        self.delivered += buf.len() as u64;
        Ok(buf.len())
    }

    fn stop(&mut self) {
        debug!(bytes = self.delivered, "mic capture stopped");
    }
}

/// Speaker that appends received PCM to a file, or discards it.
pub struct FileSpeaker {
    path: Option<PathBuf>,
}

impl FileSpeaker {
    pub fn discard() -> Self {
        Self { path: None }
    }

    /// Write to `path`, truncating it now.
    pub fn create(path: &Path) -> io::Result<Self> {
        File::create(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
        })
    }
}

impl SpeakerDevice for FileSpeaker {
    fn probe(&self) -> Result<(), DeviceError> {
        if let Some(path) = &self.path {
            OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(|err| DeviceError::Unavailable(format!("{}: {err}", path.display())))?;
        }
        Ok(())
    }

    fn open(&self) -> Result<Box<dyn SpeakerPlayback>, DeviceError> {
        let out = match &self.path {
            Some(path) => Some(BufWriter::new(
                OpenOptions::new().append(true).open(path)?,
            )),
            None => None,
        };
        Ok(Box::new(FilePlayback { out, played: 0 }))
    }
}

struct FilePlayback {
    out: Option<BufWriter<File>>,
    played: u64,
}

impl SpeakerPlayback for FilePlayback {
    fn play_samples(&mut self, buf: &[u8]) -> Result<(), DeviceError> {
        if let Some(out) = &mut self.out {
            out.write_all(buf)?;
        }
        self.played += buf.len() as u64;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(out) = &mut self.out {
            if let Err(err) = out.flush() {
                tracing::warn!(error = %err, "failed flushing speaker output");
            }
        }
        debug!(bytes = self.played, "playback stopped");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LensFacing {
    Back,
    Front,
}

/// Camera that logs every control and tracks the resulting state.
///
/// Only the back lens has a flash unit, as on most phones.
#[derive(Debug)]
pub struct LoggingCamera {
    pub zoom: f32,
    pub facing: LensFacing,
    pub torch: bool,
}

impl Default for LoggingCamera {
    fn default() -> Self {
        Self {
            zoom: 0.0,
            facing: LensFacing::Back,
            torch: false,
        }
    }
}

impl CameraControl for LoggingCamera {
    fn set_zoom_level(&mut self, level: f32) {
        self.zoom = level;
        info!(zoom = self.zoom, "camera zoom set");
    }

    fn toggle_torch(&mut self, on: bool) {
        self.torch = on;
        info!(torch = self.torch, "camera torch toggled");
    }

    fn switch_lens_facing(&mut self) {
        self.facing = match self.facing {
            LensFacing::Back => LensFacing::Front,
            LensFacing::Front => LensFacing::Back,
        };
        self.torch = false;
        info!(facing = ?self.facing, "camera lens switched");
    }

    fn has_flash_unit(&self) -> bool {
        self.facing == LensFacing::Back
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_jpeg(width: u16, height: u16) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        // APP0 segment to skip over
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn reads_dimensions_from_sof() {
        assert_eq!(jpeg_dimensions(&tiny_jpeg(640, 480)), Some((640, 480)));
        assert_eq!(jpeg_dimensions(b"not a jpeg"), None);
        assert_eq!(jpeg_dimensions(&[0xFF, 0xD8, 0xFF, 0xD9]), None);
    }

    #[test]
    fn silent_mic_fills_zeroes() {
        let mic = PcmFileMic::silent();
        let mut capture = mic.open().expect("silent mic should open");
        let mut buf = [7u8; 32];
        assert_eq!(capture.read_samples(&mut buf).expect("read should succeed"), 32);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn front_lens_has_no_flash() {
        let mut camera = LoggingCamera::default();
        assert!(camera.has_flash_unit());
        camera.toggle_torch(true);
        camera.switch_lens_facing();
        assert_eq!(camera.facing, LensFacing::Front);
        assert!(!camera.torch);
        assert!(!camera.has_flash_unit());
    }

    #[test]
    fn replay_loops_over_files() {
        let dir = std::env::temp_dir().join(format!(
            "camlink-replay-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("temp dir should be creatable");
        fs::write(dir.join("a.jpg"), tiny_jpeg(2, 2)).expect("write a");
        fs::write(dir.join("b.JPEG"), tiny_jpeg(4, 4)).expect("write b");
        fs::write(dir.join("notes.txt"), b"skip").expect("write notes");

        let mut replay = JpegReplay::load(&dir).expect("frames should load");
        let widths: Vec<u32> = (0..3)
            .map(|_| replay.capture_frame().expect("frame").width)
            .collect();
        assert_eq!(widths, vec![2, 4, 2]);

        let _ = fs::remove_dir_all(&dir);
    }
}
