use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// Command text: switch between front and back lens.
pub const SWITCH_CAMERA: &str = "SWITCH_CAMERA";
/// Command text: toggle the torch.
pub const TOGGLE_FLASH: &str = "TOGGLE_FLASH";
/// Command prefix: `ZOOM:<float>`.
pub const ZOOM_PREFIX: &str = "ZOOM:";

/// A camera control request received on the video channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SwitchCamera,
    ToggleFlash,
    /// Linear zoom, 0.0 (widest) to 1.0 (closest).
    SetZoom(f32),
    /// Anything else. Never forwarded to the camera.
    Unrecognized(String),
}

impl Command {
    /// Interpret one command message. Never fails; unknown text becomes
    /// [`Command::Unrecognized`].
    pub fn parse(text: &str) -> Self {
        match text {
            SWITCH_CAMERA => Command::SwitchCamera,
            TOGGLE_FLASH => Command::ToggleFlash,
            _ => {
                if let Some(value) = text.strip_prefix(ZOOM_PREFIX) {
                    return match value.trim().parse::<f32>() {
                        Ok(level) => Command::SetZoom(level),
                        Err(err) => {
                            warn!(command = text, error = %err, "ignoring zoom with bad level");
                            Command::Unrecognized(text.to_string())
                        }
                    };
                }
                debug!(command = text, "ignoring unrecognized command");
                Command::Unrecognized(text.to_string())
            }
        }
    }

    /// Text form as sent on the wire.
    pub fn to_wire_text(&self) -> String {
        match self {
            Command::SwitchCamera => SWITCH_CAMERA.to_string(),
            Command::ToggleFlash => TOGGLE_FLASH.to_string(),
            Command::SetZoom(level) => format!("{ZOOM_PREFIX}{level}"),
            Command::Unrecognized(text) => text.clone(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Command::Unrecognized(_))
    }
}

/// The camera controls a command can drive.
///
/// Only ever called from the control dispatcher thread, so implementations
/// need to be `Send` but not `Sync`.
pub trait CameraControl: Send {
    fn set_zoom_level(&mut self, level: f32);

    /// Turn the torch on or off.
    fn toggle_torch(&mut self, on: bool);

    /// Rebind the camera to the other lens.
    fn switch_lens_facing(&mut self);

    /// Whether the active lens has a flash unit.
    fn has_flash_unit(&self) -> bool {
        true
    }
}

/// Camera state the dispatcher tracks across commands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub torch_on: bool,
}

impl ControlState {
    /// Apply one command to the camera.
    pub fn apply(&mut self, camera: &mut dyn CameraControl, command: &Command) -> Result<()> {
        match command {
            Command::SetZoom(level) => {
                if !level.is_finite() || !(0.0..=1.0).contains(level) {
                    return Err(SessionError::MalformedCommand(format!(
                        "zoom level {level} outside 0.0..=1.0"
                    )));
                }
                camera.set_zoom_level(*level);
            }
            Command::ToggleFlash => {
                if !camera.has_flash_unit() {
                    debug!("torch toggle ignored, no flash unit");
                    return Ok(());
                }
                self.torch_on = !self.torch_on;
                camera.toggle_torch(self.torch_on);
            }
            Command::SwitchCamera => {
                camera.switch_lens_facing();
                self.torch_on = false;
            }
            Command::Unrecognized(_) => {}
        }
        Ok(())
    }
}

enum ControlMessage {
    Dispatch(Command),
    Stop,
}

/// Owns the camera on a dedicated thread and applies commands in arrival order.
pub struct ControlDispatcher {
    tx: Sender<ControlMessage>,
    handle: Option<JoinHandle<()>>,
}

impl ControlDispatcher {
    pub fn spawn(camera: Box<dyn CameraControl>) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("camlink-control".to_string())
            .spawn(move || run_dispatch_loop(camera, rx))
            .map_err(SessionError::Spawn)?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// A handle sessions use to submit commands.
    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stop the dispatcher thread after it drains queued commands.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.tx.send(ControlMessage::Stop);
        if handle.join().is_err() {
            warn!("control dispatcher thread panicked");
        }
    }
}

impl Drop for ControlDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Cloneable sender side of the control dispatcher.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Sender<ControlMessage>,
}

impl ControlHandle {
    /// Queue a command. Unrecognized commands are dropped here.
    ///
    /// Returns `false` when the command was not queued.
    pub fn dispatch(&self, command: Command) -> bool {
        if !command.is_recognized() {
            return false;
        }
        self.tx.send(ControlMessage::Dispatch(command)).is_ok()
    }
}

fn run_dispatch_loop(mut camera: Box<dyn CameraControl>, rx: Receiver<ControlMessage>) {
    let mut state = ControlState::default();
    while let Ok(message) = rx.recv() {
        match message {
            ControlMessage::Dispatch(command) => {
                debug!(command = ?command, "applying camera command");
                if let Err(err) = state.apply(camera.as_mut(), &command) {
                    warn!(error = %err, "camera command rejected");
                }
            }
            ControlMessage::Stop => break,
        }
    }
    info!("control dispatcher stopped");
}
