//! Audio capture state machine.
//!
//! All recording transitions live in this one type, driven synchronously
//! from the event loop: `start()`, per-second `tick()`s, chunk pushes from
//! the input device, and `stop()`. The 60-second hard cap truncates, never
//! rejects.

use tracing::debug;

use murmur_core::defaults::MAX_RECORDING_SECS;
use murmur_core::{format_mm_ss, Error, Result};

/// Boundary to the microphone. The real device lives in a client; the
/// server-side recorder only needs to know whether access can be opened.
pub trait AudioInput: Send {
    /// Acquire the device. Fails with `DeviceUnavailable` when microphone
    /// access is denied or absent.
    fn open(&mut self) -> Result<()>;

    /// Release the device. Infallible; called on every stop.
    fn close(&mut self);
}

/// Test-double microphone with a fixed grant decision.
pub struct StubMicrophone {
    available: bool,
}

impl StubMicrophone {
    /// A microphone the user has granted access to.
    pub fn granted() -> Self {
        Self { available: true }
    }

    /// A microphone that is denied or absent.
    pub fn denied() -> Self {
        Self { available: false }
    }
}

impl AudioInput for StubMicrophone {
    fn open(&mut self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::DeviceUnavailable("microphone access denied".into()))
        }
    }

    fn close(&mut self) {}
}

/// Recording lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Stopped,
}

/// Captures microphone audio into a finite byte buffer.
///
/// State machine: `Idle --start--> Recording --stop--> Stopped`, with an
/// automatic transition to `Stopped` when elapsed time reaches the
/// 60-second cap.
pub struct Recorder {
    input: Box<dyn AudioInput>,
    state: RecorderState,
    elapsed_secs: u64,
    buffer: Vec<u8>,
}

impl Recorder {
    pub fn new(input: impl AudioInput + 'static) -> Self {
        Self {
            input: Box::new(input),
            state: RecorderState::Idle,
            elapsed_secs: 0,
            buffer: Vec::new(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Elapsed whole seconds of the current (or finished) recording.
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Elapsed time as a zero-padded `mm:ss` string.
    pub fn elapsed_display(&self) -> String {
        format_mm_ss(self.elapsed_secs)
    }

    /// Begin capturing.
    ///
    /// From `Idle` or `Stopped` this opens the device and starts a fresh
    /// recording (any previous buffer is discarded). While already
    /// `Recording` it is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.state == RecorderState::Recording {
            return Ok(());
        }
        self.input.open()?;
        self.buffer.clear();
        self.elapsed_secs = 0;
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Append a chunk of captured audio. Ignored unless `Recording`.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        if self.state == RecorderState::Recording {
            self.buffer.extend_from_slice(chunk);
        }
    }

    /// Advance the clock by one second.
    ///
    /// Called once per second while recording. Reaching the cap force-stops
    /// the session; elapsed time never exceeds the cap.
    pub fn tick(&mut self) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.elapsed_secs += 1;
        if self.elapsed_secs >= MAX_RECORDING_SECS {
            self.elapsed_secs = MAX_RECORDING_SECS;
            debug!(size_bytes = self.buffer.len(), "recording cap reached, force-stopping");
            self.halt();
        }
    }

    /// Stop capturing and return the accumulated bytes.
    ///
    /// Idempotent after stop; calling while `Idle` is a no-op returning no
    /// bytes.
    pub fn stop(&mut self) -> Vec<u8> {
        match self.state {
            RecorderState::Idle => Vec::new(),
            RecorderState::Recording => {
                self.halt();
                self.buffer.clone()
            }
            RecorderState::Stopped => self.buffer.clone(),
        }
    }

    /// Discard any captured audio and return to `Idle`.
    pub fn reset(&mut self) {
        if self.state == RecorderState::Recording {
            self.halt();
        }
        self.buffer.clear();
        self.elapsed_secs = 0;
        self.state = RecorderState::Idle;
    }

    fn halt(&mut self) {
        self.input.close();
        self.state = RecorderState::Stopped;
    }
}
