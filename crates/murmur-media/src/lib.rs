//! # murmur-media
//!
//! The capture-side media pipeline:
//!
//! - [`recorder::Recorder`] — audio capture state machine with the 60-second
//!   hard cap
//! - [`transcriber::Transcriber`] — live dictation accumulating finalized
//!   utterances, plus speech-engine backends
//! - [`stager::MediaStager`] — staged images/audio for one editing session
//! - [`capture::CaptureSession`] — binds the three together and serializes
//!   saves

pub mod capture;
pub mod recorder;
pub mod stager;
pub mod transcriber;

pub use capture::{CaptureResult, CaptureSession};
pub use recorder::{AudioInput, Recorder, RecorderState, StubMicrophone};
pub use stager::{ExistingImage, MediaSnapshot, MediaStager, NewImage, StagedAudio};
pub use transcriber::{
    HttpSpeechEngine, ScriptedSpeechEngine, SpeechEngine, SpeechFragment, SpeechSession,
    Transcriber,
};
